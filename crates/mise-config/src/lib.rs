//! Mise Config
//!
//! This crate contains the serializable recipe configuration types for mise.
//! These types represent recipe definitions before they are validated and
//! scheduled by the engine.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `mise validate recipe.json`)
//! - A recipe store (as JSON blobs)
//!
//! Input references are parsed while deserializing, so a recipe with a
//! malformed reference never makes it past loading.

mod edge;
mod enums;
mod node;
mod recipe;
mod source;

pub use edge::Edge;
pub use enums::{DataOperation, NodeKind, OnError, ResponseFormat, RetryBackoff};
pub use node::{ActionDef, ErrorPolicy, GenerationConfig, NodeDef};
pub use recipe::{ExecutionConfig, RecipeDef, RetryPolicy};
pub use source::{INPUT_PREFIX, SourceRef, SourceRefError};
