//! Mise Engine
//!
//! Runs validated recipes against capability providers and keeps a durable,
//! poll-friendly execution record.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Orchestrator                          │
//! │  - execute_recipe(id, input, options) → ExecutionHandle     │
//! │  - validate, schedule, persist Running record               │
//! │  - dispatch nodes sequentially, persist after each          │
//! │  - get_execution_status / get_recipe_executions / cancel    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                           │
//! │  - input resolution, prompt templating                      │
//! │  - timeout, retry with backoff, skip / fail policy          │
//! │  - for_each fan-out, artifact persistence                   │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   CapabilityRegistry                        │
//! │  - text / image / video providers, data processor           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let orchestrator = Orchestrator::new(recipes, executions, registry, artifacts)
//!   .with_notifier(notifier);
//!
//! let handle = orchestrator
//!   .execute_recipe("product-shots", json!({ "count": 2 }), ExecutionOptions::default())
//!   .await?;
//!
//! // Either wait in-process or poll by id
//! let record = wait_for_terminal(&orchestrator, handle.execution_id(), &PollConfig::default()).await?;
//! ```

mod config;
mod dispatch;
mod error;
mod events;
mod input;
mod orchestrator;
mod poll;
mod template;

pub use config::{ConfigError, EngineConfig, PollConfig};
pub use dispatch::{Dispatcher, NodeOutcome, artifact_key};
pub use error::EngineError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use input::{ExecutionContext, MappingError, lookup_path, resolve, resolve_source};
pub use orchestrator::{ExecutionHandle, ExecutionOptions, Orchestrator};
pub use poll::{PollError, wait_for_terminal};
pub use template::render;
