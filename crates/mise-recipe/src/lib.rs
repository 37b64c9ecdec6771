//! Mise Recipe
//!
//! This crate provides the validated recipe representation for mise.
//! A [`Recipe`] is built from a [`mise_config::RecipeDef`] only after the
//! graph passed structural validation and a deterministic run order was
//! computed.
//!
//! Key differences from `mise-config`:
//! - The node/edge graph is acyclic and every reference points at a known node
//! - Output keys are unique
//! - Every node output read through an input mapping comes from a declared
//!   (transitive) dependency
//! - Nodes are available in their scheduled order

mod error;
mod graph;
mod recipe;
mod schedule;
mod validate;

#[cfg(test)]
mod testing;

pub use error::{RecipeError, ScheduleError, ValidationError};
pub use graph::Graph;
pub use recipe::Recipe;
pub use schedule::order;
pub use validate::validate;
