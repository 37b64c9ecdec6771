//! Mise Capability
//!
//! Narrow, fixed-signature contracts for the work a recipe node dispatches
//! to. Generation capabilities wrap external, metered providers and are
//! treated as opaque network calls; the engine owns timeouts, retries and
//! error policy around them.
//!
//! ```text
//! TextGeneration   generate(prompt, options) -> GeneratedText
//! ImageGeneration  generate(prompt, options) -> GeneratedImage
//! VideoGeneration  generate(prompt, options) -> GeneratedVideo
//! DataProcessing   process(operation, params) -> serde_json::Value
//! ```
//!
//! [`CapabilityRegistry`] maps provider ids to implementations. The only
//! capability with logic of its own is [`MergeProcessor`], the built-in
//! deterministic data processor.

mod data;
mod error;
mod generation;
mod registry;

pub use data::{DataProcessing, MergeProcessor};
pub use error::CapabilityError;
pub use generation::{
  GenerateOptions, GeneratedImage, GeneratedText, GeneratedVideo, ImageGeneration, TextGeneration,
  VideoGeneration,
};
pub use registry::{CapabilityRegistry, Providers};
