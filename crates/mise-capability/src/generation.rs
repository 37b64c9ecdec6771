//! Generation capability contracts.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// Options handed to a generation provider alongside the rendered prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
  pub model: Option<String>,
  /// The node's resolved input parameters.
  pub params: serde_json::Map<String, serde_json::Value>,
  /// Provider-specific options from the recipe, passed through untouched.
  pub options: serde_json::Map<String, serde_json::Value>,
  pub execution_id: String,
  pub node_id: String,
  /// Position within a `for_each` fan-out.
  pub item_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedText {
  pub text: String,
}

impl GeneratedText {
  pub fn new(text: impl Into<String>) -> Self {
    Self { text: text.into() }
  }
}

/// An image either returned inline or hosted by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
  Buffer { data: Bytes, content_type: String },
  Url { url: String },
}

impl GeneratedImage {
  pub fn png(data: impl Into<Bytes>) -> Self {
    GeneratedImage::Buffer {
      data: data.into(),
      content_type: "image/png".to_string(),
    }
  }

  pub fn url(url: impl Into<String>) -> Self {
    GeneratedImage::Url { url: url.into() }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedVideo {
  pub video_url: String,
  pub duration_seconds: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub thumbnail_url: Option<String>,
}

#[async_trait]
pub trait TextGeneration: Send + Sync {
  async fn generate(
    &self,
    prompt: &str,
    options: &GenerateOptions,
  ) -> Result<GeneratedText, CapabilityError>;
}

#[async_trait]
pub trait ImageGeneration: Send + Sync {
  async fn generate(
    &self,
    prompt: &str,
    options: &GenerateOptions,
  ) -> Result<GeneratedImage, CapabilityError>;
}

#[async_trait]
pub trait VideoGeneration: Send + Sync {
  async fn generate(
    &self,
    prompt: &str,
    options: &GenerateOptions,
  ) -> Result<GeneratedVideo, CapabilityError>;
}
