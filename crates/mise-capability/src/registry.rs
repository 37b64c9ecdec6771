//! Provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use mise_config::NodeKind;

use crate::data::{DataProcessing, MergeProcessor};
use crate::error::CapabilityError;
use crate::generation::{ImageGeneration, TextGeneration, VideoGeneration};

/// Implementations of one capability, keyed by provider id.
///
/// The first provider registered becomes the default.
pub struct Providers<T: ?Sized> {
  capability: NodeKind,
  entries: HashMap<String, Arc<T>>,
  default: Option<String>,
}

impl<T: ?Sized> Providers<T> {
  fn new(capability: NodeKind) -> Self {
    Self {
      capability,
      entries: HashMap::new(),
      default: None,
    }
  }

  pub fn register(&mut self, id: impl Into<String>, provider: Arc<T>) {
    let id = id.into();
    if self.default.is_none() {
      self.default = Some(id.clone());
    }
    self.entries.insert(id, provider);
  }

  /// Look up a provider by id, or the default when `id` is `None`.
  pub fn get(&self, id: Option<&str>) -> Result<Arc<T>, CapabilityError> {
    let key = id.or(self.default.as_deref());
    key
      .and_then(|k| self.entries.get(k))
      .cloned()
      .ok_or_else(|| CapabilityError::ProviderNotFound {
        capability: self.capability,
        provider: id.map(str::to_string),
      })
  }
}

/// Registry of capability providers.
///
/// The data processor defaults to [`MergeProcessor`].
pub struct CapabilityRegistry {
  pub text: Providers<dyn TextGeneration>,
  pub image: Providers<dyn ImageGeneration>,
  pub video: Providers<dyn VideoGeneration>,
  data: Arc<dyn DataProcessing>,
}

impl CapabilityRegistry {
  pub fn new() -> Self {
    Self {
      text: Providers::new(NodeKind::TextGeneration),
      image: Providers::new(NodeKind::ImageGeneration),
      video: Providers::new(NodeKind::VideoGeneration),
      data: Arc::new(MergeProcessor),
    }
  }

  pub fn with_text(mut self, id: impl Into<String>, provider: Arc<dyn TextGeneration>) -> Self {
    self.text.register(id, provider);
    self
  }

  pub fn with_image(mut self, id: impl Into<String>, provider: Arc<dyn ImageGeneration>) -> Self {
    self.image.register(id, provider);
    self
  }

  pub fn with_video(mut self, id: impl Into<String>, provider: Arc<dyn VideoGeneration>) -> Self {
    self.video.register(id, provider);
    self
  }

  pub fn with_data(mut self, processor: Arc<dyn DataProcessing>) -> Self {
    self.data = processor;
    self
  }

  pub fn data(&self) -> Arc<dyn DataProcessing> {
    self.data.clone()
  }
}

impl Default for CapabilityRegistry {
  fn default() -> Self {
    Self::new()
  }
}
