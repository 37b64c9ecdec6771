use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::enums::{DataOperation, NodeKind, OnError, ResponseFormat};
use crate::source::SourceRef;

/// One unit of work in a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub id: String,
  pub action: ActionDef,
  /// Tie-break hint among nodes that become runnable at the same time.
  #[serde(default)]
  pub order: i32,
  #[serde(default)]
  pub input_mapping: BTreeMap<String, SourceRef>,
  pub output_key: String,
  #[serde(default)]
  pub dependencies: BTreeSet<String>,
  /// When absent, the recipe's `continue_on_error` picks the policy.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_policy: Option<ErrorPolicy>,
  /// Run the capability once per element of the referenced array.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub for_each: Option<SourceRef>,
}

impl NodeDef {
  pub fn kind(&self) -> NodeKind {
    self.action.kind()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDef {
  TextGeneration(GenerationConfig),
  ImageGeneration(GenerationConfig),
  VideoGeneration(GenerationConfig),
  DataProcessing { operation: DataOperation },
}

impl ActionDef {
  pub fn kind(&self) -> NodeKind {
    match self {
      ActionDef::TextGeneration(_) => NodeKind::TextGeneration,
      ActionDef::ImageGeneration(_) => NodeKind::ImageGeneration,
      ActionDef::VideoGeneration(_) => NodeKind::VideoGeneration,
      ActionDef::DataProcessing { .. } => NodeKind::DataProcessing,
    }
  }

  pub fn generation(&self) -> Option<&GenerationConfig> {
    match self {
      ActionDef::TextGeneration(config)
      | ActionDef::ImageGeneration(config)
      | ActionDef::VideoGeneration(config) => Some(config),
      ActionDef::DataProcessing { .. } => None,
    }
  }
}

/// Model and prompt configuration shared by the generation capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
  /// Provider id in the capability registry; the default provider when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub provider: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  /// Prompt template. `{param}` tokens are substituted from resolved inputs.
  #[serde(default)]
  pub prompt: String,
  /// Only meaningful for text generation.
  #[serde(default)]
  pub response_format: ResponseFormat,
  /// Provider-specific options passed through untouched.
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub options: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPolicy {
  #[serde(default)]
  pub on_error: OnError,
  #[serde(default)]
  pub retry_count: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  /// Output stored for a skipped node. Absent means JSON null.
  #[serde(default)]
  pub default_output: serde_json::Value,
}

impl ErrorPolicy {
  pub fn fail() -> Self {
    Self::default()
  }

  pub fn skip(default_output: serde_json::Value) -> Self {
    Self {
      on_error: OnError::Skip,
      default_output,
      ..Self::default()
    }
  }

  pub fn retry(retry_count: u32) -> Self {
    Self {
      on_error: OnError::Retry,
      retry_count,
      ..Self::default()
    }
  }

  pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.timeout_ms = Some(timeout_ms);
    self
  }
}
