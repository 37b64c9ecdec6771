use mise_config::NodeKind;

/// Errors raised by capability executors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilityError {
  /// The provider call failed.
  #[error("provider call failed: {0}")]
  Provider(String),

  /// The provider answered, but the result cannot be used.
  #[error("unusable provider result: {0}")]
  InvalidOutput(String),

  /// No provider registered under the requested id.
  #[error("no {capability} provider registered{}", .provider.as_ref().map(|p| format!(" as '{}'", p)).unwrap_or_default())]
  ProviderNotFound {
    capability: NodeKind,
    provider: Option<String>,
  },

  /// Parallel arrays handed to a merge differ in length.
  #[error("'{field}' has {actual} items but '{base}' has {expected}")]
  CountMismatch {
    base: String,
    expected: usize,
    field: String,
    actual: usize,
  },

  /// A data processing operand has the wrong shape.
  #[error("invalid operand '{param}': {message}")]
  InvalidOperand { param: String, message: String },
}

impl CapabilityError {
  pub fn provider(message: impl Into<String>) -> Self {
    CapabilityError::Provider(message.into())
  }

  pub fn invalid_output(message: impl Into<String>) -> Self {
    CapabilityError::InvalidOutput(message.into())
  }

  pub(crate) fn invalid_operand(param: &str, message: impl Into<String>) -> Self {
    CapabilityError::InvalidOperand {
      param: param.to_string(),
      message: message.into(),
    }
  }
}
