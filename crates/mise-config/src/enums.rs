use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The capability a node dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
  TextGeneration,
  ImageGeneration,
  VideoGeneration,
  DataProcessing,
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      NodeKind::TextGeneration => "text_generation",
      NodeKind::ImageGeneration => "image_generation",
      NodeKind::VideoGeneration => "video_generation",
      NodeKind::DataProcessing => "data_processing",
    };
    f.write_str(name)
  }
}

/// What to do when a node fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
  /// Abort the run; no successor is dispatched.
  #[default]
  Fail,
  /// Record the node as skipped, store its default output and continue.
  Skip,
  /// Re-attempt up to `retry_count` more times, then fail.
  Retry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBackoff {
  #[default]
  Constant,
  Linear,
  Exponential,
}

/// How generated text is turned into a node output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
  /// The output is the generated text as a JSON string.
  #[default]
  Text,
  /// The generated text is parsed as JSON.
  Json,
}

/// Deterministic transformations performed by data processing nodes.
///
/// Operands name resolved input parameters of the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DataOperation {
  /// Positionally merge a base array of objects with one or more arrays of
  /// the same length. `attach` maps the field written on each base record to
  /// the parameter holding the attachment array.
  Zip {
    base: String,
    attach: BTreeMap<String, String>,
  },
  /// Shallow-merge several object parameters into one object.
  Merge { params: Vec<String> },
  /// Emit the resolved parameters as one object.
  Collect,
}

impl DataOperation {
  /// Parameter names this operation reads.
  pub fn operands(&self) -> Vec<&str> {
    match self {
      DataOperation::Zip { base, attach } => std::iter::once(base.as_str())
        .chain(attach.values().map(String::as_str))
        .collect(),
      DataOperation::Merge { params } => params.iter().map(String::as_str).collect(),
      DataOperation::Collect => Vec::new(),
    }
  }
}
