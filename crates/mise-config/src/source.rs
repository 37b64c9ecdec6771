//! Typed references to node input sources.
//!
//! A reference is written as a compact string in recipe files:
//!
//! ```json
//! {
//!   "count": "input.count",
//!   "details": "gen_text",
//!   "first_name": "gen_text.0.name"
//! }
//! ```
//!
//! - `input.<field>` reads from the caller's input object.
//! - `<node_id>` reads the whole output of another node.
//! - `<node_id>.<subpath>` reads a dotted path into that output; numeric
//!   segments index arrays.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix reserved for external input references.
pub const INPUT_PREFIX: &str = "input";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceRefError {
  #[error("source reference is empty")]
  Empty,

  #[error("source reference '{0}' has an empty path segment")]
  EmptySegment(String),

  #[error("source reference '{0}' names no input field")]
  MissingField(String),
}

/// Where a node input comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceRef {
  /// A field of the external input object (dotted path allowed).
  ExternalInput { field: String },
  /// The output of another node, optionally narrowed by a dotted subpath.
  NodeOutput {
    node_id: String,
    subpath: Option<String>,
  },
}

impl SourceRef {
  pub fn input(field: impl Into<String>) -> Self {
    SourceRef::ExternalInput {
      field: field.into(),
    }
  }

  pub fn node(node_id: impl Into<String>) -> Self {
    SourceRef::NodeOutput {
      node_id: node_id.into(),
      subpath: None,
    }
  }

  pub fn node_path(node_id: impl Into<String>, subpath: impl Into<String>) -> Self {
    SourceRef::NodeOutput {
      node_id: node_id.into(),
      subpath: Some(subpath.into()),
    }
  }

  /// The node this reference depends on, if any.
  pub fn node_id(&self) -> Option<&str> {
    match self {
      SourceRef::ExternalInput { .. } => None,
      SourceRef::NodeOutput { node_id, .. } => Some(node_id),
    }
  }
}

impl FromStr for SourceRef {
  type Err = SourceRefError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if s.is_empty() {
      return Err(SourceRefError::Empty);
    }
    if s.split('.').any(str::is_empty) {
      return Err(SourceRefError::EmptySegment(s.to_string()));
    }

    let (head, rest) = match s.split_once('.') {
      Some((head, rest)) => (head, Some(rest)),
      None => (s, None),
    };

    if head == INPUT_PREFIX {
      let field = rest.ok_or_else(|| SourceRefError::MissingField(s.to_string()))?;
      return Ok(SourceRef::input(field));
    }

    Ok(SourceRef::NodeOutput {
      node_id: head.to_string(),
      subpath: rest.map(str::to_string),
    })
  }
}

impl TryFrom<String> for SourceRef {
  type Error = SourceRefError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<SourceRef> for String {
  fn from(value: SourceRef) -> Self {
    value.to_string()
  }
}

impl fmt::Display for SourceRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SourceRef::ExternalInput { field } => write!(f, "{}.{}", INPUT_PREFIX, field),
      SourceRef::NodeOutput {
        node_id,
        subpath: Some(path),
      } => write!(f, "{}.{}", node_id, path),
      SourceRef::NodeOutput {
        node_id,
        subpath: None,
      } => f.write_str(node_id),
    }
  }
}
