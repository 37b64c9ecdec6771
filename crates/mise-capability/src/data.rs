//! Deterministic data processing.
//!
//! Data processing nodes combine outputs that upstream nodes already
//! produced. Merges are positional and strict: arrays that should line up
//! but differ in length are an error, never truncated or padded.

use async_trait::async_trait;
use mise_config::DataOperation;
use serde_json::{Map, Value};

use crate::error::CapabilityError;

#[async_trait]
pub trait DataProcessing: Send + Sync {
  async fn process(
    &self,
    operation: &DataOperation,
    params: &Map<String, Value>,
  ) -> Result<Value, CapabilityError>;
}

/// The built-in data processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeProcessor;

#[async_trait]
impl DataProcessing for MergeProcessor {
  async fn process(
    &self,
    operation: &DataOperation,
    params: &Map<String, Value>,
  ) -> Result<Value, CapabilityError> {
    apply(operation, params)
  }
}

/// Apply an operation to resolved parameters.
pub(crate) fn apply(
  operation: &DataOperation,
  params: &Map<String, Value>,
) -> Result<Value, CapabilityError> {
  match operation {
    DataOperation::Zip { base, attach } => zip(base, attach, params),
    DataOperation::Merge { params: names } => merge(names, params),
    DataOperation::Collect => Ok(Value::Object(params.clone())),
  }
}

fn operand<'a>(params: &'a Map<String, Value>, name: &str) -> Result<&'a Value, CapabilityError> {
  params
    .get(name)
    .ok_or_else(|| CapabilityError::invalid_operand(name, "parameter was not resolved"))
}

fn array_operand<'a>(
  params: &'a Map<String, Value>,
  name: &str,
) -> Result<&'a Vec<Value>, CapabilityError> {
  operand(params, name)?
    .as_array()
    .ok_or_else(|| CapabilityError::invalid_operand(name, "expected an array"))
}

fn zip(
  base: &str,
  attach: &std::collections::BTreeMap<String, String>,
  params: &Map<String, Value>,
) -> Result<Value, CapabilityError> {
  let records = array_operand(params, base)?;

  let mut columns = Vec::with_capacity(attach.len());
  for (field, param) in attach {
    let column = array_operand(params, param)?;
    if column.len() != records.len() {
      return Err(CapabilityError::CountMismatch {
        base: base.to_string(),
        expected: records.len(),
        field: param.clone(),
        actual: column.len(),
      });
    }
    columns.push((field, column));
  }

  let mut merged = Vec::with_capacity(records.len());
  for (index, record) in records.iter().enumerate() {
    let mut record = record
      .as_object()
      .cloned()
      .ok_or_else(|| CapabilityError::invalid_operand(base, format!("item {} is not an object", index)))?;

    for (field, column) in &columns {
      if record.contains_key(field.as_str()) {
        return Err(CapabilityError::invalid_operand(
          base,
          format!("item {} already has a '{}' field", index, field),
        ));
      }
      record.insert((*field).clone(), column[index].clone());
    }

    merged.push(Value::Object(record));
  }

  Ok(Value::Array(merged))
}

fn merge(names: &[String], params: &Map<String, Value>) -> Result<Value, CapabilityError> {
  let mut merged = Map::new();
  for name in names {
    let object = operand(params, name)?
      .as_object()
      .ok_or_else(|| CapabilityError::invalid_operand(name, "expected an object"))?;

    for (key, value) in object {
      if merged.insert(key.clone(), value.clone()).is_some() {
        return Err(CapabilityError::invalid_operand(
          name,
          format!("key '{}' is already set by an earlier parameter", key),
        ));
      }
    }
  }
  Ok(Value::Object(merged))
}
