//! Action dispatch.
//!
//! The dispatcher runs one node to a settled outcome. It resolves inputs,
//! routes the node to its capability, enforces the node's time budget and
//! applies the node's error policy. Every attempt is returned for the
//! execution record, whatever its outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use mise_artifact::Store as ArtifactStore;
use mise_capability::{
  CapabilityError, CapabilityRegistry, GenerateOptions, GeneratedImage, GeneratedText,
};
use mise_config::{ActionDef, GenerationConfig, NodeDef, NodeKind, OnError, ResponseFormat};
use mise_recipe::Recipe;
use mise_store::{ErrorKind, NodeError, NodeResult, NodeStatus};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::EngineConfig;
use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::input::{ExecutionContext, MappingError, resolve, resolve_partial, resolve_source};
use crate::template;

/// The settled outcome of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
  pub status: NodeStatus,
  /// The capability output, the default output when skipped, null when failed.
  pub output: Value,
  pub attempts: Vec<NodeResult>,
  pub error: Option<NodeError>,
}

impl NodeOutcome {
  pub fn is_failed(&self) -> bool {
    self.status == NodeStatus::Failed
  }
}

impl From<MappingError> for NodeError {
  fn from(e: MappingError) -> Self {
    NodeError::new(ErrorKind::Mapping, e.to_string())
  }
}

fn capability_error(e: CapabilityError) -> NodeError {
  NodeError::new(ErrorKind::Capability, e.to_string())
}

/// Routes nodes to capability executors.
pub struct Dispatcher {
  registry: Arc<CapabilityRegistry>,
  artifacts: Arc<dyn ArtifactStore>,
  notifier: Arc<dyn ExecutionNotifier>,
  config: EngineConfig,
}

impl Dispatcher {
  pub fn new(
    registry: Arc<CapabilityRegistry>,
    artifacts: Arc<dyn ArtifactStore>,
    notifier: Arc<dyn ExecutionNotifier>,
    config: EngineConfig,
  ) -> Self {
    Self {
      registry,
      artifacts,
      notifier,
      config,
    }
  }

  /// Run a node until it settles as Completed, Skipped or Failed.
  #[instrument(
    name = "node_dispatch",
    skip(self, recipe, node, ctx, cancel),
    fields(
      execution_id = %ctx.execution_id(),
      node_id = %node.id,
    )
  )]
  pub async fn execute_action(
    &self,
    recipe: &Recipe,
    node: &NodeDef,
    ctx: &ExecutionContext,
    cancel: &CancellationToken,
  ) -> NodeOutcome {
    let policy = recipe.error_policy(node);
    let timeout = self.config.node_timeout(recipe, node);
    let max_attempts = match policy.on_error {
      OnError::Retry => policy.retry_count.saturating_add(1),
      _ => 1,
    };

    let mut attempts = Vec::new();
    let mut attempt = 1;

    loop {
      self.notifier.notify(ExecutionEvent::NodeStarted {
        execution_id: ctx.execution_id().to_string(),
        node_id: node.id.clone(),
        attempt,
      });
      info!(attempt, kind = %node.kind(), "node_started");

      let started_at = Utc::now();
      let clock = Instant::now();

      let (resolved_input, result) = match resolve(&node.input_mapping, ctx) {
        Ok(params) => {
          let result = self.run_with_timeout(node, &params, ctx, timeout).await;
          (Value::Object(params), result)
        }
        Err(e) => (
          Value::Object(resolve_partial(&node.input_mapping, ctx)),
          Err(NodeError::from(e)),
        ),
      };

      let mut record = NodeResult {
        node_id: node.id.clone(),
        attempt,
        status: NodeStatus::Completed,
        resolved_input,
        output: Value::Null,
        started_at,
        completed_at: Utc::now(),
        duration_ms: clock.elapsed().as_millis() as u64,
        error: None,
      };

      let node_error = match result {
        Ok(output) => {
          record.output = output.clone();
          attempts.push(record);
          info!(attempt, "node_completed");
          self.notifier.notify(ExecutionEvent::NodeCompleted {
            execution_id: ctx.execution_id().to_string(),
            node_id: node.id.clone(),
            output: output.clone(),
          });
          return NodeOutcome {
            status: NodeStatus::Completed,
            output,
            attempts,
            error: None,
          };
        }
        Err(e) => e,
      };

      // Only provider failures and timeouts are worth another attempt;
      // mapping errors are deterministic.
      let retryable = matches!(node_error.kind, ErrorKind::Capability | ErrorKind::Timeout);
      if policy.on_error == OnError::Retry && retryable && attempt < max_attempts {
        record.status = NodeStatus::Failed;
        record.error = Some(node_error.clone());
        attempts.push(record);

        let delay = self
          .config
          .retry_delay(&recipe.execution_config().retry_policy, attempt);
        warn!(
          attempt,
          delay_ms = delay.as_millis() as u64,
          error = %node_error,
          "node_retrying"
        );
        self.notifier.notify(ExecutionEvent::NodeRetrying {
          execution_id: ctx.execution_id().to_string(),
          node_id: node.id.clone(),
          attempt,
          delay_ms: delay.as_millis() as u64,
          error: node_error.to_string(),
        });

        tokio::select! {
          _ = tokio::time::sleep(delay) => {}
          _ = cancel.cancelled() => {
            return self.failed(node, ctx, attempts, NodeError::new(ErrorKind::Cancelled, "execution cancelled during retry wait"));
          }
        }

        attempt += 1;
        continue;
      }

      if policy.on_error == OnError::Skip {
        record.status = NodeStatus::Skipped;
        record.output = policy.default_output.clone();
        record.error = Some(node_error.clone());
        attempts.push(record);

        warn!(attempt, error = %node_error, "node_skipped");
        self.notifier.notify(ExecutionEvent::NodeSkipped {
          execution_id: ctx.execution_id().to_string(),
          node_id: node.id.clone(),
          error: node_error.to_string(),
        });
        return NodeOutcome {
          status: NodeStatus::Skipped,
          output: policy.default_output,
          attempts,
          error: Some(node_error),
        };
      }

      record.status = NodeStatus::Failed;
      record.error = Some(node_error.clone());
      attempts.push(record);
      return self.failed(node, ctx, attempts, node_error);
    }
  }

  fn failed(
    &self,
    node: &NodeDef,
    ctx: &ExecutionContext,
    attempts: Vec<NodeResult>,
    node_error: NodeError,
  ) -> NodeOutcome {
    error!(error = %node_error, attempts = attempts.len(), "node_failed");
    self.notifier.notify(ExecutionEvent::NodeFailed {
      execution_id: ctx.execution_id().to_string(),
      node_id: node.id.clone(),
      error: node_error.to_string(),
    });
    NodeOutcome {
      status: NodeStatus::Failed,
      output: Value::Null,
      attempts,
      error: Some(node_error),
    }
  }

  /// Run one attempt inside the node's budget. On timeout the in-flight call
  /// is dropped.
  async fn run_with_timeout(
    &self,
    node: &NodeDef,
    params: &Map<String, Value>,
    ctx: &ExecutionContext,
    timeout: Duration,
  ) -> Result<Value, NodeError> {
    match tokio::time::timeout(timeout, self.run_action(node, params, ctx)).await {
      Ok(result) => result,
      Err(_) => Err(NodeError::new(
        ErrorKind::Timeout,
        format!("node '{}' exceeded its {}ms budget", node.id, timeout.as_millis()),
      )),
    }
  }

  async fn run_action(
    &self,
    node: &NodeDef,
    params: &Map<String, Value>,
    ctx: &ExecutionContext,
  ) -> Result<Value, NodeError> {
    let generation = match &node.action {
      ActionDef::DataProcessing { operation } => {
        return self
          .registry
          .data()
          .process(operation, params)
          .await
          .map_err(capability_error);
      }
      ActionDef::TextGeneration(generation)
      | ActionDef::ImageGeneration(generation)
      | ActionDef::VideoGeneration(generation) => generation,
    };

    let Some(source) = &node.for_each else {
      return self.generate(node, generation, params, ctx, None).await;
    };

    let items = match resolve_source("for_each", source, ctx)? {
      Value::Array(items) => items,
      _ => {
        return Err(
          MappingError::NotAnArray {
            source_ref: source.to_string(),
          }
          .into(),
        );
      }
    };

    let mut outputs = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
      outputs.push(
        self
          .generate(node, generation, params, ctx, Some((index, item)))
          .await?,
      );
    }
    Ok(Value::Array(outputs))
  }

  /// One capability call, optionally for one fan-out item.
  async fn generate(
    &self,
    node: &NodeDef,
    generation: &GenerationConfig,
    params: &Map<String, Value>,
    ctx: &ExecutionContext,
    item: Option<(usize, &Value)>,
  ) -> Result<Value, NodeError> {
    let mut vars = params.clone();
    if let Some((index, item)) = item {
      vars.insert("item".to_string(), item.clone());
      vars.insert("index".to_string(), json!(index));
    }
    let prompt = template::render(&generation.prompt, &vars);

    let options = GenerateOptions {
      model: generation.model.clone(),
      params: params.clone(),
      options: generation.options.clone(),
      execution_id: ctx.execution_id().to_string(),
      node_id: node.id.clone(),
      item_index: item.map(|(index, _)| index),
    };
    let provider = generation.provider.as_deref();

    match node.kind() {
      NodeKind::TextGeneration => {
        let text = self
          .registry
          .text
          .get(provider)
          .map_err(capability_error)?
          .generate(&prompt, &options)
          .await
          .map_err(capability_error)?;
        text_output(text, generation.response_format)
      }
      NodeKind::ImageGeneration => {
        let image = self
          .registry
          .image
          .get(provider)
          .map_err(capability_error)?
          .generate(&prompt, &options)
          .await
          .map_err(capability_error)?;
        self
          .persist_image(ctx.execution_id(), &node.id, options.item_index.unwrap_or(0), image)
          .await
      }
      NodeKind::VideoGeneration => {
        let video = self
          .registry
          .video
          .get(provider)
          .map_err(capability_error)?
          .generate(&prompt, &options)
          .await
          .map_err(capability_error)?;
        serde_json::to_value(video).map_err(|e| {
          capability_error(CapabilityError::invalid_output(e.to_string()))
        })
      }
      NodeKind::DataProcessing => Err(NodeError::new(
        ErrorKind::Fatal,
        format!("node '{}' is not a generation node", node.id),
      )),
    }
  }

  /// Store an image buffer and return its reference. URLs pass through.
  async fn persist_image(
    &self,
    execution_id: &str,
    node_id: &str,
    index: usize,
    image: GeneratedImage,
  ) -> Result<Value, NodeError> {
    match image {
      GeneratedImage::Url { url } => Ok(json!({ "url": url })),
      GeneratedImage::Buffer { data, content_type } => {
        let key = artifact_key(execution_id, node_id, index, &content_type);
        self
          .artifacts
          .put_bytes(&key, data, &content_type)
          .await
          .map_err(|e| {
            NodeError::new(
              ErrorKind::Capability,
              format!("failed to store artifact '{}': {}", key, e),
            )
          })?;
        Ok(json!({ "artifact_key": key, "content_type": content_type }))
      }
    }
  }
}

/// `executions/<execution_id>/<node_id>/<index>.<ext>`
pub fn artifact_key(execution_id: &str, node_id: &str, index: usize, content_type: &str) -> String {
  let ext = match content_type {
    "image/png" => "png",
    "image/jpeg" | "image/jpg" => "jpg",
    "image/webp" => "webp",
    "image/gif" => "gif",
    _ => "bin",
  };
  format!("executions/{}/{}/{}.{}", execution_id, node_id, index, ext)
}

fn text_output(text: GeneratedText, format: ResponseFormat) -> Result<Value, NodeError> {
  match format {
    ResponseFormat::Text => Ok(Value::String(text.text)),
    ResponseFormat::Json => serde_json::from_str(strip_code_fence(&text.text)).map_err(|e| {
      capability_error(CapabilityError::invalid_output(format!(
        "expected JSON text: {}",
        e
      )))
    }),
  }
}

/// Strip a surrounding Markdown code fence, with or without a language tag.
fn strip_code_fence(text: &str) -> &str {
  let trimmed = text.trim();
  let Some(body) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  let Some(body) = body.strip_suffix("```") else {
    return trimmed;
  };
  match body.split_once('\n') {
    Some((tag, rest)) if !tag.trim_start().starts_with(['{', '[']) => rest.trim(),
    _ => body.trim(),
  }
}
