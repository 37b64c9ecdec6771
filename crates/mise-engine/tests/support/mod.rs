//! Shared fixtures: scripted capability providers and recipe builders.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mise_artifact::MemoryStore;
use mise_capability::{
  CapabilityError, CapabilityRegistry, GenerateOptions, GeneratedImage, GeneratedText,
  GeneratedVideo, ImageGeneration, TextGeneration, VideoGeneration,
};
use mise_config::{
  ActionDef, DataOperation, Edge, ErrorPolicy, ExecutionConfig, GenerationConfig, NodeDef,
  RecipeDef, SourceRef,
};
use mise_engine::{EngineConfig, Orchestrator};
use mise_store::{MemoryExecutionStore, MemoryRecipeStore};

/// A provider that replays a queue of responses and records its calls.
pub struct Scripted<T> {
  responses: Mutex<VecDeque<Result<T, CapabilityError>>>,
  calls: AtomicUsize,
  prompts: Mutex<Vec<String>>,
  delay: Option<Duration>,
}

impl<T: Clone + Send> Scripted<T> {
  pub fn new(responses: impl IntoIterator<Item = Result<T, CapabilityError>>) -> Arc<Self> {
    Arc::new(Self {
      responses: Mutex::new(responses.into_iter().collect()),
      calls: AtomicUsize::new(0),
      prompts: Mutex::new(Vec::new()),
      delay: None,
    })
  }

  /// Sleep before answering each call.
  pub fn delayed(
    delay: Duration,
    responses: impl IntoIterator<Item = Result<T, CapabilityError>>,
  ) -> Arc<Self> {
    Arc::new(Self {
      responses: Mutex::new(responses.into_iter().collect()),
      calls: AtomicUsize::new(0),
      prompts: Mutex::new(Vec::new()),
      delay: Some(delay),
    })
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn prompts(&self) -> Vec<String> {
    self.prompts.lock().unwrap().clone()
  }

  async fn next(&self, prompt: &str) -> Result<T, CapabilityError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.prompts.lock().unwrap().push(prompt.to_string());
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    self
      .responses
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Err(CapabilityError::provider("no scripted response left")))
  }
}

#[async_trait]
impl TextGeneration for Scripted<GeneratedText> {
  async fn generate(
    &self,
    prompt: &str,
    _options: &GenerateOptions,
  ) -> Result<GeneratedText, CapabilityError> {
    self.next(prompt).await
  }
}

#[async_trait]
impl ImageGeneration for Scripted<GeneratedImage> {
  async fn generate(
    &self,
    prompt: &str,
    _options: &GenerateOptions,
  ) -> Result<GeneratedImage, CapabilityError> {
    self.next(prompt).await
  }
}

#[async_trait]
impl VideoGeneration for Scripted<GeneratedVideo> {
  async fn generate(
    &self,
    prompt: &str,
    _options: &GenerateOptions,
  ) -> Result<GeneratedVideo, CapabilityError> {
    self.next(prompt).await
  }
}

pub fn text(value: &str) -> Result<GeneratedText, CapabilityError> {
  Ok(GeneratedText::new(value))
}

pub fn provider_error(message: &str) -> Result<GeneratedText, CapabilityError> {
  Err(CapabilityError::provider(message))
}

pub fn generation(provider: &str, prompt: &str) -> GenerationConfig {
  GenerationConfig {
    provider: Some(provider.to_string()),
    prompt: prompt.to_string(),
    ..GenerationConfig::default()
  }
}

/// A node whose output key equals its id.
pub fn node(id: &str, action: ActionDef, deps: &[&str], mapping: &[(&str, SourceRef)]) -> NodeDef {
  NodeDef {
    id: id.to_string(),
    action,
    order: 0,
    input_mapping: mapping
      .iter()
      .map(|(param, source)| (param.to_string(), source.clone()))
      .collect::<BTreeMap<_, _>>(),
    output_key: id.to_string(),
    dependencies: deps.iter().map(|d| d.to_string()).collect(),
    error_policy: None,
    for_each: None,
  }
}

pub fn text_node(id: &str, provider: &str, deps: &[&str], mapping: &[(&str, SourceRef)]) -> NodeDef {
  node(
    id,
    ActionDef::TextGeneration(generation(provider, &format!("run {}", id))),
    deps,
    mapping,
  )
}

pub fn data_node(
  id: &str,
  operation: DataOperation,
  deps: &[&str],
  mapping: &[(&str, SourceRef)],
) -> NodeDef {
  node(id, ActionDef::DataProcessing { operation }, deps, mapping)
}

pub fn with_policy(mut node: NodeDef, policy: ErrorPolicy) -> NodeDef {
  node.error_policy = Some(policy);
  node
}

/// A recipe whose edges mirror each node's dependencies.
pub fn recipe(id: &str, nodes: Vec<NodeDef>) -> RecipeDef {
  let edges = nodes
    .iter()
    .flat_map(|n| n.dependencies.iter().map(|d| Edge::new(d.clone(), n.id.clone())))
    .collect();
  RecipeDef {
    id: id.to_string(),
    name: id.to_string(),
    stage_type: "test".to_string(),
    version: 1,
    nodes,
    edges,
    execution_config: ExecutionConfig::default(),
  }
}

/// Config with millisecond retry delays and a node budget small enough for
/// retried nodes to fit the polling window.
pub fn fast_config() -> EngineConfig {
  EngineConfig {
    default_node_timeout_ms: 5_000,
    min_retry_delay_ms: 1,
    max_retry_delay_ms: 10,
    ..EngineConfig::default()
  }
}

pub struct Harness {
  pub orchestrator: Orchestrator,
  pub executions: MemoryExecutionStore,
  pub recipes: MemoryRecipeStore,
  pub artifacts: MemoryStore,
}

pub fn harness(recipes: Vec<RecipeDef>, registry: CapabilityRegistry) -> Harness {
  let executions = MemoryExecutionStore::new();
  let recipe_store = MemoryRecipeStore::with_recipes(recipes);
  let artifacts = MemoryStore::new();

  let orchestrator = Orchestrator::new(
    Arc::new(recipe_store.clone()),
    Arc::new(executions.clone()),
    registry,
    Arc::new(artifacts.clone()),
  )
  .with_config(fast_config())
  .expect("fast config is valid");

  Harness {
    orchestrator,
    executions,
    recipes: recipe_store,
    artifacts,
  }
}
