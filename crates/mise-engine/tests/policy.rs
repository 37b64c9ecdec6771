//! Error policy behaviour: skip, fail, retry, timeout and mapping failures.

mod support;

use std::time::Duration;

use mise_capability::CapabilityRegistry;
use mise_config::{ErrorPolicy, SourceRef};
use mise_engine::ExecutionOptions;
use mise_store::{ErrorKind, ExecutionStatus, NodeStatus};
use serde_json::{Value, json};
use support::{Scripted, harness, provider_error, recipe, text, text_node, with_policy};

#[tokio::test]
async fn test_skip_substitutes_default_output() {
  let a = Scripted::new([text("a-out")]);
  let b = Scripted::new([provider_error("model overloaded")]);
  let c = Scripted::new([text("c-out")]);
  let registry = CapabilityRegistry::new()
    .with_text("a", a.clone())
    .with_text("b", b.clone())
    .with_text("c", c.clone());

  let nodes = vec![
    text_node("a", "a", &[], &[]),
    with_policy(
      text_node("b", "b", &["a"], &[("a", SourceRef::node("a"))]),
      ErrorPolicy::skip(json!({})),
    ),
    text_node(
      "c",
      "c",
      &["a", "b"],
      &[("a", SourceRef::node("a")), ("b", SourceRef::node("b"))],
    ),
  ];
  let h = harness(vec![recipe("linear", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("linear", json!({}), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Completed);
  let b_results: Vec<_> = record.results_for("b").collect();
  assert_eq!(b_results.len(), 1);
  assert_eq!(b_results[0].status, NodeStatus::Skipped);
  assert_eq!(b_results[0].output, json!({}));
  assert_eq!(
    b_results[0].error.as_ref().map(|e| e.kind),
    Some(ErrorKind::Capability)
  );

  let c_result = record.results_for("c").next().unwrap();
  assert_eq!(c_result.resolved_input, json!({ "a": "a-out", "b": {} }));
  assert_eq!(record.node_outputs.get("b"), Some(&json!({})));
  assert_eq!(record.result, json!("c-out"));
  assert_eq!(c.calls(), 1);
}

#[tokio::test]
async fn test_fail_stops_successors() {
  let a = Scripted::new([text("a-out")]);
  let b = Scripted::new([provider_error("model overloaded")]);
  let c = Scripted::new([text("c-out")]);
  let registry = CapabilityRegistry::new()
    .with_text("a", a.clone())
    .with_text("b", b.clone())
    .with_text("c", c.clone());

  let nodes = vec![
    text_node("a", "a", &[], &[]),
    with_policy(text_node("b", "b", &["a"], &[]), ErrorPolicy::fail()),
    text_node("c", "c", &["b"], &[("b", SourceRef::node("b"))]),
  ];
  let h = harness(vec![recipe("linear", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("linear", json!({}), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Failed);
  assert_eq!(record.failed_node_id.as_deref(), Some("b"));
  let error = record.error.as_ref().unwrap();
  assert_eq!(error.kind, ErrorKind::Capability);
  assert!(error.message.contains("model overloaded"));
  assert_eq!(c.calls(), 0);
  assert_eq!(record.results_for("c").count(), 0);
  assert_eq!(record.node_outputs.get("a"), Some(&json!("a-out")));
  assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn test_retry_until_success_records_every_attempt() {
  let a = Scripted::new([
    provider_error("rate limited"),
    provider_error("rate limited"),
    text("done"),
  ]);
  let registry = CapabilityRegistry::new().with_text("a", a.clone());
  let nodes = vec![with_policy(text_node("a", "a", &[], &[]), ErrorPolicy::retry(2))];
  let h = harness(vec![recipe("retry", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("retry", json!({}), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Completed);
  assert_eq!(a.calls(), 3);

  let attempts: Vec<_> = record.results_for("a").collect();
  assert_eq!(attempts.len(), 3);
  assert_eq!(
    attempts.iter().map(|r| r.attempt).collect::<Vec<_>>(),
    vec![1, 2, 3]
  );
  assert_eq!(
    attempts.iter().map(|r| r.status).collect::<Vec<_>>(),
    vec![NodeStatus::Failed, NodeStatus::Failed, NodeStatus::Completed]
  );
  assert_eq!(record.result, json!("done"));
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_run() {
  let a = Scripted::new([
    provider_error("down"),
    provider_error("down"),
    provider_error("down"),
  ]);
  let registry = CapabilityRegistry::new().with_text("a", a.clone());
  let nodes = vec![with_policy(text_node("a", "a", &[], &[]), ErrorPolicy::retry(1))];
  let h = harness(vec![recipe("retry", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("retry", json!({}), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Failed);
  assert_eq!(record.failed_node_id.as_deref(), Some("a"));
  assert_eq!(a.calls(), 2);
  assert_eq!(record.results_for("a").count(), 2);
}

#[tokio::test]
async fn test_timeout_is_a_distinct_failure() {
  let a = Scripted::delayed(Duration::from_secs(5), [text("too late")]);
  let registry = CapabilityRegistry::new().with_text("a", a.clone());
  let nodes = vec![with_policy(
    text_node("a", "a", &[], &[]),
    ErrorPolicy::fail().with_timeout_ms(20),
  )];
  let h = harness(vec![recipe("slow", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("slow", json!({}), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Failed);
  assert_eq!(record.error.as_ref().map(|e| e.kind), Some(ErrorKind::Timeout));
  assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn test_null_default_fails_strict_downstream_mapping() {
  let a = Scripted::new([provider_error("down")]);
  let b = Scripted::new([text("b-out")]);
  let registry = CapabilityRegistry::new()
    .with_text("a", a.clone())
    .with_text("b", b.clone());

  let nodes = vec![
    with_policy(text_node("a", "a", &[], &[]), ErrorPolicy::skip(Value::Null)),
    text_node("b", "b", &["a"], &[("a", SourceRef::node("a"))]),
  ];
  let h = harness(vec![recipe("cascade", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("cascade", json!({}), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Failed);
  assert_eq!(record.failed_node_id.as_deref(), Some("b"));
  assert_eq!(record.error.as_ref().map(|e| e.kind), Some(ErrorKind::Mapping));
  assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_mapping_errors_are_not_retried() {
  let a = Scripted::new([text("unused")]);
  let registry = CapabilityRegistry::new().with_text("a", a.clone());
  let nodes = vec![with_policy(
    text_node("a", "a", &[], &[("count", SourceRef::input("count"))]),
    ErrorPolicy::retry(3),
  )];
  let h = harness(vec![recipe("mapping", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("mapping", json!({ "other": 1 }), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Failed);
  assert_eq!(record.error.as_ref().map(|e| e.kind), Some(ErrorKind::Mapping));
  assert_eq!(record.results_for("a").count(), 1);
  assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_mapping_failure_records_the_inputs_that_resolved() {
  let a = Scripted::new([text("unused")]);
  let registry = CapabilityRegistry::new().with_text("a", a.clone());
  let nodes = vec![text_node(
    "a",
    "a",
    &[],
    &[
      ("topic", SourceRef::input("topic")),
      ("count", SourceRef::input("count")),
    ],
  )];
  let h = harness(vec![recipe("partial", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("partial", json!({ "topic": "hats" }), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Failed);
  let attempt = record.results_for("a").next().unwrap();
  assert_eq!(attempt.resolved_input, json!({ "topic": "hats" }));
  assert!(attempt.error.as_ref().unwrap().message.contains("count"));
  assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_mapping_error_can_be_skipped() {
  let a = Scripted::new([text("unused")]);
  let registry = CapabilityRegistry::new().with_text("a", a.clone());
  let nodes = vec![with_policy(
    text_node("a", "a", &[], &[("count", SourceRef::input("count"))]),
    ErrorPolicy::skip(json!("fallback")),
  )];
  let h = harness(vec![recipe("mapping", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("mapping", json!({}), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Completed);
  assert_eq!(record.result, json!("fallback"));
  assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_unknown_provider_is_a_node_failure() {
  let registry = CapabilityRegistry::new().with_text("a", Scripted::new([text("x")]));
  let nodes = vec![text_node("a", "ghost", &[], &[])];
  let h = harness(vec![recipe("ghost", nodes)], registry);

  let record = h
    .orchestrator
    .execute_recipe("ghost", json!({}), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Failed);
  assert_eq!(record.failed_node_id.as_deref(), Some("a"));
  assert_eq!(
    record.error.as_ref().map(|e| e.kind),
    Some(ErrorKind::Capability)
  );
}

#[tokio::test]
async fn test_continue_on_error_skips_nodes_without_policy() {
  let a = Scripted::new([provider_error("down")]);
  let b = Scripted::new([text("b-out")]);
  let registry = CapabilityRegistry::new()
    .with_text("a", a.clone())
    .with_text("b", b.clone());

  let mut def = recipe(
    "lenient",
    vec![text_node("a", "a", &[], &[]), text_node("b", "b", &["a"], &[])],
  );
  def.execution_config.continue_on_error = true;
  let h = harness(vec![def], registry);

  let record = h
    .orchestrator
    .execute_recipe("lenient", json!({}), ExecutionOptions::default())
    .await
    .unwrap()
    .wait()
    .await
    .unwrap();

  assert_eq!(record.status, ExecutionStatus::Completed);
  assert_eq!(
    record.results_for("a").next().map(|r| r.status),
    Some(NodeStatus::Skipped)
  );
  assert_eq!(record.result, json!("b-out"));
  assert_eq!(b.calls(), 1);
}
