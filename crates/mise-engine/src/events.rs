//! Execution events and notifiers for observability.
//!
//! Events are advisory. The execution record is the source of truth and no
//! consumer is required for a run to make progress.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during recipe execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// The execution record was persisted and the run began.
  ExecutionStarted {
    execution_id: String,
    recipe_id: String,
  },

  /// An attempt at a node has started.
  NodeStarted {
    execution_id: String,
    node_id: String,
    attempt: u32,
  },

  /// An attempt failed and the node will be tried again after `delay_ms`.
  NodeRetrying {
    execution_id: String,
    node_id: String,
    attempt: u32,
    delay_ms: u64,
    error: String,
  },

  /// A node has completed successfully.
  NodeCompleted {
    execution_id: String,
    node_id: String,
    output: serde_json::Value,
  },

  /// A node failed and its default output was used instead.
  NodeSkipped {
    execution_id: String,
    node_id: String,
    error: String,
  },

  /// A node has failed.
  NodeFailed {
    execution_id: String,
    node_id: String,
    error: String,
  },

  /// Coarse progress for UIs.
  Progress {
    execution_id: String,
    stage: String,
    message: String,
    percent: u8,
  },

  /// The execution has completed.
  ExecutionCompleted { execution_id: String },

  /// The execution has failed or was cancelled.
  ExecutionFailed {
    execution_id: String,
    error: String,
    failed_node_id: Option<String>,
  },
}

/// Trait for receiving execution events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them (broadcast, log, ignore).
pub trait ExecutionNotifier: Send + Sync {
  /// Called when an execution event occurs.
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a run. Volume is a handful of
  // events per node.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with its receiving end.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // The receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
