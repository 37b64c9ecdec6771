//! Engine configuration.

use std::time::Duration;

use mise_config::{NodeDef, OnError, RetryBackoff, RetryPolicy};
use mise_recipe::Recipe;
use serde::{Deserialize, Serialize};

/// Configuration for the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Node budget when neither the node nor the recipe sets one.
  pub default_node_timeout_ms: u64,
  /// Floor for any delay between attempts.
  pub min_retry_delay_ms: u64,
  /// Ceiling for backoff growth.
  pub max_retry_delay_ms: u64,
  /// The client polling contract server-side timeouts must fit inside.
  pub poll: PollConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      default_node_timeout_ms: 120_000,
      min_retry_delay_ms: 1_000,
      max_retry_delay_ms: 30_000,
      poll: PollConfig::default(),
    }
  }
}

/// How a client polls an execution: every `interval_ms`, at most
/// `max_attempts` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
  pub interval_ms: u64,
  pub max_attempts: u32,
}

impl Default for PollConfig {
  fn default() -> Self {
    Self {
      interval_ms: 5_000,
      max_attempts: 36,
    }
  }
}

impl PollConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_millis(self.interval_ms)
  }

  /// Total time a client waits before giving up.
  pub fn window_ms(&self) -> u64 {
    self.interval_ms.saturating_mul(u64::from(self.max_attempts))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
  #[error("default node timeout {timeout_ms}ms must be shorter than the polling window {window_ms}ms")]
  TimeoutExceedsPollWindow { timeout_ms: u64, window_ms: u64 },

  #[error("min retry delay {min_ms}ms exceeds max retry delay {max_ms}ms")]
  RetryDelayRange { min_ms: u64, max_ms: u64 },

  #[error("poll interval and attempts must be non-zero")]
  EmptyPollWindow,

  #[error("min retry delay must be at least 1ms")]
  ZeroRetryDelay,

  #[error("recipe timeout {timeout_ms}ms must be shorter than the polling window {window_ms}ms")]
  RecipeTimeoutExceedsPollWindow { timeout_ms: u64, window_ms: u64 },

  #[error(
    "node '{node_id}' may run for {budget_ms}ms including retries, which does not fit the polling window {window_ms}ms"
  )]
  NodeBudgetExceedsPollWindow {
    node_id: String,
    budget_ms: u64,
    window_ms: u64,
  },
}

impl EngineConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.poll.interval_ms == 0 || self.poll.max_attempts == 0 {
      return Err(ConfigError::EmptyPollWindow);
    }
    if self.default_node_timeout_ms >= self.poll.window_ms() {
      return Err(ConfigError::TimeoutExceedsPollWindow {
        timeout_ms: self.default_node_timeout_ms,
        window_ms: self.poll.window_ms(),
      });
    }
    if self.min_retry_delay_ms == 0 {
      return Err(ConfigError::ZeroRetryDelay);
    }
    if self.min_retry_delay_ms > self.max_retry_delay_ms {
      return Err(ConfigError::RetryDelayRange {
        min_ms: self.min_retry_delay_ms,
        max_ms: self.max_retry_delay_ms,
      });
    }
    Ok(())
  }

  /// Check a recipe's time budgets against the polling window.
  ///
  /// The recipe-level timeout and every node's worst case (all attempts
  /// timing out, plus every retry wait) must end before a polling client
  /// gives up.
  pub fn check_recipe(&self, recipe: &Recipe) -> Result<(), ConfigError> {
    let window_ms = self.poll.window_ms();
    if let Some(timeout_ms) = recipe.execution_config().timeout_ms {
      if timeout_ms >= window_ms {
        return Err(ConfigError::RecipeTimeoutExceedsPollWindow {
          timeout_ms,
          window_ms,
        });
      }
    }

    for node in recipe.scheduled() {
      let budget_ms = self.node_budget_ms(recipe, node);
      if budget_ms >= window_ms {
        return Err(ConfigError::NodeBudgetExceedsPollWindow {
          node_id: node.id.clone(),
          budget_ms,
          window_ms,
        });
      }
    }
    Ok(())
  }

  /// Budget for a single attempt of `node`.
  pub fn node_timeout(&self, recipe: &Recipe, node: &NodeDef) -> Duration {
    Duration::from_millis(recipe.timeout_ms(node).unwrap_or(self.default_node_timeout_ms))
  }

  /// Longest wall-clock time `node` can hold the run. Stops counting once the
  /// polling window is reached.
  pub fn node_budget_ms(&self, recipe: &Recipe, node: &NodeDef) -> u64 {
    let window_ms = self.poll.window_ms();
    let timeout_ms = self.node_timeout(recipe, node).as_millis() as u64;
    let policy = recipe.error_policy(node);
    let retries = match policy.on_error {
      OnError::Retry => policy.retry_count,
      _ => 0,
    };

    let mut budget = timeout_ms;
    for retry in 1..=retries {
      if budget >= window_ms {
        break;
      }
      let wait = self.retry_delay(&recipe.execution_config().retry_policy, retry);
      budget = budget
        .saturating_add(wait.as_millis() as u64)
        .saturating_add(timeout_ms);
    }
    budget
  }

  /// Delay before retry number `retry` (1-based).
  ///
  /// Starts from the policy's initial delay (or the floor), grows per the
  /// backoff, and is clamped into `[min_retry_delay_ms, max_retry_delay_ms]`.
  pub fn retry_delay(&self, policy: &RetryPolicy, retry: u32) -> Duration {
    let base = policy.initial_delay_ms.unwrap_or(self.min_retry_delay_ms);
    let retry = u64::from(retry.max(1));

    let delay = match policy.backoff {
      RetryBackoff::Constant => base,
      RetryBackoff::Linear => base.saturating_mul(retry),
      RetryBackoff::Exponential => {
        let factor = 1u64.checked_shl((retry - 1) as u32).unwrap_or(u64::MAX);
        base.saturating_mul(factor)
      }
    };

    Duration::from_millis(delay.max(self.min_retry_delay_ms).min(self.max_retry_delay_ms))
  }
}
