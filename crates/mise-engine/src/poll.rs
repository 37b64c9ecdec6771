//! Client-side polling.

use mise_store::ExecutionRecord;
use tracing::debug;

use crate::config::PollConfig;
use crate::error::EngineError;
use crate::orchestrator::Orchestrator;

#[derive(Debug, thiserror::Error)]
pub enum PollError {
  /// The execution was still running after the last poll.
  #[error("execution '{execution_id}' still running after {attempts} polls")]
  TimedOut { execution_id: String, attempts: u32 },

  #[error(transparent)]
  Engine(#[from] EngineError),
}

/// Poll until the execution is terminal, at most `poll.max_attempts` times.
pub async fn wait_for_terminal(
  orchestrator: &Orchestrator,
  execution_id: &str,
  poll: &PollConfig,
) -> Result<ExecutionRecord, PollError> {
  for attempt in 1..=poll.max_attempts {
    let record = orchestrator.get_execution_status(execution_id).await?;
    if record.is_terminal() {
      return Ok(record);
    }
    debug!(execution_id = %execution_id, attempt, "execution still running");
    if attempt < poll.max_attempts {
      tokio::time::sleep(poll.interval()).await;
    }
  }

  Err(PollError::TimedOut {
    execution_id: execution_id.to_string(),
    attempts: poll.max_attempts,
  })
}
