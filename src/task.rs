use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ApiError, TaskReport, TaskState};

pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Anything that can report the status of a backend task.
pub trait TaskSource {
    fn task_status(
        &self,
        task_id: &str,
    ) -> impl Future<Output = Result<TaskReport, ApiError>> + Send;
}

/// Poll `task_id` until it completes, fails, or `max_wait` runs out.
///
/// Returns the task's `result` (`Value::Null` when the backend sends none).
/// A poll still in flight when the budget runs out is abandoned, and the
/// last sleep is cut short, so the timeout fires at `max_wait`.
pub async fn wait_for_task<S: TaskSource>(
    source: &S,
    task_id: &str,
    max_wait: Duration,
    interval: Duration,
) -> Result<Value, ApiError> {
    let start = Instant::now();
    let mut polls = 0u32;

    while start.elapsed() < max_wait {
        let remaining = max_wait.saturating_sub(start.elapsed());
        polls += 1;
        let report = match tokio::time::timeout(remaining, source.task_status(task_id)).await {
            Ok(report) => report?,
            Err(_) => break,
        };

        match report.status {
            TaskState::Completed => {
                info!(task_id, polls, elapsed_ms = start.elapsed().as_millis() as u64, "task completed");
                return Ok(report.result.unwrap_or(Value::Null));
            }
            TaskState::Failed => {
                let error = report.error.unwrap_or_else(|| "Task failed".to_string());
                warn!(task_id, polls, %error, "task failed");
                return Err(ApiError::TaskFailed(error));
            }
            TaskState::Pending | TaskState::InProgress | TaskState::Unknown => {
                debug!(task_id, polls, status = ?report.status, "task still running");
                tokio::time::sleep(interval.min(max_wait.saturating_sub(start.elapsed()))).await;
            }
        }
    }

    warn!(task_id, polls, max_wait_secs = max_wait.as_secs_f64(), "task timed out");
    Err(ApiError::TimedOut)
}
