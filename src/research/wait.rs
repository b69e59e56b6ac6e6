use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::types::{ResearchTask, TaskStatus};
use crate::error::Error;
use crate::validate::ValidationError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Polling cadence and overall deadline for [`Research::wait`](super::Research::wait).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl WaitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval.is_zero() {
            return Err(ValidationError::OutOfRange {
                field: "poll_interval",
                value: "0ms".into(),
                min: "1ms".into(),
                max: format!("{}ms", self.timeout.as_millis().max(1)),
            });
        }
        Ok(())
    }
}

pub(crate) trait TaskStatusSource {
    async fn task_status(&self, id: &str) -> Result<ResearchTask, Error>;
}

/// Poll `source` until the task reaches a terminal status or the deadline
/// passes. `on_progress` sees every polled snapshot, terminal ones included.
pub(crate) async fn wait_for<S, F>(
    source: &S,
    id: &str,
    options: &WaitOptions,
    mut on_progress: F,
) -> Result<ResearchTask, Error>
where
    S: TaskStatusSource,
    F: FnMut(&ResearchTask),
{
    options.validate()?;
    let started = Instant::now();
    let deadline = started + options.timeout;
    let mut polls = 0u32;

    loop {
        let task = source.task_status(id).await?;
        polls += 1;
        on_progress(&task);

        match task.status {
            TaskStatus::Completed => {
                info!(
                    id,
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "research task completed"
                );
                return Ok(task);
            }
            TaskStatus::Failed => {
                return Err(Error::TaskFailed {
                    id: id.to_string(),
                    message: task.error.unwrap_or_else(|| "no error message".into()),
                });
            }
            TaskStatus::Cancelled => return Err(Error::TaskCancelled(id.to_string())),
            status => debug!(id, %status, polls, "research task in flight"),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(Error::WaitTimeout {
                id: id.to_string(),
                waited: now - started,
            });
        }
        tokio::time::sleep(options.poll_interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct MockSource {
        responses: Mutex<VecDeque<Result<ResearchTask, Error>>>,
        polls: Mutex<Vec<Instant>>,
    }

    impl MockSource {
        fn with_statuses(statuses: &[&str]) -> Self {
            let tasks = statuses.iter().map(|s| Ok(task(s)));
            Self {
                responses: Mutex::new(tasks.collect()),
                polls: Mutex::new(Vec::new()),
            }
        }

        fn poll_count(&self) -> usize {
            self.polls.lock().unwrap().len()
        }
    }

    impl TaskStatusSource for MockSource {
        async fn task_status(&self, _id: &str) -> Result<ResearchTask, Error> {
            self.polls.lock().unwrap().push(Instant::now());
            let mut responses = self.responses.lock().unwrap();
            // Repeat the last snapshot once the script runs out.
            if responses.len() == 1
                && let Some(Ok(task)) = responses.front()
            {
                return Ok(task.clone());
            }
            responses.pop_front().unwrap()
        }
    }

    fn task(status: &str) -> ResearchTask {
        let error = (status == "failed").then_some("source quota exhausted");
        serde_json::from_value(serde_json::json!({
            "id": "dr_1",
            "status": status,
            "error": error,
        }))
        .unwrap()
    }

    fn fast() -> WaitOptions {
        WaitOptions::new()
            .poll_interval(Duration::from_secs(1))
            .timeout(Duration::from_secs(60))
    }

    #[test]
    fn defaults() {
        let opts = WaitOptions::default();
        assert_eq!(opts.poll_interval, Duration::from_secs(5));
        assert_eq!(opts.timeout, Duration::from_secs(7200));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_completed_task_and_reports_every_poll() {
        let source = MockSource::with_statuses(&["queued", "running", "running", "completed"]);
        let mut seen = Vec::new();
        let task = wait_for(&source, "dr_1", &fast(), |t| seen.push(t.status))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(
            seen,
            vec![
                TaskStatus::Queued,
                TaskStatus::Running,
                TaskStatus::Running,
                TaskStatus::Completed
            ]
        );
        assert_eq!(source.poll_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_at_the_configured_interval() {
        let source = MockSource::with_statuses(&["running", "running", "completed"]);
        wait_for(&source, "dr_1", &fast(), |_| {}).await.unwrap();
        let polls = source.polls.lock().unwrap();
        assert_eq!(polls[1] - polls[0], Duration::from_secs(1));
        assert_eq!(polls[2] - polls[1], Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_task_surfaces_server_message() {
        let source = MockSource::with_statuses(&["running", "failed"]);
        match wait_for(&source, "dr_1", &fast(), |_| {}).await {
            Err(Error::TaskFailed { id, message }) => {
                assert_eq!(id, "dr_1");
                assert_eq!(message, "source quota exhausted");
            }
            other => panic!("expected TaskFailed, got: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_is_an_error() {
        let source = MockSource::with_statuses(&["canceled"]);
        assert!(matches!(
            wait_for(&source, "dr_1", &fast(), |_| {}).await,
            Err(Error::TaskCancelled(id)) if id == "dr_1"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_overshooting_deadline() {
        let source = MockSource::with_statuses(&["running"]);
        let opts = WaitOptions::new()
            .poll_interval(Duration::from_secs(4))
            .timeout(Duration::from_secs(10));
        let started = Instant::now();
        match wait_for(&source, "dr_1", &opts, |_| {}).await {
            Err(Error::WaitTimeout { id, waited }) => {
                assert_eq!(id, "dr_1");
                assert_eq!(waited, Duration::from_secs(10));
            }
            other => panic!("expected WaitTimeout, got: {other:?}"),
        }
        // Polls at 0s, 4s, 8s, then a final one exactly at the deadline.
        assert_eq!(source.poll_count(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_keeps_polling() {
        let source = MockSource::with_statuses(&["paused_for_review", "completed"]);
        let task = wait_for(&source, "dr_1", &fast(), |_| {}).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(source.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn status_errors_propagate() {
        let source = MockSource {
            responses: Mutex::new(VecDeque::from([Err(Error::NotFound(
                "no such task".into(),
            ))])),
            polls: Mutex::new(Vec::new()),
        };
        assert!(matches!(
            wait_for(&source, "dr_1", &fast(), |_| {}).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn zero_interval_rejected_before_polling() {
        let source = MockSource::with_statuses(&["completed"]);
        let opts = WaitOptions::new().poll_interval(Duration::ZERO);
        assert!(matches!(
            wait_for(&source, "dr_1", &opts, |_| {}).await,
            Err(Error::Validation(ValidationError::OutOfRange { field: "poll_interval", .. }))
        ));
        assert_eq!(source.poll_count(), 0);
    }
}
