//! Long-running research tasks: create, inspect, manage, and wait.

mod types;
mod wait;

pub use types::{
    OutputFormat, Progress, ResearchMode, ResearchRequest, ResearchTask, TaskStatus,
};
pub use wait::WaitOptions;

use tracing::{debug, info};

use crate::client::Client;
use crate::error::Error;
use crate::transport::Replay;
use crate::validate::{self, ValidationError};
use types::{FollowUpPayload, PublicPayload, TaskListBody};
use wait::{TaskStatusSource, wait_for};

const TASKS_PATH: &str = "/research/tasks";
const MAX_LIST_LIMIT: u32 = 100;

/// Research task operations, borrowed from a [`Client`] via [`Client::research`].
#[derive(Debug, Clone, Copy)]
pub struct Research<'a> {
    client: &'a Client,
}

impl Client {
    pub fn research(&self) -> Research<'_> {
        Research { client: self }
    }
}

fn task_path(id: &str) -> Result<String, ValidationError> {
    Ok(format!("{TASKS_PATH}/{}", validate::task_id_segment(id)?))
}

impl Research<'_> {
    /// Start a research task. The returned task is usually still queued.
    ///
    /// Server errors are not retried so a task is never started twice.
    pub async fn create(&self, request: &ResearchRequest) -> Result<ResearchTask, Error> {
        let payload = request.to_payload()?;
        let task: ResearchTask = self
            .client
            .transport
            .post_json(TASKS_PATH, &payload, Replay::RateLimitOnly)
            .await?;
        info!(id = %task.id, query = %payload.query, "research task created");
        Ok(task)
    }

    pub async fn status(&self, id: &str) -> Result<ResearchTask, Error> {
        self.client.transport.get_json(&task_path(id)?).await
    }

    /// Most recent tasks first, at most `limit` (1..=100).
    pub async fn list(&self, limit: u32) -> Result<Vec<ResearchTask>, Error> {
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(ValidationError::OutOfRange {
                field: "limit",
                value: limit.to_string(),
                min: "1".into(),
                max: MAX_LIST_LIMIT.to_string(),
            }
            .into());
        }
        let body: TaskListBody = self
            .client
            .transport
            .get_json(&format!("{TASKS_PATH}?limit={limit}"))
            .await?;
        let tasks = body.into_tasks();
        debug!(limit, returned = tasks.len(), "research tasks listed");
        Ok(tasks)
    }

    pub async fn cancel(&self, id: &str) -> Result<(), Error> {
        let path = format!("{}/cancel", task_path(id)?);
        let _: serde_json::Value = self
            .client
            .transport
            .post_json(&path, &serde_json::json!({}), Replay::Safe)
            .await?;
        info!(id, "research task cancel requested");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        let _: serde_json::Value = self.client.transport.delete_json(&task_path(id)?).await?;
        info!(id, "research task deleted");
        Ok(())
    }

    /// Ask a follow-up question about a finished task. The server answers
    /// with the task that will carry the follow-up report.
    pub async fn follow_up(&self, id: &str, instruction: &str) -> Result<ResearchTask, Error> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(ValidationError::Empty {
                field: "instruction",
            }
            .into());
        }
        validate::max_chars("instruction", instruction, validate::MAX_STRATEGY_CHARS)?;
        let path = format!("{}/followup", task_path(id)?);
        let task: ResearchTask = self
            .client
            .transport
            .post_json(&path, &FollowUpPayload { instruction }, Replay::RateLimitOnly)
            .await?;
        info!(parent = id, id = %task.id, "research follow-up created");
        Ok(task)
    }

    /// Publish (or unpublish) a task's report at a shareable URL.
    pub async fn set_public(&self, id: &str, public: bool) -> Result<(), Error> {
        let path = format!("{}/public", task_path(id)?);
        let _: serde_json::Value = self
            .client
            .transport
            .post_json(&path, &PublicPayload { public }, Replay::Safe)
            .await?;
        debug!(id, public, "research task visibility updated");
        Ok(())
    }

    /// Poll until the task finishes.
    ///
    /// `on_progress` runs after every poll with the latest snapshot.
    /// A failed or cancelled task is returned as an error, as is running
    /// past `options`' timeout.
    ///
    /// ```no_run
    /// use sift::WaitOptions;
    ///
    /// # async fn run(client: sift::Client) -> Result<(), sift::Error> {
    /// let task = client
    ///     .research()
    ///     .wait("dr_123", &WaitOptions::default(), |t| {
    ///         if let Some(fraction) = t.progress.and_then(|p| p.fraction()) {
    ///             eprintln!("{:.0}%", fraction * 100.0);
    ///         }
    ///     })
    ///     .await?;
    /// println!("{}", task.output.map(|o| o.to_text()).unwrap_or_default());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait<F>(
        &self,
        id: &str,
        options: &WaitOptions,
        on_progress: F,
    ) -> Result<ResearchTask, Error>
    where
        F: FnMut(&ResearchTask),
    {
        validate::task_id_segment(id)?;
        wait_for(self, id, options, on_progress).await
    }

    pub async fn create_and_wait<F>(
        &self,
        request: &ResearchRequest,
        options: &WaitOptions,
        on_progress: F,
    ) -> Result<ResearchTask, Error>
    where
        F: FnMut(&ResearchTask),
    {
        let task = self.create(request).await?;
        self.wait(&task.id, options, on_progress).await
    }
}

impl TaskStatusSource for Research<'_> {
    async fn task_status(&self, id: &str) -> Result<ResearchTask, Error> {
        self.status(id).await
    }
}
