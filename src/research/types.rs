use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::types::{
    Content, FilterPayload, SearchFilters, SearchResult, error_message, null_as_default, timestamp,
};
use crate::validate::{self, MAX_STRATEGY_CHARS, MAX_URLS, ValidationError};

/// Depth/latency trade-off for a research task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchMode {
    Fast,
    #[default]
    Standard,
    Heavy,
}

/// Deliverable format of a research report.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Markdown,
    Pdf,
    /// Structured report conforming to this JSON schema.
    Schema(serde_json::Value),
}

impl Serialize for OutputFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OutputFormat::Markdown => serializer.serialize_str("markdown"),
            OutputFormat::Pdf => serializer.serialize_str("pdf"),
            OutputFormat::Schema(schema) => schema.serialize(serializer),
        }
    }
}

/// Request for `POST /research/tasks`.
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    query: String,
    mode: Option<ResearchMode>,
    output_formats: Vec<OutputFormat>,
    strategy: Option<String>,
    filters: SearchFilters,
    urls: Vec<String>,
    webhook_url: Option<String>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: None,
            output_formats: Vec::new(),
            strategy: None,
            filters: SearchFilters::default(),
            urls: Vec::new(),
            webhook_url: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn mode(mut self, mode: ResearchMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_formats.push(format);
        self
    }

    /// Natural-language research plan or constraints for the agent.
    pub fn strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Pages the agent must read in addition to its own searches (at most 10).
    pub fn urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// HTTPS endpoint notified when the task reaches a terminal status.
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    /// Opaque key/value pairs echoed back on the task.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn to_payload(&self) -> Result<ResearchPayload<'_>, ValidationError> {
        let query = validate::query(&self.query)?;
        validate_output_formats(&self.output_formats)?;
        let strategy = match self.strategy.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(s) => {
                validate::max_chars("strategy", s, MAX_STRATEGY_CHARS)?;
                Some(s)
            }
        };
        let filters = self.filters.to_payload()?;
        Ok(ResearchPayload {
            query,
            mode: self.mode,
            output_formats: (!self.output_formats.is_empty())
                .then_some(self.output_formats.as_slice()),
            strategy,
            search: (!filters.is_empty()).then_some(filters),
            urls: validate::optional_url_list(&self.urls, MAX_URLS)?,
            webhook_url: self
                .webhook_url
                .as_deref()
                .map(validate::webhook_url)
                .transpose()?,
            metadata: (!self.metadata.is_empty()).then_some(&self.metadata),
        })
    }
}

fn validate_output_formats(formats: &[OutputFormat]) -> Result<(), ValidationError> {
    let mut schemas = 0;
    for format in formats {
        if let OutputFormat::Schema(schema) = format {
            validate::json_schema("output_formats", schema)?;
            schemas += 1;
        }
    }
    if schemas > 0 && formats.len() > 1 {
        return Err(ValidationError::ConflictingOutputFormats);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub(crate) struct ResearchPayload<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ResearchMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_formats: Option<&'a [OutputFormat]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<FilterPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    #[serde(alias = "pending")]
    Queued,
    #[serde(alias = "in_progress", alias = "processing")]
    Running,
    Completed,
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
    /// A status this client does not know yet; treated as still in flight.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Progress {
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_step: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_steps: u32,
}

impl Progress {
    /// Completed share in `0.0..=1.0`, or `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        (self.total_steps > 0)
            .then(|| (f64::from(self.current_step) / f64::from(self.total_steps)).min(1.0))
    }
}

/// State of a research task as reported by the status endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "TaskWire")]
pub struct ResearchTask {
    pub id: String,
    pub status: TaskStatus,
    pub query: Option<String>,
    /// Echoed mode name; kept as text so new modes do not break parsing.
    pub mode: Option<String>,
    pub progress: Option<Progress>,
    /// Report body: Markdown text, or JSON for schema outputs.
    pub output: Option<Content>,
    pub pdf_url: Option<String>,
    pub sources: Vec<SearchResult>,
    pub cost: Option<f64>,
    pub error: Option<String>,
    pub public: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Task as sent by the server. The id shows up under any of three keys,
/// sometimes more than one at once, and so does the cost.
#[derive(Deserialize)]
struct TaskWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    deepresearch_id: Option<String>,
    /// Creation acknowledgements may omit the status of a freshly queued task.
    #[serde(default, deserialize_with = "null_as_default")]
    status: TaskStatus,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    progress: Option<Progress>,
    #[serde(default)]
    output: Option<Content>,
    #[serde(default)]
    pdf_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    sources: Vec<SearchResult>,
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    total_cost_dollars: Option<f64>,
    #[serde(default, deserialize_with = "error_message")]
    error: Option<String>,
    #[serde(default)]
    public: Option<bool>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl TryFrom<TaskWire> for ResearchTask {
    type Error = String;

    fn try_from(wire: TaskWire) -> Result<Self, Self::Error> {
        let id = [wire.id, wire.task_id, wire.deepresearch_id]
            .into_iter()
            .flatten()
            .find(|id| !id.trim().is_empty())
            .ok_or("research task has no id")?;
        Ok(Self {
            id,
            status: wire.status,
            query: wire.query,
            mode: wire.mode,
            progress: wire.progress,
            output: wire.output,
            pdf_url: wire.pdf_url,
            sources: wire.sources,
            cost: wire.cost.or(wire.total_cost_dollars),
            error: wire.error,
            public: wire.public,
            created_at: wire.created_at,
            completed_at: wire.completed_at,
            metadata: wire.metadata,
        })
    }
}

/// `GET /research/tasks` answers with a bare array or a wrapped list.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum TaskListBody {
    Bare(Vec<ResearchTask>),
    Wrapped {
        #[serde(alias = "data")]
        tasks: Vec<ResearchTask>,
    },
}

impl TaskListBody {
    pub(crate) fn into_tasks(self) -> Vec<ResearchTask> {
        match self {
            TaskListBody::Bare(tasks) | TaskListBody::Wrapped { tasks } => tasks,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FollowUpPayload<'a> {
    pub instruction: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct PublicPayload {
    pub public: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchType;

    #[test]
    fn minimal_payload() {
        let req = ResearchRequest::new("state of WASI in 2025");
        let json = serde_json::to_value(req.to_payload().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"query": "state of WASI in 2025"}));
    }

    #[test]
    fn full_payload_shape() {
        let req = ResearchRequest::new("compare raft implementations")
            .mode(ResearchMode::Heavy)
            .output_format(OutputFormat::Markdown)
            .output_format(OutputFormat::Pdf)
            .strategy("focus on production users")
            .filters(
                SearchFilters::new()
                    .search_type(SearchType::Web)
                    .include_sources(["github.com"]),
            )
            .urls(["https://raft.github.io/"])
            .webhook_url("https://hooks.example.com/research")
            .metadata("ticket", "ENG-42");
        let json = serde_json::to_value(req.to_payload().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "query": "compare raft implementations",
                "mode": "heavy",
                "output_formats": ["markdown", "pdf"],
                "strategy": "focus on production users",
                "search": {"search_type": "web", "included_sources": ["github.com"]},
                "urls": ["https://raft.github.io/"],
                "webhook_url": "https://hooks.example.com/research",
                "metadata": {"ticket": "ENG-42"}
            })
        );
    }

    #[test]
    fn schema_output_must_stand_alone() {
        let schema = serde_json::json!({"type": "object", "properties": {}});
        assert!(
            ResearchRequest::new("q")
                .output_format(OutputFormat::Schema(schema.clone()))
                .to_payload()
                .is_ok()
        );
        assert_eq!(
            ResearchRequest::new("q")
                .output_format(OutputFormat::Schema(schema))
                .output_format(OutputFormat::Pdf)
                .to_payload()
                .unwrap_err(),
            ValidationError::ConflictingOutputFormats
        );
    }

    #[test]
    fn rejects_insecure_webhook_and_long_strategy() {
        assert!(matches!(
            ResearchRequest::new("q")
                .webhook_url("http://hooks.example.com")
                .to_payload(),
            Err(ValidationError::InsecureWebhook(_))
        ));
        assert!(matches!(
            ResearchRequest::new("q")
                .strategy("s".repeat(MAX_STRATEGY_CHARS + 1))
                .to_payload(),
            Err(ValidationError::TooLong { field: "strategy", .. })
        ));
    }

    #[test]
    fn task_parses_with_aliases_and_unknown_status() {
        let task: ResearchTask = serde_json::from_value(serde_json::json!({
            "task_id": "dr_1",
            "status": "paused_for_review",
            "progress": {"current_step": 2, "total_steps": 8},
            "created_at": 1714564800
        }))
        .unwrap();
        assert_eq!(task.id, "dr_1");
        assert_eq!(task.status, TaskStatus::Unknown);
        assert!(!task.status.is_terminal());
        assert_eq!(task.progress.unwrap().fraction(), Some(0.25));
        assert!(task.created_at.is_some());
    }

    #[test]
    fn completed_task_with_structured_output() {
        let task: ResearchTask = serde_json::from_value(serde_json::json!({
            "id": "dr_2",
            "status": "completed",
            "output": {"summary": "done"},
            "sources": null,
            "total_cost_dollars": 1.25,
            "completed_at": "2025-01-02T03:04:05Z"
        }))
        .unwrap();
        assert!(task.status.is_terminal());
        assert_eq!(task.output.unwrap().as_json().unwrap()["summary"], "done");
        assert!(task.sources.is_empty());
        assert_eq!(task.cost, Some(1.25));
    }

    #[test]
    fn task_id_under_several_keys() {
        let task: ResearchTask = serde_json::from_value(serde_json::json!({
            "id": "dr_1",
            "task_id": "dr_1",
            "deepresearch_id": "dr_1",
            "status": "running",
            "cost": 0.5,
            "total_cost_dollars": 0.5
        }))
        .unwrap();
        assert_eq!(task.id, "dr_1");
        assert_eq!(task.cost, Some(0.5));

        let task: ResearchTask = serde_json::from_value(serde_json::json!({
            "id": "",
            "task_id": "dr_2",
            "status": "queued"
        }))
        .unwrap();
        assert_eq!(task.id, "dr_2");
    }

    #[test]
    fn task_without_id_is_rejected() {
        let err = serde_json::from_value::<ResearchTask>(serde_json::json!({"status": "queued"}))
            .unwrap_err();
        assert!(err.to_string().contains("no id"), "got: {err}");
    }

    #[test]
    fn null_status_defaults_to_queued() {
        let task: ResearchTask =
            serde_json::from_value(serde_json::json!({"id": "dr_3", "status": null})).unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        let task: ResearchTask =
            serde_json::from_value(serde_json::json!({
                "id": "dr_3",
                "progress": {"current_step": null, "total_steps": 4}
            }))
            .unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress.unwrap().fraction(), Some(0.0));
    }

    #[test]
    fn status_aliases() {
        for (raw, expected) in [
            ("pending", TaskStatus::Queued),
            ("in_progress", TaskStatus::Running),
            ("canceled", TaskStatus::Cancelled),
            ("failed", TaskStatus::Failed),
        ] {
            let status: TaskStatus = serde_json::from_value(serde_json::json!(raw)).unwrap();
            assert_eq!(status, expected, "{raw}");
        }
    }

    #[test]
    fn progress_fraction_clamped_and_optional() {
        assert_eq!(Progress::default().fraction(), None);
        let over = Progress {
            current_step: 5,
            total_steps: 4,
        };
        assert_eq!(over.fraction(), Some(1.0));
    }

    #[test]
    fn task_list_accepts_both_shapes() {
        let bare: TaskListBody =
            serde_json::from_value(serde_json::json!([{"id": "a", "status": "queued"}])).unwrap();
        let wrapped: TaskListBody = serde_json::from_value(
            serde_json::json!({"data": [{"id": "a", "status": "queued"}, {"id": "b", "status": "running"}]}),
        )
        .unwrap();
        assert_eq!(bare.into_tasks().len(), 1);
        assert_eq!(wrapped.into_tasks().len(), 2);
    }
}
