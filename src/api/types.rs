//! Request and response bodies shared by the API handlers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::assistant::ChatTurn;
use crate::task::{EvidenceCategory, Task, TaskId, TaskStatus};
use crate::tracker::Board;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub dev_mode: bool,
    pub auth_required: bool,
    /// `google` or `memory`
    pub backend: String,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Serialize)]
pub struct EvidenceResponse {
    pub locator: String,
    pub filename: String,
    pub category: EvidenceCategory,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: TaskId,
    pub title: String,
    pub summary: String,
    pub status: TaskStatus,
    pub evidence: EvidenceResponse,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub analysis: Map<String, Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        let evidence = t.evidence();
        Self {
            id: t.id(),
            title: t.title().to_string(),
            summary: t.description().to_string(),
            status: t.status(),
            evidence: EvidenceResponse {
                locator: evidence.locator().to_string(),
                filename: evidence.filename().to_string(),
                category: evidence.category(),
                size_bytes: evidence.size_bytes(),
                uploaded_at: evidence.uploaded_at(),
            },
            analysis: t.analysis().fields.clone(),
            notes: t.notes().map(str::to_string),
            created_at: t.created_at(),
            updated_at: t.updated_at(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct BoardColumnResponse {
    pub status: TaskStatus,
    pub count: usize,
    pub tasks: Vec<TaskResponse>,
}

#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub columns: Vec<BoardColumnResponse>,
    pub total: usize,
}

impl From<Board> for BoardResponse {
    fn from(board: Board) -> Self {
        Self {
            total: board.total,
            columns: board
                .columns
                .into_iter()
                .map(|c| BoardColumnResponse {
                    status: c.status,
                    count: c.count,
                    tasks: c.tasks.into_iter().map(Into::into).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CategoryCount {
    pub category: EvidenceCategory,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_tasks: usize,
    pub by_status: Vec<StatusCount>,
    pub by_category: Vec<CategoryCount>,
    /// `Done` tasks created since Monday of the current week.
    pub done_this_week: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct RequirementsRequest {
    /// Status labels or names; defaults to `Done` only.
    #[serde(default)]
    pub statuses: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ScrumEmailRequest {
    pub week_start: Option<NaiveDate>,
    pub week_end: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}
