//! The task entity and its error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::analysis::AnalysisResult;
use super::evidence::EvidenceReference;
use super::status::{InvalidStatus, TaskStatus, Transition};

/// Unique identifier for a task. Generated locally, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Errors raised by the workflow and the task store.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidStatus(#[from] InvalidStatus),

    #[error("task {0} already exists")]
    DuplicateId(TaskId),

    #[error("malformed task row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("tabular store request failed: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Input for creating a task. Status is not part of it: new tasks always
/// start in [`TaskStatus::INITIAL`].
#[derive(Debug, Clone)]
pub struct NewTask {
    pub evidence: EvidenceReference,
    pub analysis: AnalysisResult,
    pub notes: Option<String>,
}

/// A unit of tracked work: one evidence file and its review progress.
///
/// # Invariants
/// - exactly one evidence reference, fixed at creation
/// - `status` is always one of the five workflow states
/// - `created_at <= updated_at`
/// - everything except `status` and `updated_at` is write-once
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    id: TaskId,
    title: String,
    description: String,
    status: TaskStatus,
    evidence: EvidenceReference,
    analysis: AnalysisResult,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task in the initial workflow state.
    pub fn new(input: NewTask, created_at: DateTime<Utc>) -> Self {
        let notes = input
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Self {
            id: TaskId::new(),
            title: input.analysis.title.clone(),
            description: input.analysis.summary.clone(),
            status: TaskStatus::INITIAL,
            evidence: input.evidence,
            analysis: input.analysis,
            notes,
            created_at,
            updated_at: created_at,
        }
    }

    /// Rebuild a task from persisted fields.
    ///
    /// `updated_at` is raised to `created_at` if the stored value is older.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: TaskId,
        title: String,
        description: String,
        status: TaskStatus,
        evidence: EvidenceReference,
        analysis: AnalysisResult,
        notes: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            description,
            status,
            evidence,
            analysis,
            notes,
            created_at,
            updated_at: updated_at.max(created_at),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn evidence(&self) -> &EvidenceReference {
        &self.evidence
    }

    pub fn analysis(&self) -> &AnalysisResult {
        &self.analysis
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Move the task to `status` and stamp `updated_at`.
    ///
    /// Any status may follow any other. `at` is clamped so `updated_at`
    /// never decreases.
    pub fn set_status(&mut self, status: TaskStatus, at: DateTime<Utc>) -> Transition {
        let transition = self.status.transition_to(status);
        self.status = status;
        self.updated_at = at.max(self.updated_at);
        transition
    }
}
