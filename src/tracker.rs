//! Task tracking: evidence intake, status changes and board views.
//!
//! The tracker owns the three external services and sequences them for one
//! request at a time. It keeps no state of its own.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::analyzer::{AnalysisError, EvidenceAnalyzer};
use crate::storage::SharedFileStorage;
use crate::store::SharedTaskStore;
use crate::task::{
    EvidenceCategory, EvidenceError, EvidenceUpload, NewTask, Task, TaskError, TaskId, TaskStatus,
    TransitionDirection,
};

/// Why an evidence submission failed, by stage.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("invalid evidence: {0}")]
    Evidence(#[from] EvidenceError),

    #[error("evidence upload failed: {0}")]
    Upload(#[source] anyhow::Error),

    #[error("evidence analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("task creation failed: {0}")]
    Task(#[from] TaskError),
}

/// Listing filter. All present criteria must match.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub category: Option<EvidenceCategory>,
    /// Case-insensitive substring of the title.
    pub query: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status() != status {
                return false;
            }
        }
        if let Some(category) = self.category {
            if task.evidence().category() != category {
                return false;
            }
        }
        match self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => task.title().to_lowercase().contains(&q.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub status: TaskStatus,
    pub count: usize,
    pub tasks: Vec<Task>,
}

/// Tasks in five columns, in workflow order.
#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub columns: Vec<BoardColumn>,
    pub total: usize,
}

impl Board {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let total = tasks.len();
        let mut columns: Vec<BoardColumn> = TaskStatus::ALL
            .into_iter()
            .map(|status| BoardColumn {
                status,
                count: 0,
                tasks: Vec::new(),
            })
            .collect();
        for task in tasks {
            let column = &mut columns[task.status().position()];
            column.count += 1;
            column.tasks.push(task);
        }
        Self { columns, total }
    }
}

pub struct Tracker {
    store: SharedTaskStore,
    storage: SharedFileStorage,
    analyzer: Arc<EvidenceAnalyzer>,
    max_upload_bytes: u64,
}

impl Tracker {
    pub fn new(
        store: SharedTaskStore,
        storage: SharedFileStorage,
        analyzer: Arc<EvidenceAnalyzer>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            store,
            storage,
            analyzer,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Validate, store, analyze and record one evidence file.
    ///
    /// A file that was stored but whose task could not be created stays in
    /// storage; its locator is logged.
    pub async fn submit(
        &self,
        filename: &str,
        data: Bytes,
        notes: Option<String>,
    ) -> Result<Task, IntakeError> {
        let start = Instant::now();
        let upload = EvidenceUpload::new(filename, data, self.max_upload_bytes)?;

        let evidence = self.storage.store(&upload).await.map_err(|e| {
            tracing::error!("Failed to store evidence {}: {}", upload.filename, e);
            IntakeError::Upload(e)
        })?;

        let analysis = match self.analyzer.analyze(&upload, notes.as_deref()).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(
                    "Evidence {} stored at {} but analysis failed: {}",
                    upload.filename,
                    evidence.locator(),
                    e
                );
                return Err(e.into());
            }
        };

        let locator = evidence.locator().to_string();
        let task = Task::new(
            NewTask {
                evidence,
                analysis,
                notes,
            },
            Utc::now(),
        );

        if let Err(e) = self.store.create(&task).await {
            tracing::warn!(
                "Evidence {} stored at {} but task creation failed, file is orphaned: {}",
                upload.filename,
                locator,
                e
            );
            return Err(e.into());
        }

        tracing::info!(
            "Created task {} '{}' from {} in {:.2}ms",
            task.id(),
            task.title(),
            upload.filename,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(task)
    }

    /// Move a task to `raw_status`. The status is checked before the store is
    /// touched; ids that are not task ids are reported as not found.
    pub async fn set_status(&self, raw_id: &str, raw_status: &str) -> Result<Task, TaskError> {
        let status: TaskStatus = raw_status.parse()?;
        let id = parse_id(raw_id)?;

        let (task, transition) = self.store.update_status(id, status, Utc::now()).await?;
        match transition.direction {
            TransitionDirection::Backward => tracing::info!(
                "Task {} moved back: {} -> {}",
                id,
                transition.from,
                transition.to
            ),
            TransitionDirection::Forward => tracing::info!(
                "Task {} moved forward: {} -> {}",
                id,
                transition.from,
                transition.to
            ),
            TransitionDirection::Unchanged => {
                tracing::info!("Task {} status unchanged: {}", id, transition.to)
            }
        }
        Ok(task)
    }

    pub async fn task(&self, raw_id: &str) -> Result<Task, TaskError> {
        self.store.get(parse_id(raw_id)?).await
    }

    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError> {
        let tasks = match filter.status {
            Some(status) => self.store.list_by_status(status).await?,
            None => self.store.list().await?,
        };
        Ok(tasks.into_iter().filter(|t| filter.matches(t)).collect())
    }

    /// Tasks whose status is one of `statuses`, in store order.
    pub async fn list_in(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>, TaskError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|t| statuses.contains(&t.status()))
            .collect())
    }

    pub async fn board(&self) -> Result<Board, TaskError> {
        Ok(Board::from_tasks(self.store.list().await?))
    }
}

fn parse_id(raw: &str) -> Result<TaskId, TaskError> {
    raw.parse()
        .map_err(|_| TaskError::NotFound(raw.trim().to_string()))
}
