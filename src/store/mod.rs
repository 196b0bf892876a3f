//! Task persistence.
//!
//! Tasks live as rows in an external spreadsheet, one row per task. The
//! [`TaskStore`] trait is the seam between the workflow and that store; the
//! production implementation talks to Google Sheets, the in-memory one backs
//! dev mode and tests.
//!
//! The store offers no isolation beyond single-row overwrite: concurrent
//! status updates to the same task are last-write-wins.

mod memory;
mod row;
mod sheets;

pub use memory::MemoryTaskStore;
pub use row::{decode_row, encode_row, SHEET_HEADERS};
pub use sheets::SheetsTaskStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::task::{Task, TaskError, TaskId, TaskStatus, Transition};

/// Row-per-task persistence.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Append a new task. Fails with `DuplicateId` if the id is taken.
    async fn create(&self, task: &Task) -> Result<(), TaskError>;

    /// Fetch a task by id. Fails with `NotFound`.
    async fn get(&self, id: TaskId) -> Result<Task, TaskError>;

    /// Every task, in store order.
    async fn list(&self) -> Result<Vec<Task>, TaskError>;

    /// Tasks whose status equals `status`, in store order.
    async fn list_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, TaskError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.status() == status)
            .collect())
    }

    /// Rewrite the status and updated-at of one task in place.
    ///
    /// Returns the task as stored after the write and the transition measured
    /// against the row it replaced. Fails with `NotFound`.
    async fn update_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<(Task, Transition), TaskError>;

    /// Number of task rows.
    async fn count(&self) -> Result<usize, TaskError> {
        Ok(self.list().await?.len())
    }
}

/// Shared task store handle.
pub type SharedTaskStore = Arc<dyn TaskStore>;
