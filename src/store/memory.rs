//! In-process task store.
//!
//! Keeps tasks in insertion order, like rows appended to a sheet. Used when
//! the server runs in dev mode without Google credentials, and in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::TaskStore;
use crate::task::{Task, TaskError, TaskId, TaskStatus, Transition};

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    rows: RwLock<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create(&self, task: &Task) -> Result<(), TaskError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|t| t.id() == task.id()) {
            return Err(TaskError::DuplicateId(task.id()));
        }
        rows.push(task.clone());
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Task, TaskError> {
        self.rows
            .read()
            .await
            .iter()
            .find(|t| t.id() == id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Task>, TaskError> {
        Ok(self.rows.read().await.clone())
    }

    async fn update_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<(Task, Transition), TaskError> {
        let mut rows = self.rows.write().await;
        let task = rows
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        let transition = task.set_status(status, at);
        Ok((task.clone(), transition))
    }

    async fn count(&self) -> Result<usize, TaskError> {
        Ok(self.rows.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{AnalysisResult, EvidenceCategory, EvidenceReference, NewTask};
    use std::collections::HashSet;

    fn task(name: &str) -> Task {
        let now = Utc::now();
        Task::new(
            NewTask {
                evidence: EvidenceReference::new(
                    format!("mem://{}", name),
                    format!("{}.png", name),
                    EvidenceCategory::Image,
                    10,
                    now,
                ),
                analysis: AnalysisResult {
                    title: name.to_string(),
                    summary: format!("{} summary", name),
                    fields: Default::default(),
                    raw: false,
                },
                notes: None,
            },
            now,
        )
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let store = MemoryTaskStore::new();
        let t = task("a");
        store.create(&t).await.unwrap();

        let err = store.create(&t).await.unwrap_err();
        assert!(matches!(err, TaskError::DuplicateId(id) if id == t.id()));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = MemoryTaskStore::new();
        let err = store.get(TaskId::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_status_then_get() {
        let store = MemoryTaskStore::new();
        let t = task("a");
        store.create(&t).await.unwrap();

        let mut previous = TaskStatus::INITIAL;
        for status in TaskStatus::ALL.into_iter().rev() {
            let before = store.get(t.id()).await.unwrap().updated_at();
            let (updated, transition) = store.update_status(t.id(), status, Utc::now()).await.unwrap();
            assert_eq!(transition.from, previous);
            assert_eq!(transition.to, status);
            assert_eq!(updated, store.get(t.id()).await.unwrap());
            assert_eq!(updated.status(), status);
            assert!(updated.updated_at() >= before);
            previous = status;
        }
    }

    #[tokio::test]
    async fn test_update_unknown_leaves_store_unchanged() {
        let store = MemoryTaskStore::new();
        store.create(&task("a")).await.unwrap();

        let err = store
            .update_status(TaskId::new(), TaskStatus::Done, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_by_status_partitions_all_tasks() {
        let store = MemoryTaskStore::new();
        let mut ids = Vec::new();
        for (i, status) in TaskStatus::ALL.iter().cycle().take(12).enumerate() {
            let t = task(&format!("t{}", i));
            store.create(&t).await.unwrap();
            store.update_status(t.id(), *status, Utc::now()).await.unwrap();
            ids.push(t.id());
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for status in TaskStatus::ALL {
            let listed = store.list_by_status(status).await.unwrap();
            assert!(listed.iter().all(|t| t.status() == status));
            total += listed.len();
            seen.extend(listed.iter().map(|t| t.id()));
        }
        assert_eq!(total, ids.len());
        assert_eq!(seen, ids.into_iter().collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = MemoryTaskStore::new();
        let a = task("a");
        let b = task("b");
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        let listed: Vec<TaskId> = store.list().await.unwrap().iter().map(|t| t.id()).collect();
        assert_eq!(listed, vec![a.id(), b.id()]);
    }
}
