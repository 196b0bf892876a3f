//! In-process file storage for dev mode and tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::FileStorage;
use crate::task::{EvidenceReference, EvidenceUpload};

/// Keeps uploaded files in memory under `memory://<uuid>/<filename>` locators.
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    objects: RwLock<Vec<(String, Bytes)>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Bytes stored under `locator`.
    pub async fn get(&self, locator: &str) -> Option<Bytes> {
        self.objects
            .read()
            .await
            .iter()
            .find(|(l, _)| l == locator)
            .map(|(_, data)| data.clone())
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn store(&self, upload: &EvidenceUpload) -> anyhow::Result<EvidenceReference> {
        let locator = format!("memory://{}/{}", Uuid::new_v4(), upload.filename);
        self.objects
            .write()
            .await
            .push((locator.clone(), upload.data.clone()));

        Ok(EvidenceReference::new(
            locator,
            upload.filename.clone(),
            upload.category,
            upload.size(),
            Utc::now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::EvidenceCategory;

    #[tokio::test]
    async fn test_each_store_gets_a_new_locator() {
        let storage = MemoryFileStorage::new();
        let upload = EvidenceUpload::new("a.csv", Bytes::from_static(b"x,y\n1,2\n"), 1024).unwrap();

        let first = storage.store(&upload).await.unwrap();
        let second = storage.store(&upload).await.unwrap();

        assert_ne!(first.locator(), second.locator());
        assert_eq!(first.category(), EvidenceCategory::Spreadsheet);
        assert_eq!(first.size_bytes(), 8);
        assert_eq!(storage.len().await, 2);
        assert_eq!(storage.get(first.locator()).await.unwrap(), upload.data);
    }
}
