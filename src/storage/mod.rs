//! Evidence file storage.
//!
//! Uploaded files go to external storage; what comes back is an
//! [`EvidenceReference`] the task keeps for its whole life.

mod drive;
mod memory;

pub use drive::DriveStorage;
pub use memory::MemoryFileStorage;

use async_trait::async_trait;
use std::sync::Arc;

use crate::task::{EvidenceReference, EvidenceUpload};

/// Storage for evidence files.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store the file and return a reference to it.
    ///
    /// Every call stores a new object, even for identical bytes.
    async fn store(&self, upload: &EvidenceUpload) -> anyhow::Result<EvidenceReference>;
}

/// Shared file storage handle.
pub type SharedFileStorage = Arc<dyn FileStorage>;
