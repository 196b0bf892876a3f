//! Review tasks.
//!
//! A [`Task`] is created from one uploaded evidence file and its model
//! analysis, then moves through the five [`TaskStatus`] stages. Only the
//! status and `updated_at` change after creation.

pub mod task;
mod status;
mod evidence;
mod analysis;

pub use task::{Task, TaskId, TaskError, NewTask};
pub use status::{TaskStatus, Transition, TransitionDirection, InvalidStatus};
pub use evidence::{
    mime_type_for, EvidenceCategory, EvidenceError, EvidenceReference, EvidenceUpload,
    DEFAULT_MAX_UPLOAD_BYTES,
};
pub use analysis::{strip_code_fence, AnalysisResult};
