//! Mapping of domain errors to HTTP status codes.

use axum::http::StatusCode;

use crate::assistant::AssistantError;
use crate::output::OutputError;
use crate::task::TaskError;
use crate::tracker::IntakeError;

pub type ApiError = (StatusCode, String);

pub fn task_error(e: TaskError) -> ApiError {
    let status = match &e {
        TaskError::NotFound(_) => StatusCode::NOT_FOUND,
        TaskError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
        TaskError::DuplicateId(_) => StatusCode::CONFLICT,
        TaskError::MalformedRow { .. } | TaskError::Backend(_) => {
            tracing::error!("Task store error: {}", e);
            StatusCode::BAD_GATEWAY
        }
    };
    (status, e.to_string())
}

pub fn intake_error(e: IntakeError) -> ApiError {
    match e {
        IntakeError::Task(inner) => task_error(inner),
        other => {
            let status = match &other {
                IntakeError::Evidence(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, other.to_string())
        }
    }
}

pub fn output_error(e: OutputError) -> ApiError {
    let status = match &e {
        OutputError::EmptyInput | OutputError::InvalidWindow { .. } => StatusCode::BAD_REQUEST,
        OutputError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}

pub fn assistant_error(e: AssistantError) -> ApiError {
    let status = match &e {
        AssistantError::EmptyMessage => StatusCode::BAD_REQUEST,
        AssistantError::Model(_) | AssistantError::EmptyReply => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{EvidenceError, InvalidStatus, TaskId};

    #[test]
    fn test_task_error_codes() {
        assert_eq!(task_error(TaskError::NotFound("x".into())).0, StatusCode::NOT_FOUND);
        assert_eq!(
            task_error(TaskError::InvalidStatus(InvalidStatus("x".into()))).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(task_error(TaskError::DuplicateId(TaskId::new())).0, StatusCode::CONFLICT);
        assert_eq!(
            task_error(TaskError::Backend(anyhow::anyhow!("503"))).0,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_intake_error_codes() {
        let e = IntakeError::Evidence(EvidenceError::EmptyFile("a.png".into()));
        assert_eq!(intake_error(e).0, StatusCode::BAD_REQUEST);

        let e = IntakeError::Upload(anyhow::anyhow!("drive down"));
        assert_eq!(intake_error(e).0, StatusCode::BAD_GATEWAY);

        let e = IntakeError::Task(TaskError::DuplicateId(TaskId::new()));
        assert_eq!(intake_error(e).0, StatusCode::CONFLICT);
    }

    #[test]
    fn test_output_error_codes() {
        assert_eq!(output_error(OutputError::EmptyInput).0, StatusCode::BAD_REQUEST);
        assert_eq!(
            output_error(OutputError::GenerationFailed("x".into())).0,
            StatusCode::BAD_GATEWAY
        );
    }
}
