//! Generated artifacts: test cases, requirement document, scrum email.
//!
//! Each endpoint selects its tasks, then makes a single model call.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use bytes::Bytes;
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::output::{Artifact, ReportWindow};
use crate::task::TaskStatus;

use super::errors::{output_error, task_error};
use super::routes::AppState;
use super::types::{RequirementsRequest, ScrumEmailRequest};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/test-cases", post(generate_test_cases))
        .route("/requirements", post(generate_requirements))
        .route("/scrum-email", post(generate_scrum_email))
}

/// Test cases for every `Done` task.
async fn generate_test_cases(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Artifact>, (StatusCode, String)> {
    let tasks = state
        .tracker
        .list_in(&[TaskStatus::Done])
        .await
        .map_err(task_error)?;
    let artifact = state.outputs.test_cases(&tasks).await.map_err(output_error)?;
    Ok(Json(artifact))
}

/// Requirement document for tasks in the requested statuses (`Done` by default).
async fn generate_requirements(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Artifact>, (StatusCode, String)> {
    let req: RequirementsRequest = optional_body(&body)?;
    let statuses = match req.statuses.filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .iter()
            .map(|s| s.trim().parse::<TaskStatus>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        None => vec![TaskStatus::Done],
    };

    let tasks = state
        .tracker
        .list_in(&statuses)
        .await
        .map_err(task_error)?;
    let artifact = state
        .outputs
        .requirement_document(&tasks)
        .await
        .map_err(output_error)?;
    Ok(Json(artifact))
}

/// Weekly email over `Done` tasks created inside the window.
///
/// The window defaults to Monday of the current week through today.
async fn generate_scrum_email(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Artifact>, (StatusCode, String)> {
    let req: ScrumEmailRequest = optional_body(&body)?;
    let current = ReportWindow::current_week(Utc::now().date_naive());
    let window = ReportWindow::new(
        req.week_start.unwrap_or(current.start()),
        req.week_end.unwrap_or(current.end()),
    )
    .map_err(output_error)?;

    let tasks: Vec<_> = state
        .tracker
        .list_in(&[TaskStatus::Done])
        .await
        .map_err(task_error)?
        .into_iter()
        .filter(|t| window.contains(t.created_at()))
        .collect();
    tracing::debug!(
        "Scrum email for {} to {}: {} tasks",
        window.start(),
        window.end(),
        tasks.len()
    );

    let artifact = state
        .outputs
        .scrum_email(&tasks, window)
        .await
        .map_err(output_error)?;
    Ok(Json(artifact))
}

/// Decode a JSON body that may be omitted. An empty body means defaults.
fn optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, (StatusCode, String)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::{test_state, AppState};
    use crate::output::ArtifactKind;

    async fn submit(state: &AppState, title: &str, filename: &str, status: &str) {
        let task = state
            .tracker
            .submit(filename, Bytes::from_static(b"data"), None)
            .await
            .unwrap();
        assert_eq!(task.title(), title);
        state
            .tracker
            .set_status(&task.id().to_string(), status)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_test_cases_use_done_tasks_only() {
        let (state, llm) = test_state(vec![
            Ok(r#"{"task_name": "Shipped"}"#.to_string()),
            Ok(r#"{"task_name": "Staged"}"#.to_string()),
            Ok("```csv\nTitle,Steps\nA,B\n```".to_string()),
        ]);
        submit(&state, "Shipped", "a.png", "Done").await;
        submit(&state, "Staged", "b.png", "In Stage").await;

        let Json(artifact) = generate_test_cases(State(state)).await.unwrap();
        assert_eq!(artifact.kind, ArtifactKind::TestCases);
        assert_eq!(artifact.content, "Title,Steps\nA,B");
        assert!(artifact.filename.starts_with("test_cases_"));

        let calls = llm.calls().await;
        let prompt = calls[2].messages[0].text_content();
        assert!(prompt.contains("Shipped"));
        assert!(!prompt.contains("Staged"));
    }

    #[tokio::test]
    async fn test_test_cases_without_done_tasks_is_bad_request() {
        let (state, llm) = test_state(vec![]);
        let err = generate_test_cases(State(state)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(llm.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_requirements_status_selection() {
        let (state, llm) = test_state(vec![
            Ok(r#"{"task_name": "Reviewed"}"#.to_string()),
            Ok("# Requirements".to_string()),
        ]);
        submit(&state, "Reviewed", "design.pdf", "Passed In Review").await;

        let err = generate_requirements(State(state.clone()), Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let body = Bytes::from_static(br#"{"statuses": ["PassedInReview"]}"#);
        let Json(artifact) = generate_requirements(State(state.clone()), body)
            .await
            .unwrap();
        assert_eq!(artifact.kind, ArtifactKind::RequirementDocument);
        assert_eq!(artifact.content, "# Requirements");
        assert_eq!(llm.calls().await.len(), 2);

        let body = Bytes::from_static(br#"{"statuses": ["Archived"]}"#);
        let err = generate_requirements(State(state.clone()), body)
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let body = Bytes::from_static(br#"{"statuses": "Done"}"#);
        let err = generate_requirements(State(state), body).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(llm.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_scrum_email_window() {
        let (state, llm) = test_state(vec![
            Ok(r#"{"task_name": "Demo walkthrough"}"#.to_string()),
            Ok("Hi team".to_string()),
        ]);
        submit(&state, "Demo walkthrough", "demo.mov", "Done").await;

        let Json(artifact) = generate_scrum_email(State(state.clone()), Bytes::from_static(b"  "))
            .await
            .unwrap();
        assert_eq!(artifact.kind, ArtifactKind::ScrumEmail);
        assert_eq!(artifact.content, "Hi team");
        let prompt = llm.calls().await[1].messages[0].text_content();
        assert!(prompt.contains("Demo walkthrough"));

        let past = Bytes::from_static(br#"{"week_start": "2020-01-06", "week_end": "2020-01-10"}"#);
        let err = generate_scrum_email(State(state.clone()), past)
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let reversed = Bytes::from_static(br#"{"week_start": "2020-01-10", "week_end": "2020-01-06"}"#);
        let err = generate_scrum_email(State(state), reversed)
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(llm.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_scrum_email_rejects_unreadable_body() {
        let (state, llm) = test_state(vec![
            Ok(r#"{"task_name": "Demo walkthrough"}"#.to_string()),
            Ok("Hi team".to_string()),
        ]);
        submit(&state, "Demo walkthrough", "demo.mov", "Done").await;

        for raw in [
            r#"{"week_start": "2020-13-45"}"#,
            r#"{"week_end": 20200110}"#,
            r#"{"week_start": "#,
        ] {
            let err = generate_scrum_email(State(state.clone()), Bytes::from(raw))
                .await
                .unwrap_err();
            assert_eq!(err.0, StatusCode::BAD_REQUEST, "{}", raw);
            assert!(err.1.starts_with("Invalid request body"), "{}", err.1);
        }
        assert_eq!(llm.calls().await.len(), 1);
    }
}
