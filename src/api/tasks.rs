//! Task endpoints: evidence upload, listing, lookup, status changes, export.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use chrono::Utc;

use crate::output::export_tasks_csv;
use crate::task::{EvidenceCategory, TaskStatus};
use crate::tracker::TaskFilter;

use super::errors::{intake_error, task_error};
use super::routes::AppState;
use super::types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Accept one evidence file (`file` field) plus optional `notes`.
pub async fn upload_evidence(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    let mut file: Option<(String, Bytes)> = None;
    let mut notes: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(base_name)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        (
                            StatusCode::BAD_REQUEST,
                            "File field has no filename".to_string(),
                        )
                    })?;
                let data = field.bytes().await.map_err(|e| {
                    (e.status(), format!("Failed to read uploaded file: {}", e))
                })?;
                file = Some((filename, data));
            }
            Some("notes") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| (e.status(), format!("Failed to read notes: {}", e)))?;
                notes = Some(text.trim().to_string()).filter(|t| !t.is_empty());
            }
            _ => {}
        }
    }

    let (filename, data) = file.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Missing 'file' field".to_string(),
        )
    })?;

    let task = state
        .tracker
        .submit(&filename, data, notes)
        .await
        .map_err(intake_error)?;
    Ok(Json(task.into()))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<TaskResponse>>, (StatusCode, String)> {
    let filter = parse_filter(query)?;
    let tasks = state.tracker.list(&filter).await.map_err(task_error)?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    let task = state.tracker.task(&id).await.map_err(task_error)?;
    Ok(Json(task.into()))
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<TaskResponse>, (StatusCode, String)> {
    let task = state
        .tracker
        .set_status(&id, req.status.trim())
        .await
        .map_err(task_error)?;
    Ok(Json(task.into()))
}

/// Every task as CSV, in the stored column layout.
pub async fn export_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Response, (StatusCode, String)> {
    let tasks = state
        .tracker
        .list(&TaskFilter::default())
        .await
        .map_err(task_error)?;
    let filename = format!("tasks_{}.csv", Utc::now().format("%Y%m%d"));
    tracing::debug!("Exporting {} tasks as {}", tasks.len(), filename);

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, export_tasks_csv(&tasks)).into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_filter(query: ListTasksQuery) -> Result<TaskFilter, (StatusCode, String)> {
    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<TaskStatus>())
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let category = query
        .category
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<EvidenceCategory>())
        .transpose()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    Ok(TaskFilter {
        status,
        category,
        query: query.q,
    })
}

/// Last path component of a client-supplied filename.
fn base_name(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .trim()
        .to_string()
}
