//! Google Sheets client for the task table.
//!
//! Uses the Sheets v4 `values` endpoints. Row 1 holds [`SHEET_HEADERS`];
//! each following row is one task. Lookups scan the whole table, which is the
//! only index the store has.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::row::{column_letter, decode_row, encode_row, COL_ID, COL_STATUS, COL_UPDATED_AT, SHEET_HEADERS};
use super::TaskStore;
use crate::google::GoogleAuth;
use crate::task::{Task, TaskError, TaskId, TaskStatus, Transition};

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
/// First sheet row holding task data (row 1 is the header).
const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Sheets-backed [`TaskStore`].
pub struct SheetsTaskStore {
    client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
    spreadsheet_id: String,
    worksheet: String,
}

impl SheetsTaskStore {
    /// Create a store and make sure the header row exists.
    pub async fn connect(
        auth: Arc<GoogleAuth>,
        spreadsheet_id: &str,
        worksheet: &str,
    ) -> anyhow::Result<Self> {
        Self::connect_with_base_url(auth, SHEETS_API_URL, spreadsheet_id, worksheet).await
    }

    /// Like [`SheetsTaskStore::connect`], against another Sheets API root.
    pub async fn connect_with_base_url(
        auth: Arc<GoogleAuth>,
        base_url: &str,
        spreadsheet_id: &str,
        worksheet: &str,
    ) -> anyhow::Result<Self> {
        let store = Self {
            client: Client::new(),
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            worksheet: worksheet.to_string(),
        };
        store.ensure_headers().await?;
        tracing::info!(
            "Google Sheets task store ready (spreadsheet {}, worksheet '{}')",
            store.spreadsheet_id,
            store.worksheet
        );
        Ok(store)
    }

    /// A1 range on this worksheet, quoted so names with spaces work.
    fn range(&self, cells: &str) -> String {
        a1_range(&self.worksheet, cells)
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    fn last_column(&self) -> char {
        column_letter(SHEET_HEADERS.len() - 1)
    }

    async fn get_values(&self, range: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let token = self.auth.access_token().await?;
        let resp = self
            .client
            .get(self.values_url(range))
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("Failed to read range {}: {} - {}", range, status, text);
        }

        let parsed: ValueRange = serde_json::from_str(&text)?;
        Ok(parsed.values)
    }

    async fn ensure_headers(&self) -> anyhow::Result<()> {
        let header_range = self.range(&format!("A1:{}1", self.last_column()));
        let existing = self.get_values(&header_range).await?;
        if existing.first().map_or(false, |row| !row.is_empty()) {
            return Ok(());
        }

        let token = self.auth.access_token().await?;
        let body = serde_json::json!({
            "range": header_range,
            "majorDimension": "ROWS",
            "values": [SHEET_HEADERS],
        });
        let resp = self
            .client
            .put(format!("{}?valueInputOption=RAW", self.values_url(&header_range)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            anyhow::bail!("Failed to write header row: {} - {}", status, text);
        }

        tracing::info!("Initialized worksheet '{}' with headers", self.worksheet);
        Ok(())
    }

    /// All data rows, paired with their 1-based sheet row numbers.
    async fn read_rows(&self) -> anyhow::Result<Vec<(usize, Vec<String>)>> {
        let start = Instant::now();
        let range = self.range(&format!("A{}:{}", FIRST_DATA_ROW, self.last_column()));
        let rows = self.get_values(&range).await?;
        tracing::info!(
            "Google Sheets - read {} rows completed in {:.2}ms",
            rows.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, cells)| (i + FIRST_DATA_ROW, cells))
            .collect())
    }

    /// Sheet row number of the task with `id`, plus its cells.
    async fn find_row(&self, id: TaskId) -> Result<(usize, Vec<String>), TaskError> {
        let wanted = id.to_string();
        self.read_rows()
            .await?
            .into_iter()
            .find(|(_, cells)| cells.get(COL_ID).map(|c| c.trim()) == Some(wanted.as_str()))
            .ok_or_else(|| TaskError::NotFound(wanted))
    }
}

/// Quote a worksheet name for A1 notation (`'My Sheet'!A1:B2`).
fn a1_range(worksheet: &str, cells: &str) -> String {
    format!("'{}'!{}", worksheet.replace('\'', "''"), cells)
}

#[async_trait]
impl TaskStore for SheetsTaskStore {
    async fn create(&self, task: &Task) -> Result<(), TaskError> {
        let start = Instant::now();
        let wanted = task.id().to_string();
        let rows = self.read_rows().await?;
        if rows
            .iter()
            .any(|(_, cells)| cells.get(COL_ID).map(|c| c.trim()) == Some(wanted.as_str()))
        {
            return Err(TaskError::DuplicateId(task.id()));
        }

        let range = self.range(&format!("A1:{}", self.last_column()));
        let token = self.auth.access_token().await?;
        let body = serde_json::json!({
            "majorDimension": "ROWS",
            "values": [encode_row(task)],
        });
        let resp = self
            .client
            .post(format!(
                "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
                self.values_url(&range)
            ))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Failed to append task row: {} - {}", status, text).into());
        }

        tracing::info!(
            "Google Sheets - create_task: {} completed in {:.2}ms",
            task.title(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Task, TaskError> {
        let (row, cells) = self.find_row(id).await?;
        decode_row(row, &cells)
    }

    async fn list(&self) -> Result<Vec<Task>, TaskError> {
        let rows = self.read_rows().await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for (row, cells) in rows {
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            match decode_row(row, &cells) {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::warn!("Skipping unreadable task row: {}", e),
            }
        }
        Ok(tasks)
    }

    async fn update_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<(Task, Transition), TaskError> {
        let start = Instant::now();
        let (row, cells) = self.find_row(id).await?;
        let mut task = decode_row(row, &cells)?;
        let transition = task.set_status(status, at);

        let status_cell = self.range(&format!("{}{}", column_letter(COL_STATUS), row));
        let updated_cell = self.range(&format!("{}{}", column_letter(COL_UPDATED_AT), row));
        let body = serde_json::json!({
            "valueInputOption": "RAW",
            "data": [
                { "range": status_cell, "values": [[task.status().label()]] },
                { "range": updated_cell, "values": [[task.updated_at().to_rfc3339()]] },
            ],
        });

        let token = self.auth.access_token().await?;
        let resp = self
            .client
            .post(format!(
                "{}/{}/values:batchUpdate",
                self.base_url, self.spreadsheet_id
            ))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(anyhow::Error::from)?;

        let http_status = resp.status();
        if !http_status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Failed to update status of task {}: {} - {}",
                id,
                http_status,
                text
            )
            .into());
        }

        tracing::info!(
            "Google Sheets - update_task_status: {} -> {} completed in {:.2}ms",
            id,
            status,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok((task, transition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::extract::State;
    use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use axum::{Json, Router};
    use bytes::Bytes;
    use serde_json::{json, Value};

    use crate::testing::task;

    const TOKEN: &str = "sheet-token";

    /// In-process stand-in for one spreadsheet with a `Sheet1` worksheet.
    #[derive(Default)]
    struct FakeSheet {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
        header_writes: usize,
        appends: Vec<Value>,
        batches: Vec<Value>,
    }

    type SharedSheet = Arc<Mutex<FakeSheet>>;

    async fn sheets_api(
        State(sheet): State<SharedSheet>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let bearer = format!("Bearer {}", TOKEN);
        if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(bearer.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        let path = urlencoding::decode(uri.path()).unwrap().into_owned();
        let body: Value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };

        let mut sheet = sheet.lock().unwrap();
        match (method, path.as_str()) {
            (Method::GET, "/sheet-1/values/'Sheet1'!A1:M1") => {
                let values: Vec<Vec<String>> = if sheet.header.is_empty() {
                    vec![]
                } else {
                    vec![sheet.header.clone()]
                };
                Json(json!({ "values": values })).into_response()
            }
            (Method::PUT, "/sheet-1/values/'Sheet1'!A1:M1") => {
                sheet.header = serde_json::from_value(body["values"][0].clone()).unwrap();
                sheet.header_writes += 1;
                Json(json!({})).into_response()
            }
            (Method::GET, "/sheet-1/values/'Sheet1'!A2:M") => {
                let mut resp = json!({ "range": "Sheet1!A2:M1000", "majorDimension": "ROWS" });
                if !sheet.rows.is_empty() {
                    resp["values"] = json!(sheet.rows);
                }
                Json(resp).into_response()
            }
            (Method::POST, "/sheet-1/values/'Sheet1'!A1:M:append") => {
                let row: Vec<String> = serde_json::from_value(body["values"][0].clone()).unwrap();
                sheet.rows.push(row);
                sheet.appends.push(body);
                Json(json!({})).into_response()
            }
            (Method::POST, "/sheet-1/values:batchUpdate") => {
                sheet.batches.push(body);
                Json(json!({})).into_response()
            }
            _ => (StatusCode::NOT_FOUND, path).into_response(),
        }
    }

    fn headed(rows: Vec<Vec<String>>) -> FakeSheet {
        FakeSheet {
            header: SHEET_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows,
            ..FakeSheet::default()
        }
    }

    async fn fake_store(sheet: FakeSheet) -> (SheetsTaskStore, SharedSheet) {
        let shared = Arc::new(Mutex::new(sheet));
        let app = Router::new()
            .fallback(sheets_api)
            .with_state(Arc::clone(&shared));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let auth = Arc::new(GoogleAuth::with_token(TOKEN));
        let base = format!("http://{}/", addr);
        let store = SheetsTaskStore::connect_with_base_url(auth, &base, "sheet-1", "Sheet1")
            .await
            .unwrap();
        (store, shared)
    }

    #[tokio::test]
    async fn test_connect_writes_missing_header_once() {
        let (_store, sheet) = fake_store(FakeSheet::default()).await;
        {
            let sheet = sheet.lock().unwrap();
            assert_eq!(sheet.header_writes, 1);
            assert_eq!(sheet.header, SHEET_HEADERS.to_vec());
        }

        let (_store, sheet) = fake_store(headed(vec![])).await;
        assert_eq!(sheet.lock().unwrap().header_writes, 0);
    }

    #[tokio::test]
    async fn test_list_skips_blank_rows() {
        let first = task("Login page", "login.png");
        let second = task("Checkout flow", "checkout.mp4");
        let rows = vec![
            encode_row(&first),
            vec![],
            vec![String::new(), "  ".to_string()],
            encode_row(&second),
        ];
        let (store, _) = fake_store(headed(rows)).await;

        let ids: Vec<TaskId> = store.list().await.unwrap().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![first.id(), second.id()]);
        assert_eq!(store.get(second.id()).await.unwrap().title(), "Checkout flow");
    }

    #[tokio::test]
    async fn test_update_status_targets_row_after_blank_row() {
        let first = task("Login page", "login.png");
        let second = task("Checkout flow", "checkout.mp4");
        let rows = vec![encode_row(&first), vec![], encode_row(&second)];
        let (store, sheet) = fake_store(headed(rows)).await;

        let at = second.created_at() + chrono::Duration::minutes(5);
        let (updated, transition) = store
            .update_status(second.id(), TaskStatus::InStage, at)
            .await
            .unwrap();
        assert_eq!(updated.status(), TaskStatus::InStage);
        assert_eq!(updated.updated_at(), at);
        assert_eq!(transition.from, TaskStatus::InReview);
        assert_eq!(transition.to, TaskStatus::InStage);

        let sheet = sheet.lock().unwrap();
        assert_eq!(sheet.batches.len(), 1);
        let data = &sheet.batches[0]["data"];
        assert_eq!(sheet.batches[0]["valueInputOption"], "RAW");
        assert_eq!(data[0]["range"], "'Sheet1'!D4");
        assert_eq!(data[0]["values"][0][0], "In Stage");
        assert_eq!(data[1]["range"], "'Sheet1'!M4");
        assert_eq!(data[1]["values"][0][0], at.to_rfc3339());
    }

    #[tokio::test]
    async fn test_update_status_of_missing_task() {
        let first = task("Login page", "login.png");
        let (store, sheet) = fake_store(headed(vec![encode_row(&first)])).await;

        let err = store
            .update_status(TaskId::new(), TaskStatus::Done, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
        assert!(sheet.lock().unwrap().batches.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_existing_id_without_append() {
        let first = task("Login page", "login.png");
        let (store, sheet) = fake_store(headed(vec![encode_row(&first)])).await;

        let err = store.create(&first).await.unwrap_err();
        assert!(matches!(err, TaskError::DuplicateId(id) if id == first.id()));
        assert!(sheet.lock().unwrap().appends.is_empty());

        let second = task("Checkout flow", "checkout.mp4");
        store.create(&second).await.unwrap();
        {
            let sheet = sheet.lock().unwrap();
            assert_eq!(sheet.appends.len(), 1);
            assert_eq!(sheet.appends[0]["majorDimension"], "ROWS");
        }
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[test]
    fn test_a1_range_quotes_worksheet() {
        assert_eq!(a1_range("Sheet1", "A2:M"), "'Sheet1'!A2:M");
        assert_eq!(a1_range("Sprint Board", "D5"), "'Sprint Board'!D5");
        assert_eq!(a1_range("Bob's", "A1"), "'Bob''s'!A1");
    }

    #[test]
    fn test_value_range_without_values() {
        let parsed: ValueRange =
            serde_json::from_str(r#"{"range": "Sheet1!A2:M1000", "majorDimension": "ROWS"}"#).unwrap();
        assert!(parsed.values.is_empty());
    }
}
