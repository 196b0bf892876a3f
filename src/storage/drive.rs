//! Google Drive client for evidence uploads.
//!
//! Files are filed under `<root>/<YYYY>/<MM>/<category>/`, creating folders
//! on demand. Uploads use the single-request multipart form of `files.create`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use super::FileStorage;
use crate::google::GoogleAuth;
use crate::task::{EvidenceCategory, EvidenceReference, EvidenceUpload};

const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// File metadata returned by Drive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    web_view_link: Option<String>,
    /// Drive reports sizes as decimal strings.
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    created_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Drive-backed [`FileStorage`].
pub struct DriveStorage {
    client: Client,
    auth: Arc<GoogleAuth>,
    root_folder_id: String,
}

impl DriveStorage {
    pub fn new(auth: Arc<GoogleAuth>, root_folder_id: &str) -> Self {
        Self {
            client: Client::new(),
            auth,
            root_folder_id: root_folder_id.to_string(),
        }
    }

    /// Folder for today's uploads of `category`, falling back to the root
    /// folder if the hierarchy cannot be created.
    async fn dated_folder(&self, category: EvidenceCategory, now: DateTime<Utc>) -> String {
        let year = now.format("%Y").to_string();
        let month = now.format("%m").to_string();

        let result = async {
            let year_id = self.find_or_create_folder(&year, &self.root_folder_id).await?;
            let month_id = self.find_or_create_folder(&month, &year_id).await?;
            self.find_or_create_folder(category.as_str(), &month_id).await
        }
        .await;

        match result {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Failed to organize upload folders, using root folder: {}", e);
                self.root_folder_id.clone()
            }
        }
    }

    async fn find_or_create_folder(&self, name: &str, parent_id: &str) -> anyhow::Result<String> {
        let token = self.auth.access_token().await?;
        let resp = self
            .client
            .get(DRIVE_API_URL)
            .bearer_auth(&token)
            .query(&[
                ("q", folder_query(name, parent_id).as_str()),
                ("fields", "files(id, name)"),
                ("pageSize", "1"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("Failed to search folder '{}': {} - {}", name, status, text);
        }

        let list: FileList = serde_json::from_str(&text)?;
        if let Some(existing) = list.files.into_iter().next() {
            return Ok(existing.id);
        }

        let body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id],
        });
        let resp = self
            .client
            .post(DRIVE_API_URL)
            .bearer_auth(&token)
            .query(&[("fields", "id, name"), ("supportsAllDrives", "true")])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("Failed to create folder '{}': {} - {}", name, status, text);
        }

        let folder: DriveFile = serde_json::from_str(&text)?;
        tracing::info!("Created folder: {} (ID: {})", name, folder.id);
        Ok(folder.id)
    }
}

/// Drive search query for a non-trashed folder named `name` under `parent_id`.
fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and mimeType='{}' and trashed=false",
        escape_query(name),
        escape_query(parent_id),
        FOLDER_MIME_TYPE
    )
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Build a `multipart/related` body: JSON metadata part, then the media part.
fn multipart_related(boundary: &str, metadata: &serde_json::Value, mime_type: &str, data: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(data.len() + 512);
    body.put_slice(format!("--{}\r\n", boundary).as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(metadata.to_string().as_bytes());
    body.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.put_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.put_slice(data);
    body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body.freeze()
}

#[async_trait]
impl FileStorage for DriveStorage {
    async fn store(&self, upload: &EvidenceUpload) -> anyhow::Result<EvidenceReference> {
        let start = Instant::now();
        let now = Utc::now();
        let folder_id = self.dated_folder(upload.category, now).await;

        let metadata = serde_json::json!({
            "name": upload.filename,
            "parents": [folder_id],
        });
        let boundary = format!("evidence-{}", Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, &upload.mime_type, &upload.data);

        let token = self.auth.access_token().await?;
        let resp = self
            .client
            .post(DRIVE_UPLOAD_URL)
            .bearer_auth(token)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", "id, name, webViewLink, size, createdTime"),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            anyhow::bail!("Failed to upload file {}: {} - {}", upload.filename, status, text);
        }

        let file: DriveFile = serde_json::from_str(&text)?;
        let locator = file
            .web_view_link
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", file.id));
        let size = file
            .size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or_else(|| upload.size());

        tracing::info!(
            "Google Drive - upload_file: {} completed in {:.2}ms",
            file.name,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(EvidenceReference::new(
            locator,
            upload.filename.clone(),
            upload.category,
            size,
            file.created_time.unwrap_or(now),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_query_escapes_quotes() {
        let q = folder_query("Bob's", "root123");
        assert_eq!(
            q,
            "name='Bob\\'s' and 'root123' in parents and mimeType='application/vnd.google-apps.folder' and trashed=false"
        );
    }

    #[test]
    fn test_multipart_related_layout() {
        let metadata = serde_json::json!({"name": "a.png"});
        let body = multipart_related("b1", &metadata, "image/png", b"PNGDATA");
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.starts_with("--b1\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"name\":\"a.png\"}"));
        assert!(text.contains("\r\n--b1\r\nContent-Type: image/png\r\n\r\nPNGDATA"));
        assert!(text.ends_with("\r\n--b1--\r\n"));
    }

    #[test]
    fn test_drive_file_parses_string_size() {
        let file: DriveFile = serde_json::from_str(
            r#"{"id": "f1", "name": "a.png", "webViewLink": "https://drive.google.com/file/d/f1/view", "size": "1234", "createdTime": "2024-05-01T10:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(file.size.as_deref(), Some("1234"));
        assert_eq!(file.web_view_link.as_deref(), Some("https://drive.google.com/file/d/f1/view"));
        assert!(file.created_time.is_some());
    }
}
