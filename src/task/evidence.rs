//! Evidence files and the immutable references that tasks hold to them.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Default upload ceiling (100 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvidenceError {
    #[error("file type '{extension}' not allowed (allowed: {allowed})")]
    UnsupportedType { extension: String, allowed: String },

    #[error("file size ({:.1}MB) exceeds maximum allowed size ({}MB)", megabytes(.size), whole_megabytes(.max))]
    TooLarge { size: u64, max: u64 },

    #[error("file '{0}' is empty")]
    EmptyFile(String),
}

/// Kind of content an evidence file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceCategory {
    Video,
    #[serde(alias = "document")]
    Pdf,
    Spreadsheet,
    Image,
}

impl EvidenceCategory {
    pub const ALL: [EvidenceCategory; 4] = [
        EvidenceCategory::Video,
        EvidenceCategory::Pdf,
        EvidenceCategory::Spreadsheet,
        EvidenceCategory::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Pdf => "pdf",
            Self::Spreadsheet => "spreadsheet",
            Self::Image => "image",
        }
    }

    /// Accepted lowercase file extensions, without the dot.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Video => &["mp4", "mov"],
            Self::Pdf => &["pdf"],
            Self::Spreadsheet => &["xlsx", "csv"],
            Self::Image => &["png", "jpg", "jpeg"],
        }
    }

    /// Resolve the category from a filename's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, EvidenceError> {
        let extension = extension_of(filename);
        Self::ALL
            .into_iter()
            .find(|c| c.extensions().contains(&extension.as_str()))
            .ok_or_else(|| EvidenceError::UnsupportedType {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{}", extension)
                },
                allowed: allowed_extensions(),
            })
    }
}

impl fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "pdf" | "document" => Ok(Self::Pdf),
            "spreadsheet" => Ok(Self::Spreadsheet),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown evidence category '{}'", other)),
        }
    }
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

fn whole_megabytes(bytes: &u64) -> u64 {
    *bytes / (1024 * 1024)
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn allowed_extensions() -> String {
    EvidenceCategory::ALL
        .iter()
        .flat_map(|c| c.extensions().iter())
        .map(|e| format!(".{}", e))
        .collect::<Vec<_>>()
        .join(", ")
}

/// MIME type sent to storage and the model for a file.
pub fn mime_type_for(filename: &str) -> &'static str {
    match extension_of(filename).as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// A validated file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct EvidenceUpload {
    pub filename: String,
    pub category: EvidenceCategory,
    pub mime_type: String,
    pub data: Bytes,
}

impl EvidenceUpload {
    /// Validate type and size, then wrap the bytes.
    pub fn new(filename: impl Into<String>, data: Bytes, max_bytes: u64) -> Result<Self, EvidenceError> {
        let filename = filename.into();
        let category = EvidenceCategory::from_filename(&filename)?;

        let size = data.len() as u64;
        if size == 0 {
            return Err(EvidenceError::EmptyFile(filename));
        }
        if size > max_bytes {
            return Err(EvidenceError::TooLarge { size, max: max_bytes });
        }

        Ok(Self {
            mime_type: mime_type_for(&filename).to_string(),
            filename,
            category,
            data,
        })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Immutable pointer to a stored evidence file.
///
/// Produced once per upload and owned by exactly one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceReference {
    locator: String,
    filename: String,
    category: EvidenceCategory,
    size_bytes: u64,
    uploaded_at: DateTime<Utc>,
}

impl EvidenceReference {
    pub fn new(
        locator: impl Into<String>,
        filename: impl Into<String>,
        category: EvidenceCategory,
        size_bytes: u64,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            locator: locator.into(),
            filename: filename.into(),
            category,
            size_bytes,
            uploaded_at,
        }
    }

    /// Opaque storage locator (a shareable link for Drive-backed storage).
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn category(&self) -> EvidenceCategory {
        self.category
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }
}
