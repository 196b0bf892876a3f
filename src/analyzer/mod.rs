//! Evidence analysis: one model call per uploaded file.
//!
//! Images, PDFs and videos are attached as media. CSV files are sent as a
//! text preview. Excel workbooks are not parsed; the model only sees their
//! name and size.

mod preview;
mod prompts;

pub use preview::{csv_preview, parse_csv};
pub use prompts::{analysis_prompt, constraints_block, CONSTRAINTS};

use std::time::Instant;

use thiserror::Error;

use crate::llm::{ChatMessage, ContentPart, Role, SharedLlmClient};
use crate::task::{AnalysisResult, EvidenceCategory, EvidenceUpload};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("model request failed: {0}")]
    Model(#[source] anyhow::Error),

    #[error("model returned an empty reply for {0}")]
    EmptyReply(String),
}

/// Turns an uploaded evidence file into an [`AnalysisResult`].
pub struct EvidenceAnalyzer {
    llm: SharedLlmClient,
    model: String,
}

impl EvidenceAnalyzer {
    pub fn new(llm: SharedLlmClient, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn analyze(
        &self,
        upload: &EvidenceUpload,
        notes: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();
        let prompt = analysis_prompt(upload.category, notes);

        let parts = match upload.category {
            EvidenceCategory::Spreadsheet => {
                vec![ContentPart::text(format!("{}\n\n{}", prompt, spreadsheet_text(upload)))]
            }
            EvidenceCategory::Video | EvidenceCategory::Pdf | EvidenceCategory::Image => {
                let media = self
                    .llm
                    .attach_media(&upload.mime_type, upload.data.clone(), &upload.filename)
                    .await
                    .map_err(AnalysisError::Model)?;
                vec![media, ContentPart::text(prompt)]
            }
        };

        let messages = [ChatMessage::with_parts(Role::User, parts)];
        let response = self
            .llm
            .chat_completion(&self.model, &messages)
            .await
            .map_err(AnalysisError::Model)?;

        let reply = response.content.unwrap_or_default();
        let result = AnalysisResult::from_model_reply(&reply, &upload.filename)
            .ok_or_else(|| AnalysisError::EmptyReply(upload.filename.clone()))?;

        if result.raw {
            tracing::warn!(
                "Analysis of {} was not valid JSON, keeping raw text",
                upload.filename
            );
        }
        tracing::info!(
            "Gemini - process_{}: {} completed in {:.2}ms",
            upload.category,
            upload.filename,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }
}

/// Text sent in place of a spreadsheet's bytes.
fn spreadsheet_text(upload: &EvidenceUpload) -> String {
    let is_csv = upload.filename.to_ascii_lowercase().ends_with(".csv");
    if is_csv {
        csv_preview(&String::from_utf8_lossy(&upload.data))
    } else {
        format!(
            "Spreadsheet Data:\n\nWorkbook: {} ({} bytes). Cell contents are not available; base the analysis on the file name and the user's notes.",
            upload.filename,
            upload.size()
        )
    }
}
