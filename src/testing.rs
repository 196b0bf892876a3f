//! Test doubles shared by unit tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Map;
use tokio::sync::Mutex;

use crate::llm::{ChatMessage, ChatOptions, ChatResponse, LlmClient};
use crate::task::{AnalysisResult, EvidenceCategory, EvidenceReference, NewTask, Task};

/// A task with evidence `filename`, created at `at`.
pub fn task_at(title: &str, filename: &str, at: DateTime<Utc>) -> Task {
    let category = EvidenceCategory::from_filename(filename).unwrap_or(EvidenceCategory::Pdf);
    Task::new(
        NewTask {
            evidence: EvidenceReference::new(
                format!("https://drive.example/{}", filename),
                filename,
                category,
                42,
                at,
            ),
            analysis: AnalysisResult {
                title: title.to_string(),
                summary: format!("Summary of {}", title),
                fields: Map::new(),
                raw: false,
            },
            notes: None,
        },
        at,
    )
}

pub fn task(title: &str, filename: &str) -> Task {
    task_at(title, filename, Utc::now())
}

/// One request seen by [`ScriptedLlm`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
}

/// LLM fake that answers from a fixed script and records every request.
///
/// `Err(message)` entries make the call fail with that message.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> anyhow::Result<ChatResponse> {
        self.chat_completion_with_options(model, messages, ChatOptions::default())
            .await
    }

    async fn chat_completion_with_options(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> anyhow::Result<ChatResponse> {
        self.calls.lock().await.push(RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
            options,
        });

        let reply = self
            .replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))?;

        match reply {
            Ok(text) => Ok(ChatResponse {
                content: Some(text).filter(|t| !t.is_empty()),
                finish_reason: Some("STOP".to_string()),
                usage: None,
                model: Some(model.to_string()),
            }),
            Err(message) => Err(anyhow::anyhow!("{}", message)),
        }
    }
}
