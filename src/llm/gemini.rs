//! Gemini API client (`generateContent` plus the Files API for large media).
//!
//! Requests are sent once. Failures are classified into [`LlmError`] and
//! returned to the caller without retrying.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::LlmError;
use super::{ChatMessage, ChatOptions, ChatResponse, ContentPart, LlmClient, Role, TokenUsage};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_UPLOAD_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta/files";

/// Largest media payload sent inline; bigger files go through the Files API.
pub const MAX_INLINE_BYTES: usize = 20 * 1024 * 1024;
const FILE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_FILE_POLLS: u32 = 150;

/// Gemini API client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    async fn execute_request(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/models/{}:generateContent", GEMINI_API_URL, model_path(model));
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network_error(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    LlmError::network_error(format!("Connection failed: {}", e))
                } else {
                    LlmError::network_error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        parse_response(&body, model)
    }

    /// Upload media through the resumable Files API and wait until it is usable.
    async fn upload_file(
        &self,
        mime_type: &str,
        data: Bytes,
        display_name: &str,
    ) -> Result<ContentPart, LlmError> {
        let start = Instant::now();
        let size = data.len();

        let response = self
            .client
            .post(GEMINI_UPLOAD_URL)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| LlmError::network_error(format!("File upload start failed: {}", e)))?;

        let status = response.status();
        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), body));
        }
        let upload_url = upload_url
            .ok_or_else(|| LlmError::parse_error("Missing x-goog-upload-url header"))?;

        let response = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(data)
            .send()
            .await
            .map_err(|e| LlmError::network_error(format!("File upload failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body));
        }
        let mut file = serde_json::from_str::<UploadResponse>(&body)
            .map_err(|e| LlmError::parse_error(format!("Failed to parse upload response: {}, body: {}", e, body)))?
            .file;

        let mut polls = 0;
        while file.state.as_deref() == Some("PROCESSING") {
            if polls >= MAX_FILE_POLLS {
                return Err(LlmError::network_error(format!(
                    "File {} still processing after {} polls",
                    file.name, polls
                )));
            }
            tokio::time::sleep(FILE_POLL_INTERVAL).await;
            polls += 1;
            file = self.get_file(&file.name).await?;
        }

        if file.state.as_deref() == Some("FAILED") {
            return Err(LlmError::parse_error(format!("File {} failed processing", file.name)));
        }

        tracing::info!(
            "Gemini - upload_file: {} ({} bytes) completed in {:.2}ms",
            display_name,
            size,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(ContentPart::FileUri {
            mime_type: file.mime_type.unwrap_or_else(|| mime_type.to_string()),
            uri: file.uri,
        })
    }

    async fn get_file(&self, name: &str) -> Result<FileResource, LlmError> {
        let response = self
            .client
            .get(format!("{}/{}", GEMINI_API_URL, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| LlmError::network_error(format!("File status request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body));
        }
        serde_json::from_str(&body)
            .map_err(|e| LlmError::parse_error(format!("Failed to parse file status: {}, body: {}", e, body)))
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
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
        let request = build_request(messages, &options);
        tracing::debug!("Sending request to Gemini: model={}", model);

        let start = Instant::now();
        match self.execute_request(model, &request).await {
            Ok(response) => {
                tracing::info!(
                    "Gemini - generate_content: {} completed in {:.2}ms",
                    model,
                    start.elapsed().as_secs_f64() * 1000.0
                );
                Ok(response)
            }
            Err(error) => {
                tracing::error!("Gemini request failed: {}", error);
                Err(error.into())
            }
        }
    }

    async fn attach_media(
        &self,
        mime_type: &str,
        data: Bytes,
        display_name: &str,
    ) -> anyhow::Result<ContentPart> {
        if data.len() <= MAX_INLINE_BYTES {
            return Ok(ContentPart::blob(mime_type, data));
        }
        self.upload_file(mime_type, data, display_name)
            .await
            .map_err(|e| {
                tracing::error!("Gemini file upload failed: {}", e);
                e.into()
            })
    }
}

/// Model id as it appears in the URL path (`models/` prefix optional in config).
fn model_path(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

/// Translate chat messages into a `generateContent` request.
///
/// System messages become the system instruction; assistant turns use the
/// `model` role.
fn build_request(messages: &[ChatMessage], options: &ChatOptions) -> GenerateContentRequest {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for message in messages {
        let parts = message.parts.iter().map(Part::from).collect::<Vec<_>>();
        match message.role {
            Role::System => system_parts.extend(parts),
            Role::User => contents.push(Content {
                role: Some("user".to_string()),
                parts,
            }),
            Role::Assistant => contents.push(Content {
                role: Some("model".to_string()),
                parts,
            }),
        }
    }

    let generation_config = if options.temperature.is_some()
        || options.top_p.is_some()
        || options.max_tokens.is_some()
    {
        Some(GenerationConfig {
            temperature: options.temperature,
            top_p: options.top_p,
            max_output_tokens: options.max_tokens,
        })
    } else {
        None
    };

    GenerateContentRequest {
        contents,
        system_instruction: if system_parts.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: system_parts,
            })
        },
        generation_config,
    }
}

fn parse_response(body: &str, model: &str) -> Result<ChatResponse, LlmError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
    })?;

    let candidate = match parsed.candidates.into_iter().next() {
        Some(c) => c,
        None => {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(LlmError::parse_error(format!("No candidates in response ({})", reason)));
        }
    };

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .filter(|t| !t.is_empty());

    Ok(ChatResponse {
        content: text,
        finish_reason: candidate.finish_reason,
        usage: parsed
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count)),
        model: parsed.model_version.or_else(|| Some(model.to_string())),
    })
}

/// Gemini API request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    /// Base64-encoded bytes.
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

impl From<&ContentPart> for Part {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Part::Text { text: text.clone() },
            ContentPart::Blob { mime_type, data } => Part::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(data),
                },
            },
            ContentPart::FileUri { mime_type, uri } => Part::FileData {
                file_data: FileData {
                    mime_type: mime_type.clone(),
                    file_uri: uri.clone(),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u64>,
}

/// Gemini API response format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    /// Set on reasoning parts from thinking models.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;

    #[test]
    fn test_build_request_splits_system_and_roles() {
        let messages = vec![
            ChatMessage::new(Role::System, "be terse"),
            ChatMessage::new(Role::User, "hi"),
            ChatMessage::new(Role::Assistant, "hello"),
            ChatMessage::with_parts(
                Role::User,
                vec![
                    ContentPart::text("what is this"),
                    ContentPart::blob("image/png", Bytes::from_static(b"abc")),
                    ContentPart::FileUri {
                        mime_type: "video/mp4".to_string(),
                        uri: "https://files.example/v1".to_string(),
                    },
                ],
            ),
        ];
        let request = build_request(&messages, &ChatOptions::deterministic());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be terse");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][2]["parts"][1]["inlineData"]["data"], "YWJj");
        assert_eq!(
            json["contents"][2]["parts"][2]["fileData"]["fileUri"],
            "https://files.example/v1"
        );
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
        assert!(json["generationConfig"].get("topP").is_none());
    }

    #[test]
    fn test_build_request_without_options_omits_config() {
        let request = build_request(&[ChatMessage::new(Role::User, "hi")], &ChatOptions::default());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("generationConfig").is_none());
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_response_joins_text_and_skips_thoughts() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "{\"task_name\": "},
                    {"text": "\"Login bug\"}"}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15},
            "modelVersion": "gemini-flash-001"
        }"#;
        let response = parse_response(body, "gemini-flash-latest").unwrap();
        assert_eq!(response.content.as_deref(), Some("{\"task_name\": \"Login bug\"}"));
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(response.usage.unwrap().total_tokens, 15);
        assert_eq!(response.model.as_deref(), Some("gemini-flash-001"));
    }

    #[test]
    fn test_parse_response_blocked_prompt() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let err = parse_response(body, "m").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ParseError);
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn test_parse_response_empty_text_is_none() {
        let body = r#"{"candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]}"#;
        let response = parse_response(body, "m").unwrap();
        assert!(response.content.is_none());
        assert_eq!(response.model.as_deref(), Some("m"));
    }

    #[test]
    fn test_model_path_strips_prefix() {
        assert_eq!(model_path("models/gemini-flash-latest"), "gemini-flash-latest");
        assert_eq!(model_path("gemini-flash-latest"), "gemini-flash-latest");
    }

    #[test]
    fn test_file_resource_parse() {
        let body = r#"{"file": {"name": "files/abc", "uri": "https://x/files/abc", "mimeType": "video/mp4", "state": "PROCESSING"}}"#;
        let parsed: UploadResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.file.name, "files/abc");
        assert_eq!(parsed.file.state.as_deref(), Some("PROCESSING"));
    }
}
