//! Structured summary produced by the model for one evidence file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parsed model reply attached to a task at creation.
///
/// The workflow never inspects `fields`; they are carried verbatim into the
/// store and the output prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    pub summary: String,
    /// Category-specific extras (steps to reproduce, severity, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    /// True when the reply was not JSON and `summary` holds the raw text.
    #[serde(default)]
    pub raw: bool,
}

impl AnalysisResult {
    pub const UNTITLED: &'static str = "Untitled Task";

    /// Parse a model reply.
    ///
    /// Strips a surrounding Markdown code fence, then reads `task_name` and
    /// `summary` from a JSON object. Non-JSON replies are kept as raw text.
    /// Returns `None` for an empty reply.
    pub fn from_model_reply(reply: &str, filename: &str) -> Option<Self> {
        let text = strip_code_fence(reply);
        if text.is_empty() {
            return None;
        }

        let mut object = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Some(Self {
                    title: Self::UNTITLED.to_string(),
                    summary: reply.trim().to_string(),
                    fields: Map::new(),
                    raw: true,
                })
            }
        };

        let title = take_string(&mut object, "task_name")
            .unwrap_or_else(|| format!("Task from {}", filename));
        let summary =
            take_string(&mut object, "summary").unwrap_or_else(|| "No summary available".to_string());

        Some(Self {
            title,
            summary,
            fields: object,
            raw: false,
        })
    }

    /// Fields flattened to `key: value` lines for prompts.
    pub fn fields_as_text(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{}: {}", key, s),
                Value::Array(items) => format!(
                    "{}: {}",
                    key,
                    items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect::<Vec<_>>()
                        .join("; ")
                ),
                other => format!("{}: {}", key, other),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::String(_)) | Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and a trailing fence.
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json", "csv", "markdown", ...) on the fence line.
        text = match rest.find('\n') {
            Some(idx) if !rest[..idx].trim().contains(' ') => &rest[idx + 1..],
            _ => rest,
        };
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}
