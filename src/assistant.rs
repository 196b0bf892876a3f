//! Chat assistant that answers questions about the board.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{ChatMessage, Role, SharedLlmClient};
use crate::tracker::Board;

/// Longest summary excerpt per task in the board summary.
const SUMMARY_EXCERPT_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("assistant request failed: {0}")]
    Model(#[source] anyhow::Error),

    #[error("assistant returned an empty reply")]
    EmptyReply,
}

/// One previous turn of the conversation, as the client sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatTurnRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatTurnRole {
    User,
    Assistant,
}

pub struct BoardAssistant {
    llm: SharedLlmClient,
    model: String,
}

impl BoardAssistant {
    pub fn new(llm: SharedLlmClient, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Answer `message` with the board as context. One model call.
    pub async fn ask(
        &self,
        board: &Board,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String, AssistantError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AssistantError::EmptyMessage);
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new(Role::System, system_prompt(board)));
        for turn in history.iter().filter(|t| !t.content.trim().is_empty()) {
            let role = match turn.role {
                ChatTurnRole::User => Role::User,
                ChatTurnRole::Assistant => Role::Assistant,
            };
            messages.push(ChatMessage::new(role, turn.content.clone()));
        }
        messages.push(ChatMessage::new(Role::User, message));

        let response = self
            .llm
            .chat_completion(&self.model, &messages)
            .await
            .map_err(AssistantError::Model)?;

        response
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AssistantError::EmptyReply)
    }
}

/// Counts per status and one line per task.
pub fn board_summary(board: &Board) -> String {
    let mut out = format!("There are {} tasks in total.\n", board.total);
    for column in &board.columns {
        out.push_str(&format!("\n{}: {} tasks\n", column.status, column.count));
        for task in &column.tasks {
            out.push_str(&format!(
                "  - {} [{}]: {}\n",
                task.title(),
                task.evidence().category(),
                excerpt(task.description(), SUMMARY_EXCERPT_CHARS)
            ));
        }
    }
    out
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn system_prompt(board: &Board) -> String {
    format!(
        "You are the assistant of a sprint task board. Tasks are created from uploaded evidence \
         (screen recordings, PDFs, spreadsheets, screenshots) and move through five stages: \
         In Review -> Passed In Review -> In Stage -> Passed In Stage -> Done.\n\n\
         Current board:\n{}\n\
         Answer from this context. Be helpful, concise and actionable.",
        board_summary(board)
    )
}
