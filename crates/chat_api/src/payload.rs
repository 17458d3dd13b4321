use serde::{Deserialize, Serialize};
use serde_json::Value;
use transcript_store::{Transcript, Turn};

use crate::error::ChatApiError;

/// One `{role, content}` entry of the `messages` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role().as_str().to_owned(),
            content: turn.content().to_owned(),
        }
    }
}

/// Request body for the chat-completions endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }

    /// Snapshot of the whole window, oldest turn first.
    pub fn from_transcript(model: impl Into<String>, transcript: &Transcript) -> Self {
        Self::new(model, transcript.iter().map(ChatMessage::from).collect())
    }
}

/// Extracts `choices[0].message.content` from a success body.
///
/// A missing or non-string content yields an empty reply; a body that is not
/// JSON at all is an error.
pub fn completion_content(body: &str) -> Result<String, ChatApiError> {
    let value = serde_json::from_str::<Value>(body)
        .map_err(|error| ChatApiError::MalformedResponse(error.to_string()))?;

    Ok(value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned())
}
