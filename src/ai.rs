//! Collaborator seam for chat completions plus the uniform `{ok, content, error}`
//! result every AI-triggered session action reports upward.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: String,
  pub content: String,
}

impl ChatMessage {
  pub fn system(content: impl Into<String>) -> Self {
    Self { role: "system".into(), content: content.into() }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self { role: "user".into(), content: content.into() }
  }

  pub fn assistant(content: impl Into<String>) -> Self {
    Self { role: "assistant".into(), content: content.into() }
  }
}

/// Anything that can answer an ordered list of chat messages with text.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
  async fn chat_complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AiResult {
  pub ok: bool,
  pub content: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl AiResult {
  pub fn success(content: impl Into<String>) -> Self {
    Self { ok: true, content: content.into(), error: None }
  }

  pub fn failure(error: impl Into<String>) -> Self {
    Self { ok: false, content: String::new(), error: Some(error.into()) }
  }
}

impl From<&Result<String, ChatError>> for AiResult {
  fn from(r: &Result<String, ChatError>) -> Self {
    match r {
      Ok(text) => AiResult::success(text.clone()),
      Err(e) => AiResult::failure(e.to_string()),
    }
  }
}

/// Model access used when no API key is configured: every call fails with `Disabled`,
/// which sessions record as an ordinary per-question error.
pub struct OfflineChat;

#[async_trait]
impl ChatCompleter for OfflineChat {
  async fn chat_complete(&self, _messages: Vec<ChatMessage>) -> Result<String, ChatError> {
    Err(ChatError::Disabled)
  }
}
