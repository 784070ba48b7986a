//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and always request plain text: problem sets are parsed
//! by `extract`, grading replies by the keyword verdict.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::ai::{ChatCompleter, ChatMessage};
use crate::config::Prompts;
use crate::domain::{Difficulty, ProblemStyle};
use crate::error::ChatError;
use crate::source::ProblemGenerator;
use crate::util::fill_template;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  /// Hints, solutions, grading, code review.
  pub fast_model: String,
  /// Problem-set generation.
  pub strong_model: String,
  pub prompts: Arc<Prompts>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Arc<Prompts>) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    if api_key.trim().is_empty() {
      return None;
    }
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    // Long problem sets take a while to stream out of the strong model.
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(90))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model, prompts })
  }

  /// Plain-text chat completion over an arbitrary message list.
  #[instrument(level = "info", skip(self, messages), fields(model = %model, messages = messages.len()))]
  async fn chat_plain(
    &self,
    model: &str,
    messages: Vec<ChatMessage>,
    temperature: f32,
  ) -> Result<String, ChatError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages,
      temperature,
      max_tokens: None,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "problemset-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      error!(status = status.as_u16(), elapsed = ?start.elapsed(), "OpenAI request rejected");
      return Err(ChatError::Upstream { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default().trim().to_string();

    info!(elapsed = ?start.elapsed(), reply_len = text.len(), "Model response received");
    if text.is_empty() {
      return Err(ChatError::EmptyResponse);
    }
    Ok(text)
  }

  fn generation_messages(&self, user: String) -> Vec<ChatMessage> {
    vec![ChatMessage::system(&self.prompts.generate_system), ChatMessage::user(user)]
  }
}

#[async_trait]
impl ChatCompleter for OpenAI {
  async fn chat_complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatError> {
    self.chat_plain(&self.fast_model, messages, 0.2).await
  }
}

#[async_trait]
impl ProblemGenerator for OpenAI {
  #[instrument(level = "info", skip(self, query), fields(model = %self.strong_model, query_len = query.len()))]
  async fn generate(
    &self,
    query: &str,
    count: usize,
    max_results: usize,
    style: ProblemStyle,
    difficulty: Difficulty,
  ) -> Result<String, ChatError> {
    let (count, max_results) = (count.to_string(), max_results.to_string());
    let user = fill_template(
      &self.prompts.generate_user_template,
      &[
        ("query", query),
        ("count", count.as_str()),
        ("max_results", max_results.as_str()),
        ("style", style.as_str()),
        ("difficulty", difficulty.as_str()),
      ],
    );
    self.chat_plain(&self.strong_model, self.generation_messages(user), 0.8).await
  }

  #[instrument(level = "info", skip(self, query), fields(model = %self.strong_model, query_len = query.len()))]
  async fn continue_generate(
    &self,
    query: &str,
    start_at: usize,
    count: usize,
    max_results: usize,
    style: ProblemStyle,
    difficulty: Difficulty,
  ) -> Result<String, ChatError> {
    let (start_at, count, max_results) = (start_at.to_string(), count.to_string(), max_results.to_string());
    let user = fill_template(
      &self.prompts.continue_user_template,
      &[
        ("query", query),
        ("start_at", start_at.as_str()),
        ("count", count.as_str()),
        ("max_results", max_results.as_str()),
        ("style", style.as_str()),
        ("difficulty", difficulty.as_str()),
      ],
    );
    self.chat_plain(&self.strong_model, self.generation_messages(user), 0.8).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessage>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn openai_error_message_is_extracted() {
    let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("You exceeded your current quota"));
    assert_eq!(extract_openai_error("<html>bad gateway</html>"), None);
  }

  #[test]
  fn upstream_error_formats_like_the_transport() {
    let e = ChatError::Upstream { status: 429, message: "slow down".into() };
    assert_eq!(e.to_string(), "OpenAI HTTP 429: slow down");
  }

  #[test]
  fn request_serializes_messages_in_order() {
    let req = ChatCompletionRequest {
      model: "m".into(),
      messages: vec![ChatMessage::system("s"), ChatMessage::user("u"), ChatMessage::assistant("a")],
      temperature: 0.2,
      max_tokens: None,
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["messages"][0]["role"], "system");
    assert_eq!(v["messages"][2]["content"], "a");
    assert!(v.get("max_tokens").is_none());
  }

  #[test]
  fn response_without_content_parses() {
    let body: ChatCompletionResponse =
      serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
    assert!(body.choices[0].message.content.is_none());
    assert!(body.usage.is_none());
  }
}
