//! Error types for the collaborator boundary.
//!
//! Neither type escapes a session: chat failures become `{status: error}` records,
//! generation failures become an error message on the session-creation response.

use thiserror::Error;
use uuid::Uuid;

/// Failure of a chat-completion or generation call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatError {
  #[error("model access is not configured (set OPENAI_API_KEY)")]
  Disabled,
  #[error("model returned an empty response")]
  EmptyResponse,
  /// Upstream rejected the request; carries the provider's message.
  #[error("OpenAI HTTP {status}: {message}")]
  Upstream { status: u16, message: String },
  #[error("transport error: {0}")]
  Transport(String),
  #[error("{0}")]
  Other(String),
}

impl From<reqwest::Error> for ChatError {
  fn from(e: reqwest::Error) -> Self {
    ChatError::Transport(e.to_string())
  }
}

/// Problem-set acquisition failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AcquireError {
  /// `generate` or `continue_generate` rejected. Message is the collaborator's, verbatim.
  #[error("{0}")]
  Generation(String),
  /// Every strategy came up empty, so there is nothing to practice.
  #[error("no problems could be extracted from the generated text")]
  Empty,
}

/// Session-level precondition failures (never raised by AI actions).
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
  #[error("a session needs at least one problem")]
  NoItems,
  #[error("session already started")]
  AlreadyStarted,
}

/// Failures surfaced to HTTP and WebSocket clients as `{error}` / `{type: "error"}`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
  #[error("Unknown sessionId: {0}")]
  UnknownSession(Uuid),
  #[error("session is not running")]
  NotRunning,
  /// Session creation failed; carries the acquisition error verbatim.
  #[error("{0}")]
  Acquire(String),
}

impl From<AcquireError> for ApiError {
  fn from(e: AcquireError) -> Self {
    ApiError::Acquire(e.to_string())
  }
}
