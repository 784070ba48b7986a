//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::UnknownSession(_) => StatusCode::NOT_FOUND,
      ApiError::NotRunning => StatusCode::CONFLICT,
      ApiError::Acquire(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

fn reply(r: Result<CommandReply, ApiError>) -> Response {
  match r {
    Ok(CommandReply::Session(s)) => Json(s).into_response(),
    Ok(CommandReply::Action(a)) => Json(a).into_response(),
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let sessions = state.sessions.read().await.len();
  Json(HealthOut { ok: true, ai_enabled: state.ai_enabled, sessions })
}

#[instrument(level = "info", skip(body), fields(text_len = body.text.len()))]
pub async fn http_post_extract(Json(body): Json<ExtractIn>) -> impl IntoResponse {
  Json(extract_text(&body.text))
}

#[instrument(level = "info", skip(state, body), fields(count = ?body.count, difficulty = ?body.difficulty, style = ?body.style))]
pub async fn http_post_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateSessionIn>,
) -> Response {
  match create_session(&state, body).await {
    Ok(created) => {
      info!(target: "session", id = %created.session_id, items = created.session.items().len(), "HTTP session created");
      Json(created).into_response()
    }
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  match get_session(&state, id).await {
    Ok(s) => Json(s).into_response(),
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_delete_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  match discard_session(&state, id).await {
    Ok(()) => StatusCode::NO_CONTENT.into_response(),
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip_all, fields(%id, answer_len = body.answer.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AnswerIn>,
) -> Response {
  reply(run_command(&state, id, SessionCommand::Answer(body.answer)).await)
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_post_advance(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  reply(run_command(&state, id, SessionCommand::Advance).await)
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_post_retreat(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  reply(run_command(&state, id, SessionCommand::Retreat).await)
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_post_finish(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  reply(run_command(&state, id, SessionCommand::Finish).await)
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_post_hint(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  reply(run_command(&state, id, SessionCommand::Hint).await)
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_post_solution(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  reply(run_command(&state, id, SessionCommand::Solution).await)
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_post_full_solution(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  reply(run_command(&state, id, SessionCommand::FullSolution).await)
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_post_check(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  reply(run_command(&state, id, SessionCommand::Check).await)
}

#[instrument(level = "info", skip_all, fields(%id))]
pub async fn http_post_run(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
  reply(run_command(&state, id, SessionCommand::Run).await)
}
