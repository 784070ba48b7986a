//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Creating a session (acquire problems, start the clock)
//!   - Dispatching navigation, answer and AI commands to a live session
//!   - Running the extractor on arbitrary text

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::engine::ActionOutcome;
use crate::error::ApiError;
use crate::extract::extract;
use crate::protocol::{ActionOut, CreateSessionIn, ExtractOut, SessionCreatedOut, SessionOut};
use crate::state::AppState;

/// Everything a client can ask of a live session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
  Advance,
  Retreat,
  Finish,
  Answer(String),
  Hint,
  Solution,
  FullSolution,
  Check,
  Run,
}

impl SessionCommand {
  pub fn name(&self) -> &'static str {
    match self {
      SessionCommand::Advance => "advance",
      SessionCommand::Retreat => "retreat",
      SessionCommand::Finish => "finish",
      SessionCommand::Answer(_) => "answer",
      SessionCommand::Hint => "hint",
      SessionCommand::Solution => "solution",
      SessionCommand::FullSolution => "full_solution",
      SessionCommand::Check => "check",
      SessionCommand::Run => "run",
    }
  }
}

/// What a command produced: AI commands carry an outcome, the rest only a snapshot.
#[derive(Debug)]
pub enum CommandReply {
  Session(SessionOut),
  Action(ActionOut),
}

#[instrument(level = "info", skip(state, params), fields(query_len = params.query.len()))]
pub async fn create_session(state: &AppState, params: CreateSessionIn) -> Result<SessionCreatedOut, ApiError> {
  let req = state.session_request(params.query, params.count, params.difficulty, params.style, params.deadline_secs);
  match state.create_session(req).await {
    Ok((engine, acq)) => Ok(SessionCreatedOut::new(engine.id(), &acq, engine.snapshot())),
    Err(e) => {
      warn!(target: "problems", error = %e, "Session creation failed");
      Err(e.into())
    }
  }
}

#[instrument(level = "debug", skip_all, fields(%id))]
pub async fn get_session(state: &AppState, id: Uuid) -> Result<SessionOut, ApiError> {
  let engine = state.get_session(id).await.ok_or(ApiError::UnknownSession(id))?;
  Ok(SessionOut { session_id: id, session: engine.snapshot() })
}

/// Drop a session the learner navigated away from.
pub async fn discard_session(state: &AppState, id: Uuid) -> Result<(), ApiError> {
  if state.discard_session(id).await {
    info!(target: "session", session = %id, "Session discarded");
    Ok(())
  } else {
    Err(ApiError::UnknownSession(id))
  }
}

#[instrument(level = "info", skip_all, fields(%id, command = cmd.name()))]
pub async fn run_command(state: &AppState, id: Uuid, cmd: SessionCommand) -> Result<CommandReply, ApiError> {
  let engine = state.get_session(id).await.ok_or(ApiError::UnknownSession(id))?;
  let action = cmd.name();

  let outcome: ActionOutcome = match cmd {
    SessionCommand::Advance => {
      engine.advance();
      return Ok(CommandReply::Session(SessionOut { session_id: id, session: engine.snapshot() }));
    }
    SessionCommand::Retreat => {
      engine.retreat();
      return Ok(CommandReply::Session(SessionOut { session_id: id, session: engine.snapshot() }));
    }
    SessionCommand::Finish => {
      engine.finish();
      return Ok(CommandReply::Session(SessionOut { session_id: id, session: engine.snapshot() }));
    }
    SessionCommand::Answer(answer) => {
      if !engine.submit_answer(answer) {
        return Err(ApiError::NotRunning);
      }
      return Ok(CommandReply::Session(SessionOut { session_id: id, session: engine.snapshot() }));
    }
    SessionCommand::Hint => engine.request_hint().await,
    SessionCommand::Solution => engine.request_solution().await,
    SessionCommand::FullSolution => engine.request_full_solution().await,
    SessionCommand::Check => engine.check_answer().await,
    SessionCommand::Run => engine.run_code().await,
  };

  info!(target: "session", session = %id, action, ok = ?outcome.result().map(|r| r.ok), "Action handled");
  Ok(CommandReply::Action(ActionOut { session_id: id, action: action.to_string(), outcome, session: engine.snapshot() }))
}

#[instrument(level = "info", skip(text), fields(text_len = text.len()))]
pub fn extract_text(text: &str) -> ExtractOut {
  let ex = extract(text);
  info!(target: "extract", items = ex.len(), complete = ex.complete_count(), strategy = ?ex.trace.matched_strategy(), "Extraction served");
  ExtractOut::from(ex)
}
