//! Async side of a practice session: AI-triggered actions under the session-wide
//! single-flight lock, plus the timer and navigation entry points.
//!
//! The state mutex is never held across `.await`. Each action takes the lock in one
//! critical section (check + set), calls the model with the mutex released, then
//! writes the result back. The lock is released by a drop guard, so a failed,
//! panicking, or cancelled call can never leave the session stuck.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::ai::{AiResult, ChatCompleter, ChatMessage};
use crate::config::Prompts;
use crate::domain::{BusyAction, Grading, ProblemItem, SessionPhase};
use crate::error::{ChatError, SessionError};
use crate::session::{BusyTicket, SessionState};
use crate::util::{fill_template, trunc_for_log};

pub const MISSING_ANSWER: &str = "missing answer";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  /// Another AI action is in flight.
  Busy,
  /// Session is not running.
  NotRunning,
  /// Full solution asked for before any solution exists.
  NoSolution,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
  /// Nothing happened; state is unchanged.
  Skipped { reason: SkipReason },
  Completed { result: AiResult },
}

impl ActionOutcome {
  fn skipped(reason: SkipReason) -> Self { ActionOutcome::Skipped { reason } }
  fn completed(result: AiResult) -> Self { ActionOutcome::Completed { result } }

  pub fn result(&self) -> Option<&AiResult> {
    match self {
      ActionOutcome::Completed { result } => Some(result),
      ActionOutcome::Skipped { .. } => None,
    }
  }
}

/// Releases the busy lock when dropped.
struct BusyGuard<'a> {
  engine: &'a SessionEngine,
  ticket: BusyTicket,
}

impl Drop for BusyGuard<'_> {
  fn drop(&mut self) {
    self.engine.lock().release(self.ticket);
    debug!(target: "session", session = %self.engine.id, action = ?self.ticket.action, "busy lock released");
  }
}

/// What an action needs from the state, copied out before the model call.
struct Claim<'a> {
  guard: BusyGuard<'a>,
  index: usize,
  item: ProblemItem,
}

pub struct SessionEngine {
  id: Uuid,
  state: Mutex<SessionState>,
  chat: Arc<dyn ChatCompleter>,
  prompts: Arc<Prompts>,
}

impl SessionEngine {
  pub fn new(state: SessionState, chat: Arc<dyn ChatCompleter>, prompts: Arc<Prompts>) -> Self {
    Self { id: Uuid::new_v4(), state: Mutex::new(state), chat, prompts }
  }

  pub fn id(&self) -> Uuid { self.id }

  fn lock(&self) -> MutexGuard<'_, SessionState> {
    // State stays consistent across a panic (every write is a single map insert).
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Copy of the whole session, for rendering.
  pub fn snapshot(&self) -> SessionState {
    self.lock().clone()
  }

  // --- transitions ---

  #[instrument(target = "session", level = "info", skip(self, items), fields(session = %self.id, items = items.len()))]
  pub fn start(&self, items: Vec<ProblemItem>) -> Result<(), SessionError> {
    let mut st = self.lock();
    st.start(items)?;
    info!(target: "session", session = %self.id, deadline = st.remaining_secs(), "Session running");
    Ok(())
  }

  pub fn advance(&self) -> usize {
    let mut st = self.lock();
    st.advance();
    st.current_index()
  }

  pub fn retreat(&self) -> usize {
    let mut st = self.lock();
    st.retreat();
    st.current_index()
  }

  pub fn finish(&self) {
    let mut st = self.lock();
    st.finish();
    info!(target: "session", session = %self.id, total_score = st.total_score(), completed = st.completed_count(), "Session finished by learner");
  }

  /// Returns true when this tick ran the clock out.
  pub fn tick(&self) -> bool {
    let mut st = self.lock();
    let expired = st.tick();
    if expired {
      info!(target: "session", session = %self.id, total_score = st.total_score(), busy = ?st.busy(), "Deadline reached; session finished");
    }
    expired
  }

  pub fn phase(&self) -> SessionPhase {
    self.lock().phase()
  }

  pub fn submit_answer(&self, answer: impl Into<String>) -> bool {
    self.lock().submit_answer(answer)
  }

  // --- AI actions ---

  /// Busy first, so a second action while one is in flight is always a plain no-op.
  fn precheck(st: &SessionState) -> Option<SkipReason> {
    if st.busy() != BusyAction::None {
      Some(SkipReason::Busy)
    } else if st.phase() != SessionPhase::Running {
      Some(SkipReason::NotRunning)
    } else {
      None
    }
  }

  /// Must be the last fallible step while `st` is held: the returned guard locks the
  /// state again when dropped.
  fn claim(&self, st: &mut SessionState, action: BusyAction) -> Result<Claim<'_>, SkipReason> {
    if let Some(reason) = Self::precheck(st) {
      return Err(reason);
    }
    let index = st.current_index();
    let item = st.current_item().cloned().ok_or(SkipReason::NotRunning)?;
    let ticket = st.try_begin(action).ok_or(SkipReason::Busy)?;
    Ok(Claim { guard: BusyGuard { engine: self, ticket }, index, item })
  }

  async fn call(&self, action: BusyAction, index: usize, messages: Vec<ChatMessage>) -> Result<String, ChatError> {
    let res = self.chat.chat_complete(messages).await;
    match &res {
      Ok(text) => debug!(target: "session", session = %self.id, ?action, index, reply = %trunc_for_log(text, 120), "AI reply"),
      Err(e) => warn!(target: "session", session = %self.id, ?action, index, error = %e, "AI call failed"),
    }
    res
  }

  #[instrument(target = "session", level = "info", skip(self), fields(session = %self.id))]
  pub async fn request_hint(&self) -> ActionOutcome {
    let claim = match self.claim(&mut self.lock(), BusyAction::Hint) {
      Ok(c) => c,
      Err(reason) => return ActionOutcome::skipped(reason),
    };
    let messages = vec![
      ChatMessage::system(&self.prompts.hint_system),
      ChatMessage::user(fill_template(
        &self.prompts.hint_user_template,
        &[("problem", claim.item.statement.as_str()), ("clarification", claim.item.clarification.as_str())],
      )),
    ];
    let res = self.call(BusyAction::Hint, claim.index, messages).await;
    if let Ok(text) = &res {
      self.lock().record_hint(claim.index, text.clone());
    }
    drop(claim.guard);
    ActionOutcome::completed(AiResult::from(&res))
  }

  #[instrument(target = "session", level = "info", skip(self), fields(session = %self.id))]
  pub async fn request_solution(&self) -> ActionOutcome {
    let claim = match self.claim(&mut self.lock(), BusyAction::Solution) {
      Ok(c) => c,
      Err(reason) => return ActionOutcome::skipped(reason),
    };
    let messages = vec![
      ChatMessage::system(&self.prompts.solution_system),
      ChatMessage::user(fill_template(
        &self.prompts.solution_user_template,
        &[("problem", claim.item.statement.as_str()), ("clarification", claim.item.clarification.as_str())],
      )),
    ];
    let res = self.call(BusyAction::Solution, claim.index, messages).await;
    if let Ok(text) = &res {
      self.lock().record_solution(claim.index, text.clone());
    }
    drop(claim.guard);
    ActionOutcome::completed(AiResult::from(&res))
  }

  /// Ask the model to finish the existing solution. The partial text goes back in as the
  /// assistant's own turn so the model continues it instead of starting over.
  #[instrument(target = "session", level = "info", skip(self), fields(session = %self.id))]
  pub async fn request_full_solution(&self) -> ActionOutcome {
    let (claim, existing) = {
      let mut st = self.lock();
      if let Some(reason) = Self::precheck(&st) {
        return ActionOutcome::skipped(reason);
      }
      let Some(existing) = st.solution(st.current_index()).map(str::to_string) else {
        return ActionOutcome::skipped(SkipReason::NoSolution);
      };
      let claim = match self.claim(&mut st, BusyAction::FullSolution) {
        Ok(c) => c,
        Err(reason) => return ActionOutcome::skipped(reason),
      };
      (claim, existing)
    };
    let messages = vec![
      ChatMessage::system(&self.prompts.solution_system),
      ChatMessage::user(fill_template(
        &self.prompts.solution_user_template,
        &[("problem", claim.item.statement.as_str()), ("clarification", claim.item.clarification.as_str())],
      )),
      ChatMessage::assistant(existing),
      ChatMessage::user(&self.prompts.full_solution_user_template),
    ];
    let res = self.call(BusyAction::FullSolution, claim.index, messages).await;
    if let Ok(text) = &res {
      self.lock().record_full_solution(claim.index, text.clone());
    }
    drop(claim.guard);
    ActionOutcome::completed(AiResult::from(&res))
  }

  /// Grade the stored answer for the current question.
  #[instrument(target = "session", level = "info", skip(self), fields(session = %self.id))]
  pub async fn check_answer(&self) -> ActionOutcome {
    let (claim, answer) = {
      let mut st = self.lock();
      if let Some(reason) = Self::precheck(&st) {
        return ActionOutcome::skipped(reason);
      }
      let index = st.current_index();
      let answer = st.answer(index).map(str::trim).unwrap_or_default().to_string();
      if answer.is_empty() {
        st.set_grading(index, Grading::error(MISSING_ANSWER));
        return ActionOutcome::completed(AiResult::failure(MISSING_ANSWER));
      }
      let claim = match self.claim(&mut st, BusyAction::Grade) {
        Ok(c) => c,
        Err(reason) => return ActionOutcome::skipped(reason),
      };
      st.set_grading(index, Grading::pending());
      (claim, answer)
    };

    let messages = vec![
      ChatMessage::system(&self.prompts.grade_system),
      ChatMessage::user(fill_template(
        &self.prompts.grade_user_template,
        &[("problem", claim.item.statement.as_str()), ("clarification", claim.item.clarification.as_str()), ("answer", answer.as_str())],
      )),
    ];
    let res = self.call(BusyAction::Grade, claim.index, messages).await;
    {
      let mut st = self.lock();
      match &res {
        Ok(reply) => {
          let verdict = st.apply_verdict(claim.index, reply);
          info!(target: "session", session = %self.id, index = claim.index, ?verdict, total_score = st.total_score(), "Answer graded");
        }
        Err(e) => st.set_grading(claim.index, Grading::error(e.to_string())),
      }
    }
    drop(claim.guard);
    ActionOutcome::completed(AiResult::from(&res))
  }

  /// Have the model trace and review the code stored as the current answer.
  #[instrument(target = "session", level = "info", skip(self), fields(session = %self.id))]
  pub async fn run_code(&self) -> ActionOutcome {
    let (claim, code) = {
      let mut st = self.lock();
      if let Some(reason) = Self::precheck(&st) {
        return ActionOutcome::skipped(reason);
      }
      let code = st.answer(st.current_index()).map(str::trim).unwrap_or_default().to_string();
      if code.is_empty() {
        return ActionOutcome::completed(AiResult::failure(MISSING_ANSWER));
      }
      let claim = match self.claim(&mut st, BusyAction::Run) {
        Ok(c) => c,
        Err(reason) => return ActionOutcome::skipped(reason),
      };
      (claim, code)
    };
    let messages = vec![
      ChatMessage::system(&self.prompts.code_system),
      ChatMessage::user(fill_template(
        &self.prompts.code_user_template,
        &[("problem", claim.item.statement.as_str()), ("clarification", claim.item.clarification.as_str()), ("answer", code.as_str())],
      )),
    ];
    let res = self.call(BusyAction::Run, claim.index, messages).await;
    if let Ok(text) = &res {
      self.lock().record_code_output(claim.index, text.clone());
    }
    drop(claim.guard);
    ActionOutcome::completed(AiResult::from(&res))
  }
}
