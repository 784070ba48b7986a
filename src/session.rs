//! Practice session state machine: `Setup → Running → Finished`.
//!
//! This type is synchronous and owns every piece of per-session bookkeeping.
//! The async side (`engine.rs`) only ever touches it through the guarded
//! transitions below, inside short critical sections.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::{BusyAction, Difficulty, GradeStatus, Grading, ProblemItem, ProblemStyle, SessionPhase};
use crate::error::SessionError;
use crate::scoring::{self, Verdict};

/// Proof that the caller holds the single-flight lock.
/// Only the matching ticket can release it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusyTicket {
  pub action: BusyAction,
  serial: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionState {
  difficulty: Difficulty,
  style: ProblemStyle,
  phase: SessionPhase,
  items: Vec<ProblemItem>,
  current_index: usize,
  answers: BTreeMap<usize, String>,
  hints: BTreeMap<usize, String>,
  solutions: BTreeMap<usize, String>,
  full_solutions: BTreeMap<usize, String>,
  code_outputs: BTreeMap<usize, String>,
  grading: BTreeMap<usize, Grading>,
  completed: BTreeSet<usize>,
  scores: BTreeMap<usize, u32>,
  total_score: u32,
  deadline_secs: u32,
  remaining_secs: u32,
  busy: BusyAction,
  #[serde(skip)]
  busy_serial: u64,
}

impl SessionState {
  pub fn new(difficulty: Difficulty, style: ProblemStyle, deadline_secs: u32) -> Self {
    Self {
      difficulty,
      style,
      phase: SessionPhase::Setup,
      items: Vec::new(),
      current_index: 0,
      answers: BTreeMap::new(),
      hints: BTreeMap::new(),
      solutions: BTreeMap::new(),
      full_solutions: BTreeMap::new(),
      code_outputs: BTreeMap::new(),
      grading: BTreeMap::new(),
      completed: BTreeSet::new(),
      scores: BTreeMap::new(),
      total_score: 0,
      deadline_secs,
      remaining_secs: deadline_secs,
      busy: BusyAction::None,
      busy_serial: 0,
    }
  }

  // --- transitions ---

  pub fn start(&mut self, items: Vec<ProblemItem>) -> Result<(), SessionError> {
    if self.phase != SessionPhase::Setup {
      return Err(SessionError::AlreadyStarted);
    }
    if items.is_empty() {
      return Err(SessionError::NoItems);
    }
    let fresh = Self::new(self.difficulty, self.style, self.deadline_secs);
    *self = Self { items, phase: SessionPhase::Running, ..fresh };
    Ok(())
  }

  pub fn advance(&mut self) {
    if !self.items.is_empty() {
      self.current_index = (self.current_index + 1).min(self.items.len() - 1);
    }
  }

  pub fn retreat(&mut self) {
    self.current_index = self.current_index.saturating_sub(1);
  }

  /// One second of countdown. Returns true when this tick ended the session.
  pub fn tick(&mut self) -> bool {
    if self.phase != SessionPhase::Running {
      return false;
    }
    self.remaining_secs = self.remaining_secs.saturating_sub(1);
    if self.remaining_secs == 0 {
      self.phase = SessionPhase::Finished;
      return true;
    }
    false
  }

  pub fn finish(&mut self) {
    if self.phase == SessionPhase::Running {
      self.phase = SessionPhase::Finished;
    }
  }

  /// Store the learner's answer for the current question. Ignored outside `Running`.
  pub fn submit_answer(&mut self, answer: impl Into<String>) -> bool {
    if self.phase != SessionPhase::Running {
      return false;
    }
    self.answers.insert(self.current_index, answer.into());
    true
  }

  // --- single-flight lock ---

  /// Take the session-wide lock for `action`. `None` when anything is already in flight
  /// or the session is not running.
  pub fn try_begin(&mut self, action: BusyAction) -> Option<BusyTicket> {
    if action == BusyAction::None || self.busy != BusyAction::None || self.phase != SessionPhase::Running {
      return None;
    }
    self.busy = action;
    self.busy_serial += 1;
    Some(BusyTicket { action, serial: self.busy_serial })
  }

  /// Release the lock if `ticket` still owns it.
  pub fn release(&mut self, ticket: BusyTicket) {
    if self.busy == ticket.action && self.busy_serial == ticket.serial {
      self.busy = BusyAction::None;
    }
  }

  // --- results written back by AI actions ---

  pub fn record_hint(&mut self, index: usize, text: impl Into<String>) {
    self.hints.insert(index, text.into());
  }

  pub fn record_solution(&mut self, index: usize, text: impl Into<String>) {
    self.solutions.insert(index, text.into());
  }

  pub fn record_full_solution(&mut self, index: usize, text: impl Into<String>) {
    self.full_solutions.insert(index, text.into());
  }

  pub fn record_code_output(&mut self, index: usize, text: impl Into<String>) {
    self.code_outputs.insert(index, text.into());
  }

  /// Record a grading status. `completed` and `scores` follow the status: an index
  /// is completed and scored exactly while its grading is `Correct`.
  pub fn set_grading(&mut self, index: usize, grading: Grading) {
    if grading.status == GradeStatus::Correct {
      let points = scoring::delta(Verdict::Correct, self.difficulty, index);
      if self.scores.insert(index, points).is_none() {
        self.total_score += points;
      }
      self.completed.insert(index);
    } else {
      if let Some(points) = self.scores.remove(&index) {
        self.total_score -= points;
      }
      self.completed.remove(&index);
    }
    self.grading.insert(index, grading);
  }

  /// Apply a grader reply. Re-grading a solved question as correct does not add its
  /// points twice; any other outcome takes them back.
  pub fn apply_verdict(&mut self, index: usize, reply: &str) -> Verdict {
    let verdict = Verdict::classify(reply);
    let status = match verdict {
      Verdict::Correct => GradeStatus::Correct,
      Verdict::Incorrect => GradeStatus::Incorrect,
    };
    self.set_grading(index, Grading { status, feedback: Some(reply.to_string()) });
    verdict
  }

  // --- accessors ---

  pub fn phase(&self) -> SessionPhase { self.phase }
  pub fn items(&self) -> &[ProblemItem] { &self.items }
  pub fn current_index(&self) -> usize { self.current_index }
  pub fn current_item(&self) -> Option<&ProblemItem> { self.items.get(self.current_index) }
  pub fn busy(&self) -> BusyAction { self.busy }
  pub fn remaining_secs(&self) -> u32 { self.remaining_secs }
  pub fn total_score(&self) -> u32 { self.total_score }
  pub fn answer(&self, index: usize) -> Option<&str> { self.answers.get(&index).map(String::as_str) }
  pub fn hint(&self, index: usize) -> Option<&str> { self.hints.get(&index).map(String::as_str) }
  pub fn solution(&self, index: usize) -> Option<&str> { self.solutions.get(&index).map(String::as_str) }
  pub fn full_solution(&self, index: usize) -> Option<&str> { self.full_solutions.get(&index).map(String::as_str) }
  pub fn code_output(&self, index: usize) -> Option<&str> { self.code_outputs.get(&index).map(String::as_str) }
  pub fn grading(&self, index: usize) -> Option<&Grading> { self.grading.get(&index) }
  pub fn score(&self, index: usize) -> Option<u32> { self.scores.get(&index).copied() }
  pub fn is_completed(&self, index: usize) -> bool { self.completed.contains(&index) }
  pub fn completed_count(&self) -> usize { self.completed.len() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(s: &str) -> ProblemItem {
    ProblemItem { statement: s.into(), clarification: String::new(), is_complete: true }
  }

  fn running(n: usize, deadline: u32) -> SessionState {
    let mut st = SessionState::new(Difficulty::Medium, ProblemStyle::Olympiad, deadline);
    st.start((0..n).map(|i| item(&format!("P{i}"))).collect()).unwrap();
    st
  }

  #[test]
  fn start_resets_and_runs() {
    let st = running(3, 900);
    assert_eq!(st.phase(), SessionPhase::Running);
    assert_eq!(st.current_index(), 0);
    assert_eq!(st.total_score(), 0);
    assert_eq!(st.remaining_secs(), 900);
    assert_eq!(st.busy(), BusyAction::None);
  }

  #[test]
  fn start_rejects_empty_and_restart() {
    let mut st = SessionState::new(Difficulty::Easy, ProblemStyle::Quiz, 60);
    assert_eq!(st.start(vec![]), Err(SessionError::NoItems));
    assert_eq!(st.phase(), SessionPhase::Setup);
    st.start(vec![item("a")]).unwrap();
    assert_eq!(st.start(vec![item("b")]), Err(SessionError::AlreadyStarted));
  }

  #[test]
  fn navigation_is_clamped() {
    let mut st = running(3, 900);
    st.retreat();
    assert_eq!(st.current_index(), 0);
    st.advance();
    st.advance();
    st.advance();
    assert_eq!(st.current_index(), 2);
    assert_eq!(st.phase(), SessionPhase::Running);
    st.retreat();
    assert_eq!(st.current_index(), 1);
  }

  #[test]
  fn deadline_finishes_on_last_tick() {
    let mut st = running(2, 900);
    for _ in 0..899 {
      assert!(!st.tick());
    }
    assert_eq!(st.phase(), SessionPhase::Running);
    assert!(st.tick());
    assert_eq!(st.phase(), SessionPhase::Finished);
    assert!(!st.tick());
    assert_eq!(st.remaining_secs(), 0);
  }

  #[test]
  fn finish_is_terminal() {
    let mut st = running(2, 900);
    st.finish();
    assert_eq!(st.phase(), SessionPhase::Finished);
    assert!(!st.submit_answer("late"));
    assert!(st.try_begin(BusyAction::Hint).is_none());
    let before = st.remaining_secs();
    st.tick();
    assert_eq!(st.remaining_secs(), before);
  }

  #[test]
  fn busy_lock_is_single_flight_and_ticketed() {
    let mut st = running(2, 900);
    let t = st.try_begin(BusyAction::Hint).unwrap();
    assert!(st.try_begin(BusyAction::Grade).is_none());
    assert_eq!(st.busy(), BusyAction::Hint);

    st.release(t);
    assert_eq!(st.busy(), BusyAction::None);

    let t2 = st.try_begin(BusyAction::Hint).unwrap();
    // A stale ticket must not free someone else's lock.
    st.release(t);
    assert_eq!(st.busy(), BusyAction::Hint);
    st.release(t2);
    assert_eq!(st.busy(), BusyAction::None);

    assert!(st.try_begin(BusyAction::None).is_none());
  }

  #[test]
  fn correct_verdict_scores_once() {
    let mut st = running(4, 900);
    st.advance();
    st.advance();
    st.advance();
    let idx = st.current_index();
    assert_eq!(st.apply_verdict(idx, "Correct!"), Verdict::Correct);
    assert_eq!(st.score(idx), Some(35));
    assert_eq!(st.total_score(), 35);
    assert!(st.is_completed(idx));

    st.apply_verdict(idx, "That is right.");
    assert_eq!(st.total_score(), 35);

    assert_eq!(st.apply_verdict(0, "Wrong answer"), Verdict::Incorrect);
    assert_eq!(st.grading(0).unwrap().status, GradeStatus::Incorrect);
    assert_eq!(st.total_score(), 35);
    assert_eq!(st.completed_count(), 1);
  }

  #[test]
  fn regrade_to_incorrect_takes_points_back() {
    let mut st = running(3, 900);
    st.apply_verdict(0, "Correct.");
    st.apply_verdict(1, "Correct.");
    assert_eq!(st.total_score(), 45);

    assert_eq!(st.apply_verdict(0, "Incorrect, step 2 is wrong."), Verdict::Incorrect);
    assert_eq!(st.grading(0).unwrap().status, GradeStatus::Incorrect);
    assert!(!st.is_completed(0));
    assert_eq!(st.score(0), None);
    assert_eq!(st.total_score(), 25);
    assert!(st.is_completed(1));
  }

  #[test]
  fn pending_or_failed_regrade_clears_completion() {
    let mut st = running(2, 900);
    st.apply_verdict(1, "Right.");
    st.set_grading(1, Grading::pending());
    assert!(!st.is_completed(1));
    assert_eq!(st.total_score(), 0);

    st.apply_verdict(1, "Correct again.");
    assert_eq!(st.total_score(), 25);
    st.set_grading(1, Grading::error("rate limited"));
    assert!(!st.is_completed(1));
    assert_eq!(st.score(1), None);
    assert_eq!(st.total_score(), 0);
  }

  #[test]
  fn connect_tag_holds_the_session_lock() {
    let mut st = running(1, 900);
    let t = st.try_begin(BusyAction::Connect).unwrap();
    assert!(st.try_begin(BusyAction::Hint).is_none());
    st.release(t);
    assert!(st.try_begin(BusyAction::Hint).is_some());
  }
}
