//! Domain models: difficulty/style of a problem set, extracted problem items,
//! per-question grading records and the session-wide busy tag.

use serde::{Deserialize, Serialize};

/// Difficulty requested from the generator. Also drives scoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }
}

/// Flavour of problem set the generator is asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemStyle {
  /// Long-form proof/derivation problems.
  #[default]
  Olympiad,
  /// Short self-contained quiz questions.
  Quiz,
  /// Implementation tasks answered with code.
  Coding,
}

impl ProblemStyle {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProblemStyle::Olympiad => "olympiad",
      ProblemStyle::Quiz => "quiz",
      ProblemStyle::Coding => "coding",
    }
  }
}

/// One self-contained problem extracted from generated text.
/// Never patched after extraction; a new extraction replaces the list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemItem {
  /// Problem text. Carries `TRUNCATION_NOTICE` when `is_complete` is false.
  pub statement: String,
  /// Plain-language restatement, empty when the generator gave none.
  #[serde(default)]
  pub clarification: String,
  pub is_complete: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeStatus {
  Pending,
  Correct,
  Incorrect,
  Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grading {
  pub status: GradeStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub feedback: Option<String>,
}

impl Grading {
  pub fn pending() -> Self { Self { status: GradeStatus::Pending, feedback: None } }

  pub fn error(message: impl Into<String>) -> Self {
    Self { status: GradeStatus::Error, feedback: Some(message.into()) }
  }
}

/// Which AI-triggering action currently holds the session lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyAction {
  #[default]
  None,
  Hint,
  Solution,
  FullSolution,
  Grade,
  Run,
  /// Held by the external IDE-connection flow; the engine never issues a call under it.
  Connect,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
  #[default]
  Setup,
  Running,
  Finished,
}
