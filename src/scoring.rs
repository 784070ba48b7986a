//! Scoring policy and the keyword verdict read from the grader's reply.

use serde::{Deserialize, Serialize};

use crate::domain::Difficulty;

/// Later questions are worth more at the same difficulty.
pub const POINTS_PER_POSITION: u32 = 5;

const POSITIVE_TERMS: [&str; 3] = ["correct", "right", "accurate"];
const NEGATIVE_TERMS: [&str; 3] = ["incorrect", "wrong", "error"];

pub fn base_points(difficulty: Difficulty) -> u32 {
  match difficulty {
    Difficulty::Easy => 10,
    Difficulty::Medium => 20,
    Difficulty::Hard => 30,
  }
}

/// Points awarded for solving question `index` (0-based) of a session.
pub fn points(difficulty: Difficulty, index: usize) -> u32 {
  let position = u32::try_from(index).unwrap_or(u32::MAX / POINTS_PER_POSITION);
  base_points(difficulty).saturating_add(position.saturating_mul(POINTS_PER_POSITION))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  Correct,
  Incorrect,
}

impl Verdict {
  /// Keyword reading of a free-text grading reply. Any negative term vetoes a positive one,
  /// so "incorrect" never reads as "correct".
  pub fn classify(reply: &str) -> Self {
    let lower = reply.to_lowercase();
    let positive = POSITIVE_TERMS.iter().any(|t| lower.contains(t));
    let negative = NEGATIVE_TERMS.iter().any(|t| lower.contains(t));
    if positive && !negative { Verdict::Correct } else { Verdict::Incorrect }
  }
}

/// Score change for a graded answer.
pub fn delta(verdict: Verdict, difficulty: Difficulty, index: usize) -> u32 {
  match verdict {
    Verdict::Correct => points(difficulty, index),
    Verdict::Incorrect => 0,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn points_grow_with_position() {
    assert_eq!(points(Difficulty::Medium, 0), 20);
    assert_eq!(points(Difficulty::Medium, 3), 35);
    assert_eq!(points(Difficulty::Hard, 2), 40);
    assert_eq!(points(Difficulty::Easy, 0), 10);
    assert!(points(Difficulty::Easy, 4) > points(Difficulty::Easy, 3));
  }

  #[test]
  fn points_saturate_instead_of_overflowing() {
    assert_eq!(points(Difficulty::Hard, usize::MAX), u32::MAX);
  }

  #[test]
  fn verdict_keywords() {
    assert_eq!(Verdict::classify("That's correct, well done"), Verdict::Correct);
    assert_eq!(Verdict::classify("This is incorrect because..."), Verdict::Incorrect);
    assert_eq!(Verdict::classify("Mostly correct but step 3 is wrong"), Verdict::Incorrect);
    assert_eq!(Verdict::classify("You got it RIGHT."), Verdict::Correct);
    assert_eq!(Verdict::classify("Please try again."), Verdict::Incorrect);
    assert_eq!(Verdict::classify(""), Verdict::Incorrect);
  }

  #[test]
  fn delta_only_rewards_correct() {
    assert_eq!(delta(Verdict::Correct, Difficulty::Medium, 1), 25);
    assert_eq!(delta(Verdict::Incorrect, Difficulty::Hard, 5), 0);
  }
}
