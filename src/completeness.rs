//! Heuristic classifier deciding whether a problem statement looks whole or
//! was clipped mid-sentence by the generator.
//!
//! A statement is complete when it has a basic "this ended properly" signal
//! and either a structural signal or enough length to stand on its own.

use std::sync::OnceLock;

use regex::Regex;

/// Statements shorter than this (trimmed, in chars) are always incomplete.
pub const MIN_COMPLETE_CHARS: usize = 100;
/// Above this length a statement needs no structural signal.
pub const LONG_ENOUGH_CHARS: usize = 200;
/// Above this length a statement counts as properly ended regardless of punctuation.
pub const VERY_LONG_CHARS: usize = 500;

/// Individual signals, kept around so extraction diagnostics can report them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Signals {
  pub proper_ending: bool,
  pub question_indicators: bool,
  pub math_pattern: bool,
  pub coding_pattern: bool,
  pub text_pattern: bool,
  pub multiple_sentences: bool,
  pub structure_pattern: bool,
  pub very_long: bool,
  pub chars: usize,
}

impl Signals {
  pub fn basic(&self) -> bool {
    self.proper_ending || self.question_indicators || self.very_long
  }

  pub fn advanced(&self) -> bool {
    self.math_pattern
      || self.coding_pattern
      || self.text_pattern
      || self.multiple_sentences
      || self.structure_pattern
  }

  pub fn complete(&self) -> bool {
    if self.chars < MIN_COMPLETE_CHARS {
      return false;
    }
    self.basic() && (self.advanced() || self.chars > LONG_ENOUGH_CHARS)
  }
}

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
  // Patterns are literals below; a failure here is a programming error caught by the tests.
  cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|e| panic!("bad pattern {pattern}: {e}")))
}

fn question_tail() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  re(
    &CELL,
    r"(?i)\b(find|prove|determine|calculate|show|solve|compute|evaluate|construct|demonstrate|what|how|why|which|when|where|explain|describe|analy[sz]e|compare|contrast)\b[^.!?]*[.!?]?\s*$",
  )
}

fn math_pattern() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  re(
    &CELL,
    r"(?is)\b(find|prove|determine|calculate|show|solve|compute|evaluate)\b.*\b(given|let|suppose|assume|if|when|where|such that|for all|there exists|for some)\b",
  )
}

fn coding_pattern() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  re(
    &CELL,
    r"(?is)\b(implement|write|create|design|develop|build|code|program)\b.*\b(function|class|method|algorithm|solution|approach)\b",
  )
}

fn text_pattern() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  re(
    &CELL,
    r"(?is)\b(analy[sz]e|discuss|explain|interpret|evaluate|examine|compare|contrast|summari[sz]e)\b.*\b(text|passage|article|excerpt|work|piece|document)\b",
  )
}

fn structure_pattern() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  re(
    &CELL,
    r"(?is)\b(problem|question|task|exercise)\b.*\b(solution|answer|approach|result)\b",
  )
}

/// Compute every signal for a statement.
pub fn signals(problem: &str) -> Signals {
  let text = problem.trim();
  let chars = text.chars().count();
  let terminals = text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();

  Signals {
    proper_ending: text.ends_with(['.', '!', '?']),
    question_indicators: question_tail().is_match(text),
    math_pattern: math_pattern().is_match(text),
    coding_pattern: coding_pattern().is_match(text),
    text_pattern: text_pattern().is_match(text),
    multiple_sentences: terminals >= 2,
    structure_pattern: structure_pattern().is_match(text),
    very_long: chars > VERY_LONG_CHARS,
    chars,
  }
}

/// True if the statement looks like a full, unclipped problem.
pub fn is_complete(problem: &str) -> bool {
  let trimmed = problem.trim();
  // Skip the regex work for the common short-fragment case.
  if trimmed.chars().count() < MIN_COMPLETE_CHARS {
    return false;
  }
  signals(trimmed).complete()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patterns_compile() {
    let _ = signals("Prove that the answer holds.");
  }

  #[test]
  fn ninety_nine_chars_is_incomplete() {
    let s = format!("{}.", "a".repeat(98));
    assert_eq!(s.chars().count(), 99);
    assert!(!is_complete(&s));
    assert!(!is_complete(&format!("   {s}   ")));
  }

  #[test]
  fn very_long_without_punctuation_is_complete() {
    let s = "a".repeat(501);
    assert!(is_complete(&s));
    let sig = signals(&s);
    assert!(sig.very_long);
    assert!(!sig.proper_ending);
  }

  #[test]
  fn medium_statement_needs_structural_signal() {
    // 100..=200 chars, ends with '.', single sentence, no domain pattern.
    let s = format!("The quick brown fox jumps over the lazy dog {}.", "again ".repeat(12));
    let n = s.chars().count();
    assert!(n >= 100 && n <= 200, "len {n}");
    assert!(!is_complete(&s));

    let with_math = format!("Let x be a real number such that x squared equals {}. Find x.", "two ".repeat(20));
    assert!(is_complete(&with_math));
  }

  #[test]
  fn clipped_statement_without_ending_is_incomplete() {
    let s = "Let ABC be a triangle with sides a, b, c and let the incircle touch BC at D. Suppose that the length of AD is equal to the";
    let sig = signals(s);
    assert!(!sig.proper_ending);
    assert!(!is_complete(s));
  }

  #[test]
  fn question_word_at_tail_counts_as_ending() {
    let s = "A bag contains 5 red balls and 7 blue balls; two balls are drawn at random without replacement, which colour is more likely to appear twice";
    let sig = signals(s);
    assert!(sig.question_indicators);
    assert!(sig.basic());
  }

  #[test]
  fn coding_task_is_complete() {
    let s = "Write a function that takes a list of integers and returns the length of the longest strictly increasing subsequence. Aim for an O(n log n) algorithm.";
    assert!(signals(s).coding_pattern);
    assert!(is_complete(s));
  }
}
