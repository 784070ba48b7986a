//! Turning free-form generator output into an ordered list of problems.
//!
//! Pipeline:
//! 1) Narrow the input to the `<<<PROBLEMS>>>` … `<<<END>>>` window when both sentinels exist.
//! 2) Try the block strategies in order (numbered, bulleted, paragraphs); first non-empty wins.
//! 3) Split each block on a `Clarification:` label.
//! 4) Classify completeness, tag incomplete statements, put complete items first.
//!
//! Everything here is pure. Each step records an `ExtractEvent` so callers (and tests)
//! can see which strategy fired without scraping logs.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::completeness::{is_complete, signals};
use crate::domain::ProblemItem;

pub const START_MARKER: &str = "<<<PROBLEMS>>>";
pub const END_MARKER: &str = "<<<END>>>";

/// Appended to statements classified incomplete. Consumers grep for this exact text,
/// so it must never change or be localized.
pub const TRUNCATION_NOTICE: &str = "[Note: this problem may be incomplete or truncated.]";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
  Numbered,
  Bulleted,
  Paragraphs,
}

type BlockFn = for<'a> fn(&'a str) -> Option<Vec<&'a str>>;

const STRATEGIES: [(Strategy, BlockFn); 3] = [
  (Strategy::Numbered, numbered_blocks),
  (Strategy::Bulleted, bulleted_blocks),
  (Strategy::Paragraphs, paragraph_blocks),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExtractEvent {
  /// Both sentinels found; only `[start, end)` of the input is parsed.
  MarkerWindow { start: usize, end: usize },
  /// A sentinel was present without its partner; the whole text is parsed.
  UnbalancedMarkers,
  StrategyTried { strategy: Strategy, blocks: usize },
  BlockDiscarded { strategy: Strategy, block: usize },
  StrategyMatched { strategy: Strategy, items: usize },
  Classified { index: usize, complete: bool, chars: usize, has_clarification: bool },
  NoItems,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExtractTrace {
  pub events: Vec<ExtractEvent>,
}

impl ExtractTrace {
  fn push(&mut self, ev: ExtractEvent) {
    debug!(target: "extract", event = ?ev, "extract step");
    self.events.push(ev);
  }

  pub fn matched_strategy(&self) -> Option<Strategy> {
    self.events.iter().find_map(|e| match e {
      ExtractEvent::StrategyMatched { strategy, .. } => Some(*strategy),
      _ => None,
    })
  }
}

/// Result of one extraction run. `items` are already ordered complete-first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
  pub items: Vec<ProblemItem>,
  pub trace: ExtractTrace,
}

impl Extraction {
  pub fn problems(&self) -> Vec<&str> {
    self.items.iter().map(|i| i.statement.as_str()).collect()
  }

  pub fn clarifications(&self) -> Vec<&str> {
    self.items.iter().map(|i| i.clarification.as_str()).collect()
  }

  pub fn complete_count(&self) -> usize {
    self.items.iter().filter(|i| i.is_complete).count()
  }

  pub fn len(&self) -> usize { self.items.len() }

  pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

fn numbered_marker() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  CELL.get_or_init(|| Regex::new(r"(?m)^[ \t]*(?:\*\*)?\d{1,3}[.)](?:\*\*)?\s+").unwrap_or_else(|e| panic!("{e}")))
}

fn bullet_marker() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  CELL.get_or_init(|| Regex::new(r"(?m)^[ \t]*[-*•][ \t]+").unwrap_or_else(|e| panic!("{e}")))
}

fn paragraph_break() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  CELL.get_or_init(|| Regex::new(r"\r?\n[ \t]*\r?\n\s*").unwrap_or_else(|e| panic!("{e}")))
}

fn clarification_label() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  CELL.get_or_init(|| Regex::new(r"(?i)\bclarification\s*:").unwrap_or_else(|e| panic!("{e}")))
}

fn problem_label() -> &'static Regex {
  static CELL: OnceLock<Regex> = OnceLock::new();
  CELL.get_or_init(|| {
    Regex::new(r"(?i)^(?:\*\*)?(?:problem|question)(?:[ \t]+\d{1,3})?[ \t]*[:.](?:\*\*)?\s*").unwrap_or_else(|e| panic!("{e}"))
  })
}

/// Blocks start right after each marker match and run to the next marker (or end of text).
fn blocks_after<'a>(re: &Regex, text: &'a str) -> Option<Vec<&'a str>> {
  let starts: Vec<(usize, usize)> = re.find_iter(text).map(|m| (m.start(), m.end())).collect();
  if starts.is_empty() {
    return None;
  }
  let blocks = starts
    .iter()
    .enumerate()
    .map(|(i, &(_, body_start))| {
      let body_end = starts.get(i + 1).map(|&(next, _)| next).unwrap_or(text.len());
      &text[body_start..body_end]
    })
    .collect();
  Some(blocks)
}

fn numbered_blocks(text: &str) -> Option<Vec<&str>> {
  blocks_after(numbered_marker(), text)
}

fn bulleted_blocks(text: &str) -> Option<Vec<&str>> {
  blocks_after(bullet_marker(), text)
}

fn paragraph_blocks(text: &str) -> Option<Vec<&str>> {
  let blocks: Vec<&str> = paragraph_break().split(text).collect();
  if blocks.iter().all(|b| b.trim().is_empty()) { None } else { Some(blocks) }
}

/// Either the marker interior or the whole input with stray sentinels removed.
fn payload_window(raw: &str, trace: &mut ExtractTrace) -> String {
  if let Some(start) = raw.find(START_MARKER) {
    let body_start = start + START_MARKER.len();
    if let Some(rel_end) = raw[body_start..].find(END_MARKER) {
      let body_end = body_start + rel_end;
      trace.push(ExtractEvent::MarkerWindow { start: body_start, end: body_end });
      return raw[body_start..body_end].to_string();
    }
  }
  if raw.contains(START_MARKER) || raw.contains(END_MARKER) {
    trace.push(ExtractEvent::UnbalancedMarkers);
    return raw.replace(START_MARKER, "").replace(END_MARKER, "");
  }
  raw.to_string()
}

/// Split a block into (problem, clarification). Either side is trimmed.
fn split_clarification(block: &str) -> (String, String) {
  let (problem, clarification) = match clarification_label().find(block) {
    Some(m) => (&block[..m.start()], block[m.end()..].trim()),
    None => (block, ""),
  };
  let problem = problem.trim();
  let problem = problem_label().replace(problem, "");
  (problem.trim().to_string(), clarification.to_string())
}

/// Extract problems and clarifications from raw generator output.
pub fn extract(raw: &str) -> Extraction {
  let mut trace = ExtractTrace::default();
  let text = payload_window(raw, &mut trace);

  let mut pairs: Vec<(String, String)> = Vec::new();
  for (strategy, blocks_fn) in STRATEGIES {
    let Some(blocks) = blocks_fn(&text) else {
      trace.push(ExtractEvent::StrategyTried { strategy, blocks: 0 });
      continue;
    };
    trace.push(ExtractEvent::StrategyTried { strategy, blocks: blocks.len() });

    for (i, block) in blocks.iter().enumerate() {
      let (problem, clarification) = split_clarification(block);
      if problem.is_empty() {
        trace.push(ExtractEvent::BlockDiscarded { strategy, block: i });
        continue;
      }
      pairs.push((problem, clarification));
    }

    if !pairs.is_empty() {
      trace.push(ExtractEvent::StrategyMatched { strategy, items: pairs.len() });
      break;
    }
  }

  if pairs.is_empty() {
    trace.push(ExtractEvent::NoItems);
    return Extraction { items: Vec::new(), trace };
  }

  let items: Vec<ProblemItem> = pairs
    .into_iter()
    .enumerate()
    .map(|(index, (problem, clarification))| {
      // A clarified statement may be shorter than the length floor, but it still has to
      // end like a sentence; a clipped one keeps its truncation notice.
      let has_clarification = !clarification.is_empty();
      let complete = is_complete(&problem) || (has_clarification && signals(&problem).proper_ending);
      trace.push(ExtractEvent::Classified {
        index,
        complete,
        chars: problem.chars().count(),
        has_clarification,
      });
      let statement = if complete { problem } else { format!("{problem}\n\n{TRUNCATION_NOTICE}") };
      ProblemItem { statement, clarification, is_complete: complete }
    })
    .collect();

  Extraction { items: complete_first(items), trace }
}

/// Stable partition: complete items first, extraction order kept inside each group.
pub fn complete_first(items: Vec<ProblemItem>) -> Vec<ProblemItem> {
  let (mut complete, incomplete): (Vec<_>, Vec<_>) = items.into_iter().partition(|i| i.is_complete);
  complete.extend(incomplete);
  complete
}
