//! Acquiring a problem set: one generation call, extraction, and a single backfill
//! call when the first batch came up short.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::domain::{Difficulty, ProblemItem, ProblemStyle};
use crate::error::{AcquireError, ChatError};
use crate::extract::extract;

/// Upstream problem generator.
#[async_trait]
pub trait ProblemGenerator: Send + Sync {
  async fn generate(
    &self,
    query: &str,
    count: usize,
    max_results: usize,
    style: ProblemStyle,
    difficulty: Difficulty,
  ) -> Result<String, ChatError>;

  /// `start_at` is the 1-based position the new problems should be numbered from.
  async fn continue_generate(
    &self,
    query: &str,
    start_at: usize,
    count: usize,
    max_results: usize,
    style: ProblemStyle,
    difficulty: Difficulty,
  ) -> Result<String, ChatError>;
}

#[derive(Clone, Debug, Serialize)]
pub struct Acquisition {
  pub items: Vec<ProblemItem>,
  pub requested: usize,
  /// Items taken from the first batch.
  pub first_batch: usize,
  /// Items taken from the continuation batch.
  pub backfilled: usize,
}

impl Acquisition {
  pub fn complete_count(&self) -> usize {
    self.items.iter().filter(|i| i.is_complete).count()
  }
}

/// First starting position requested from the continuation call.
pub fn continuation_start(extracted: usize) -> usize {
  (extracted + 1).max(2)
}

#[derive(Clone)]
pub struct ProblemSource {
  generator: Arc<dyn ProblemGenerator>,
}

impl ProblemSource {
  pub fn new(generator: Arc<dyn ProblemGenerator>) -> Self {
    Self { generator }
  }

  /// Produce up to `requested` problems. Completeness ordering is per batch only:
  /// continuation items are appended after the whole first batch.
  #[instrument(target = "problems", level = "info", skip(self, query), fields(query_len = query.len()))]
  pub async fn acquire(
    &self,
    query: &str,
    requested: usize,
    difficulty: Difficulty,
    style: ProblemStyle,
  ) -> Result<Acquisition, AcquireError> {
    let raw = self
      .generator
      .generate(query, requested, requested, style, difficulty)
      .await
      .map_err(|e| {
        error!(target: "problems", error = %e, "Problem generation failed");
        AcquireError::Generation(e.to_string())
      })?;

    let first = extract(&raw);
    let extracted = first.len();
    info!(
      target: "problems",
      extracted,
      complete = first.complete_count(),
      strategy = ?first.trace.matched_strategy(),
      raw_len = raw.len(),
      "First batch extracted"
    );

    let mut items = first.items;
    let mut backfilled = 0;

    if extracted < requested {
      let missing = requested.saturating_sub(extracted);
      let start_at = continuation_start(extracted);
      warn!(target: "problems", extracted, requested, missing, start_at, "Short batch; requesting continuation");

      let more_raw = self
        .generator
        .continue_generate(query, start_at, missing, requested, style, difficulty)
        .await
        .map_err(|e| {
          error!(target: "problems", error = %e, "Continuation generation failed");
          AcquireError::Generation(e.to_string())
        })?;

      let more = extract(&more_raw);
      info!(target: "problems", extracted = more.len(), complete = more.complete_count(), "Continuation batch extracted");
      items.extend(more.items);
      backfilled = items.len().min(requested).saturating_sub(extracted);
    }

    items.truncate(requested);
    let first_batch = items.len() - backfilled;
    Ok(Acquisition { items, requested, first_batch, backfilled })
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::Mutex;

  pub(crate) fn numbered(start: usize, n: usize) -> String {
    let mut out = String::from("<<<PROBLEMS>>>\n");
    for i in start..start + n {
      out.push_str(&format!(
        "{i}. Let x be a positive integer with x > {i}. Determine the smallest such x for which x squared exceeds {i} hundred, and prove that it is minimal.\nClarification: Smallest x with x^2 > {i}00.\n"
      ));
    }
    out.push_str("<<<END>>>");
    out
  }

  #[derive(Debug, Clone, PartialEq)]
  pub(crate) enum Call {
    Generate { count: usize, max_results: usize },
    Continue { start_at: usize, count: usize, max_results: usize },
  }

  pub(crate) struct ScriptedGenerator {
    pub first: Result<String, String>,
    pub more: Result<String, String>,
    pub calls: Mutex<Vec<Call>>,
  }

  impl ScriptedGenerator {
    pub(crate) fn new(first: Result<String, String>, more: Result<String, String>) -> Self {
      Self { first, more, calls: Mutex::new(Vec::new()) }
    }

    fn calls(&self) -> Vec<Call> {
      self.calls.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl ProblemGenerator for ScriptedGenerator {
    async fn generate(
      &self,
      _query: &str,
      count: usize,
      max_results: usize,
      _style: ProblemStyle,
      _difficulty: Difficulty,
    ) -> Result<String, ChatError> {
      self.calls.lock().unwrap().push(Call::Generate { count, max_results });
      self.first.clone().map_err(ChatError::Other)
    }

    async fn continue_generate(
      &self,
      _query: &str,
      start_at: usize,
      count: usize,
      max_results: usize,
      _style: ProblemStyle,
      _difficulty: Difficulty,
    ) -> Result<String, ChatError> {
      self.calls.lock().unwrap().push(Call::Continue { start_at, count, max_results });
      self.more.clone().map_err(ChatError::Other)
    }
  }

  async fn run(g: Arc<ScriptedGenerator>, requested: usize) -> Result<Acquisition, AcquireError> {
    ProblemSource::new(g).acquire("number theory", requested, Difficulty::Medium, ProblemStyle::Olympiad).await
  }

  #[tokio::test]
  async fn full_first_batch_skips_continuation() {
    let g = Arc::new(ScriptedGenerator::new(Ok(numbered(1, 5)), Err("unused".into())));
    let acq = run(g.clone(), 5).await.unwrap();
    assert_eq!(acq.items.len(), 5);
    assert_eq!(acq.backfilled, 0);
    assert_eq!(g.calls(), vec![Call::Generate { count: 5, max_results: 5 }]);
  }

  #[tokio::test]
  async fn short_batch_is_backfilled_with_exact_count() {
    let g = Arc::new(ScriptedGenerator::new(Ok(numbered(1, 3)), Ok(numbered(4, 2))));
    let acq = run(g.clone(), 5).await.unwrap();
    assert_eq!(acq.items.len(), 5);
    assert_eq!(acq.first_batch, 3);
    assert_eq!(acq.backfilled, 2);
    assert_eq!(acq.complete_count(), 5);
    assert!(acq.items[3].statement.contains("x > 4"));
    assert_eq!(
      g.calls(),
      vec![
        Call::Generate { count: 5, max_results: 5 },
        Call::Continue { start_at: 4, count: 2, max_results: 5 },
      ]
    );
  }

  #[tokio::test]
  async fn short_continuation_returns_fewer() {
    let g = Arc::new(ScriptedGenerator::new(Ok(numbered(1, 3)), Ok(numbered(4, 1))));
    let acq = run(g, 5).await.unwrap();
    assert_eq!(acq.items.len(), 4);
    assert_eq!(acq.backfilled, 1);
  }

  #[tokio::test]
  async fn oversized_continuation_is_truncated() {
    let g = Arc::new(ScriptedGenerator::new(Ok(numbered(1, 2)), Ok(numbered(3, 6))));
    let acq = run(g, 4).await.unwrap();
    assert_eq!(acq.items.len(), 4);
    assert_eq!(acq.first_batch, 2);
    assert_eq!(acq.backfilled, 2);
  }

  #[tokio::test]
  async fn empty_first_batch_starts_continuation_at_two() {
    let g = Arc::new(ScriptedGenerator::new(Ok("   ".into()), Ok(numbered(2, 3))));
    let acq = run(g.clone(), 3).await.unwrap();
    assert_eq!(acq.items.len(), 3);
    assert_eq!(g.calls()[1], Call::Continue { start_at: 2, count: 3, max_results: 3 });
  }

  #[tokio::test]
  async fn ordering_is_not_reapplied_across_batches() {
    let first = format!("{}\n4. Clipped", numbered(1, 1).replace("<<<END>>>", ""));
    let g = Arc::new(ScriptedGenerator::new(Ok(first), Ok(numbered(3, 1))));
    let acq = run(g, 3).await.unwrap();
    let flags: Vec<bool> = acq.items.iter().map(|i| i.is_complete).collect();
    assert_eq!(flags, vec![true, false, true]);
  }

  #[tokio::test]
  async fn generation_failure_is_verbatim() {
    let g = Arc::new(ScriptedGenerator::new(Err("quota exceeded".into()), Ok(numbered(1, 5))));
    let err = run(g.clone(), 5).await.unwrap_err();
    assert_eq!(err.to_string(), "quota exceeded");
    assert!(matches!(err, AcquireError::Generation(_)));
    assert_eq!(g.calls().len(), 1);
  }

  #[tokio::test]
  async fn continuation_failure_is_a_generation_failure() {
    let g = Arc::new(ScriptedGenerator::new(Ok(numbered(1, 1)), Err("upstream down".into())));
    let err = run(g, 3).await.unwrap_err();
    assert_eq!(err.to_string(), "upstream down");
  }

  #[test]
  fn continuation_start_is_at_least_two() {
    assert_eq!(continuation_start(0), 2);
    assert_eq!(continuation_start(1), 2);
    assert_eq!(continuation_start(3), 4);
  }
}
