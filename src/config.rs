//! Loading agent configuration (prompts + session defaults) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `SessionDefaults` for the expected schema.
//! Every field is optional; missing ones fall back to the defaults below.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub session: SessionDefaults,
}

/// Knobs for new practice sessions.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
  /// Countdown length in seconds.
  pub deadline_secs: u32,
  /// Problems requested when the client does not say.
  pub default_count: usize,
  /// Upper bound on problems per session.
  pub max_count: usize,
  /// How long a finished session stays reviewable before it is evicted.
  pub retain_finished_secs: u64,
}

impl Default for SessionDefaults {
  fn default() -> Self {
    Self { deadline_secs: 900, default_count: 5, max_count: 20, retain_finished_secs: 3600 }
  }
}

/// Prompts sent to the model. Placeholders in `{braces}` are filled per call.
///
/// Generation templates: `{query}`, `{count}`, `{max_results}`, `{style}`, `{difficulty}`,
/// and `{start_at}` for continuations. Session templates: `{problem}`, `{clarification}`,
/// `{answer}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generate_system: String,
  pub generate_user_template: String,
  pub continue_user_template: String,
  pub hint_system: String,
  pub hint_user_template: String,
  pub solution_system: String,
  pub solution_user_template: String,
  pub full_solution_user_template: String,
  pub grade_system: String,
  pub grade_user_template: String,
  pub code_system: String,
  pub code_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generate_system: "You write practice problem sets. Every problem must be fully self-contained and end with a clear question or task. Output only the problem set.".into(),
      generate_user_template: "Write {count} {difficulty} {style}-style problems about: {query}.\nNever write more than {max_results} problems.\nPut the whole set between the lines <<<PROBLEMS>>> and <<<END>>>.\nNumber each problem as \"1.\", \"2.\", ...\nAfter each problem add one line \"Clarification: <the same problem restated in plain language>\".".into(),
      continue_user_template: "Continue an existing {difficulty} {style}-style problem set about: {query}.\nWrite {count} more problems, numbered starting at {start_at}. Never write more than {max_results} in total.\nPut them between the lines <<<PROBLEMS>>> and <<<END>>>.\nAfter each problem add one line \"Clarification: <the same problem restated in plain language>\".".into(),
      hint_system: "You are a patient coach. Give one short hint that points toward the key idea. Do NOT reveal the solution.".into(),
      hint_user_template: "Problem:\n{problem}\n\nPlain-language version:\n{clarification}\n\nGive one hint.".into(),
      solution_system: "You are an expert tutor. Write a clear, step-by-step solution.".into(),
      solution_user_template: "Problem:\n{problem}\n\nSolve it step by step.".into(),
      full_solution_user_template: "Continue the solution above from where it stops and complete it. Do not repeat the parts already written.".into(),
      grade_system: "You grade a learner's answer. Start your reply with \"Correct\" or \"Incorrect\", then explain briefly.".into(),
      grade_user_template: "Problem:\n{problem}\n\nLearner's answer:\n{answer}\n\nIs the answer correct?".into(),
      code_system: "You review code written for a programming problem. Trace it on a small example, report its output, and point out bugs.".into(),
      code_user_template: "Problem:\n{problem}\n\nCode:\n{answer}\n\nAnalyze this code.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "problemset_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "problemset_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "problemset_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_toml_gives_defaults() {
    let cfg = parse_agent_config("").unwrap();
    assert_eq!(cfg.session.deadline_secs, 900);
    assert_eq!(cfg.session.default_count, 5);
    assert_eq!(cfg.session.retain_finished_secs, 3600);
    assert!(cfg.prompts.generate_user_template.contains("<<<PROBLEMS>>>"));
  }

  #[test]
  fn partial_override_keeps_other_defaults() {
    let cfg = parse_agent_config(
      r#"
        [session]
        deadline_secs = 600
        retain_finished_secs = 120

        [prompts]
        hint_system = "Be brief."
      "#,
    )
    .unwrap();
    assert_eq!(cfg.session.deadline_secs, 600);
    assert_eq!(cfg.session.max_count, 20);
    assert_eq!(cfg.session.retain_finished_secs, 120);
    assert_eq!(cfg.prompts.hint_system, "Be brief.");
    assert_eq!(cfg.prompts.grade_system, Prompts::default().grade_system);
  }

  #[test]
  fn malformed_toml_is_an_error() {
    assert!(parse_agent_config("[session\ndeadline_secs = ").is_err());
  }
}
