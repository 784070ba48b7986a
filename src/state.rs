//! Application state: the session registry, collaborators, prompts and defaults.
//!
//! This module owns:
//!   - live practice sessions (by id), each with its own deadline ticker task
//!   - the problem source (OpenAI generator, or the built-in seed bank)
//!   - the chat collaborator used by session actions
//!   - prompts and session defaults (from TOML or defaults)

use std::{collections::HashMap, sync::{Arc, Weak}, time::Duration};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::ai::{ChatCompleter, OfflineChat};
use crate::config::{load_agent_config_from_env, Prompts, SessionDefaults};
use crate::domain::{Difficulty, ProblemStyle, SessionPhase};
use crate::engine::SessionEngine;
use crate::error::AcquireError;
use crate::openai::OpenAI;
use crate::seeds::SeedBank;
use crate::session::SessionState;
use crate::source::{Acquisition, ProblemGenerator, ProblemSource};

/// Parameters for a new practice session, already defaulted.
#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub query: String,
    pub count: usize,
    pub difficulty: Difficulty,
    pub style: ProblemStyle,
    pub deadline_secs: u32,
}

type Registry = Arc<RwLock<HashMap<Uuid, Arc<SessionEngine>>>>;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Registry,
    pub source: ProblemSource,
    pub chat: Arc<dyn ChatCompleter>,
    pub prompts: Arc<Prompts>,
    pub defaults: SessionDefaults,
    /// True when AI actions go to a real model.
    pub ai_enabled: bool,
    /// Countdown granularity; each period takes one second off the clock.
    pub tick_every: Duration,
}

impl AppState {
    /// Build state from env: load config, init OpenAI or fall back to the seed bank.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();
        let prompts = Arc::new(cfg.prompts);

        match OpenAI::from_env(prompts.clone()) {
            Some(oa) => {
                info!(target: "problemset_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, "OpenAI enabled.");
                let oa = Arc::new(oa);
                Self { ai_enabled: true, ..Self::with_collaborators(oa.clone(), oa, prompts, cfg.session) }
            }
            None => {
                info!(target: "problemset_backend", "OpenAI disabled (no OPENAI_API_KEY). Serving built-in problems; AI actions will report errors.");
                Self::with_collaborators(Arc::new(SeedBank), Arc::new(OfflineChat), prompts, cfg.session)
            }
        }
    }

    pub fn with_collaborators(
        generator: Arc<dyn ProblemGenerator>,
        chat: Arc<dyn ChatCompleter>,
        prompts: Arc<Prompts>,
        defaults: SessionDefaults,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            source: ProblemSource::new(generator),
            chat,
            prompts,
            defaults,
            ai_enabled: false,
            tick_every: Duration::from_secs(1),
        }
    }

    /// Clamp client-supplied parameters against the configured defaults.
    pub fn session_request(
        &self,
        query: String,
        count: Option<usize>,
        difficulty: Option<Difficulty>,
        style: Option<ProblemStyle>,
        deadline_secs: Option<u32>,
    ) -> SessionRequest {
        let max = self.defaults.max_count.max(1);
        SessionRequest {
            query,
            count: count.unwrap_or(self.defaults.default_count).clamp(1, max),
            difficulty: difficulty.unwrap_or_default(),
            style: style.unwrap_or_default(),
            deadline_secs: deadline_secs.filter(|s| *s > 0).unwrap_or(self.defaults.deadline_secs),
        }
    }

    /// Acquire problems, start a session on them, register it and start its clock.
    #[instrument(level = "info", skip(self, req), fields(count = req.count, difficulty = ?req.difficulty, style = ?req.style))]
    pub async fn create_session(&self, req: SessionRequest) -> Result<(Arc<SessionEngine>, Acquisition), AcquireError> {
        let acq = self.source.acquire(&req.query, req.count, req.difficulty, req.style).await?;
        if acq.items.is_empty() {
            warn!(target: "problems", requested = req.count, "Generation produced no usable problems");
            return Err(AcquireError::Empty);
        }

        let engine = Arc::new(SessionEngine::new(
            SessionState::new(req.difficulty, req.style, req.deadline_secs),
            self.chat.clone(),
            self.prompts.clone(),
        ));
        engine.start(acq.items.clone()).map_err(|_| AcquireError::Empty)?;

        self.sessions.write().await.insert(engine.id(), engine.clone());
        spawn_deadline_ticker(
            self.sessions.clone(),
            Arc::downgrade(&engine),
            self.tick_every,
            Duration::from_secs(self.defaults.retain_finished_secs),
        );
        info!(target: "session", session = %engine.id(), items = acq.items.len(), backfilled = acq.backfilled, "Session created");
        Ok((engine, acq))
    }

    #[instrument(level = "debug", skip_all, fields(%id))]
    pub async fn get_session(&self, id: Uuid) -> Option<Arc<SessionEngine>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Forget a session now rather than waiting for eviction. An in-flight AI call still
    /// completes into the dropped state.
    #[instrument(level = "info", skip_all, fields(%id))]
    pub async fn discard_session(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }
}

/// Drive the countdown until it expires or the learner finishes, then keep the finished
/// session around for `retain` before evicting it. Stops early if the session is discarded.
fn spawn_deadline_ticker(sessions: Registry, engine: Weak<SessionEngine>, every: Duration, retain: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        let id = loop {
            interval.tick().await;
            let Some(engine) = engine.upgrade() else { return };
            if engine.tick() || engine.phase() != SessionPhase::Running {
                break engine.id();
            }
        };

        tokio::time::sleep(retain).await;
        if sessions.write().await.remove(&id).is_some() {
            info!(target: "session", session = %id, retained_secs = retain.as_secs(), "Finished session evicted");
        }
    });
}
