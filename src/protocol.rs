//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Difficulty, ProblemItem, ProblemStyle};
use crate::engine::ActionOutcome;
use crate::extract::{ExtractTrace, Extraction, Strategy};
use crate::session::SessionState;
use crate::source::Acquisition;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    CreateSession {
        #[serde(flatten)]
        params: CreateSessionIn,
    },
    GetSession {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    Advance {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    Retreat {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    Finish {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    SubmitAnswer {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        answer: String,
    },
    Hint {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    Solution {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    FullSolution {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    CheckAnswer {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    RunCode {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    Extract {
        text: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    SessionCreated {
        #[serde(flatten)]
        created: SessionCreatedOut,
    },
    Session {
        #[serde(flatten)]
        view: SessionOut,
    },
    ActionResult {
        #[serde(flatten)]
        result: ActionOut,
    },
    Extracted {
        #[serde(flatten)]
        extraction: ExtractOut,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct CreateSessionIn {
    #[serde(default)]
    pub query: String,
    pub count: Option<usize>,
    pub difficulty: Option<Difficulty>,
    pub style: Option<ProblemStyle>,
    #[serde(rename = "deadlineSecs")]
    pub deadline_secs: Option<u32>,
}

/// Snapshot of one session, shared by every session endpoint.
#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub session: SessionState,
}

#[derive(Debug, Serialize)]
pub struct SessionCreatedOut {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub requested: usize,
    #[serde(rename = "firstBatch")]
    pub first_batch: usize,
    pub backfilled: usize,
    #[serde(rename = "completeCount")]
    pub complete_count: usize,
    pub session: SessionState,
}

impl SessionCreatedOut {
    pub fn new(session_id: Uuid, acq: &Acquisition, session: SessionState) -> Self {
        Self {
            session_id,
            requested: acq.requested,
            first_batch: acq.first_batch,
            backfilled: acq.backfilled,
            complete_count: acq.complete_count(),
            session,
        }
    }
}

/// Result of an AI-triggered action plus the session as it stands afterwards.
#[derive(Debug, Serialize)]
pub struct ActionOut {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub action: String,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
    pub session: SessionState,
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub answer: String,
}

#[derive(Deserialize)]
pub struct ExtractIn {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractOut {
    pub items: Vec<ProblemItem>,
    pub problems: Vec<String>,
    pub clarifications: Vec<String>,
    pub strategy: Option<Strategy>,
    pub trace: ExtractTrace,
}

impl From<Extraction> for ExtractOut {
    fn from(ex: Extraction) -> Self {
        Self {
            problems: ex.problems().into_iter().map(str::to_string).collect(),
            clarifications: ex.clarifications().into_iter().map(str::to_string).collect(),
            strategy: ex.trace.matched_strategy(),
            items: ex.items,
            trace: ex.trace,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    #[serde(rename = "aiEnabled")]
    pub ai_enabled: bool,
    pub sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_messages_parse_with_camel_case_ids() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"submit_answer","sessionId":"{id}","answer":"42"}}"#);
        match serde_json::from_str::<ClientWsMessage>(&raw).unwrap() {
            ClientWsMessage::SubmitAnswer { session_id, answer } => {
                assert_eq!(session_id, id);
                assert_eq!(answer, "42");
            }
            other => panic!("unexpected {other:?}"),
        }

        let create = r#"{"type":"create_session","query":"graphs","count":3,"difficulty":"hard","style":"coding","deadlineSecs":60}"#;
        match serde_json::from_str::<ClientWsMessage>(create).unwrap() {
            ClientWsMessage::CreateSession { params } => {
                assert_eq!(params.count, Some(3));
                assert_eq!(params.difficulty, Some(Difficulty::Hard));
                assert_eq!(params.style, Some(ProblemStyle::Coding));
                assert_eq!(params.deadline_secs, Some(60));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn extract_out_mirrors_extraction() {
        let out = ExtractOut::from(crate::extract::extract(
            "1. Find all primes less than 10.\nClarification: List the primes below ten.",
        ));
        assert_eq!(out.problems, vec!["Find all primes less than 10."]);
        assert_eq!(out.clarifications, vec!["List the primes below ten."]);
        assert_eq!(out.strategy, Some(Strategy::Numbered));

        let v = serde_json::to_value(ServerWsMessage::Extracted { extraction: out }).unwrap();
        assert_eq!(v["type"], "extracted");
        assert_eq!(v["items"][0]["is_complete"], true);
    }

    #[test]
    fn error_message_is_tagged() {
        let v = serde_json::to_value(ServerWsMessage::Error { message: "nope".into() }).unwrap();
        assert_eq!(v, serde_json::json!({"type": "error", "message": "nope"}));
    }
}
