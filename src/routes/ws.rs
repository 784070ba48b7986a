//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::error::ApiError;
use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "problemset_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "problemset_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "problemset_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "problemset_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "problemset_backend", "WebSocket disconnected");
}

fn to_ws(r: Result<CommandReply, ApiError>) -> ServerWsMessage {
  match r {
    Ok(CommandReply::Session(view)) => ServerWsMessage::Session { view },
    Ok(CommandReply::Action(result)) => ServerWsMessage::ActionResult { result },
    Err(e) => ServerWsMessage::Error { message: e.to_string() },
  }
}

#[instrument(level = "info", skip(msg, state))]
pub(crate) async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  let (id, cmd) = match msg {
    ClientWsMessage::Ping => return ServerWsMessage::Pong,

    ClientWsMessage::CreateSession { params } => {
      return match create_session(state, params).await {
        Ok(created) => {
          info!(target: "session", id = %created.session_id, "WS session created");
          ServerWsMessage::SessionCreated { created }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      };
    }

    ClientWsMessage::GetSession { session_id } => {
      return match get_session(state, session_id).await {
        Ok(view) => ServerWsMessage::Session { view },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      };
    }

    ClientWsMessage::Extract { text } => {
      return ServerWsMessage::Extracted { extraction: extract_text(&text) };
    }

    ClientWsMessage::Advance { session_id } => (session_id, SessionCommand::Advance),
    ClientWsMessage::Retreat { session_id } => (session_id, SessionCommand::Retreat),
    ClientWsMessage::Finish { session_id } => (session_id, SessionCommand::Finish),
    ClientWsMessage::SubmitAnswer { session_id, answer } => (session_id, SessionCommand::Answer(answer)),
    ClientWsMessage::Hint { session_id } => (session_id, SessionCommand::Hint),
    ClientWsMessage::Solution { session_id } => (session_id, SessionCommand::Solution),
    ClientWsMessage::FullSolution { session_id } => (session_id, SessionCommand::FullSolution),
    ClientWsMessage::CheckAnswer { session_id } => (session_id, SessionCommand::Check),
    ClientWsMessage::RunCode { session_id } => (session_id, SessionCommand::Run),
  };
  to_ws(run_command(state, id, cmd).await)
}
