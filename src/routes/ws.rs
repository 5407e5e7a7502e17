//! WebSocket handler — canvas editing sessions.
//!
//! DESIGN
//! ======
//! On upgrade the connection enters a `select!` loop:
//! - Incoming client frames → parse + dispatch on the `drawing:` syscalls
//! - Auto-save events from the open drawing's worker → forward to client
//!
//! A connection edits at most one drawing at a time. Opening another one
//! closes the previous auto-save session first, which flushes its pending
//! edits when configured to.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade (one-time ticket) → send `session:connected`
//! 2. `drawing:open` → spawn auto-save worker, reply with the snapshot
//! 3. `drawing:change` / `drawing:rename` → fed to the worker, no reply
//! 4. `drawing:save` → explicit save; result arrives as `drawing:saved`
//! 5. `drawing:close` or disconnect → worker closed

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, FRAME_CODE, FRAME_MESSAGE, Frame};
use crate::services::autosave::{AutosaveEvent, AutosaveHandle, AutosaveSession, PolicyKind, SaveTarget};
use crate::services::drawing::{self, DrawingRef};
use crate::services::session;
use crate::state::AppState;

const EVENT_QUEUE_CAPACITY: usize = 64;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    match authorize_ticket(&state, params.get("ticket").map(String::as_str)).await {
        Ok(user_id) => ws.on_upgrade(move |socket| run_ws(socket, state, user_id)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Resolve the upgrade's one-time ticket to a user id.
async fn authorize_ticket(state: &AppState, ticket: Option<&str>) -> Result<Uuid, (StatusCode, &'static str)> {
    let Some(ticket) = ticket.filter(|t| !t.is_empty()) else {
        return Err((StatusCode::UNAUTHORIZED, "ticket required"));
    };

    match session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(uid)) => Ok(uid),
        Ok(None) => Err((StatusCode::UNAUTHORIZED, "invalid or expired ticket")),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error"))
        }
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: Uuid) {
    let (events_tx, mut events_rx) = mpsc::channel::<AutosaveEvent>(EVENT_QUEUE_CAPACITY);

    let welcome = Frame::request("session:connected", Data::new()).with_data("user_id", user_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }
    info!(%user_id, "ws: canvas connected");

    let mut editor: Option<AutosaveHandle> = None;

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mut editor, user_id, &events_tx, text.as_str()).await;
                        for frame in replies {
                            if send_frame(&mut socket, &frame).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = events_rx.recv() => {
                if send_frame(&mut socket, &event_frame(&event)).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(handle) = editor.take() {
        handle.close().await;
    }
    info!(%user_id, "ws: canvas disconnected");
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept apart from the socket so tests can drive whole editing sessions.
async fn process_inbound_text(
    state: &AppState,
    editor: &mut Option<AutosaveHandle>,
    user_id: Uuid,
    events_tx: &mpsc::Sender<AutosaveEvent>,
    text: &str,
) -> Vec<Frame> {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%user_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data(FRAME_MESSAGE, format!("invalid json: {e}"));
            return vec![err];
        }
    };

    if req.prefix() != "drawing" {
        return vec![req.error(format!("unknown prefix: {}", req.prefix()))];
    }

    match req.op() {
        "open" => handle_open(state, editor, user_id, events_tx, &req).await,
        "change" => {
            let Some(handle) = editor.as_ref() else {
                return vec![req.error("no drawing open")];
            };
            let Some(content) = req.data_str("content") else {
                return vec![req.error("content required")];
            };
            handle.change(content.to_owned()).await;
            Vec::new()
        }
        "rename" => {
            let Some(handle) = editor.as_ref() else {
                return vec![req.error("no drawing open")];
            };
            let Some(title) = req.data_str("title") else {
                return vec![req.error("title required")];
            };
            handle.rename(drawing::title_or_default(Some(title))).await;
            Vec::new()
        }
        "save" => {
            let Some(handle) = editor.as_ref() else {
                return vec![req.error("no drawing open")];
            };
            handle.save_now().await;
            vec![req.done()]
        }
        "close" => {
            if let Some(handle) = editor.take() {
                handle.close().await;
            }
            vec![req.done()]
        }
        op => vec![req.error(format!("unknown drawing op: {op}"))],
    }
}

async fn handle_open(
    state: &AppState,
    editor: &mut Option<AutosaveHandle>,
    user_id: Uuid,
    events_tx: &mpsc::Sender<AutosaveEvent>,
    req: &Frame,
) -> Vec<Frame> {
    let Some(raw_id) = req.data_str("drawing_id") else {
        return vec![req.error("drawing_id required")];
    };
    let drawing_ref = match raw_id.parse::<DrawingRef>() {
        Ok(r) => r,
        Err(e) => return vec![req.error(e.to_string())],
    };
    let policy = match req.data_str("policy").map(str::parse::<PolicyKind>) {
        Some(Ok(kind)) => state.autosave.policy(kind),
        Some(Err(e)) => return vec![req.error(e.to_string())],
        None => state.autosave.default_policy(),
    };
    let kind = policy.kind();

    // Close the previous drawing before loading the next one so its final
    // flush cannot race the new session's first save.
    if let Some(previous) = editor.take() {
        previous.close().await;
    }

    let mut reply = Data::new();
    reply.insert("policy".into(), serde_json::json!(kind.as_str()));
    let target = match drawing_ref {
        DrawingRef::New => {
            let title = drawing::title_or_default(req.data_str("title"));
            reply.insert("drawing".into(), serde_json::Value::Null);
            reply.insert("title".into(), serde_json::json!(title));
            SaveTarget::Unsaved { title }
        }
        DrawingRef::Saved(id) => match drawing::load_owned(state.drawings.as_ref(), id, user_id).await {
            Ok(loaded) => {
                reply.insert("drawing".into(), serde_json::to_value(&loaded).unwrap_or_default());
                SaveTarget::Saved(id)
            }
            Err(e) => return vec![req.error_from(&e)],
        },
    };

    let session = AutosaveSession {
        store: state.drawings.clone(),
        owner_id: user_id,
        target,
        policy,
        flush_on_close: state.autosave.flush_on_close,
    };
    *editor = Some(session.spawn(events_tx.clone()));
    info!(%user_id, drawing = %drawing_ref, policy = kind.as_str(), "ws: drawing opened");

    let done = req.done_with(reply);
    match drawing_ref {
        DrawingRef::Saved(id) => vec![done.with_drawing_id(id)],
        DrawingRef::New => vec![done],
    }
}

/// Server-initiated frame announcing a save outcome.
fn event_frame(event: &AutosaveEvent) -> Frame {
    match event {
        AutosaveEvent::Saved { drawing, created, trigger } => Frame::request("drawing:saved", Data::new())
            .with_drawing_id(drawing.id)
            .with_data("drawing_id", drawing.id.to_string())
            .with_data("title", drawing.title.clone())
            .with_data("updated_at", drawing.updated_at)
            .with_data("created", *created)
            .with_data("trigger", trigger.as_str()),
        AutosaveEvent::Failed { drawing_id, code, message, trigger } => {
            let frame = Frame::request("drawing:error", Data::new())
                .with_data(FRAME_CODE, *code)
                .with_data(FRAME_MESSAGE, message.clone())
                .with_data("trigger", trigger.as_str());
            match drawing_id {
                Some(id) => frame.with_drawing_id(*id),
                None => frame,
            }
        }
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
