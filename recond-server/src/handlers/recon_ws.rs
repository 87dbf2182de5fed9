//! The recon stream gateway: `/ws`.
//!
//! Clients send `{action, project, modules?}` control messages; the gateway
//! translates them into job controller calls and relays that project's job
//! events back as `{log?, progress?, status?}` messages. A `status` message
//! binds the session to a project and replays the buffered log tail; every
//! event after the bind is streamed incrementally, one log line per message,
//! in the exact order it was produced.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use recond_core::{JobEvent, ReconError};
use recond_model::{ClientAction, ClientRequest, ServerMessage};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::infra::{app_state::AppState, websocket::Session};

const OUTBOUND_BUFFER: usize = 100;

/// Handle WebSocket upgrade request
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(OUTBOUND_BUFFER);

    let session = Arc::new(Session::new(tx));
    let session_id = session.id;
    state.sessions.add_session(session.clone());
    tracing::debug!(session = %session_id, "recon stream connected");

    // Spawn task to handle outgoing messages
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if ws_sender.send(Message::Text(Utf8Bytes::from(json))).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages
    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                dispatch_text(&state, &session, text.as_str()).await;
            }
            Ok(Message::Binary(bin)) => match std::str::from_utf8(bin.as_ref()) {
                Ok(text) => dispatch_text(&state, &session, text).await,
                Err(_) => report_malformed(&session, "message is not valid UTF-8").await,
            },
            Ok(Message::Close(_)) => break,
            Err(err) => {
                tracing::error!(session = %session_id, "WebSocket error: {err}");
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect; the job keeps running unattended and a
    // reconnecting session can pick it back up via `status`.
    state.sessions.remove_session(session_id);
    tracing::debug!(session = %session_id, "recon stream disconnected");
}

async fn dispatch_text(state: &AppState, session: &Arc<Session>, text: &str) {
    match serde_json::from_str::<ClientRequest>(text) {
        Ok(request) => handle_request(state, session, request).await,
        Err(err) => report_malformed(session, &err.to_string()).await,
    }
}

/// Applies one control message. Errors only ever reach the originating
/// session; job state is untouched by invalid requests.
pub(crate) async fn handle_request(state: &AppState, session: &Arc<Session>, request: ClientRequest) {
    let project = request.project.trim().to_string();
    if project.is_empty() {
        report_malformed(session, "missing required field: project").await;
        return;
    }

    match request.action {
        ClientAction::Status => {
            bind_session(state, session, &project, true).await;
        }
        ClientAction::Start => {
            let Some(modules) = request.modules else {
                report_malformed(session, "start requires a modules list").await;
                return;
            };
            bind_session(state, session, &project, false).await;
            if let Err(err) = state.jobs.start(&project, &modules).await {
                report_error(state, session, &project, &err).await;
            }
        }
        ClientAction::Pause => {
            if let Err(err) = state.jobs.pause(&project) {
                report_error(state, session, &project, &err).await;
            }
        }
        ClientAction::Resume => {
            if let Err(err) = state.jobs.resume(&project) {
                report_error(state, session, &project, &err).await;
            }
        }
        ClientAction::Stop => {
            if let Err(err) = state.jobs.stop(&project) {
                report_error(state, session, &project, &err).await;
            }
        }
    }
}

/// Binds the session to a project, subscribing it to that project's job
/// events. With `send_snapshot` the current state and log tail are replayed
/// first; the subscription is taken atomically with the snapshot, so the
/// stream continues exactly where the tail ends.
async fn bind_session(state: &AppState, session: &Arc<Session>, project: &str, send_snapshot: bool) {
    let already_bound = session.project().await.as_deref() == Some(project);
    if !already_bound {
        session.set_project(Some(project.to_string())).await;
    }
    if already_bound && !send_snapshot {
        return;
    }

    let (snapshot, receiver) = state.jobs.observe(project);

    if send_snapshot {
        let reply = ServerMessage::log_with_status(
            snapshot.log_tail.join("\n"),
            snapshot.state.wire_status(),
        );
        let _ = session.send(reply).await;
        if let Some(progress) = snapshot.progress {
            let _ = session.send(ServerMessage::progress(progress)).await;
        }
    }

    if !already_bound {
        let forwarder = spawn_forwarder(session.clone(), receiver);
        session.replace_forwarder(Some(forwarder));
    }
}

fn spawn_forwarder(
    session: Arc<Session>,
    mut receiver: broadcast::Receiver<JobEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let message = match event {
                        JobEvent::Log(line) => ServerMessage::log(line),
                        JobEvent::Progress(progress) => ServerMessage::progress(progress),
                        JobEvent::Status(status) => ServerMessage::status(status.wire_status()),
                    };
                    if session.send(message).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        session = %session.id,
                        skipped,
                        "session fell behind the event stream"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn report_error(state: &AppState, session: &Arc<Session>, project: &str, err: &ReconError) {
    let status = state.jobs.state(project).wire_status();
    let _ = session
        .send(ServerMessage::log_with_status(err.to_string(), status))
        .await;
}

async fn report_malformed(session: &Arc<Session>, reason: &str) {
    let _ = session
        .send(ServerMessage::log(format!("Malformed message: {reason}")))
        .await;
}
