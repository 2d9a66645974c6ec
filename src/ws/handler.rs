//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::session::{SessionCommand, SessionHandle};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Subscribe to this session right after connecting
    pub session_id: Option<Uuid>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.session_id, state))
}

/// Live subscription of this connection to one session
struct Subscription {
    handle: SessionHandle,
    forwarder: JoinHandle<()>,
}

impl Subscription {
    async fn leave(self, client_id: Uuid) {
        self.forwarder.abort();
        let _ = self
            .handle
            .command_tx
            .send(SessionCommand::Leave { client_id })
            .await;
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, initial_session: Option<Uuid>, state: AppState) {
    let client_id = Uuid::new_v4();
    info!(client_id = %client_id, "New WebSocket connection");

    let (ws_sink, mut ws_stream) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<ServerMsg>(128);
    let writer_handle = tokio::spawn(write_loop(client_id, ws_sink, out_rx));

    let welcome = ServerMsg::Welcome {
        client_id,
        server_time: unix_millis(),
    };
    if out_tx.send(welcome).await.is_err() {
        error!(client_id = %client_id, "Failed to queue welcome");
        return;
    }

    let mut subscription = None;
    if let Some(session_id) = initial_session {
        subscription = subscribe(&state, client_id, session_id, &out_tx).await;
    }

    let rate_limiter = ConnectionRateLimiter::new();

    // Reader loop: WebSocket -> session commands
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(client_id = %client_id, "Rate limited client message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Subscribe { session_id }) => {
                        if let Some(previous) = subscription.take() {
                            previous.leave(client_id).await;
                        }
                        subscription = subscribe(&state, client_id, session_id, &out_tx).await;
                    }
                    Ok(ClientMsg::Ping { t }) => {
                        let _ = out_tx.send(ServerMsg::Pong { t }).await;
                    }
                    Ok(ClientMsg::Leave) => {
                        if let Some(previous) = subscription.take() {
                            previous.leave(client_id).await;
                        }
                    }
                    Err(e) => {
                        warn!(client_id = %client_id, error = %e, "Failed to parse client message");
                        let _ = out_tx
                            .send(ServerMsg::error("bad_message", e.to_string()))
                            .await;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(client_id = %client_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(client_id = %client_id, "Received control frame");
            }
            Ok(Message::Close(_)) => {
                info!(client_id = %client_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(client_id = %client_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Cleanup on disconnect
    if let Some(previous) = subscription.take() {
        previous.leave(client_id).await;
    }
    drop(out_tx);
    writer_handle.abort();

    info!(client_id = %client_id, "WebSocket connection closed");
}

/// Attach this connection to a session's broadcast stream
async fn subscribe(
    state: &AppState,
    client_id: Uuid,
    session_id: Uuid,
    out_tx: &mpsc::Sender<ServerMsg>,
) -> Option<Subscription> {
    let Some(handle) = state.session_registry.get(&session_id) else {
        let _ = out_tx
            .send(ServerMsg::error(
                "session_not_found",
                format!("No session {}", session_id),
            ))
            .await;
        return None;
    };

    // Subscribe before registering so the forced snapshot is not missed
    let session_rx = handle.subscribe();

    if handle
        .command_tx
        .send(SessionCommand::Subscribe { client_id })
        .await
        .is_err()
    {
        let _ = out_tx
            .send(ServerMsg::error("session_closed", "Session has ended"))
            .await;
        return None;
    }

    let _ = out_tx
        .send(ServerMsg::Subscribed {
            session_id,
            seed: handle.seed,
            tick_rate: handle.tick_rate,
            initial_radius: handle.settings.initial_radius,
            phases: handle.settings.phases.iter().copied().collect(),
        })
        .await;

    info!(client_id = %client_id, session_id = %session_id, "Observer subscribed");

    let forwarder = tokio::spawn(forward_session(client_id, session_rx, out_tx.clone()));
    Some(Subscription { handle, forwarder })
}

/// Forward session broadcasts to this connection's outbound queue
async fn forward_session(
    client_id: Uuid,
    mut session_rx: broadcast::Receiver<ServerMsg>,
    out_tx: mpsc::Sender<ServerMsg>,
) {
    loop {
        match session_rx.recv().await {
            Ok(msg) => {
                let ended = matches!(msg, ServerMsg::SessionEnded { .. });
                if out_tx.send(msg).await.is_err() || ended {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    client_id = %client_id,
                    lagged_count = n,
                    "Observer lagged, skipping {} messages", n
                );
                // Continue - the next snapshot carries the full zone
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(client_id = %client_id, "Session channel closed");
                break;
            }
        }
    }
}

/// Writer task: outbound queue -> WebSocket
async fn write_loop(
    client_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = out_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(client_id = %client_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
