//! WebSocket Connection Handler
//!
//! One task per socket. The lifecycle is Hello, then Identify within the
//! identify timeout, then READY, then a loop over client commands, routed
//! events and the heartbeat check. Once a connection is registered it is
//! always released, whichever way the loop ends.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use super::messages::{
    GatewayReceive, GatewaySend, IdentifyPayload, MatchPayload, OpCode, ReadMessagePayload,
    ReadyPayload, SendMessagePayload,
};
use super::session::SessionState;
use crate::application::dto::request::SendMessageRequest;
use crate::application::events::RealtimeEvent;
use crate::application::ports::ConnectionId;
use crate::application::services::PresenceService;
use crate::infrastructure::metrics;
use crate::presentation::http::extractors::parse_id;
use crate::presentation::middleware::decode_token;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Extra time a client gets past the advertised heartbeat interval
const HEARTBEAT_GRACE: Duration = Duration::from_secs(10);

/// How long a rejected socket may take to flush its InvalidSession frame
const REJECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let limits = &state.settings.websocket;
    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let heartbeat_interval = state.settings.websocket.heartbeat_interval_ms;

    if let Err(e) = send_frame(&mut sink, &GatewaySend::hello(heartbeat_interval)).await {
        tracing::debug!(error = %e, "Failed to send Hello");
        return;
    }

    // Single writer: every outgoing frame goes through this channel.
    let (tx, mut rx) = mpsc::unbounded_channel::<GatewaySend>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if send_frame(&mut sink, &frame).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let identify_timeout = Duration::from_secs(state.settings.websocket.identify_timeout_secs);
    let user_id = match timeout(identify_timeout, wait_for_identify(&mut stream)).await {
        Ok(Some(identify)) => match decode_token(&state.settings.jwt.secret, &identify.token) {
            Ok(user_id) => user_id,
            Err(e) => {
                tracing::debug!(error = %e, "Identify rejected");
                reject(tx, writer).await;
                return;
            }
        },
        Ok(None) => {
            tracing::debug!("Connection closed before Identify");
            writer.abort();
            return;
        }
        Err(_) => {
            tracing::debug!("Identify timeout");
            reject(tx, writer).await;
            return;
        }
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RealtimeEvent>();
    let connected = match state.presence.connect(user_id, event_tx).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Failed to register connection");
            reject(tx, writer).await;
            return;
        }
    };
    metrics::websocket_connected();
    let guard = DisconnectGuard::new(state.presence.clone(), connected.connection_id);

    let mut session = SessionState::new(user_id, connected.connection_id);
    let ready = ReadyPayload {
        connection_id: connected.connection_id.to_string(),
        user_id: user_id.to_string(),
        rooms: connected.rooms,
    };

    if tx.send(GatewaySend::ready(session.next_sequence(), &ready)).is_ok() {
        run_session(&mut session, &state, &tx, &mut stream, &mut event_rx).await;
    }

    guard.release().await;
    // Closing the channel lets the writer flush what is queued and close.
    drop(tx);
}

/// Main loop for an identified connection. Returns when the connection
/// should be torn down.
async fn run_session(
    session: &mut SessionState,
    state: &AppState,
    tx: &mpsc::UnboundedSender<GatewaySend>,
    stream: &mut SplitStream<WebSocket>,
    events: &mut mpsc::UnboundedReceiver<RealtimeEvent>,
) {
    let heartbeat_timeout =
        Duration::from_millis(state.settings.websocket.heartbeat_interval_ms) + HEARTBEAT_GRACE;
    let mut heartbeat_check = interval(heartbeat_timeout);
    heartbeat_check.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_frame(text.as_str(), session, state).await;
                        if tx.send(reply).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %session.connection_id, "Connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %session.connection_id, error = %e, "WebSocket error");
                        break;
                    }
                    // Pings are answered by axum; binary frames are not part of the protocol.
                    Some(Ok(_)) => {}
                }
            }

            event = events.recv() => {
                match event {
                    Some(event) => {
                        let dispatch = GatewaySend::dispatch(session.next_sequence(), &event);
                        if tx.send(dispatch).is_err() {
                            break;
                        }
                    }
                    // The registry dropped this connection.
                    None => break,
                }
            }

            _ = heartbeat_check.tick() => {
                if !session.is_alive(heartbeat_timeout) {
                    tracing::info!(
                        connection_id = %session.connection_id,
                        user_id = session.user_id,
                        "Heartbeat timeout, closing connection"
                    );
                    break;
                }
            }
        }
    }
}

/// Handle one text frame from an identified client and build the reply.
async fn handle_frame(text: &str, session: &mut SessionState, state: &AppState) -> GatewaySend {
    let frame: GatewayReceive = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            return GatewaySend::reply(None, Err(AppError::BadRequest(format!("Invalid frame: {}", e))));
        }
    };

    let op = match OpCode::from_u8(frame.op) {
        Some(OpCode::Heartbeat) => {
            session.heartbeat();
            tracing::trace!(connection_id = %session.connection_id, "Heartbeat received");
            if let Err(e) = state.presence.heartbeat(session.connection_id).await {
                tracing::warn!(connection_id = %session.connection_id, error = %e, "Failed to refresh presence");
            }
            return GatewaySend::heartbeat_ack();
        }
        Some(op) => op,
        None => {
            return GatewaySend::reply(
                frame.nonce,
                Err(AppError::BadRequest(format!("Unknown opcode {}", frame.op))),
            );
        }
    };

    let result = execute(op, frame.d.unwrap_or(Value::Null), session, state).await;
    if let Err(e) = &result {
        tracing::debug!(
            connection_id = %session.connection_id,
            op = frame.op,
            error = %e,
            "Command rejected"
        );
    }
    GatewaySend::reply(frame.nonce, result)
}

/// Run a client command on behalf of the session's user.
async fn execute(
    op: OpCode,
    d: Value,
    session: &SessionState,
    state: &AppState,
) -> Result<Value, AppError> {
    match op {
        OpCode::JoinMatch => {
            let payload: MatchPayload = payload(d)?;
            let joined = state
                .presence
                .join_room(session.connection_id, parse_id(&payload.match_id)?)
                .await?;
            to_value(joined)
        }
        OpCode::LeaveMatch => {
            let payload: MatchPayload = payload(d)?;
            state
                .presence
                .leave_room(session.connection_id, parse_id(&payload.match_id)?)
                .await?;
            Ok(json!({ "match_id": payload.match_id }))
        }
        OpCode::SendMessage => {
            let payload: SendMessagePayload = payload(d)?;
            let match_id = parse_id(&payload.match_id)?;
            let request = SendMessageRequest {
                content: payload.content,
                attachment_url: payload.attachment_url,
            };
            validate(&request)?;

            let message = state
                .chat
                .send_message(match_id, session.user_id, request)
                .await?;
            to_value(message)
        }
        OpCode::Typing => {
            let payload: MatchPayload = payload(d)?;
            state
                .chat
                .typing(parse_id(&payload.match_id)?, session.user_id)
                .await?;
            Ok(json!({ "match_id": payload.match_id }))
        }
        OpCode::ReadMessage => {
            let payload: ReadMessagePayload = payload(d)?;
            let message = state
                .chat
                .mark_read(parse_id(&payload.message_id)?, session.user_id)
                .await?;
            to_value(message)
        }
        OpCode::Identify => Err(AppError::BadRequest("Already identified".into())),
        _ => Err(AppError::BadRequest(format!(
            "Opcode {} is server-only",
            op as u8
        ))),
    }
}

fn payload<T: DeserializeOwned>(d: Value) -> Result<T, AppError> {
    serde_json::from_value(d).map_err(|e| AppError::BadRequest(format!("Invalid payload: {}", e)))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(format!("Serialization error: {}", e)))
}

/// Read frames until a well-formed Identify arrives. `None` if the socket
/// closes first.
async fn wait_for_identify(stream: &mut SplitStream<WebSocket>) -> Option<IdentifyPayload> {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(frame) = serde_json::from_str::<GatewayReceive>(text.as_str()) else {
                    continue;
                };
                if OpCode::from_u8(frame.op) != Some(OpCode::Identify) {
                    continue;
                }
                if let Some(identify) = frame
                    .d
                    .and_then(|d| serde_json::from_value::<IdentifyPayload>(d).ok())
                {
                    return Some(identify);
                }
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

/// Send InvalidSession, then let the writer flush it and close the socket.
async fn reject(tx: mpsc::UnboundedSender<GatewaySend>, writer: tokio::task::JoinHandle<()>) {
    let _ = tx.send(GatewaySend::invalid_session());
    drop(tx);
    if timeout(REJECT_FLUSH_TIMEOUT, writer).await.is_err() {
        tracing::debug!("Writer did not finish after rejection");
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &GatewaySend,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to serialize frame: {}", e);
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await
}

/// Releases a registered connection exactly once.
///
/// The normal path awaits [`DisconnectGuard::release`]. If the socket task is
/// dropped first (server shutdown, panic) the release is spawned from `Drop`.
struct DisconnectGuard {
    presence: Arc<dyn PresenceService>,
    connection_id: ConnectionId,
    armed: bool,
}

impl DisconnectGuard {
    fn new(presence: Arc<dyn PresenceService>, connection_id: ConnectionId) -> Self {
        Self {
            presence,
            connection_id,
            armed: true,
        }
    }

    async fn release(mut self) {
        self.armed = false;
        release(self.presence.clone(), self.connection_id).await;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.armed {
            tokio::spawn(release(self.presence.clone(), self.connection_id));
        }
    }
}

async fn release(presence: Arc<dyn PresenceService>, connection_id: ConnectionId) {
    metrics::websocket_disconnected();
    match presence.disconnect(connection_id).await {
        Ok(at) => tracing::debug!(connection_id = %connection_id, at = %at, "Connection released"),
        Err(e) => tracing::warn!(connection_id = %connection_id, error = %e, "Failed to release connection"),
    }
}
