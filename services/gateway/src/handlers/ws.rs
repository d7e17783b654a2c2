//! WebSocket session handling
//!
//! Each connection gets a session id, a bounded outbound queue, and a
//! registry entry. The dispatcher enqueues updates with `try_send`; a
//! full queue drops the update for this session only. Inbound
//! subscribe/unsubscribe requests are acknowledged in order, with
//! `initial-data` following a successful subscribe before any
//! matching updates.
//!
//! Flow: connect → subscribe → ack → initial-data → updates.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use market_data::events::{ClientRequest, ServerMessage};
use market_data::filter;
use market_data::registry::SessionId;
use market_data::transport::{SinkError, UpdateSink};
use types::ids::{InstrumentId, SubscriptionId};
use types::predicate::Predicate;

use crate::state::{epoch_ms, AppState};

/// Outbound queue depth per session. Overflow means the client is
/// lagging; overflowed updates are dropped, not buffered.
const SESSION_QUEUE_CAPACITY: usize = 256;

/// `UpdateSink` over the session's bounded channel.
struct SessionSink {
    tx: mpsc::Sender<ServerMessage>,
}

impl UpdateSink for SessionSink {
    fn try_send(&self, message: ServerMessage) -> Result<(), SinkError> {
        self.tx.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

/// `GET /v1/ws`: upgrade to a subscriber session.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(SESSION_QUEUE_CAPACITY);
    let sink = Arc::new(SessionSink {
        tx: outbound_tx.clone(),
    });

    let session_id = state
        .registry
        .lock()
        .expect("registry lock poisoned")
        .register(sink, epoch_ms());
    state.metrics.record_session_connected();
    debug!(session = session_id, "WebSocket session connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Forward task: outbound queue → socket
    let send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        break; // client gone
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to serialize outbound message");
                }
            }
        }
    });

    // Inbound loop: requests from the client
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_request(&state, session_id, &outbound_tx, text.as_str()).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong/binary
            Err(err) => {
                debug!(session = session_id, error = %err, "socket error");
                break;
            }
        }
    }

    // Disconnect detaches the session immediately; queued updates
    // are dropped with the channel.
    state
        .registry
        .lock()
        .expect("registry lock poisoned")
        .unregister(session_id);
    state.metrics.record_session_disconnected();
    send_task.abort();
    debug!(session = session_id, "WebSocket session disconnected");
}

async fn handle_request(
    state: &AppState,
    session_id: SessionId,
    outbound: &mpsc::Sender<ServerMessage>,
    raw: &str,
) {
    let request = match serde_json::from_str::<ClientRequest>(raw) {
        Ok(request) => request,
        Err(err) => {
            debug!(session = session_id, error = %err, "unparseable request ignored");
            return;
        }
    };

    let messages = match request {
        ClientRequest::Subscribe {
            instrument_ids,
            filter,
            update_frequency,
        } => subscribe(state, session_id, instrument_ids, filter, update_frequency),
        ClientRequest::Unsubscribe { subscription_id } => {
            vec![unsubscribe(state, session_id, subscription_id)]
        }
    };

    for message in messages {
        // Control messages go through the same queue as updates so
        // the ack/initial-data/update order is preserved.
        if outbound.send(message).await.is_err() {
            break;
        }
    }
}

/// Handle a subscribe request: validate, snapshot, then register.
///
/// The snapshot is taken before the subscription becomes visible to
/// the dispatcher, so `initial-data` always precedes the first
/// update for these instruments.
fn subscribe(
    state: &AppState,
    session_id: SessionId,
    instrument_ids: Vec<InstrumentId>,
    filter: Option<serde_json::Value>,
    update_frequency: Option<f64>,
) -> Vec<ServerMessage> {
    let predicate = match filter {
        None => None,
        Some(value) => match Predicate::parse(&value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                return vec![ServerMessage::SubscribeAck {
                    success: false,
                    subscription_id: None,
                    message: format!("invalid filter: {err}"),
                }]
            }
        },
    };

    let snapshots: Vec<serde_json::Value> = instrument_ids
        .iter()
        .filter_map(|id| state.store.get(id))
        .filter(|instrument| filter::matches(predicate.as_ref(), &instrument.field_map()))
        .filter_map(|instrument| serde_json::to_value(instrument.field_map()).ok())
        .collect();

    let result = state
        .registry
        .lock()
        .expect("registry lock poisoned")
        .add_subscription(session_id, instrument_ids, predicate, update_frequency);

    match result {
        Ok(subscription_id) => vec![
            ServerMessage::SubscribeAck {
                success: true,
                subscription_id: Some(subscription_id),
                message: "subscribed".to_string(),
            },
            ServerMessage::InitialData {
                instruments: snapshots,
            },
        ],
        Err(err) => vec![ServerMessage::SubscribeAck {
            success: false,
            subscription_id: None,
            message: err.to_string(),
        }],
    }
}

fn unsubscribe(
    state: &AppState,
    session_id: SessionId,
    subscription_id: SubscriptionId,
) -> ServerMessage {
    let result = state
        .registry
        .lock()
        .expect("registry lock poisoned")
        .remove_subscription(session_id, subscription_id);

    match result {
        Ok(()) => ServerMessage::UnsubscribeAck {
            success: true,
            message: "unsubscribed".to_string(),
        },
        Err(err) => ServerMessage::UnsubscribeAck {
            success: false,
            message: err.to_string(),
        },
    }
}
