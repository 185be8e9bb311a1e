use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{trip_topic, Subscription};
use crate::models::event::BusEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join")]
    Join { topic: String },
    #[serde(rename = "leave")]
    Leave { topic: String },
    #[serde(rename = "trip:join")]
    TripJoin { trip_id: Uuid },
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    topic: &'a str,
    #[serde(flatten)]
    event: &'a BusEvent,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscriptions: StreamMap<String, Subscription> = StreamMap::new();

    info!("websocket client connected");

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        apply_client_message(&state, &mut subscriptions, &text);
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            Some((topic, event)) = subscriptions.next(), if !subscriptions.is_empty() => {
                let json = match serde_json::to_string(&OutboundFrame { topic: &topic, event: &event }) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize event for ws");
                        continue;
                    }
                };

                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Dropping the map releases every subscription.
    info!(topics = subscriptions.len(), "websocket client disconnected");
}

fn apply_client_message(
    state: &AppState,
    subscriptions: &mut StreamMap<String, Subscription>,
    text: &str,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(error = %err, "ignoring malformed ws message");
            return;
        }
    };

    match message {
        ClientMessage::Join { topic } => join(state, subscriptions, topic),
        ClientMessage::TripJoin { trip_id } => join(state, subscriptions, trip_topic(trip_id)),
        ClientMessage::Leave { topic } => {
            subscriptions.remove(&topic);
        }
    }
}

fn join(state: &AppState, subscriptions: &mut StreamMap<String, Subscription>, topic: String) {
    if topic.trim().is_empty() || subscriptions.contains_key(&topic) {
        return;
    }

    let subscription = state.bus.subscribe(&topic);
    subscriptions.insert(topic, subscription);
}
