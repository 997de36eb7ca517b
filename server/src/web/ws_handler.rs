use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::hub::events::{ClientCommand, MemberId, PresenceEvent, parse_channel};

use super::app_state::AppState;

/// GET /ws — upgrade to the presence WebSocket.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &PresenceEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        let _ = sender.send(Message::Text(json.into())).await;
    }
}

/// Drive one presence connection: handshake on a `join` command, then relay
/// hub events out and client commands in until either side disconnects.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // The connection is bound to exactly one room, fixed by the first join.
    let room_id = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(ClientCommand::Join { channel }) => match parse_channel(&channel) {
                    Some(room) => break room.to_string(),
                    None => {
                        send_event(
                            &mut sender,
                            &PresenceEvent::Error {
                                code: "bad_channel".into(),
                                message: format!("Unknown channel: {channel}"),
                            },
                        )
                        .await;
                        return;
                    }
                },
                Ok(_) => {
                    send_event(
                        &mut sender,
                        &PresenceEvent::Error {
                            code: "not_joined".into(),
                            message: "Join a channel first".into(),
                        },
                    )
                    .await;
                }
                Err(e) => {
                    debug!(error = %e, "ignoring unparsable command before join");
                }
            },
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => {}
        }
    };

    let (member_id, mut events) = state.hub.join(&room_id);

    // Outbound: forward hub events to the socket until the hub drops the
    // member or the socket dies.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Inbound: client commands and transport liveness.
    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_command(&state, member_id, &text);
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        state.hub.heartbeat(member_id);
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = &mut send_task => break,
        }
    }

    // Every exit path converges here: abrupt drops count as leaves.
    state.hub.leave(member_id);
    send_task.abort();
}

fn handle_command(state: &AppState, member_id: MemberId, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Track {
            joined_at,
            online_at,
        }) => {
            if let Err(e) = state.hub.track(member_id, joined_at, online_at) {
                warn!(%member_id, error = %e, "track rejected");
                state.hub.send_error(member_id, "track_rejected", &e);
            }
        }
        Ok(ClientCommand::Leave) => {
            state.hub.leave(member_id);
        }
        Ok(ClientCommand::Join { .. }) => {
            state
                .hub
                .send_error(member_id, "already_joined", "Connection already has a room");
        }
        Err(e) => {
            debug!(%member_id, error = %e, "ignoring unparsable command");
        }
    }
}
