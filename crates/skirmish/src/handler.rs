//! Per-connection handler: request routing and disconnect cleanup.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. Every server-to-client event, whether a direct reply or a
//! room broadcast, flows through one ordered channel drained by a pump
//! task, so a reply can never overtake a broadcast queued before it.
//!
//! A connection that drops while seated in a room triggers an
//! unconsented leave, opening the reconnection window; only an explicit
//! `leave` request evicts on the spot.

use std::sync::Arc;

use skirmish_protocol::{
    ClientId, ClientRequest, Codec, GameCommand, JoinOptions, ServerEvent, SessionId,
};
use skirmish_room::{LobbyEvent, RoomError, RoomHandle};
use skirmish_transport::{Connection, WebSocketConnection};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::server::ServerState;
use crate::SkirmishError;

/// Outbound event channel for one connection.
type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// The room a connection is currently seated in.
struct ActiveRoom {
    handle: RoomHandle,
    client_id: ClientId,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), SkirmishError> {
    let conn_id = conn.id();
    let session_id = SessionId::from(format!("sess-{}", conn_id.into_inner()));
    tracing::debug!(%conn_id, %session_id, "handling new connection");

    // Pump: serialize and ship everything queued for this client.
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let pump_conn = conn.clone();
    let codec = state.codec;
    let pump = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let bytes = match codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode outbound event");
                    continue;
                }
            };
            if pump_conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });

    let mut joined: Option<ActiveRoom> = None;
    let mut lobby_task: Option<JoinHandle<()>> = None;

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%session_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "recv error");
                break;
            }
        };

        let request: ClientRequest = match state.codec.decode(&data) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "failed to decode request");
                send_error(&events_tx, format!("invalid message: {e}"));
                continue;
            }
        };

        handle_request(
            &state,
            &session_id,
            &events_tx,
            &mut joined,
            &mut lobby_task,
            request,
        )
        .await;
    }

    if let Some(task) = lobby_task {
        task.abort();
    }

    // Dropped without a consented leave: open the reconnection window.
    if let Some(active) = joined {
        tracing::info!(%session_id, client_id = %active.client_id, "connection lost mid-room");
        let _ = active.handle.leave(session_id, false).await;
    }

    pump.abort();
    Ok(())
}

/// Routes one decoded request. Failures are reported to the client as
/// `error` events; only transport-level trouble aborts the handler.
async fn handle_request(
    state: &Arc<ServerState>,
    session_id: &SessionId,
    events: &EventSender,
    joined: &mut Option<ActiveRoom>,
    lobby_task: &mut Option<JoinHandle<()>>,
    request: ClientRequest,
) {
    match request {
        ClientRequest::CreateRoom { options } => {
            if joined.is_some() {
                send_error(events, "already in a room".to_string());
                return;
            }
            let Some(client_id) = options.identity() else {
                send_error(events, RoomError::MissingIdentity.to_string());
                return;
            };

            let handle = state.rooms.lock().await.create_room();
            match join_room(state, session_id, events, handle.clone(), client_id, options).await {
                Ok(active) => *joined = Some(active),
                Err(e) => {
                    // The fresh room never admitted anyone; drop it
                    // rather than leak an empty listing.
                    let _ = state.rooms.lock().await.dispose_room(handle.room_id()).await;
                    send_error(events, e.to_string());
                }
            }
        }

        ClientRequest::JoinRoom { room_id, options } => {
            if joined.is_some() {
                send_error(events, "already in a room".to_string());
                return;
            }
            let Some(client_id) = options.identity() else {
                send_error(events, RoomError::MissingIdentity.to_string());
                return;
            };

            let handle = match state.rooms.lock().await.room(room_id) {
                Ok(handle) => handle,
                Err(e) => {
                    send_error(events, e.to_string());
                    return;
                }
            };
            match join_room(state, session_id, events, handle, client_id, options).await {
                Ok(active) => *joined = Some(active),
                Err(e) => send_error(events, e.to_string()),
            }
        }

        ClientRequest::Resume { token } => {
            if joined.is_some() {
                send_error(events, "already in a room".to_string());
                return;
            }
            // Redemption burns the token whether or not the room still
            // accepts the reconnect.
            let ticket = match state.sessions.lock().await.redeem(&token) {
                Ok(ticket) => ticket,
                Err(e) => {
                    send_error(events, e.to_string());
                    return;
                }
            };
            let handle = match state.rooms.lock().await.room(ticket.room_id) {
                Ok(handle) => handle,
                Err(e) => {
                    send_error(events, e.to_string());
                    return;
                }
            };
            let result = handle
                .reconnect(ticket.client_id.clone(), session_id.clone(), events.clone())
                .await;
            match result {
                Ok(()) => {
                    let token = state
                        .sessions
                        .lock()
                        .await
                        .issue(ticket.client_id.clone(), ticket.room_id);
                    let _ = events.send(ServerEvent::RoomJoined {
                        room_id: ticket.room_id,
                        session_id: session_id.clone(),
                        reconnect_token: token,
                    });
                    *joined = Some(ActiveRoom {
                        handle,
                        client_id: ticket.client_id,
                    });
                }
                Err(e) => send_error(events, e.to_string()),
            }
        }

        ClientRequest::Leave => {
            if let Some(active) = joined.take() {
                let _ = active.handle.leave(session_id.clone(), true).await;
                state.sessions.lock().await.invalidate_client(&active.client_id);
            }
        }

        ClientRequest::SubscribeLobby => {
            if let Some(task) = lobby_task.take() {
                task.abort();
            }
            *lobby_task = Some(subscribe_lobby(state, events.clone()).await);
        }

        ClientRequest::Game { command } => match joined {
            Some(active) => {
                route_game(active, session_id, command).await;
            }
            None => send_error(events, "not in a room".to_string()),
        },
    }
}

/// Joins a room and, on success, issues a reconnection token and
/// acknowledges. The room has already queued its `playerList` (and
/// possibly `gameStarted`) into the event channel by the time the
/// acknowledgement lands, so the client sees those first.
async fn join_room(
    state: &Arc<ServerState>,
    session_id: &SessionId,
    events: &EventSender,
    handle: RoomHandle,
    client_id: ClientId,
    options: JoinOptions,
) -> Result<ActiveRoom, RoomError> {
    handle
        .join(session_id.clone(), options, events.clone())
        .await?;

    let room_id = handle.room_id();
    let token = state.sessions.lock().await.issue(client_id.clone(), room_id);
    let _ = events.send(ServerEvent::RoomJoined {
        room_id,
        session_id: session_id.clone(),
        reconnect_token: token,
    });
    tracing::info!(%room_id, %client_id, "client joined room");

    Ok(ActiveRoom { handle, client_id })
}

/// Sends the current joinable listings, then forwards lobby events
/// until the connection goes away.
async fn subscribe_lobby(state: &Arc<ServerState>, events: EventSender) -> JoinHandle<()> {
    // Subscribe before listing so nothing falls between the two; the
    // client may see a listing twice, never a gap.
    let (mut lobby_rx, listings) = {
        let rooms = state.rooms.lock().await;
        (rooms.subscribe_lobby(), rooms.joinable_rooms().await)
    };
    for (room_id, metadata) in listings {
        let _ = events.send(ServerEvent::LobbyUpdate { room_id, metadata });
    }

    tokio::spawn(async move {
        loop {
            match lobby_rx.recv().await {
                Ok(LobbyEvent::Updated { room_id, metadata }) => {
                    if events
                        .send(ServerEvent::LobbyUpdate { room_id, metadata })
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(LobbyEvent::Removed { room_id }) => {
                    if events.send(ServerEvent::LobbyRemoved { room_id }).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "lobby subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Forwards an in-match command to the client's room.
async fn route_game(active: &ActiveRoom, session_id: &SessionId, command: GameCommand) {
    if let Err(e) = active.handle.game(session_id.clone(), command).await {
        tracing::debug!(error = %e, "failed to route game command");
    }
}

fn send_error(events: &EventSender, message: String) {
    let _ = events.send(ServerEvent::Error { message });
}
