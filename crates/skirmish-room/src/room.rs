//! Room actor: an isolated Tokio task that owns one match.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. No shared mutable state, just message
//! passing; the single exception is the process-wide
//! [`ClientRegistry`], which the actor consults on admission and
//! releases on eviction.
//!
//! A room is never torn down implicitly. Losing both players leaves it
//! idle but alive; only [`RoomHandle::dispose`] stops the task.

use std::collections::HashMap;
use std::sync::Arc;

use skirmish_protocol::{
    ClientId, GameCommand, JoinOptions, PlayerEntry, RoomId, RoomMetadata, RoomStatus, ServerEvent,
    SessionId, StartingPlayer,
};
use skirmish_session::ClientRegistry;
use tokio::sync::{mpsc, oneshot};

use crate::{player_color, LobbyPublisher, RoomConfig, RoomError, STARTING_RESOURCES};

/// Channel sender for delivering outbound events to one connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// One seat in the room, keyed by stable client identity.
///
/// `id` is the *current* session and is rewritten on every successful
/// reconnect; everything else survives the connection churn.
#[derive(Debug, Clone)]
pub struct Player {
    /// Current session identity.
    pub id: SessionId,
    /// Stable client identity.
    pub client_id: ClientId,
    pub name: String,
    pub color: String,
    pub resources: u32,
    pub connected: bool,
}

impl Player {
    fn entry(&self) -> PlayerEntry {
        PlayerEntry {
            id: self.id.clone(),
            client_id: self.client_id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
            resources: self.resources,
            connected: self.connected,
        }
    }
}

/// How an open reconnection window was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TicketOutcome {
    /// The player came back; the seat was re-bound to a new session.
    Resumed,
    /// Rejected, superseded, or the room was disposed.
    Rejected,
}

/// An open reconnection window for one disconnected player.
///
/// Settled exactly once: a resume, a rejection, a superseding leave, or
/// disposal sends through `settle`; if a deadline is configured, the
/// watcher task observing the other end converts its expiry into a
/// [`RoomCommand::ReconnectExpired`].
struct ReconnectTicket {
    /// Guards against a stale expiry racing a newer window for the same
    /// client.
    generation: u64,
    settle: oneshot::Sender<TicketOutcome>,
}

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in most variants is a reply channel: the
/// caller sends a command and awaits the response on it.
pub(crate) enum RoomCommand {
    /// Admit a player.
    Join {
        session_id: SessionId,
        options: JoinOptions,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A connection went away. `consented = true` skips the
    /// reconnection window and evicts immediately.
    Leave {
        session_id: SessionId,
        consented: bool,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Re-bind a disconnected player's seat to a new session.
    Reconnect {
        client_id: ClientId,
        session_id: SessionId,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Close an open reconnection window without waiting for expiry.
    RejectReconnect {
        client_id: ClientId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Internal: a reconnection deadline elapsed unanswered.
    ReconnectExpired { client_id: ClientId, generation: u64 },

    /// Deliver an in-match command from a player.
    Game {
        session_id: SessionId,
        command: GameCommand,
    },

    /// Request a snapshot of the room's coordination state.
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },

    /// Mark the match concluded.
    FinishGame,

    /// Tear the room down.
    Dispose {
        reply: oneshot::Sender<()>,
    },
}

/// A snapshot of the room's coordination state (not the simulation).
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub status: RoomStatus,
    /// Simulation ticks elapsed since the match started.
    pub tick: u64,
    /// Players in join order.
    pub players: Vec<Player>,
    /// Clients with an open reconnection window.
    pub pending_reconnects: Vec<ClientId>,
}

impl RoomSnapshot {
    /// The discoverable summary derived from this snapshot.
    pub fn metadata(&self, config: &RoomConfig) -> RoomMetadata {
        RoomMetadata {
            player_count: self.players.iter().filter(|p| p.connected).count(),
            max_players: config.max_players,
            status: self.status,
            map_width: config.map_width,
            map_height: config.map_height,
        }
    }
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's unique ID.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Requests admission for a new session.
    pub async fn join(
        &self,
        session_id: SessionId,
        options: JoinOptions,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                session_id,
                options,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Reports that a session's connection ended. A consented leave
    /// evicts immediately; otherwise a reconnection window opens.
    pub async fn leave(&self, session_id: SessionId, consented: bool) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                session_id,
                consented,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Re-binds a disconnected player's seat to a new session.
    pub async fn reconnect(
        &self,
        client_id: ClientId,
        session_id: SessionId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Reconnect {
                client_id,
                session_id,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Closes an open reconnection window early, evicting the player.
    pub async fn reject_reconnection(&self, client_id: ClientId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::RejectReconnect {
                client_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Delivers an in-match command (fire-and-forget).
    pub async fn game(
        &self,
        session_id: SessionId,
        command: GameCommand,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Game {
                session_id,
                command,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Requests a snapshot of the room's coordination state.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Marks the match concluded (fire-and-forget).
    pub async fn finish_game(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::FinishGame)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Tears the room down: releases every identity, settles every open
    /// reconnection window, and stops the actor. Resolves once the
    /// actor has processed the command.
    pub async fn dispose(&self) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Dispose { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    config: RoomConfig,
    status: RoomStatus,
    tick: u64,
    /// Players in join order; the index determines name and color
    /// defaults.
    players: Vec<Player>,
    /// Per-session outbound channels.
    senders: HashMap<SessionId, PlayerSender>,
    /// Current session → stable identity, for routing leave/game
    /// commands.
    session_index: HashMap<SessionId, ClientId>,
    /// Open reconnection windows.
    pending: HashMap<ClientId, ReconnectTicket>,
    ticket_seq: u64,
    registry: Arc<ClientRegistry>,
    lobby: LobbyPublisher,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Clone handed to expiry watcher tasks.
    self_sender: mpsc::Sender<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until disposal.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room started");
        self.publish_metadata();

        let mut ticker = crate::Ticker::new(self.config.tick_rate_hz);

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd) {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.status == RoomStatus::Running {
                        self.tick += 1;
                    }
                }
            }
        }

        tracing::info!(room_id = %self.room_id, "room stopped");
    }

    /// Dispatches one command. Returns `true` when the actor should
    /// stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                session_id,
                options,
                sender,
                reply,
            } => {
                let result = self.handle_join(session_id, options, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave {
                session_id,
                consented,
                reply,
            } => {
                let result = self.handle_leave(session_id, consented);
                let _ = reply.send(result);
            }
            RoomCommand::Reconnect {
                client_id,
                session_id,
                sender,
                reply,
            } => {
                let result = self.handle_reconnect(client_id, session_id, sender);
                let _ = reply.send(result);
            }
            RoomCommand::RejectReconnect { client_id, reply } => {
                let result = self.handle_reject(client_id);
                let _ = reply.send(result);
            }
            RoomCommand::ReconnectExpired {
                client_id,
                generation,
            } => {
                self.handle_expired(client_id, generation);
            }
            RoomCommand::Game {
                session_id,
                command,
            } => {
                self.handle_game(session_id, command);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::FinishGame => {
                self.handle_finish();
            }
            RoomCommand::Dispose { reply } => {
                self.handle_dispose();
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    fn handle_join(
        &mut self,
        session_id: SessionId,
        options: JoinOptions,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let Some(client_id) = options.identity() else {
            return Err(RoomError::MissingIdentity);
        };

        if self.status != RoomStatus::Waiting || self.players.len() >= self.config.max_players {
            return Err(RoomError::NotAccepting(self.room_id));
        }
        if self.players.iter().any(|p| p.client_id == client_id) {
            return Err(RoomError::DuplicateIdentity(client_id, self.room_id));
        }
        // The registry is the authoritative cross-room check: a failed
        // compare-and-set means the identity is live in another room,
        // whatever a racing lookup would have said.
        if !self.registry.register(&client_id, self.room_id) {
            return Err(RoomError::IdentityBoundElsewhere(client_id));
        }

        let index = self.players.len();
        let name = options
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Player {}", index + 1));
        let player = Player {
            id: session_id.clone(),
            client_id: client_id.clone(),
            name,
            color: player_color(index).to_string(),
            resources: STARTING_RESOURCES,
            connected: true,
        };
        self.players.push(player);
        self.session_index.insert(session_id.clone(), client_id.clone());
        self.senders.insert(session_id.clone(), sender);

        tracing::info!(
            room_id = %self.room_id,
            %client_id,
            players = self.players.len(),
            "player joined"
        );

        let started = self.players.len() == self.config.max_players;
        if started {
            self.status = RoomStatus::Running;
        }

        // Lobby and in-room observers both need a consistent snapshot
        // once the join settles: metadata goes out first, the newcomer's
        // targeted roster next, the roster broadcast last.
        self.publish_metadata();
        self.send_to(&session_id, self.player_list());
        self.broadcast(self.player_list());
        if started {
            self.broadcast(ServerEvent::GameStarted {
                players: self
                    .players
                    .iter()
                    .map(|p| StartingPlayer {
                        id: p.id.clone(),
                        name: p.name.clone(),
                        color: p.color.clone(),
                    })
                    .collect(),
            });
            tracing::info!(room_id = %self.room_id, "match started");
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Departure and reconnection
    // -----------------------------------------------------------------------

    fn handle_leave(&mut self, session_id: SessionId, consented: bool) -> Result<(), RoomError> {
        // A leave for an unknown session races disposal or a completed
        // eviction; nothing to do.
        let Some(client_id) = self.session_index.get(&session_id).cloned() else {
            return Ok(());
        };

        if let Some(player) = self.players.iter_mut().find(|p| p.client_id == client_id) {
            player.connected = false;
        }
        self.senders.remove(&session_id);

        tracing::info!(
            room_id = %self.room_id,
            %client_id,
            consented,
            "player disconnected"
        );

        // Occupants learn about the disconnect before any eviction or
        // window settlement runs.
        self.publish_metadata();
        self.broadcast(self.player_list());

        if consented {
            self.evict(&client_id);
        } else {
            self.open_ticket(client_id);
        }
        Ok(())
    }

    /// Opens a reconnection window for a disconnected player,
    /// superseding any stale one for the same identity.
    fn open_ticket(&mut self, client_id: ClientId) {
        if let Some(stale) = self.pending.remove(&client_id) {
            let _ = stale.settle.send(TicketOutcome::Rejected);
        }

        self.ticket_seq += 1;
        let generation = self.ticket_seq;
        let (settle_tx, settle_rx) = oneshot::channel();
        self.pending.insert(
            client_id.clone(),
            ReconnectTicket {
                generation,
                settle: settle_tx,
            },
        );

        let window = self.config.reconnect_window;
        let room_tx = self.self_sender.clone();
        let room_id = self.room_id;
        tokio::spawn(async move {
            let outcome = match window {
                Some(window) => match tokio::time::timeout(window, settle_rx).await {
                    Ok(settled) => settled.ok(),
                    Err(_) => None,
                },
                // No deadline: wait for an explicit settlement.
                None => settle_rx.await.ok(),
            };

            match outcome {
                Some(outcome) => {
                    tracing::debug!(%room_id, %client_id, ?outcome, "reconnection window settled");
                }
                None => {
                    tracing::info!(%room_id, %client_id, "reconnection window expired");
                    let _ = room_tx
                        .send(RoomCommand::ReconnectExpired {
                            client_id,
                            generation,
                        })
                        .await;
                }
            }
        });
    }

    fn handle_reconnect(
        &mut self,
        client_id: ClientId,
        session_id: SessionId,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let Some(position) = self.players.iter().position(|p| p.client_id == client_id) else {
            return Err(RoomError::NoPendingReconnect(client_id));
        };
        let Some(ticket) = self.pending.remove(&client_id) else {
            return Err(RoomError::NoPendingReconnect(client_id));
        };
        let _ = ticket.settle.send(TicketOutcome::Resumed);

        let old_session = self.players[position].id.clone();
        self.session_index.remove(&old_session);
        self.senders.remove(&old_session);

        let player = &mut self.players[position];
        player.id = session_id.clone();
        player.connected = true;
        self.session_index.insert(session_id.clone(), client_id.clone());
        self.senders.insert(session_id, sender);

        tracing::info!(room_id = %self.room_id, %client_id, "player reconnected");

        self.publish_metadata();
        self.broadcast(self.player_list());
        Ok(())
    }

    fn handle_reject(&mut self, client_id: ClientId) -> Result<(), RoomError> {
        if !self.pending.contains_key(&client_id) {
            return Err(RoomError::NoPendingReconnect(client_id));
        }
        tracing::info!(room_id = %self.room_id, %client_id, "reconnection rejected");
        self.evict(&client_id);
        Ok(())
    }

    fn handle_expired(&mut self, client_id: ClientId, generation: u64) {
        // A newer window for the same client outlives a stale expiry.
        match self.pending.get(&client_id) {
            Some(ticket) if ticket.generation == generation => {}
            _ => return,
        }
        tracing::info!(room_id = %self.room_id, %client_id, "evicting after expired window");
        self.evict(&client_id);
    }

    /// Removes a player's seat and releases their identity. The room
    /// itself stays up, even when emptied.
    fn evict(&mut self, client_id: &ClientId) {
        let Some(position) = self.players.iter().position(|p| p.client_id == *client_id) else {
            return;
        };
        let player = self.players.remove(position);
        self.session_index.remove(&player.id);
        self.senders.remove(&player.id);
        self.registry.unregister(client_id, self.room_id);

        if let Some(ticket) = self.pending.remove(client_id) {
            let _ = ticket.settle.send(TicketOutcome::Rejected);
        }

        tracing::info!(
            room_id = %self.room_id,
            %client_id,
            players = self.players.len(),
            "player evicted"
        );

        self.publish_metadata();
        self.broadcast(self.player_list());
    }

    // -----------------------------------------------------------------------
    // Match flow
    // -----------------------------------------------------------------------

    fn handle_game(&mut self, session_id: SessionId, command: GameCommand) {
        if self.status != RoomStatus::Running {
            tracing::debug!(room_id = %self.room_id, "game command outside running match, ignoring");
            return;
        }
        let Some(client_id) = self.session_index.get(&session_id) else {
            tracing::warn!(room_id = %self.room_id, %session_id, "game command from non-member, ignoring");
            return;
        };
        // The simulation consumes these; the coordination layer only
        // vouches that they came from a seated, connected player.
        tracing::debug!(room_id = %self.room_id, %client_id, ?command, "game command accepted");
    }

    fn handle_finish(&mut self) {
        if self.status == RoomStatus::Finished {
            return;
        }
        self.status = RoomStatus::Finished;
        tracing::info!(room_id = %self.room_id, tick = self.tick, "match finished");
        self.publish_metadata();
    }

    fn handle_dispose(&mut self) {
        for player in &self.players {
            self.registry.unregister(&player.client_id, self.room_id);
        }
        for (_, ticket) in self.pending.drain() {
            let _ = ticket.settle.send(TicketOutcome::Rejected);
        }
        self.players.clear();
        self.session_index.clear();
        self.senders.clear();
        self.lobby.removed(self.room_id);
        tracing::info!(room_id = %self.room_id, "room disposed");
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id,
            status: self.status,
            tick: self.tick,
            players: self.players.clone(),
            pending_reconnects: self.pending.keys().cloned().collect(),
        }
    }

    fn metadata(&self) -> RoomMetadata {
        RoomMetadata {
            player_count: self.players.iter().filter(|p| p.connected).count(),
            max_players: self.config.max_players,
            status: self.status,
            map_width: self.config.map_width,
            map_height: self.config.map_height,
        }
    }

    fn publish_metadata(&self) {
        self.lobby.updated(self.room_id, self.metadata());
    }

    fn player_list(&self) -> ServerEvent {
        ServerEvent::PlayerList {
            players: self.players.iter().map(Player::entry).collect(),
        }
    }

    /// Sends an event to one session. Silently drops closed receivers.
    fn send_to(&self, session_id: &SessionId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(session_id) {
            let _ = sender.send(event);
        }
    }

    /// Sends an event to every connected occupant. Silently drops
    /// closed receivers.
    fn broadcast(&self, event: ServerEvent) {
        for sender in self.senders.values() {
            let _ = sender.send(event.clone());
        }
    }
}

/// Spawns a new room actor task and returns a handle to it.
///
/// `channel_size` bounds the command channel; senders wait when it
/// fills.
pub fn spawn_room(
    room_id: RoomId,
    config: RoomConfig,
    registry: Arc<ClientRegistry>,
    lobby: LobbyPublisher,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = RoomActor {
        room_id,
        config,
        status: RoomStatus::Waiting,
        tick: 0,
        players: Vec::new(),
        senders: HashMap::new(),
        session_index: HashMap::new(),
        pending: HashMap::new(),
        ticket_seq: 0,
        registry,
        lobby,
        receiver: rx,
        self_sender: tx.clone(),
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
