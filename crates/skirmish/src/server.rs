//! `SkirmishServer` builder and accept loop.
//!
//! This is the entry point for running a Skirmish server. It ties
//! together all the layers: transport → protocol → session → room.

use std::sync::Arc;

use skirmish_protocol::JsonCodec;
use skirmish_room::{RoomConfig, RoomManager};
use skirmish_session::SessionManager;
use skirmish_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::SkirmishError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
/// Interior mutability via `Mutex` where needed; the room actors
/// themselves are reached through cloned handles, so neither lock is
/// held across room calls longer than the lookup.
pub(crate) struct ServerState {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Skirmish server.
pub struct SkirmishServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
}

impl SkirmishServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration template applied to every room.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the transport and assembles the server.
    pub async fn build(self) -> Result<SkirmishServer, SkirmishError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: Mutex::new(RoomManager::new(self.room_config)),
            sessions: Mutex::new(SessionManager::new()),
            codec: JsonCodec,
        });

        Ok(SkirmishServer { transport, state })
    }
}

impl Default for SkirmishServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Skirmish server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SkirmishServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl SkirmishServer {
    /// Creates a new builder.
    pub fn builder() -> SkirmishServerBuilder {
        SkirmishServerBuilder::new()
    }

    /// Returns the local address the server is bound to. Needed when
    /// binding to port 0.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, SkirmishError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), SkirmishError> {
        tracing::info!("Skirmish server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
