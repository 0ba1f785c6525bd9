//! Datagram server around the simulation.
//!
//! The layout is three background tasks feeding one owner loop:
//!
//! - the receiver decodes JSON commands from the socket and forwards them
//! - the sender serializes outbound messages and writes them to the socket
//! - the timeout checker reports clients that went silent
//!
//! The main loop in [`Server::run`] is the only place that touches the
//! [`GameState`]. Commands arriving between ticks are applied immediately;
//! they only write fields, and all simulation work happens on the tick.
//!
//! Every datagram carries exactly one `{"type": ..., "data": ...}` message.
//! Lost datagrams are repaired by a periodic full resync.

use crate::client_manager::{ClientManager, CLIENT_TIMEOUT};
use crate::game::GameState;
use crate::utils::ClientId;
use log::{debug, error, info, warn};
use shared::{ClientMessage, ServerMessage, MAX_DATAGRAM_SIZE};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Events delivered to the main loop by the background tasks.
#[derive(Debug)]
pub enum NetEvent {
    CommandReceived {
        message: ClientMessage,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: ClientId,
    },
    Shutdown,
}

/// Work handed to the sender task.
#[derive(Debug)]
pub enum Outbound {
    Send {
        message: ServerMessage,
        addr: SocketAddr,
    },
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub tick_duration: Duration,
    pub max_clients: usize,
    /// Ticks slower than this are logged as warnings.
    pub slow_tick: Duration,
    /// Full state is resent to everyone this often; zero disables it.
    pub resync_ticks: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(100),
            max_clients: 32,
            slow_tick: Duration::from_millis(50),
            resync_ticks: 50,
        }
    }
}

/// Stops a running server from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<NetEvent>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.tx.send(NetEvent::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

pub fn encode(message: &ServerMessage) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}

pub fn decode(bytes: &[u8]) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_slice(bytes)
}

pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    options: ServerOptions,

    server_tx: mpsc::UnboundedSender<NetEvent>,
    server_rx: mpsc::UnboundedReceiver<NetEvent>,
    game_tx: mpsc::UnboundedSender<Outbound>,
    game_rx: Option<mpsc::UnboundedReceiver<Outbound>>,
}

impl Server {
    pub async fn new(addr: &str, game_state: GameState, options: ServerOptions) -> Result<Self, BoxError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(options.max_clients))),
            game_state,
            options,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.server_tx.clone(),
        }
    }

    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode(&buffer[..len]) {
                        Ok(message) => {
                            if let Err(e) = server_tx.send(NetEvent::CommandReceived { message, addr }) {
                                error!("Failed to forward command to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Malformed datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(mut game_rx) = self.game_rx.take() else {
            warn!("Sender task already running");
            return;
        };

        tokio::spawn(async move {
            while let Some(outbound) = game_rx.recv().await {
                match outbound {
                    Outbound::Send { message, addr } => {
                        if let Err(e) = Self::send_message_impl(&socket, &message, addr).await {
                            error!("Failed to send to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(CLIENT_TIMEOUT)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(NetEvent::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_message_impl(socket: &UdpSocket, message: &ServerMessage, addr: SocketAddr) -> Result<(), BoxError> {
        let data = encode(message)?;
        if data.len() > MAX_DATAGRAM_SIZE {
            return Err(format!("message of {} bytes does not fit in a datagram", data.len()).into());
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_message(&self, message: ServerMessage, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(Outbound::Send { message, addr }) {
            error!("Failed to queue message for sending: {}", e);
        }
    }

    async fn handle_command(&mut self, message: ClientMessage, addr: SocketAddr) {
        let known = {
            let mut clients = self.clients.write().await;
            let id = clients.find_client_by_addr(addr);
            if let Some(id) = id {
                clients.touch(id);
            }
            id
        };

        let client_id = match (known, &message) {
            (Some(id), _) => id,
            (None, ClientMessage::Login { .. }) => {
                let added = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };
                match added {
                    Some(id) => id,
                    None => {
                        info!("Rejecting login from {}: server full", addr);
                        self.send_message(
                            ServerMessage::Disconnected {
                                reason: "Server full".to_string(),
                            },
                            addr,
                        );
                        return;
                    }
                }
            }
            (None, _) => {
                debug!("Ignoring {:?} from unknown address {}", message, addr);
                return;
            }
        };

        if message == ClientMessage::Logout {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id);
        }
        self.game_state.apply_command(client_id, message);
    }

    /// Sends everything the game produced this tick to the matching
    /// addresses. Clients told they are disconnected are forgotten.
    async fn send_updates(&mut self) {
        let outbound = self.game_state.outbound();
        if outbound.is_empty() {
            return;
        }

        let addrs: HashMap<ClientId, SocketAddr> = {
            let clients = self.clients.read().await;
            clients.get_client_addrs().into_iter().collect()
        };

        let mut dropped = Vec::new();
        for (client_id, message) in outbound {
            let Some(&addr) = addrs.get(&client_id) else {
                continue;
            };
            if matches!(message, ServerMessage::Disconnected { .. }) {
                dropped.push(client_id);
            }
            self.send_message(message, addr);
        }

        if !dropped.is_empty() {
            let mut clients = self.clients.write().await;
            for client_id in &dropped {
                clients.remove_client(client_id);
            }
        }
    }

    async fn run_tick(&mut self) {
        let started = Instant::now();
        let tick = self.game_state.tick + 1;

        match self.game_state.advance_tick() {
            Ok(report) => {
                if report.logins + report.logouts + report.transitions > 0 {
                    debug!(
                        "Tick {}: {} logins, {} logouts, {} level changes",
                        tick, report.logins, report.logouts, report.transitions
                    );
                }
            }
            Err(e) => error!("Tick {} failed: {}", tick, e),
        }

        if self.options.resync_ticks > 0 && tick % self.options.resync_ticks == 0 {
            self.game_state.force_resync();
        }
        self.send_updates().await;

        let elapsed = started.elapsed();
        if elapsed > self.options.slow_tick {
            warn!("Tick {} took {:?}", tick, elapsed);
        }

        if tick % 60 == 0 {
            let client_count = {
                let clients = self.clients.read().await;
                clients.len()
            };
            if client_count > 0 {
                debug!(
                    "Tick {}: {} clients, {} sessions, {:?} per tick",
                    tick,
                    client_count,
                    self.game_state.session_count(),
                    elapsed
                );
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.options.tick_duration);

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.server_rx.recv() => {
                    match event {
                        Some(NetEvent::CommandReceived { message, addr }) => {
                            self.handle_command(message, addr).await;
                        },
                        Some(NetEvent::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.game_state.disconnect(client_id);
                        },
                        Some(NetEvent::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.run_tick().await;
                },
            }
        }

        Ok(())
    }
}
