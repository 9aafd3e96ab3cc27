//! Server network layer handling UDP communications and the event loop
//!
//! Three background tasks feed and drain the main loop:
//! - a receiver that decodes datagrams into [`ServerMessage`]s
//! - a sender that encodes and writes queued [`GameMessage`]s
//! - a timeout checker that reports silent clients
//!
//! All game state lives on the main loop, which handles one message at a
//! time and polls room countdowns on a fixed interval.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game::GameState;
use crate::outbox::Outbox;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ClientId, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

const STATS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

pub type NetResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: ClientId },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Main server coordinating networking and the game rooms
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    outbox: Outbox,
    poll_interval: Duration,
    client_timeout: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> NetResult<Self> {
        let socket = Arc::new(UdpSocket::bind(config.address()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            game_state: GameState::new(),
            outbox: Outbox::new(),
            poll_interval: config.poll_interval(),
            client_timeout: config.client_timeout(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// Address the socket is actually bound to (useful with port 0).
    pub fn local_addr(&self) -> NetResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Sender that can stop the main loop with [`ServerMessage::Shutdown`].
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.client_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Resolves every queued game message to an address and hands it to
    /// the sender task. Messages for clients that are gone are dropped.
    async fn flush_outbox(&mut self) {
        if self.outbox.is_empty() {
            return;
        }
        let messages = self.outbox.drain();
        let clients = self.clients.read().await;
        for message in messages {
            match clients.get_client_addr(message.client_id) {
                Some(addr) => self.send_packet(message.packet, addr),
                None => debug!("Dropping packet for departed client {}", message.client_id),
            }
        }
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let now = Instant::now();

        if let Packet::Connect { client_version } = packet {
            self.handle_connect(client_version, addr, now).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            let client_id = clients.find_client_by_addr(addr);
            if let Some(id) = client_id {
                clients.touch(id);
                if matches!(packet, Packet::Disconnect) {
                    clients.remove_client(&id);
                }
            }
            client_id
        };

        match client_id {
            Some(client_id) => {
                self.game_state
                    .handle_packet(client_id, packet, now, &mut self.outbox);
            }
            None => debug!("Ignoring packet from unconnected address {}", addr),
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr, now: Instant) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            warn!(
                "Rejecting {}: protocol version {} (expected {})",
                addr, client_version, PROTOCOL_VERSION
            );
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Remove existing connection if present
        let existing_client_id = {
            let mut clients = self.clients.write().await;
            let existing = clients.find_client_by_addr(addr);
            if let Some(existing_id) = existing {
                info!("Removing existing client {} from {}", existing_id, addr);
                clients.remove_client(&existing_id);
            }
            existing
        };
        if let Some(existing_id) = existing_client_id {
            self.game_state
                .disconnect(existing_id, now, &mut self.outbox);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };

        let response = match client_id {
            Some(client_id) => Packet::Connected { client_id },
            None => {
                warn!("Server full, rejecting {}", addr);
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                }
            }
        };
        self.send_packet(response, addr);
    }

    /// Tells every connected client the server is going away. Writes
    /// directly so the packets leave before the loop returns.
    async fn broadcast_shutdown(&self) {
        let client_addrs = {
            let clients = self.clients.read().await;
            clients.get_client_addrs()
        };
        let packet = Packet::Disconnected {
            reason: "Server shutting down".to_string(),
        };
        for (client_id, addr) in client_addrs {
            if let Err(e) = send_packet_impl(&self.socket, &packet, addr).await {
                error!("Failed to send to client {}: {}", client_id, e);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> NetResult<()> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut poll_interval = interval(self.poll_interval);
        let mut polls: u64 = 0;
        let polls_per_report = (STATS_REPORT_INTERVAL.as_millis()
            / self.poll_interval.as_millis().max(1))
        .max(1) as u64;

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.game_state.disconnect(client_id, Instant::now(), &mut self.outbox);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            self.broadcast_shutdown().await;
                            break;
                        }
                    }
                },

                // Advance room countdowns
                _ = poll_interval.tick() => {
                    self.game_state.poll_timers(Instant::now(), &mut self.outbox);

                    // Periodic load report
                    polls += 1;
                    if polls % polls_per_report == 0 {
                        let client_count = {
                            let clients = self.clients.read().await;
                            clients.len()
                        };
                        if client_count > 0 {
                            debug!(
                                "{} clients, {} rooms, {} tracked players",
                                client_count,
                                self.game_state.rooms.len(),
                                self.game_state.stats.len()
                            );
                        }
                    }
                },
            }

            self.flush_outbox().await;
        }

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> NetResult<()> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
