//! P2P Node implementation
//!
//! Runs the libp2p swarm on its own task. The overlay talks to it through a
//! [`NodeHandle`] (commands) and receives verified packets on a channel.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use libp2p::{
    core::transport::upgrade::Version,
    identify, identity, mdns, noise,
    request_response::{self, ResponseChannel},
    swarm::{Swarm, SwarmEvent},
    tcp, yamux, Multiaddr, PeerId, StreamProtocol, Transport,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::network::behaviour::{BehaviourEvent, NodeBehaviour};
use crate::network::codec::{OverlayEvent, PacketAck};
use crate::network::config::NetworkConfig;
use crate::network::packet::SignedPacket;
use crate::network::NetworkError;
use crate::substrate::{InboundPacket, Mid, PeerRef, Substrate};

const COMMAND_CAPACITY: usize = 32;
const INBOUND_CAPACITY: usize = 64;

/// Commands that can be sent to the node
enum NodeCommand {
    /// Get peers known for the service
    GetPeers(oneshot::Sender<Vec<PeerRef>>),
    /// Get our listen addresses
    ListenAddrs(oneshot::Sender<Vec<String>>),
    /// Dial a peer
    Dial(Multiaddr),
    /// Sign and send an overlay payload
    Transmit {
        peer_id: PeerId,
        protocol_id: u8,
        payload: Vec<u8>,
    },
    /// Stop the node
    Stop,
}

/// A P2P network node, not yet started
pub struct P2PNode {
    /// Local keypair
    local_key: identity::Keypair,
    /// Our peer ID
    local_peer_id: PeerId,
    config: NetworkConfig,
}

impl P2PNode {
    /// Create a node with a fresh ed25519 identity
    pub fn new(config: NetworkConfig) -> Self {
        let local_key = identity::Keypair::generate_ed25519();
        let local_peer_id = PeerId::from(local_key.public());

        Self {
            local_key,
            local_peer_id,
            config,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    pub fn mid(&self) -> Mid {
        Mid::from(self.local_peer_id)
    }

    /// Start the swarm. Returns the control handle and the stream of
    /// verified inbound packets.
    pub fn start(self) -> Result<(NodeHandle, mpsc::Receiver<InboundPacket>), NetworkError> {
        let Self {
            local_key,
            local_peer_id,
            config,
        } = self;
        let protocol = config.protocol()?;

        let bootstrap = config
            .bootstrap_peers
            .iter()
            .map(|addr| {
                addr.parse::<Multiaddr>()
                    .map_err(|e| NetworkError::InvalidAddress(format!("{}: {}", addr, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Create transport
        let transport = tcp::tokio::Transport::new(tcp::Config::default().nodelay(true))
            .upgrade(Version::V1)
            .authenticate(
                noise::Config::new(&local_key)
                    .map_err(|e| NetworkError::StartFailed(e.to_string()))?,
            )
            .multiplex(yamux::Config::default())
            .boxed();

        let behaviour = NodeBehaviour::new(
            local_peer_id,
            local_key.public(),
            protocol.clone(),
            config.enable_mdns,
        )?;

        let mut swarm = Swarm::new(
            transport,
            behaviour,
            local_peer_id,
            libp2p::swarm::Config::with_tokio_executor()
                .with_idle_connection_timeout(config.idle_timeout),
        );

        swarm
            .listen_on(config.listen_multiaddr())
            .map_err(|e| NetworkError::StartFailed(e.to_string()))?;

        for addr in bootstrap {
            info!("Dialing bootstrap peer {addr}");
            if let Err(e) = swarm.dial(addr) {
                warn!("Failed to dial bootstrap peer: {e}");
            }
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (packet_tx, packet_rx) = mpsc::channel(INBOUND_CAPACITY);

        let event_loop = EventLoop {
            swarm,
            local_key,
            protocol,
            commands: cmd_rx,
            packets: packet_tx,
            connections: HashMap::new(),
            service_peers: HashMap::new(),
            listen_addrs: Vec::new(),
        };
        tokio::spawn(event_loop.run());

        info!("P2P node started with peer ID: {}", local_peer_id);
        Ok((
            NodeHandle {
                cmd_tx,
                local: Mid::from(local_peer_id),
            },
            packet_rx,
        ))
    }
}

/// Control handle of a running node; the overlay's [`Substrate`]
#[derive(Clone)]
pub struct NodeHandle {
    cmd_tx: mpsc::Sender<NodeCommand>,
    local: Mid,
}

impl NodeHandle {
    /// Dial a peer by multiaddr
    pub async fn dial(&self, address: &str) -> Result<(), NetworkError> {
        let addr = address
            .parse::<Multiaddr>()
            .map_err(|e| NetworkError::InvalidAddress(format!("{}: {}", address, e)))?;
        self.command(NodeCommand::Dial(addr)).await
    }

    /// Addresses the swarm is listening on
    pub async fn listen_addrs(&self) -> Result<Vec<String>, NetworkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(NodeCommand::ListenAddrs(reply_tx)).await?;
        reply_rx.await.map_err(|_| NetworkError::NotRunning)
    }

    /// Stop the node
    pub async fn stop(&self) -> Result<(), NetworkError> {
        self.command(NodeCommand::Stop).await
    }

    async fn command(&self, cmd: NodeCommand) -> Result<(), NetworkError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| NetworkError::NotRunning)
    }
}

#[async_trait]
impl Substrate for NodeHandle {
    fn local_identifier(&self) -> Mid {
        self.local.clone()
    }

    async fn current_peers(&self) -> Vec<PeerRef> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command(NodeCommand::GetPeers(reply_tx)).await.is_ok() {
            if let Ok(peers) = reply_rx.await {
                return peers;
            }
        }
        Vec::new()
    }

    async fn transmit(
        &self,
        to: &PeerRef,
        protocol_id: u8,
        payload: Vec<u8>,
    ) -> Result<(), NetworkError> {
        let peer_id =
            PeerId::from_bytes(to.identifier.as_bytes()).map_err(|_| NetworkError::InvalidPeer)?;
        self.command(NodeCommand::Transmit {
            peer_id,
            protocol_id,
            payload,
        })
        .await
    }
}

/// State owned by the swarm task
struct EventLoop {
    swarm: Swarm<NodeBehaviour>,
    local_key: identity::Keypair,
    protocol: StreamProtocol,
    commands: mpsc::Receiver<NodeCommand>,
    packets: mpsc::Sender<InboundPacket>,
    /// Remote address of each connected peer
    connections: HashMap<PeerId, Multiaddr>,
    /// Connected peers that speak the service protocol
    service_peers: HashMap<PeerId, Multiaddr>,
    listen_addrs: Vec<Multiaddr>,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.swarm.select_next_some() => self.handle_swarm_event(event),
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(NodeCommand::Stop) | None => {
                            info!("Stopping P2P node");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
            }
        }
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<BehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!("Listening on {address}");
                self.listen_addrs.push(address);
            }
            SwarmEvent::ConnectionEstablished {
                peer_id, endpoint, ..
            } => {
                info!("Connected to peer: {peer_id}");
                self.connections
                    .insert(peer_id, endpoint.get_remote_address().clone());
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established,
                ..
            } => {
                info!("Disconnected from peer: {peer_id}");
                if num_established == 0 {
                    self.connections.remove(&peer_id);
                    if self.service_peers.remove(&peer_id).is_some() {
                        info!("Peer {peer_id} left the service");
                    }
                }
            }
            SwarmEvent::IncomingConnectionError { error, .. } => {
                warn!("Incoming connection error: {error}");
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                warn!("Outgoing connection error to {peer_id:?}: {error}");
            }
            SwarmEvent::Behaviour(BehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => self.on_identified(peer_id, info),
            SwarmEvent::Behaviour(BehaviourEvent::Mdns(mdns::Event::Discovered(peers))) => {
                for (peer_id, addr) in peers {
                    if self.swarm.is_connected(&peer_id) {
                        continue;
                    }
                    info!("mDNS discovered peer: {peer_id} at {addr}");
                    if let Err(e) = self.swarm.dial(addr) {
                        debug!("Failed to dial {peer_id}: {e}");
                    }
                }
            }
            SwarmEvent::Behaviour(BehaviourEvent::Mdns(mdns::Event::Expired(peers))) => {
                for (peer_id, _) in peers {
                    debug!("mDNS peer expired: {peer_id}");
                }
            }
            SwarmEvent::Behaviour(BehaviourEvent::Overlay(event)) => self.on_overlay_event(event),
            SwarmEvent::Behaviour(BehaviourEvent::Ping(event)) => {
                debug!("Ping: {:?}", event);
            }
            _ => {}
        }
    }

    /// Track whether an identified peer belongs to our service
    fn on_identified(&mut self, peer_id: PeerId, info: identify::Info) {
        if !info.protocols.contains(&self.protocol) {
            debug!("Peer {peer_id} does not speak {}", self.protocol);
            self.service_peers.remove(&peer_id);
            return;
        }

        let address = self
            .connections
            .get(&peer_id)
            .or_else(|| info.listen_addrs.first())
            .cloned();
        let Some(address) = address else {
            return;
        };

        if self.service_peers.insert(peer_id, address).is_none() {
            info!("Peer {peer_id} joined service {}", self.protocol);
        }
    }

    fn on_overlay_event(&mut self, event: OverlayEvent) {
        match event {
            request_response::Event::Message { peer, message, .. } => match message {
                request_response::Message::Request {
                    request, channel, ..
                } => {
                    self.acknowledge(peer, channel);
                    self.deliver(peer, request);
                }
                request_response::Message::Response { .. } => {
                    debug!("Received packet ack from {peer}");
                }
            },
            request_response::Event::OutboundFailure {
                peer,
                request_id,
                error,
                ..
            } => {
                error!("Outbound packet failure to {peer} (req {request_id}): {error}");
            }
            request_response::Event::InboundFailure { peer, error, .. } => {
                warn!("Inbound packet failure from {peer}: {error}");
            }
            request_response::Event::ResponseSent { .. } => {}
        }
    }

    fn acknowledge(&mut self, peer: PeerId, channel: ResponseChannel<PacketAck>) {
        if self
            .swarm
            .behaviour_mut()
            .overlay
            .send_response(channel, PacketAck)
            .is_err()
        {
            warn!("Failed to acknowledge packet from {peer}");
        }
    }

    /// Verify a packet and pass it to the overlay. Bad packets stop here.
    fn deliver(&mut self, peer: PeerId, packet: SignedPacket) {
        if let Err(e) = packet.verify(&peer) {
            warn!("Dropping packet from {peer}: {e}");
            return;
        }

        let address = self
            .service_peers
            .get(&peer)
            .or_else(|| self.connections.get(&peer))
            .map(|addr| addr.to_string())
            .unwrap_or_default();

        let inbound = InboundPacket {
            sender: PeerRef {
                identifier: Mid::from(peer),
                address,
            },
            protocol_id: packet.protocol_id,
            payload: packet.payload,
        };

        match self.packets.try_send(inbound) {
            Ok(()) => debug!("Delivered packet from {peer}"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Inbound queue full, dropping packet from {peer}");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("No overlay attached, dropping packet from {peer}");
            }
        }
    }

    fn handle_command(&mut self, cmd: NodeCommand) {
        match cmd {
            NodeCommand::GetPeers(reply) => {
                let mut peers: Vec<PeerRef> = self
                    .service_peers
                    .iter()
                    .map(|(peer_id, addr)| PeerRef {
                        identifier: Mid::from(*peer_id),
                        address: addr.to_string(),
                    })
                    .collect();
                peers.sort_by(|a, b| a.identifier.as_bytes().cmp(b.identifier.as_bytes()));
                let _ = reply.send(peers);
            }
            NodeCommand::ListenAddrs(reply) => {
                let _ = reply.send(self.listen_addrs.iter().map(|a| a.to_string()).collect());
            }
            NodeCommand::Dial(addr) => {
                if let Err(e) = self.swarm.dial(addr) {
                    warn!("Failed to dial: {e}");
                }
            }
            NodeCommand::Transmit {
                peer_id,
                protocol_id,
                payload,
            } => match SignedPacket::seal(&self.local_key, protocol_id, payload) {
                Ok(packet) => {
                    let request_id = self
                        .swarm
                        .behaviour_mut()
                        .overlay
                        .send_request(&peer_id, packet);
                    debug!("Sent packet {request_id} to {peer_id}");
                }
                Err(e) => error!("Failed to seal packet for {peer_id}: {e}"),
            },
            NodeCommand::Stop => {}
        }
    }
}
