//! In-process substrate
//!
//! Records every transmission and, when attached to a [`MemoryNetwork`],
//! delivers it to the overlay registered under the target identifier. Used by
//! the test suites and for running several overlays inside one process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use crate::network::NetworkError;
use crate::substrate::{InboundPacket, Mid, PeerRef, Substrate};

const INBOUND_CAPACITY: usize = 64;

/// A payload handed to the substrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub to: PeerRef,
    pub protocol_id: u8,
    pub payload: Vec<u8>,
}

/// Routes transmissions between in-memory substrates
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    routes: Arc<RwLock<HashMap<Mid, mpsc::Sender<InboundPacket>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant. The receiver yields packets addressed to it.
    pub async fn join(&self, mid: Mid) -> (MemorySubstrate, mpsc::Receiver<InboundPacket>) {
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        self.routes.write().await.insert(mid.clone(), tx);

        let mut substrate = MemorySubstrate::new(mid);
        substrate.network = Some(self.clone());
        (substrate, rx)
    }

    async fn deliver(&self, to: &Mid, packet: InboundPacket) -> Result<(), NetworkError> {
        let routes = self.routes.read().await;
        let route = routes.get(to).ok_or(NetworkError::Unreachable)?;
        route
            .try_send(packet)
            .map_err(|_| NetworkError::Unreachable)
    }
}

#[derive(Clone)]
pub struct MemorySubstrate {
    local: PeerRef,
    peers: Arc<RwLock<Vec<PeerRef>>>,
    sent: Arc<Mutex<Vec<Transmission>>>,
    network: Option<MemoryNetwork>,
}

impl MemorySubstrate {
    /// A standalone substrate that only records transmissions
    pub fn new(local: Mid) -> Self {
        Self {
            local: memory_peer(local),
            peers: Arc::new(RwLock::new(Vec::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            network: None,
        }
    }

    pub fn local_peer(&self) -> PeerRef {
        self.local.clone()
    }

    pub async fn add_peer(&self, peer: PeerRef) {
        let mut peers = self.peers.write().await;
        if !peers.iter().any(|p| p.identifier == peer.identifier) {
            peers.push(peer);
        }
    }

    pub async fn remove_peer(&self, mid: &Mid) {
        self.peers.write().await.retain(|p| &p.identifier != mid);
    }

    pub async fn transmissions(&self) -> Vec<Transmission> {
        self.sent.lock().await.clone()
    }
}

/// The `PeerRef` an in-memory participant is known by
pub fn memory_peer(mid: Mid) -> PeerRef {
    let address = format!("memory/{}", mid);
    PeerRef {
        identifier: mid,
        address,
    }
}

#[async_trait]
impl Substrate for MemorySubstrate {
    fn local_identifier(&self) -> Mid {
        self.local.identifier.clone()
    }

    async fn current_peers(&self) -> Vec<PeerRef> {
        self.peers.read().await.clone()
    }

    async fn transmit(
        &self,
        to: &PeerRef,
        protocol_id: u8,
        payload: Vec<u8>,
    ) -> Result<(), NetworkError> {
        self.sent.lock().await.push(Transmission {
            to: to.clone(),
            protocol_id,
            payload: payload.clone(),
        });
        debug!("memory transmit to {} (protocol {})", to.address, protocol_id);

        match &self.network {
            Some(network) => {
                let packet = InboundPacket {
                    sender: self.local.clone(),
                    protocol_id,
                    payload,
                };
                network.deliver(&to.identifier, packet).await
            }
            None => Ok(()),
        }
    }
}
