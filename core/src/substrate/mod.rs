//! What the overlay needs from the networking substrate
//!
//! The overlay never talks to libp2p directly. It sees peers as [`PeerRef`]s,
//! hands payloads to [`Substrate::transmit`] and receives already
//! authenticated [`InboundPacket`]s over a channel.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use libp2p::PeerId;
use serde::{Serialize, Serializer};

use crate::network::NetworkError;

/// Binary identifier of a peer, rendered as standard base64 outside the core
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mid(Vec<u8>);

impl Mid {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        BASE64.decode(encoded).map(Self)
    }
}

impl fmt::Display for Mid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl Serialize for Mid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl From<PeerId> for Mid {
    fn from(peer_id: PeerId) -> Self {
        Self(peer_id.to_bytes())
    }
}

/// A remote participant as reported by the substrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRef {
    pub identifier: Mid,
    /// Opaque to the overlay
    pub address: String,
}

/// An authenticated payload delivered to the overlay
#[derive(Debug, Clone)]
pub struct InboundPacket {
    pub sender: PeerRef,
    pub protocol_id: u8,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait Substrate: Send + Sync + 'static {
    /// Our own identifier, stable for the process lifetime
    fn local_identifier(&self) -> Mid;

    /// Peers currently known for this overlay's service
    async fn current_peers(&self) -> Vec<PeerRef>;

    /// Sign, frame and hand a payload to the transport. Returns once handed
    /// off; delivery failures are reported by the substrate itself.
    async fn transmit(
        &self,
        to: &PeerRef,
        protocol_id: u8,
        payload: Vec<u8>,
    ) -> Result<(), NetworkError>;
}
