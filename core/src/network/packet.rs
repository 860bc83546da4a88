//! Signed packet frame
//!
//! Every overlay payload travels inside a [`SignedPacket`]. The signature
//! covers `[version, protocol_id, payload...]` and the embedded public key
//! must belong to the peer the packet arrived from.

use libp2p::identity::{Keypair, PublicKey};
use libp2p::PeerId;
use serde::{Deserialize, Serialize};

/// Current frame version
pub const PACKET_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedPacket {
    pub version: u8,
    pub protocol_id: u8,
    #[serde(with = "crate::util::serde_hex")]
    pub payload: Vec<u8>,
    /// Protobuf-encoded public key of the sender
    #[serde(with = "crate::util::serde_hex")]
    pub public_key: Vec<u8>,
    #[serde(with = "crate::util::serde_hex")]
    pub signature: Vec<u8>,
}

impl SignedPacket {
    /// Sign `payload` with our keypair
    pub fn seal(key: &Keypair, protocol_id: u8, payload: Vec<u8>) -> Result<Self, PacketError> {
        let signature = key
            .sign(&signable(PACKET_VERSION, protocol_id, &payload))
            .map_err(|e| PacketError::Signing(e.to_string()))?;

        Ok(Self {
            version: PACKET_VERSION,
            protocol_id,
            payload,
            public_key: key.public().encode_protobuf(),
            signature,
        })
    }

    /// Check the packet was signed by `sender`
    pub fn verify(&self, sender: &PeerId) -> Result<(), PacketError> {
        if self.version != PACKET_VERSION {
            return Err(PacketError::UnsupportedVersion(self.version));
        }

        let public_key = PublicKey::try_decode_protobuf(&self.public_key)
            .map_err(|_| PacketError::InvalidKey)?;
        if &public_key.to_peer_id() != sender {
            return Err(PacketError::SenderMismatch);
        }

        let message = signable(self.version, self.protocol_id, &self.payload);
        if !public_key.verify(&message, &self.signature) {
            return Err(PacketError::InvalidSignature);
        }
        Ok(())
    }

    /// Serialize to bytes for transport
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Deserialize from transport bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        serde_json::from_slice(bytes).map_err(|_| PacketError::InvalidFormat)
    }
}

fn signable(version: u8, protocol_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + payload.len());
    buf.push(version);
    buf.push(protocol_id);
    buf.extend_from_slice(payload);
    buf
}

/// Packet errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("Invalid packet format")]
    InvalidFormat,
    #[error("Unsupported packet version {0}")]
    UnsupportedVersion(u8),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("Invalid public key")]
    InvalidKey,
    #[error("Public key does not belong to sender")]
    SenderMismatch,
    #[error("Invalid signature")]
    InvalidSignature,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_verify() {
        let key = Keypair::generate_ed25519();
        let packet = SignedPacket::seal(&key, 1, b"payload".to_vec()).unwrap();

        let restored = SignedPacket::from_bytes(&packet.to_bytes()).unwrap();
        assert_eq!(restored, packet);
        assert!(restored.verify(&key.public().to_peer_id()).is_ok());
    }

    #[test]
    fn test_wrong_sender_is_rejected() {
        let key = Keypair::generate_ed25519();
        let other = Keypair::generate_ed25519();
        let packet = SignedPacket::seal(&key, 1, b"payload".to_vec()).unwrap();

        assert_eq!(
            packet.verify(&other.public().to_peer_id()),
            Err(PacketError::SenderMismatch)
        );
    }

    #[test]
    fn test_tampered_packet_is_rejected() {
        let key = Keypair::generate_ed25519();
        let sender = key.public().to_peer_id();

        let mut packet = SignedPacket::seal(&key, 1, b"payload".to_vec()).unwrap();
        packet.payload[0] ^= 0xff;
        assert_eq!(packet.verify(&sender), Err(PacketError::InvalidSignature));

        let mut packet = SignedPacket::seal(&key, 1, b"payload".to_vec()).unwrap();
        packet.protocol_id = 2;
        assert_eq!(packet.verify(&sender), Err(PacketError::InvalidSignature));

        let mut packet = SignedPacket::seal(&key, 1, b"payload".to_vec()).unwrap();
        packet.public_key = vec![1, 2, 3];
        assert_eq!(packet.verify(&sender), Err(PacketError::InvalidKey));
    }

    #[test]
    fn test_garbage_frame_is_invalid() {
        assert_eq!(
            SignedPacket::from_bytes(b"not json"),
            Err(PacketError::InvalidFormat)
        );
    }
}
