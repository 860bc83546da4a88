//! Network module: the libp2p substrate behind the overlay
//!
//! Provides:
//! - Encrypted transport (TCP + Noise + Yamux)
//! - Service scoping via identify (only peers speaking our overlay protocol)
//! - Signed, length-prefixed overlay packets over request/response
//! - Optional mDNS discovery

mod behaviour;
mod codec;
mod config;
mod error;
mod node;
pub mod packet;

pub use codec::{OverlayCodec, PacketAck, MAX_FRAME_LEN};
pub use config::{NetworkConfig, DEFAULT_SERVICE_ID};
pub use error::NetworkError;
pub use node::{NodeHandle, P2PNode};

#[cfg(test)]
mod tests;
