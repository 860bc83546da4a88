//! PeerMsg Core Library
//!
//! Peer-to-peer text messaging overlay: messages addressed by peer
//! identifier, an in-memory inbox, and an optional Lamport clock
//! synchronization mode. Runs over libp2p or an in-process substrate.

// Modules
pub mod api;
pub mod logger;
pub mod network;
pub mod overlay;
pub mod substrate;
mod util;

// Re-export logger types
pub use logger::{init_logger, init_tracing, CoreLogger};

// Re-export network types
pub use network::{NetworkConfig, NetworkError, NodeHandle, P2PNode};

// Re-export overlay types
pub use overlay::{
    InboxEntry, Message, MessageOverlay, OverlayConfig, OverlayError, OverlayHandle, OverlayMode,
    OverlayRuntime, SyncMessage,
};

// Re-export substrate types
pub use substrate::{InboundPacket, Mid, PeerRef, Substrate};

// Re-export API types
pub use api::messaging::build_router;
