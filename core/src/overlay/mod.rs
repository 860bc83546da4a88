//! Peer messaging overlay
//!
//! Sends text messages to peers named by identifier, stores received ones in
//! an in-memory inbox, and (in clock mode) runs the Lamport bootstrap.

mod bootstrap;
mod config;
mod directory;
mod inbox;
mod manager;
pub mod message;
mod runtime;

pub use bootstrap::{Bootstrap, BootstrapPhase, LamportClock, TickAction};
pub use config::{OverlayConfig, OverlayMode};
pub use directory::PeerDirectory;
pub use inbox::{Inbox, InboxEntry};
pub use manager::MessageOverlay;
pub use message::{CodecError, Message, SyncMessage};
pub use runtime::{OverlayError, OverlayHandle, OverlayRuntime};
