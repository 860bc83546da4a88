//! The overlay controller
//!
//! Owns the inbox and, in clock mode, the bootstrap state. All methods run to
//! completion; the only suspension points are calls into the substrate.

use tracing::{debug, error, info, warn};

use crate::overlay::bootstrap::{Bootstrap, BootstrapPhase, TickAction};
use crate::overlay::config::{OverlayConfig, OverlayMode};
use crate::overlay::directory::PeerDirectory;
use crate::overlay::inbox::{Inbox, InboxEntry};
use crate::overlay::message::{Message, SyncMessage, CLOCK_PROTOCOL_ID, MESSAGE_PROTOCOL_ID};
use crate::substrate::{InboundPacket, Mid, PeerRef, Substrate};

pub struct MessageOverlay<S> {
    substrate: S,
    config: OverlayConfig,
    inbox: Inbox,
    bootstrap: Option<Bootstrap>,
}

impl<S: Substrate> MessageOverlay<S> {
    pub fn new(substrate: S, config: OverlayConfig) -> Self {
        let bootstrap = match config.mode {
            OverlayMode::Clock => Some(Bootstrap::new()),
            OverlayMode::Text => None,
        };
        Self {
            substrate,
            config,
            inbox: Inbox::new(),
            bootstrap,
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn substrate(&self) -> &S {
        &self.substrate
    }

    pub fn local_identifier(&self) -> Mid {
        self.substrate.local_identifier()
    }

    /// Protocol id this overlay handles inbound
    pub fn registered_protocol(&self) -> u8 {
        match self.config.mode {
            OverlayMode::Text => MESSAGE_PROTOCOL_ID,
            OverlayMode::Clock => CLOCK_PROTOCOL_ID,
        }
    }

    pub fn directory(&self) -> PeerDirectory<'_, S> {
        PeerDirectory::new(&self.substrate)
    }

    /// Send `text` to the peer whose rendered identifier is `target`.
    ///
    /// Returns false when no known peer matches; nothing is transmitted then.
    pub async fn send(&self, target: &str, text: &str) -> bool {
        if self.config.mode != OverlayMode::Text {
            warn!("Text messaging is not active in {} mode", self.config.mode);
            return false;
        }

        let Some(peer) = self.directory().find(target).await else {
            warn!("No known peer with identifier {}", target);
            return false;
        };

        let message = Message::new(text);
        self.transmit(&peer, MESSAGE_PROTOCOL_ID, message.encode()).await;
        info!("Sent message to {}", peer.identifier);
        true
    }

    /// Store a decoded message. Never rejects; returns the new inbox id.
    pub fn on_receive(&mut self, sender: &PeerRef, message: Message) -> String {
        let id = self
            .inbox
            .append(sender.identifier.clone(), message.to_text_lossy());
        info!("Received message {} from {}", id, sender.identifier);
        id
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let removed = self.inbox.delete(id);
        if !removed {
            debug!("No inbox entry with id {}", id);
        }
        removed
    }

    pub fn list_inbox(&self) -> Vec<InboxEntry> {
        self.inbox.list()
    }

    pub async fn list_peers(&self) -> Vec<String> {
        self.directory().identifiers().await
    }

    /// Current Lamport counter (clock mode only)
    pub fn clock(&self) -> Option<u32> {
        self.bootstrap.as_ref().map(Bootstrap::clock)
    }

    pub fn bootstrap_phase(&self) -> Option<BootstrapPhase> {
        self.bootstrap.as_ref().map(Bootstrap::phase)
    }

    /// Dispatch an inbound packet to the registered handler. Payloads that
    /// fail to decode are dropped here and never reach the handler.
    pub async fn handle_packet(&mut self, packet: InboundPacket) {
        let InboundPacket {
            sender,
            protocol_id,
            payload,
        } = packet;

        if protocol_id != self.registered_protocol() {
            debug!(
                "No handler for protocol {} in {} mode, dropping packet from {}",
                protocol_id, self.config.mode, sender.identifier
            );
            return;
        }

        match protocol_id {
            MESSAGE_PROTOCOL_ID => match Message::decode(&payload) {
                Ok(message) => {
                    self.on_receive(&sender, message);
                }
                Err(e) => warn!("Dropping message from {}: {}", sender.identifier, e),
            },
            CLOCK_PROTOCOL_ID => match SyncMessage::decode(&payload) {
                Ok(sync) => {
                    self.on_sync(&sender, sync).await;
                }
                Err(e) => warn!("Dropping sync from {}: {}", sender.identifier, e),
            },
            _ => {}
        }
    }

    /// Merge a peer's counter and reply with the new value
    pub async fn on_sync(&mut self, sender: &PeerRef, sync: SyncMessage) -> Option<u32> {
        let bootstrap = self.bootstrap.as_mut()?;
        let Some(clock) = bootstrap.merge(sync.clock) else {
            warn!(
                "Counter overflow merging {} from {}, not replying",
                sync.clock, sender.identifier
            );
            return None;
        };

        info!("{} current clock: {}", self.substrate.local_identifier(), clock);
        self.transmit(sender, CLOCK_PROTOCOL_ID, SyncMessage::new(clock).encode())
            .await;
        Some(clock)
    }

    /// Handle one bootstrap timer tick. Returns the phase after the tick, or
    /// `None` when the overlay has no bootstrap state machine.
    pub async fn on_tick(&mut self) -> Option<BootstrapPhase> {
        let action = self.bootstrap.as_mut()?.tick();

        match action {
            TickAction::Broadcast(clock) => {
                let peers = self.directory().snapshot().await;
                debug!("Bootstrapping: sending clock {} to {} peers", clock, peers.len());
                let payload = SyncMessage::new(clock).encode();
                for peer in &peers {
                    self.transmit(peer, CLOCK_PROTOCOL_ID, payload.clone()).await;
                }
                Some(BootstrapPhase::Bootstrapping)
            }
            TickAction::Cancel => Some(BootstrapPhase::Steady),
        }
    }

    /// Send `greeting` once to every currently known peer. Returns how many
    /// peers it was handed off to.
    pub async fn greet(&self, greeting: &str) -> usize {
        let peers = self.directory().snapshot().await;
        let payload = Message::new(greeting).encode();
        for peer in &peers {
            self.transmit(peer, MESSAGE_PROTOCOL_ID, payload.clone()).await;
        }
        info!("Greeted {} peers", peers.len());
        peers.len()
    }

    /// Hand off to the substrate. Failures are logged, never retried.
    async fn transmit(&self, peer: &PeerRef, protocol_id: u8, payload: Vec<u8>) {
        if let Err(e) = self.substrate.transmit(peer, protocol_id, payload).await {
            error!("Failed to transmit to {}: {}", peer.identifier, e);
        }
    }
}
