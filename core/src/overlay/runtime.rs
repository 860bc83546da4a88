//! Cooperative event loop around a [`MessageOverlay`]
//!
//! One task owns the overlay and serializes every event: bootstrap timer
//! ticks, inbound packets and control commands. Each event is handled to
//! completion before the next one is taken.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::overlay::bootstrap::BootstrapPhase;
use crate::overlay::config::OverlayMode;
use crate::overlay::inbox::InboxEntry;
use crate::overlay::manager::MessageOverlay;
use crate::substrate::{InboundPacket, Substrate};

const COMMAND_CAPACITY: usize = 32;

/// Errors returned through an [`OverlayHandle`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("Overlay runtime has stopped")]
    Stopped,
}

/// Commands that can be sent to the runtime
enum OverlayCommand {
    Send {
        identifier: String,
        text: String,
        reply: oneshot::Sender<bool>,
    },
    ListInbox(oneshot::Sender<Vec<InboxEntry>>),
    ListPeers(oneshot::Sender<Vec<String>>),
    Delete {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    LocalIdentifier(oneshot::Sender<String>),
    Clock(oneshot::Sender<Option<u32>>),
    Stop,
}

pub struct OverlayRuntime<S> {
    overlay: MessageOverlay<S>,
    inbound: mpsc::Receiver<InboundPacket>,
    commands: mpsc::Receiver<OverlayCommand>,
}

impl<S: Substrate> OverlayRuntime<S> {
    /// Spawn the runtime on the current tokio runtime
    pub fn spawn(
        overlay: MessageOverlay<S>,
        inbound: mpsc::Receiver<InboundPacket>,
    ) -> (OverlayHandle, JoinHandle<()>) {
        let (cmd_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let runtime = Self {
            overlay,
            inbound,
            commands,
        };
        let task = tokio::spawn(runtime.run());
        (OverlayHandle { cmd_tx }, task)
    }

    async fn run(mut self) {
        info!(
            "Overlay runtime started for {} ({} mode)",
            self.overlay.local_identifier(),
            self.overlay.config().mode
        );

        if self.overlay.config().mode == OverlayMode::Text {
            if let Some(greeting) = self.overlay.config().greeting.clone() {
                self.overlay.greet(&greeting).await;
            }
        }

        let mut ticker = self.overlay.bootstrap_phase().map(|_| {
            let mut ticker = time::interval(self.overlay.config().bootstrap_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut inbound_open = true;

        loop {
            tokio::select! {
                _ = next_tick(&mut ticker) => {
                    if self.overlay.on_tick().await == Some(BootstrapPhase::Steady) {
                        info!("Bootstrap complete, clock {:?}", self.overlay.clock());
                        ticker = None;
                    }
                }
                packet = self.inbound.recv(), if inbound_open => {
                    match packet {
                        Some(packet) => self.overlay.handle_packet(packet).await,
                        None => {
                            debug!("Inbound packet channel closed");
                            inbound_open = false;
                        }
                    }
                }
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(OverlayCommand::Stop) | None => {
                            info!("Stopping overlay runtime");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: OverlayCommand) {
        match cmd {
            OverlayCommand::Send {
                identifier,
                text,
                reply,
            } => {
                let _ = reply.send(self.overlay.send(&identifier, &text).await);
            }
            OverlayCommand::ListInbox(reply) => {
                let _ = reply.send(self.overlay.list_inbox());
            }
            OverlayCommand::ListPeers(reply) => {
                let _ = reply.send(self.overlay.list_peers().await);
            }
            OverlayCommand::Delete { id, reply } => {
                let _ = reply.send(self.overlay.delete(&id));
            }
            OverlayCommand::LocalIdentifier(reply) => {
                let _ = reply.send(self.overlay.local_identifier().to_base64());
            }
            OverlayCommand::Clock(reply) => {
                let _ = reply.send(self.overlay.clock());
            }
            OverlayCommand::Stop => {}
        }
    }
}

/// Completes on the next tick; never completes once the timer is cancelled
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Cloneable control handle to a running overlay
#[derive(Clone)]
pub struct OverlayHandle {
    cmd_tx: mpsc::Sender<OverlayCommand>,
}

impl OverlayHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> OverlayCommand,
    ) -> Result<T, OverlayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| OverlayError::Stopped)?;
        reply_rx.await.map_err(|_| OverlayError::Stopped)
    }

    pub async fn send(&self, identifier: String, text: String) -> Result<bool, OverlayError> {
        self.request(|reply| OverlayCommand::Send {
            identifier,
            text,
            reply,
        })
        .await
    }

    pub async fn list_inbox(&self) -> Result<Vec<InboxEntry>, OverlayError> {
        self.request(OverlayCommand::ListInbox).await
    }

    pub async fn list_peers(&self) -> Result<Vec<String>, OverlayError> {
        self.request(OverlayCommand::ListPeers).await
    }

    pub async fn delete(&self, id: String) -> Result<bool, OverlayError> {
        self.request(|reply| OverlayCommand::Delete { id, reply }).await
    }

    /// Our base64 identifier
    pub async fn local_identifier(&self) -> Result<String, OverlayError> {
        self.request(OverlayCommand::LocalIdentifier).await
    }

    pub async fn clock(&self) -> Result<Option<u32>, OverlayError> {
        self.request(OverlayCommand::Clock).await
    }

    pub async fn stop(&self) -> Result<(), OverlayError> {
        self.cmd_tx
            .send(OverlayCommand::Stop)
            .await
            .map_err(|_| OverlayError::Stopped)
    }
}
