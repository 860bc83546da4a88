//! Read-only view of the peers known for this overlay

use crate::substrate::{PeerRef, Substrate};

pub struct PeerDirectory<'a, S: ?Sized> {
    substrate: &'a S,
}

impl<'a, S: Substrate + ?Sized> PeerDirectory<'a, S> {
    pub fn new(substrate: &'a S) -> Self {
        Self { substrate }
    }

    pub async fn snapshot(&self) -> Vec<PeerRef> {
        self.substrate.current_peers().await
    }

    /// First peer whose rendered identifier equals `target`.
    ///
    /// Linear scan; peer populations are small.
    pub async fn find(&self, target: &str) -> Option<PeerRef> {
        self.snapshot()
            .await
            .into_iter()
            .find(|peer| peer.identifier.to_base64() == target)
    }

    /// Rendered identifiers of all known peers
    pub async fn identifiers(&self) -> Vec<String> {
        self.snapshot()
            .await
            .iter()
            .map(|peer| peer.identifier.to_base64())
            .collect()
    }
}
