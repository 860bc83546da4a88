//! Combined network behaviour of an overlay node

use std::time::Duration;

use libp2p::{
    identify, mdns, ping,
    request_response::{self, ProtocolSupport},
    swarm::{behaviour::toggle::Toggle, NetworkBehaviour},
    PeerId, StreamProtocol,
};

use crate::network::codec::{OverlayBehaviour, OverlayEvent};
use crate::network::NetworkError;

/// Combined network behaviour for our P2P node
#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "BehaviourEvent")]
pub struct NodeBehaviour {
    /// Signed overlay packets
    pub overlay: OverlayBehaviour,

    /// Learns which peers speak the service protocol
    pub identify: identify::Behaviour,

    /// Ping for connection keepalive
    pub ping: ping::Behaviour,

    /// mDNS for local network peer discovery
    pub mdns: Toggle<mdns::tokio::Behaviour>,
}

/// Events from our combined behaviour
#[derive(Debug)]
pub enum BehaviourEvent {
    Overlay(OverlayEvent),
    Identify(identify::Event),
    Ping(ping::Event),
    Mdns(mdns::Event),
}

impl From<OverlayEvent> for BehaviourEvent {
    fn from(event: OverlayEvent) -> Self {
        BehaviourEvent::Overlay(event)
    }
}

impl From<identify::Event> for BehaviourEvent {
    fn from(event: identify::Event) -> Self {
        BehaviourEvent::Identify(event)
    }
}

impl From<ping::Event> for BehaviourEvent {
    fn from(event: ping::Event) -> Self {
        BehaviourEvent::Ping(event)
    }
}

impl From<mdns::Event> for BehaviourEvent {
    fn from(event: mdns::Event) -> Self {
        BehaviourEvent::Mdns(event)
    }
}

impl NodeBehaviour {
    pub fn new(
        local_peer_id: PeerId,
        local_public_key: libp2p::identity::PublicKey,
        protocol: StreamProtocol,
        enable_mdns: bool,
    ) -> Result<Self, NetworkError> {
        let overlay = request_response::Behaviour::new(
            vec![(protocol, ProtocolSupport::Full)],
            request_response::Config::default().with_request_timeout(Duration::from_secs(30)),
        );

        let identify = identify::Behaviour::new(identify::Config::new(
            "/peermsg/id/1.0.0".to_string(),
            local_public_key,
        ));

        let ping = ping::Behaviour::new(ping::Config::new().with_interval(Duration::from_secs(15)));

        let mdns = if enable_mdns {
            Some(
                mdns::tokio::Behaviour::new(mdns::Config::default(), local_peer_id)
                    .map_err(|e| NetworkError::StartFailed(format!("mDNS: {}", e)))?,
            )
        } else {
            None
        };

        Ok(Self {
            overlay,
            identify,
            ping,
            mdns: Toggle::from(mdns),
        })
    }
}
