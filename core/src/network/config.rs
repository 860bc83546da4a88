//! Network configuration

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use libp2p::multiaddr::Protocol;
use libp2p::{Multiaddr, StreamProtocol};

use crate::network::NetworkError;

/// Service identifier used when none is configured
pub const DEFAULT_SERVICE_ID: &str = "peermsg";

/// Configuration for the P2P network node
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Interface to listen on
    pub listen_ip: IpAddr,

    /// Port to listen on (0 for random)
    pub listen_port: u16,

    /// Enable mDNS for local peer discovery
    pub enable_mdns: bool,

    /// Peers dialed at start (multiaddrs)
    pub bootstrap_peers: Vec<String>,

    /// Idle connection timeout
    pub idle_timeout: Duration,

    /// Groups participants into one overlay. Only peers speaking the same
    /// service protocol are reported as known peers.
    pub service_id: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: 0, // Random port
            enable_mdns: true,
            bootstrap_peers: Vec::new(),
            idle_timeout: Duration::from_secs(60),
            service_id: DEFAULT_SERVICE_ID.to_string(),
        }
    }
}

impl NetworkConfig {
    /// Loopback only, no mDNS. Peers must be dialed explicitly.
    pub fn local_only() -> Self {
        Self {
            listen_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            enable_mdns: false,
            ..Self::default()
        }
    }

    /// Stream protocol carrying this service's overlay packets
    pub fn protocol(&self) -> Result<StreamProtocol, NetworkError> {
        let id = &self.service_id;
        if id.is_empty() || id.contains('/') || id.chars().any(char::is_whitespace) {
            return Err(NetworkError::InvalidServiceId(id.clone()));
        }
        StreamProtocol::try_from_owned(format!("/peermsg/{}/1.0.0", self.service_id))
            .map_err(|e| NetworkError::InvalidServiceId(e.to_string()))
    }

    pub fn listen_multiaddr(&self) -> Multiaddr {
        Multiaddr::from(self.listen_ip).with(Protocol::Tcp(self.listen_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NetworkConfig::default();
        assert!(config.enable_mdns);
        assert_eq!(config.listen_port, 0);
        assert_eq!(config.service_id, DEFAULT_SERVICE_ID);
        assert_eq!(config.listen_multiaddr().to_string(), "/ip4/0.0.0.0/tcp/0");
    }

    #[test]
    fn test_local_only_config() {
        let config = NetworkConfig::local_only();
        assert!(!config.enable_mdns);
        assert_eq!(config.listen_multiaddr().to_string(), "/ip4/127.0.0.1/tcp/0");
    }

    #[test]
    fn test_protocol_is_scoped_by_service() {
        let config = NetworkConfig {
            service_id: "wallet".to_string(),
            ..NetworkConfig::default()
        };
        assert_eq!(config.protocol().unwrap().as_ref(), "/peermsg/wallet/1.0.0");
    }

    #[test]
    fn test_protocol_rejects_bad_service_ids() {
        for id in ["", "a/b", "two words"] {
            let config = NetworkConfig {
                service_id: id.to_string(),
                ..NetworkConfig::default()
            };
            assert!(matches!(
                config.protocol(),
                Err(NetworkError::InvalidServiceId(_))
            ));
        }
    }
}
