//! Tests for network module

use super::*;
use crate::substrate::{PeerRef, Substrate};
use std::time::Duration;
use tokio::time::timeout;

#[test]
fn test_node_creation() {
    let node = P2PNode::new(NetworkConfig::default());

    // mid is the multihash form of the peer id
    assert_eq!(node.mid().as_bytes(), node.peer_id().to_bytes().as_slice());
    assert!(!node.mid().to_base64().is_empty());
}

#[test]
fn test_nodes_get_distinct_identities() {
    let a = P2PNode::new(NetworkConfig::local_only());
    let b = P2PNode::new(NetworkConfig::local_only());
    assert_ne!(a.peer_id(), b.peer_id());
}

#[tokio::test]
async fn test_node_start_stop() {
    let node = P2PNode::new(NetworkConfig::local_only());
    let mid = node.mid();

    let (handle, _packets) = node.start().expect("Failed to start node");
    assert_eq!(handle.local_identifier(), mid);

    let addrs = timeout(Duration::from_secs(5), async {
        loop {
            let addrs = handle.listen_addrs().await.expect("node running");
            if !addrs.is_empty() {
                break addrs;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("no listen address");
    assert!(addrs.iter().all(|a| a.starts_with("/ip4/127.0.0.1/tcp/")));

    // Nobody connected yet
    assert!(handle.current_peers().await.is_empty());

    handle.stop().await.expect("Failed to stop node");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        handle.listen_addrs().await,
        Err(NetworkError::NotRunning)
    ));
    assert!(handle.current_peers().await.is_empty());
}

#[tokio::test]
async fn test_start_rejects_bad_bootstrap_address() {
    let mut config = NetworkConfig::local_only();
    config.bootstrap_peers = vec!["not-a-multiaddr".to_string()];

    let result = P2PNode::new(config).start();
    assert!(matches!(result, Err(NetworkError::InvalidAddress(_))));
}

#[tokio::test]
async fn test_start_rejects_bad_service_id() {
    let mut config = NetworkConfig::local_only();
    config.service_id = String::new();

    let result = P2PNode::new(config).start();
    assert!(matches!(result, Err(NetworkError::InvalidServiceId(_))));
}

#[tokio::test]
async fn test_transmit_rejects_non_peer_identifier() {
    let (handle, _packets) = P2PNode::new(NetworkConfig::local_only())
        .start()
        .expect("Failed to start node");

    let bogus = PeerRef {
        identifier: crate::substrate::Mid::new(vec![1, 2, 3]),
        address: String::new(),
    };
    let result = handle.transmit(&bogus, 1, b"hi".to_vec()).await;
    assert!(matches!(result, Err(NetworkError::InvalidPeer)));

    handle.stop().await.expect("Failed to stop node");
}

#[tokio::test]
async fn test_dial_rejects_bad_address() {
    let (handle, _packets) = P2PNode::new(NetworkConfig::local_only())
        .start()
        .expect("Failed to start node");

    assert!(matches!(
        handle.dial("garbage").await,
        Err(NetworkError::InvalidAddress(_))
    ));
    handle.stop().await.expect("Failed to stop node");
}
