use std::time::Duration;

use peermsg_core::{
    MessageOverlay, NetworkConfig, NodeHandle, OverlayConfig, OverlayHandle, OverlayRuntime,
    P2PNode, Substrate,
};
use tokio::time::{sleep, timeout};

async fn start_node(config: NetworkConfig) -> (NodeHandle, OverlayHandle, String) {
    let node = P2PNode::new(config);
    let (handle, packets) = node.start().expect("node start");

    let addr = timeout(Duration::from_secs(5), async {
        loop {
            if let Some(addr) = handle.listen_addrs().await.expect("running").into_iter().next() {
                break addr;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("listen address");

    let overlay = MessageOverlay::new(handle.clone(), OverlayConfig::default());
    let (overlay_handle, _task) = OverlayRuntime::spawn(overlay, packets);
    (handle, overlay_handle, addr)
}

async fn wait_for_peer(handle: &NodeHandle, mid: &str) {
    timeout(Duration::from_secs(10), async {
        loop {
            let peers = handle.current_peers().await;
            if peers.iter().any(|p| p.identifier.to_base64() == mid) {
                break;
            }
            sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("peer never identified");
}

#[tokio::test]
async fn test_text_message_between_nodes() {
    let _ = tracing_subscriber::fmt().try_init();

    let (node1, overlay1, addr1) = start_node(NetworkConfig::local_only()).await;
    let (node2, overlay2, _) = start_node(NetworkConfig::local_only()).await;
    let mid1 = overlay1.local_identifier().await.unwrap();
    let mid2 = overlay2.local_identifier().await.unwrap();

    node2.dial(&addr1).await.expect("dial");
    wait_for_peer(&node1, &mid2).await;
    wait_for_peer(&node2, &mid1).await;

    assert_eq!(overlay2.list_peers().await.unwrap(), vec![mid1.clone()]);
    assert!(overlay2
        .send(mid1.clone(), "hello over libp2p".to_string())
        .await
        .unwrap());

    let inbox = timeout(Duration::from_secs(10), async {
        loop {
            let inbox = overlay1.list_inbox().await.unwrap();
            if !inbox.is_empty() {
                break inbox;
            }
            sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("message never arrived");

    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].text, "hello over libp2p");
    assert_eq!(inbox[0].sender.to_base64(), mid2);
    assert!(overlay2.list_inbox().await.unwrap().is_empty());

    overlay1.stop().await.unwrap();
    overlay2.stop().await.unwrap();
    node1.stop().await.unwrap();
    node2.stop().await.unwrap();
}

#[tokio::test]
async fn test_other_service_is_not_a_peer() {
    let (node1, overlay1, addr1) = start_node(NetworkConfig::local_only()).await;
    let other = NetworkConfig {
        service_id: "other".to_string(),
        ..NetworkConfig::local_only()
    };
    let (node2, overlay2, _) = start_node(other).await;
    let mid1 = overlay1.local_identifier().await.unwrap();

    node2.dial(&addr1).await.expect("dial");
    // Connected at the transport level, but identify shows a different protocol
    sleep(Duration::from_secs(2)).await;

    assert!(node1.current_peers().await.is_empty());
    assert!(node2.current_peers().await.is_empty());
    assert!(!overlay2.send(mid1, "hi".to_string()).await.unwrap());

    node1.stop().await.unwrap();
    node2.stop().await.unwrap();
}
