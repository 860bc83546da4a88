//! PeerMsg node
//!
//! Starts a libp2p node, runs the messaging overlay on it and serves the
//! HTTP control surface.

use std::error::Error;
use std::time::Duration;

use clap::Parser;
use peermsg_core::{
    build_router, init_tracing, MessageOverlay, NetworkConfig, OverlayConfig, OverlayMode,
    OverlayRuntime, P2PNode,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "peermsg-node")]
#[command(about = "Peer-to-peer messaging overlay node")]
struct Cli {
    /// HTTP control surface bind address
    #[arg(long, env = "PEERMSG_HTTP_HOST", default_value = "127.0.0.1")]
    http_host: String,

    #[arg(long, env = "PEERMSG_HTTP_PORT", default_value_t = 13310)]
    http_port: u16,

    /// libp2p TCP port (0 picks a free one)
    #[arg(long, env = "PEERMSG_LISTEN_PORT", default_value_t = 0)]
    listen_port: u16,

    /// Only peers with the same service id are addressable
    #[arg(long, env = "PEERMSG_SERVICE_ID", default_value = peermsg_core::network::DEFAULT_SERVICE_ID)]
    service_id: String,

    /// text or clock
    #[arg(long, env = "PEERMSG_MODE", default_value_t = OverlayMode::Text)]
    mode: OverlayMode,

    /// Multiaddr to dial at start (repeatable)
    #[arg(long = "bootstrap")]
    bootstrap: Vec<String>,

    /// Message sent once to every known peer after start-up (text mode)
    #[arg(long)]
    greeting: Option<String>,

    /// Seconds to wait for peers before sending the greeting
    #[arg(long, default_value_t = 3)]
    greeting_delay: u64,

    #[arg(long, default_value_t = false)]
    no_mdns: bool,

    /// tracing filter directive (RUST_LOG overrides)
    #[arg(long, default_value = "info,peermsg_core=info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let network_config = NetworkConfig {
        listen_port: cli.listen_port,
        enable_mdns: !cli.no_mdns,
        bootstrap_peers: cli.bootstrap.clone(),
        service_id: cli.service_id.clone(),
        ..NetworkConfig::default()
    };

    let node = P2PNode::new(network_config);
    let mid = node.mid();
    let (node_handle, packets) = node.start()?;
    println!("mid_b64: {}", mid);

    let overlay_config = OverlayConfig {
        mode: cli.mode,
        greeting: cli.greeting.clone(),
        ..OverlayConfig::default()
    };
    if overlay_config.greeting.is_some() && overlay_config.mode == OverlayMode::Text {
        // Give discovery a moment so the greeting has someone to reach
        tokio::time::sleep(Duration::from_secs(cli.greeting_delay)).await;
    }

    let overlay = MessageOverlay::new(node_handle.clone(), overlay_config);
    let (overlay_handle, overlay_task) = OverlayRuntime::spawn(overlay, packets);

    let app = build_router(overlay_handle.clone());
    let addr = format!("{}:{}", cli.http_host, cli.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP control surface on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = overlay_handle.stop().await {
        warn!("Overlay already stopped: {e}");
    }
    let _ = overlay_task.await;
    if let Err(e) = node_handle.stop().await {
        warn!("Node already stopped: {e}");
    }

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
