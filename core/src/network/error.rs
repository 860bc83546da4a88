/// Substrate errors
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Node is not running")]
    NotRunning,
    #[error("Node start failed: {0}")]
    StartFailed(String),
    #[error("Invalid service id: {0}")]
    InvalidServiceId(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Identifier is not a valid peer id")]
    InvalidPeer,
    #[error("Peer unreachable")]
    Unreachable,
}
