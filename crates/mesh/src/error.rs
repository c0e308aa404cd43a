//! Errors returned by mesh operations.

use meshlink_net_api::OverlayError;

/// Failure of a single command. The display text is what the control
/// channel reports in `error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("invalid peer address: {0}")]
    InvalidPeerAddress(String),
    #[error("invalid peer info: {0}")]
    InvalidPeerInfo(String),
    #[error("connection failed: {0}")]
    ConnectionFailed(OverlayError),
    #[error("invalid peer ID: {0}")]
    InvalidPeerId(String),
    #[error("failed to join topic: {0}")]
    JoinTopic(OverlayError),
    #[error("failed to subscribe to topic: {0}")]
    Subscribe(OverlayError),
    #[error("not subscribed to topic: {0}")]
    NotSubscribed(String),
    /// Publish and disconnect failures are reported as the overlay phrased them.
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error("no listen addresses")]
    NoListenAddress,
    #[error("timeout")]
    Timeout,
}
