//! Overlay error types.

use libp2p::PeerId;

/// Errors surfaced by overlay operations.
///
/// The display text is what callers of the control channel eventually see,
/// so variants render the underlying cause without extra decoration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    /// Dialing a peer failed.
    #[error("{0}")]
    Dial(String),
    /// Opening an outbound stream failed.
    #[error("failed to open stream to {peer}: {reason}")]
    OpenStream { peer: PeerId, reason: String },
    /// A stream handler is already registered for this protocol.
    #[error("stream protocol already registered: {0}")]
    ProtocolTaken(String),
    /// The peer never reported its protocols.
    #[error("no protocol information for peer {0}")]
    UnknownPeer(PeerId),
    /// Joining or subscribing to a topic failed.
    #[error("{0}")]
    Topic(String),
    /// Publishing to a topic failed.
    #[error("{0}")]
    Publish(String),
    /// The overlay event loop is gone.
    #[error("overlay node has shut down")]
    Shutdown,
}

/// Errors returned by [`OverlaySubscription::next`](crate::OverlaySubscription::next).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// Messages were dropped because the subscriber fell behind.
    ///
    /// Transient: the subscription remains usable.
    #[error("subscription lagged, {0} message(s) dropped")]
    Lagged(u64),
    /// The subscription has been closed and will never yield again.
    #[error("subscription closed")]
    Closed,
}

impl SubscriptionError {
    /// Whether the subscription can still yield messages after this error.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
