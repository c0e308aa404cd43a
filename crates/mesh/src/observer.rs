//! Local sink for inbound traffic.

use libp2p::PeerId;
use tracing::info;

/// Receives messages from topic pumps and direct-stream readers.
///
/// Called from background tasks, so implementations must not block.
pub trait Observer: Send + Sync + 'static {
    /// A message from another node arrived on `topic`.
    fn topic_message(&self, topic: &str, origin: &PeerId, data: &[u8]);

    /// `peer` sent a non-empty line over a direct stream.
    fn direct_message(&self, peer: &PeerId, line: &str);
}

/// Logs inbound traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn topic_message(&self, topic: &str, origin: &PeerId, data: &[u8]) {
        info!(
            target: "meshlink::inbound",
            topic,
            %origin,
            message = %String::from_utf8_lossy(data),
            "Topic message"
        );
    }

    fn direct_message(&self, peer: &PeerId, line: &str) {
        info!(target: "meshlink::inbound", %peer, message = line, "Direct message");
    }
}
