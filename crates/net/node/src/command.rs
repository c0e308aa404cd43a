//! Commands sent from [`NodeHandle`](crate::NodeHandle) to the event loop.

use std::sync::{Arc, atomic::AtomicU64};

use libp2p::PeerId;
use meshlink_net_api::{OverlayError, PeerAddrInfo, TopicMessage};
use tokio::sync::{mpsc, oneshot};

type Reply = oneshot::Sender<Result<(), OverlayError>>;

/// Requests that need mutable access to the swarm.
#[derive(Debug)]
pub enum NodeCommand {
    /// Connect to a peer; answered once a connection is up or the dial failed.
    Dial { peer: PeerAddrInfo, reply: Reply },
    /// Close all connections to a peer.
    Disconnect { peer: PeerId, reply: Reply },
    /// Route messages for `topic` into `sender`.
    Subscribe {
        topic: String,
        sender: mpsc::Sender<TopicMessage>,
        dropped: Arc<AtomicU64>,
        reply: Reply,
    },
    /// Publish `data` on `topic`.
    Publish {
        topic: String,
        data: Vec<u8>,
        reply: Reply,
    },
    /// Stop the event loop.
    Shutdown,
}
