//! Overlay traits.

use std::time::Duration;

use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite, Stream};
use libp2p::{Multiaddr, PeerId, StreamProtocol};

use crate::{OverlayError, PeerAddrInfo, SubscriptionError};

/// A message received on a topic subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Peer that authored the message.
    pub origin: PeerId,
    /// Raw payload.
    pub data: Vec<u8>,
}

/// Peer-to-peer overlay capabilities consumed by the mesh orchestrator.
///
/// Implementations must be safe for concurrent use: the orchestrator calls
/// into the overlay from the command loop and from background tasks without
/// adding its own locking.
#[async_trait]
pub trait Overlay: Send + Sync + 'static {
    /// Joined topic handle.
    type Topic: OverlayTopic<Subscription = Self::Subscription>;
    /// Live topic subscription.
    type Subscription: OverlaySubscription;
    /// Bidirectional byte stream to a single peer.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// Inbound streams for a registered protocol.
    type Incoming: Stream<Item = (PeerId, Self::Stream)> + Unpin + Send + 'static;

    /// This node's identity.
    fn local_peer_id(&self) -> PeerId;

    /// Addresses this node is listening on, without the `/p2p` suffix.
    fn listen_addrs(&self) -> Vec<Multiaddr>;

    /// Establish a connection to `peer`. Succeeds immediately if already connected.
    async fn connect(&self, peer: PeerAddrInfo) -> Result<(), OverlayError>;

    /// Close every connection to `peer`.
    async fn close_peer(&self, peer: PeerId) -> Result<(), OverlayError>;

    /// Open a new outbound stream to a connected peer.
    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> Result<Self::Stream, OverlayError>;

    /// Register this node as the handler for inbound streams on `protocol`.
    fn accept_streams(&self, protocol: StreamProtocol) -> Result<Self::Incoming, OverlayError>;

    /// Peers with at least one open connection.
    fn connected_peers(&self) -> Vec<PeerId>;

    /// Addresses known for `peer`.
    fn addresses_of(&self, peer: &PeerId) -> Vec<Multiaddr>;

    /// Protocols `peer` advertised.
    fn protocols_of(&self, peer: &PeerId) -> Result<Vec<String>, OverlayError>;

    /// Last measured round-trip time to `peer`.
    fn latency_of(&self, peer: &PeerId) -> Option<Duration>;

    /// Obtain a handle for the topic called `name`.
    async fn join_topic(&self, name: &str) -> Result<Self::Topic, OverlayError>;
}

/// A joined pub/sub topic.
#[async_trait]
pub trait OverlayTopic: Send + Sync + 'static {
    /// Subscription type produced by [`subscribe`](Self::subscribe).
    type Subscription: OverlaySubscription;

    /// Topic name.
    fn name(&self) -> &str;

    /// Start receiving messages published on this topic.
    async fn subscribe(&self) -> Result<Self::Subscription, OverlayError>;

    /// Publish `data` to every subscriber of this topic.
    async fn publish(&self, data: Vec<u8>) -> Result<(), OverlayError>;
}

/// A stream of messages for one topic.
#[async_trait]
pub trait OverlaySubscription: Send + 'static {
    /// Wait for the next message.
    async fn next(&mut self) -> Result<TopicMessage, SubscriptionError>;
}
