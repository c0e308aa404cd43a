//! Cloneable handle to a running [`NetworkNode`](crate::NetworkNode).

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use meshlink_net_api::{
    Overlay, OverlayError, OverlaySubscription, OverlayTopic, PeerAddrInfo, SubscriptionError,
    TopicMessage,
};
use tokio::sync::{mpsc, oneshot};

use crate::{NodeCommand, PeerBook};

/// Handle to the libp2p node.
///
/// Swarm mutations are forwarded to the event loop; peer queries read the
/// shared [`PeerBook`].
#[derive(Clone)]
pub struct NodeHandle {
    local_peer_id: PeerId,
    commands: mpsc::UnboundedSender<NodeCommand>,
    peer_book: Arc<PeerBook>,
    control: libp2p_stream::Control,
    subscription_buffer: usize,
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("local_peer_id", &self.local_peer_id)
            .finish_non_exhaustive()
    }
}

impl NodeHandle {
    pub(crate) fn new(
        local_peer_id: PeerId,
        commands: mpsc::UnboundedSender<NodeCommand>,
        peer_book: Arc<PeerBook>,
        control: libp2p_stream::Control,
        subscription_buffer: usize,
    ) -> Self {
        Self {
            local_peer_id,
            commands,
            peer_book,
            control,
            subscription_buffer: subscription_buffer.max(1),
        }
    }

    /// Ask the event loop to stop.
    pub fn shutdown(&self) {
        let _ = self.commands.send(NodeCommand::Shutdown);
    }

    /// Send a command built around a reply channel and wait for the answer.
    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<(), OverlayError>>) -> NodeCommand,
    ) -> Result<(), OverlayError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| OverlayError::Shutdown)?;
        rx.await.map_err(|_| OverlayError::Shutdown)?
    }
}

#[async_trait]
impl Overlay for NodeHandle {
    type Topic = Libp2pTopic;
    type Subscription = Libp2pSubscription;
    type Stream = libp2p::Stream;
    type Incoming = libp2p_stream::IncomingStreams;

    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.peer_book.listen_addrs()
    }

    async fn connect(&self, peer: PeerAddrInfo) -> Result<(), OverlayError> {
        if peer.peer_id == self.local_peer_id {
            return Err(OverlayError::Dial("cannot dial self".to_string()));
        }
        self.request(|reply| NodeCommand::Dial { peer, reply }).await
    }

    async fn close_peer(&self, peer: PeerId) -> Result<(), OverlayError> {
        self.request(|reply| NodeCommand::Disconnect { peer, reply })
            .await
    }

    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> Result<Self::Stream, OverlayError> {
        let mut control = self.control.clone();
        control
            .open_stream(peer, protocol)
            .await
            .map_err(|e| OverlayError::OpenStream {
                peer,
                reason: e.to_string(),
            })
    }

    fn accept_streams(&self, protocol: StreamProtocol) -> Result<Self::Incoming, OverlayError> {
        let mut control = self.control.clone();
        control
            .accept(protocol.clone())
            .map_err(|_| OverlayError::ProtocolTaken(protocol.to_string()))
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        self.peer_book.connected_peers()
    }

    fn addresses_of(&self, peer: &PeerId) -> Vec<Multiaddr> {
        self.peer_book.addresses_of(peer)
    }

    fn protocols_of(&self, peer: &PeerId) -> Result<Vec<String>, OverlayError> {
        self.peer_book
            .protocols_of(peer)
            .ok_or(OverlayError::UnknownPeer(*peer))
    }

    fn latency_of(&self, peer: &PeerId) -> Option<Duration> {
        self.peer_book.latency_of(peer)
    }

    async fn join_topic(&self, name: &str) -> Result<Self::Topic, OverlayError> {
        if name.is_empty() {
            return Err(OverlayError::Topic("topic name must not be empty".to_string()));
        }
        Ok(Libp2pTopic {
            name: name.to_string(),
            handle: self.clone(),
        })
    }
}

/// A gossipsub topic joined through a [`NodeHandle`].
#[derive(Debug)]
pub struct Libp2pTopic {
    name: String,
    handle: NodeHandle,
}

#[async_trait]
impl OverlayTopic for Libp2pTopic {
    type Subscription = Libp2pSubscription;

    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self) -> Result<Self::Subscription, OverlayError> {
        let (sender, rx) = mpsc::channel(self.handle.subscription_buffer);
        let dropped = Arc::new(AtomicU64::new(0));
        let topic = self.name.clone();
        let counter = dropped.clone();

        self.handle
            .request(|reply| NodeCommand::Subscribe {
                topic,
                sender,
                dropped: counter,
                reply,
            })
            .await?;

        Ok(Libp2pSubscription { rx, dropped })
    }

    async fn publish(&self, data: Vec<u8>) -> Result<(), OverlayError> {
        let topic = self.name.clone();
        self.handle
            .request(|reply| NodeCommand::Publish { topic, data, reply })
            .await
    }
}

/// Receiving side of a gossipsub subscription.
///
/// Dropping it releases the subscription; the node unsubscribes from the
/// topic once no local subscription is left.
#[derive(Debug)]
pub struct Libp2pSubscription {
    rx: mpsc::Receiver<TopicMessage>,
    dropped: Arc<AtomicU64>,
}

#[async_trait]
impl OverlaySubscription for Libp2pSubscription {
    async fn next(&mut self) -> Result<TopicMessage, SubscriptionError> {
        let lagged = self.dropped.swap(0, Ordering::Relaxed);
        if lagged > 0 {
            return Err(SubscriptionError::Lagged(lagged));
        }
        self.rx.recv().await.ok_or(SubscriptionError::Closed)
    }
}
