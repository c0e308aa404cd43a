//! Scriptable in-memory overlay.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use meshlink_net_api::{
    Overlay, OverlayError, OverlaySubscription, OverlayTopic, PeerAddrInfo, SubscriptionError,
    TopicMessage,
};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncBufReadExt, BufReader, DuplexStream},
    sync::mpsc,
};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

/// Byte stream handed out by [`MockOverlay`].
pub type MockStream = Compat<DuplexStream>;

type SubscriptionSender = mpsc::UnboundedSender<Result<TopicMessage, SubscriptionError>>;

const STREAM_BUFFER: usize = 64 * 1024;

#[derive(Debug, Default)]
struct MockPeer {
    connected: bool,
    addrs: Vec<Multiaddr>,
    protocols: Option<Vec<String>>,
    latency: Option<Duration>,
    refuse_streams: bool,
    stall_streams: bool,
    /// Lines written to this peer over outbound streams.
    received: Arc<Mutex<Vec<String>>>,
}

#[derive(Debug, Default)]
struct State {
    listen_addrs: Vec<Multiaddr>,
    peers: HashMap<PeerId, MockPeer>,
    /// Connection order, so peer listings are deterministic.
    order: Vec<PeerId>,
    dials: Vec<PeerAddrInfo>,
    connect_error: Option<String>,
    connect_stalls: bool,
    close_fails: bool,
    join_error: Option<String>,
    subscribe_error: Option<String>,
    publish_error: Option<String>,
    joins: HashMap<String, usize>,
    subscriptions: HashMap<String, Vec<SubscriptionSender>>,
    published: Vec<(String, Vec<u8>)>,
    acceptors: HashMap<StreamProtocol, mpsc::UnboundedSender<(PeerId, MockStream)>>,
}

/// In-memory overlay for tests.
///
/// Cloning yields another handle to the same state. Published messages are
/// looped back to local subscribers with the local peer as origin.
#[derive(Debug, Clone)]
pub struct MockOverlay {
    local_peer_id: PeerId,
    state: Arc<Mutex<State>>,
}

impl Default for MockOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOverlay {
    /// New overlay with a random identity listening on `127.0.0.1:4001`.
    pub fn new() -> Self {
        let state = State {
            listen_addrs: vec![crate::local_addr(4001)],
            ..Default::default()
        };
        Self {
            local_peer_id: PeerId::random(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_listen_addrs(self, addrs: Vec<Multiaddr>) -> Self {
        self.state.lock().listen_addrs = addrs;
        self
    }

    /// Add a peer that is already connected.
    pub fn add_connected_peer(&self, peer: PeerId, addrs: Vec<Multiaddr>) {
        let mut state = self.state.lock();
        let entry = state.peers.entry(peer).or_default();
        entry.connected = true;
        entry.addrs = addrs;
        if !state.order.contains(&peer) {
            state.order.push(peer);
        }
    }

    pub fn set_protocols(&self, peer: PeerId, protocols: Vec<String>) {
        self.state.lock().peers.entry(peer).or_default().protocols = Some(protocols);
    }

    pub fn set_latency(&self, peer: PeerId, latency: Duration) {
        self.state.lock().peers.entry(peer).or_default().latency = Some(latency);
    }

    /// Make `open_stream` to `peer` fail.
    pub fn refuse_streams(&self, peer: PeerId) {
        self.state.lock().peers.entry(peer).or_default().refuse_streams = true;
    }

    /// Make `open_stream` to `peer` never complete.
    pub fn stall_streams(&self, peer: PeerId) {
        self.state.lock().peers.entry(peer).or_default().stall_streams = true;
    }

    pub fn fail_connect(&self, reason: &str) {
        self.state.lock().connect_error = Some(reason.to_string());
    }

    /// Make `connect` never complete.
    pub fn stall_connect(&self) {
        self.state.lock().connect_stalls = true;
    }

    pub fn fail_close(&self) {
        self.state.lock().close_fails = true;
    }

    pub fn fail_join(&self, reason: &str) {
        self.state.lock().join_error = Some(reason.to_string());
    }

    pub fn fail_subscribe(&self, reason: &str) {
        self.state.lock().subscribe_error = Some(reason.to_string());
    }

    pub fn fail_publish(&self, reason: &str) {
        self.state.lock().publish_error = Some(reason.to_string());
    }

    /// Every peer passed to `connect`, in call order.
    pub fn dials(&self) -> Vec<PeerAddrInfo> {
        self.state.lock().dials.clone()
    }

    /// Number of `join_topic` calls for `topic`.
    pub fn join_count(&self, topic: &str) -> usize {
        self.state.lock().joins.get(topic).copied().unwrap_or(0)
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscription_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(topic)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Every successful publish, in order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().published.clone()
    }

    /// Lines `peer` has received over outbound streams so far.
    pub fn received_lines(&self, peer: &PeerId) -> Vec<String> {
        self.state
            .lock()
            .peers
            .get(peer)
            .map(|p| p.received.lock().clone())
            .unwrap_or_default()
    }

    /// Deliver a message on `topic` from `origin`. Returns how many subscriptions got it.
    pub fn inject_topic_message(&self, topic: &str, origin: PeerId, data: &[u8]) -> usize {
        let message = TopicMessage {
            topic: topic.to_string(),
            origin,
            data: data.to_vec(),
        };
        self.deliver(topic, Ok(message))
    }

    /// Report `dropped` lost messages to every subscription on `topic`.
    pub fn inject_lag(&self, topic: &str, dropped: u64) -> usize {
        self.deliver(topic, Err(SubscriptionError::Lagged(dropped)))
    }

    /// Close every subscription on `topic`.
    pub fn close_subscriptions(&self, topic: &str) {
        self.state.lock().subscriptions.remove(topic);
    }

    /// Open an inbound stream from `peer` on `protocol` and return the remote end.
    ///
    /// Returns `None` if nothing accepts `protocol`.
    pub fn inject_stream(&self, peer: PeerId, protocol: &StreamProtocol) -> Option<MockStream> {
        let (local, remote) = tokio::io::duplex(STREAM_BUFFER);
        let state = self.state.lock();
        let acceptor = state.acceptors.get(protocol)?;
        acceptor.send((peer, local.compat())).ok()?;
        Some(remote.compat())
    }

    fn deliver(&self, topic: &str, item: Result<TopicMessage, SubscriptionError>) -> usize {
        let mut state = self.state.lock();
        let Some(subs) = state.subscriptions.get_mut(topic) else {
            return 0;
        };
        subs.retain(|tx| tx.send(item.clone()).is_ok());
        subs.len()
    }
}

#[async_trait]
impl Overlay for MockOverlay {
    type Topic = MockTopic;
    type Subscription = MockSubscription;
    type Stream = MockStream;
    type Incoming = UnboundedReceiverStream<(PeerId, MockStream)>;

    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.state.lock().listen_addrs.clone()
    }

    async fn connect(&self, peer: PeerAddrInfo) -> Result<(), OverlayError> {
        let stalls = {
            let mut state = self.state.lock();
            state.dials.push(peer.clone());
            state.connect_stalls
        };
        if stalls {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        if let Some(reason) = &state.connect_error {
            return Err(OverlayError::Dial(reason.clone()));
        }

        let entry = state.peers.entry(peer.peer_id).or_default();
        entry.connected = true;
        for addr in peer.addrs {
            if !entry.addrs.contains(&addr) {
                entry.addrs.push(addr);
            }
        }
        if !state.order.contains(&peer.peer_id) {
            state.order.push(peer.peer_id);
        }
        Ok(())
    }

    async fn close_peer(&self, peer: PeerId) -> Result<(), OverlayError> {
        let mut state = self.state.lock();
        if state.close_fails {
            return Err(OverlayError::Shutdown);
        }
        if let Some(entry) = state.peers.get_mut(&peer) {
            entry.connected = false;
        }
        state.order.retain(|p| *p != peer);
        Ok(())
    }

    async fn open_stream(
        &self,
        peer: PeerId,
        _protocol: StreamProtocol,
    ) -> Result<Self::Stream, OverlayError> {
        let (received, stalls) = {
            let state = self.state.lock();
            let refused = |reason: &str| OverlayError::OpenStream {
                peer,
                reason: reason.to_string(),
            };
            let entry = state.peers.get(&peer).ok_or_else(|| refused("not connected"))?;
            if !entry.connected {
                return Err(refused("not connected"));
            }
            if entry.refuse_streams {
                return Err(refused("stream refused"));
            }
            (entry.received.clone(), entry.stall_streams)
        };
        if stalls {
            std::future::pending::<()>().await;
        }

        let (local, remote) = tokio::io::duplex(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut lines = BufReader::new(remote).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                received.lock().push(line);
            }
        });
        Ok(local.compat())
    }

    fn accept_streams(&self, protocol: StreamProtocol) -> Result<Self::Incoming, OverlayError> {
        let mut state = self.state.lock();
        if state.acceptors.contains_key(&protocol) {
            return Err(OverlayError::ProtocolTaken(protocol.to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.acceptors.insert(protocol, tx);
        Ok(UnboundedReceiverStream::new(rx))
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        let state = self.state.lock();
        state
            .order
            .iter()
            .filter(|peer| state.peers.get(*peer).is_some_and(|p| p.connected))
            .copied()
            .collect()
    }

    fn addresses_of(&self, peer: &PeerId) -> Vec<Multiaddr> {
        self.state
            .lock()
            .peers
            .get(peer)
            .map(|p| p.addrs.clone())
            .unwrap_or_default()
    }

    fn protocols_of(&self, peer: &PeerId) -> Result<Vec<String>, OverlayError> {
        self.state
            .lock()
            .peers
            .get(peer)
            .and_then(|p| p.protocols.clone())
            .ok_or(OverlayError::UnknownPeer(*peer))
    }

    fn latency_of(&self, peer: &PeerId) -> Option<Duration> {
        self.state.lock().peers.get(peer).and_then(|p| p.latency)
    }

    async fn join_topic(&self, name: &str) -> Result<Self::Topic, OverlayError> {
        let mut state = self.state.lock();
        *state.joins.entry(name.to_string()).or_default() += 1;
        if let Some(reason) = &state.join_error {
            return Err(OverlayError::Topic(reason.clone()));
        }
        if name.is_empty() {
            return Err(OverlayError::Topic("topic name must not be empty".to_string()));
        }
        Ok(MockTopic {
            name: name.to_string(),
            overlay: self.clone(),
        })
    }
}

/// Topic joined on a [`MockOverlay`].
#[derive(Debug)]
pub struct MockTopic {
    name: String,
    overlay: MockOverlay,
}

#[async_trait]
impl OverlayTopic for MockTopic {
    type Subscription = MockSubscription;

    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self) -> Result<Self::Subscription, OverlayError> {
        let mut state = self.overlay.state.lock();
        if let Some(reason) = &state.subscribe_error {
            return Err(OverlayError::Topic(reason.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .subscriptions
            .entry(self.name.clone())
            .or_default()
            .push(tx);
        Ok(MockSubscription { rx })
    }

    async fn publish(&self, data: Vec<u8>) -> Result<(), OverlayError> {
        {
            let mut state = self.overlay.state.lock();
            if let Some(reason) = &state.publish_error {
                return Err(OverlayError::Publish(reason.clone()));
            }
            state.published.push((self.name.clone(), data.clone()));
        }
        self.overlay
            .inject_topic_message(&self.name, self.overlay.local_peer_id, &data);
        Ok(())
    }
}

/// Subscription on a [`MockTopic`].
#[derive(Debug)]
pub struct MockSubscription {
    rx: mpsc::UnboundedReceiver<Result<TopicMessage, SubscriptionError>>,
}

#[async_trait]
impl OverlaySubscription for MockSubscription {
    async fn next(&mut self) -> Result<TopicMessage, SubscriptionError> {
        self.rx.recv().await.unwrap_or(Err(SubscriptionError::Closed))
    }
}
