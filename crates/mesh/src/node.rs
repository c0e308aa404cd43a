//! The mesh node: command execution on top of an [`Overlay`].

use std::{future::Future, sync::Arc, time::Duration};

use libp2p::{Multiaddr, PeerId, StreamProtocol};
use meshlink_net_api::{Overlay, OverlayError, OverlayTopic, PeerAddrInfo, dialable_addr};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    BroadcastReport, Command, MeshError, NetworkStats, Observer, PeerRecord, Response,
    TracingObserver, direct,
    metrics::MeshMetrics,
    peers,
    registry::{PumpContext, TopicRegistry},
};

/// Direct-message protocol spoken by existing deployments.
pub const DEFAULT_TEXT_PROTOCOL: StreamProtocol = StreamProtocol::new("/nadoomeshlink/text/1.0.0");

/// Default per-command deadline.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time one peer gets to accept a broadcast line.
pub const DEFAULT_PEER_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default longest line accepted on an inbound direct stream.
pub const DEFAULT_MAX_DIRECT_LINE_BYTES: usize = 64 * 1024;

/// Settings for a [`MeshNode`].
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Protocol used for direct messages and broadcasts.
    pub text_protocol: StreamProtocol,
    /// Deadline for a single command; `None` waits forever.
    ///
    /// Broadcasts are bounded per peer by `peer_send_timeout` instead.
    pub command_timeout: Option<Duration>,
    /// Time one peer gets to open a stream and take a broadcast line.
    pub peer_send_timeout: Duration,
    /// Inbound direct streams sending a longer line are closed.
    pub max_direct_line_bytes: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            text_protocol: DEFAULT_TEXT_PROTOCOL,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            peer_send_timeout: DEFAULT_PEER_SEND_TIMEOUT,
            max_direct_line_bytes: DEFAULT_MAX_DIRECT_LINE_BYTES,
        }
    }
}

/// This node's dialable address plus every listen address in the same form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub peer_id: PeerId,
    pub address: Multiaddr,
    pub addresses: Vec<Multiaddr>,
}

/// Orchestrates the overlay on behalf of control-channel clients.
///
/// Owns the topic registry; all peer state stays in the overlay and is
/// read through on demand.
pub struct MeshNode<O: Overlay> {
    overlay: Arc<O>,
    topics: TopicRegistry<O>,
    observer: Arc<dyn Observer>,
    metrics: MeshMetrics,
    config: MeshConfig,
}

impl<O: Overlay> std::fmt::Debug for MeshNode<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshNode")
            .field("local_peer_id", &self.overlay.local_peer_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<O: Overlay> MeshNode<O> {
    /// Create a node that logs inbound traffic through [`TracingObserver`].
    pub fn new(overlay: Arc<O>, config: MeshConfig) -> Self {
        Self {
            overlay,
            topics: TopicRegistry::default(),
            observer: Arc::new(TracingObserver),
            metrics: MeshMetrics::default(),
            config,
        }
    }

    /// Replace the observer. Only affects pumps and handlers started afterwards.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn overlay(&self) -> &Arc<O> {
        &self.overlay
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Register the direct-message stream handler on the configured protocol.
    pub fn start_direct_handler(&self) -> Result<JoinHandle<()>, OverlayError> {
        direct::spawn_direct_handler(
            self.overlay.as_ref(),
            self.config.text_protocol.clone(),
            self.config.max_direct_line_bytes,
            self.observer.clone(),
            self.metrics.clone(),
        )
    }

    /// Decode and execute one request line.
    pub async fn handle_request(&self, line: &str) -> Response {
        match Command::decode(line) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                debug!(%e, "Rejected request");
                Response::error(e)
            }
        }
    }

    /// Execute a command under the configured deadline.
    ///
    /// Broadcasts always succeed and are bounded per peer, so they skip it.
    pub async fn execute(&self, command: Command) -> Response {
        let name = command.name();
        let result = match command {
            Command::Broadcast { .. } => self.run(command).await,
            command => self.with_deadline(self.run(command)).await,
        };
        self.metrics.record_command(name, result.is_ok());

        match result {
            Ok(response) => response,
            Err(e) => {
                debug!(command = name, %e, "Command failed");
                Response::error(e)
            }
        }
    }

    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, MeshError>>,
    ) -> Result<T, MeshError> {
        match self.config.command_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| MeshError::Timeout)?,
            None => fut.await,
        }
    }

    async fn run(&self, command: Command) -> Result<Response, MeshError> {
        match command {
            Command::Connect { address } => {
                self.connect(&address).await?;
                Ok(Response::ok())
            }
            Command::Broadcast { message } => {
                self.broadcast(&message).await;
                Ok(Response::ok())
            }
            Command::GetAddress => {
                let info = self.get_address()?;
                let addresses: Vec<String> =
                    info.addresses.iter().map(ToString::to_string).collect();
                Ok(Response::with_address(
                    info.address.to_string(),
                    json!({ "peer_id": info.peer_id.to_string(), "addresses": addresses }),
                ))
            }
            Command::JoinTopic { topic } => {
                self.join_topic(&topic).await?;
                Ok(Response::ok())
            }
            Command::PublishToTopic { topic, data } => {
                self.publish_to_topic(&topic, data.into_bytes()).await?;
                Ok(Response::ok())
            }
            Command::GetPeers => Ok(Response::with_data(to_data(self.get_peers()))),
            Command::GetNetworkStats => Ok(Response::with_data(to_data(self.get_network_stats()))),
            Command::DisconnectPeer { peer_id } => {
                self.disconnect_peer(&peer_id).await?;
                Ok(Response::ok())
            }
        }
    }

    /// Connect to the peer at a `/.../p2p/<peer-id>` address.
    pub async fn connect(&self, address: &str) -> Result<(), MeshError> {
        let addr = address
            .parse::<Multiaddr>()
            .map_err(|e| MeshError::InvalidPeerAddress(e.to_string()))?;
        let peer = PeerAddrInfo::from_p2p_addr(&addr)
            .map_err(|e| MeshError::InvalidPeerInfo(e.to_string()))?;
        let peer_id = peer.peer_id;

        self.overlay
            .connect(peer)
            .await
            .map_err(MeshError::ConnectionFailed)?;
        info!(%peer_id, "Connected to peer");
        Ok(())
    }

    /// Send `message` as a line to every connected peer, skipping unreachable ones.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        direct::broadcast(
            self.overlay.as_ref(),
            &self.config.text_protocol,
            message,
            self.config.peer_send_timeout,
            &self.metrics,
        )
        .await
    }

    pub fn get_address(&self) -> Result<AddressInfo, MeshError> {
        let peer_id = self.overlay.local_peer_id();
        let addresses: Vec<Multiaddr> = self
            .overlay
            .listen_addrs()
            .iter()
            .map(|addr| dialable_addr(addr, peer_id))
            .collect();
        let address = addresses.first().cloned().ok_or(MeshError::NoListenAddress)?;

        Ok(AddressInfo {
            peer_id,
            address,
            addresses,
        })
    }

    /// Join `name` and start relaying its messages. Joining twice is a no-op.
    pub async fn join_topic(&self, name: &str) -> Result<(), MeshError> {
        let ctx = PumpContext {
            local_peer_id: self.overlay.local_peer_id(),
            observer: self.observer.clone(),
            metrics: self.metrics.clone(),
        };
        self.topics.join(self.overlay.as_ref(), name, ctx).await?;
        Ok(())
    }

    /// Publish `data` on a previously joined topic.
    pub async fn publish_to_topic(&self, name: &str, data: Vec<u8>) -> Result<(), MeshError> {
        let topic = self
            .topics
            .get(name)
            .await
            .ok_or_else(|| MeshError::NotSubscribed(name.to_string()))?;
        topic.publish(data).await?;
        Ok(())
    }

    pub fn get_peers(&self) -> Vec<PeerRecord> {
        peers::peer_records(self.overlay.as_ref())
    }

    pub fn get_network_stats(&self) -> NetworkStats {
        peers::network_stats(self.overlay.as_ref())
    }

    /// Close every connection to the peer with the given base58 id.
    pub async fn disconnect_peer(&self, peer_id: &str) -> Result<(), MeshError> {
        let peer = peer_id
            .parse::<PeerId>()
            .map_err(|e| MeshError::InvalidPeerId(e.to_string()))?;
        self.overlay.close_peer(peer).await?;
        info!(%peer, "Disconnected peer");
        Ok(())
    }

    /// Names of the joined topics.
    pub async fn topics(&self) -> Vec<String> {
        self.topics.names().await
    }

    /// Whether `name` is joined and its pump is still running.
    pub async fn is_pumping(&self, name: &str) -> bool {
        self.topics.is_pumping(name).await
    }

    /// Stop all topic pumps.
    pub async fn shutdown(&self) {
        self.topics.clear().await;
    }
}

fn to_data(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
