//! Runtime configuration for the libp2p node.

use std::time::Duration;

use libp2p::Multiaddr;

/// Default gossipsub heartbeat.
const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(1);

/// Default idle timeout before an unused connection is closed.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default per-subscription buffer.
const DEFAULT_SUBSCRIPTION_BUFFER: usize = 256;

/// Network settings consumed by [`NetworkNode`](crate::NetworkNode).
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Addresses to listen on.
    pub listen_addrs: Vec<Multiaddr>,
    /// Peers dialed at startup (`/.../p2p/<peer-id>` or plain transport addresses).
    pub bootnodes: Vec<Multiaddr>,
    /// Protocol version announced through identify.
    pub protocol_version: String,
    /// Agent version announced through identify.
    pub agent_version: String,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
    /// Gossipsub heartbeat interval.
    pub heartbeat_interval: Duration,
    /// Messages buffered per subscription before new ones are dropped.
    pub subscription_buffer: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addrs: vec![Multiaddr::empty()
                .with(libp2p::multiaddr::Protocol::Ip4([0, 0, 0, 0].into()))
                .with(libp2p::multiaddr::Protocol::Tcp(0))],
            bootnodes: Vec::new(),
            protocol_version: "/meshlink/1.0.0".to_string(),
            agent_version: concat!("meshlink/", env!("CARGO_PKG_VERSION")).to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
        }
    }
}
