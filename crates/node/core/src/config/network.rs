//! Network configuration for TOML persistence.

use std::time::Duration;

use eyre::{Result, WrapErr};
use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};

use crate::{args::NetworkArgs, constants::*, version};

/// Network configuration (TOML-serializable).
///
/// Addresses are kept as strings on disk and parsed when the runtime
/// [`meshlink_net_node::NetworkConfig`] is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listen multiaddrs
    pub listen_addrs: Vec<String>,

    /// Peers dialed at startup
    pub bootnodes: Vec<String>,

    /// Protocol id for direct text messages
    pub text_protocol: String,

    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,

    /// Gossipsub heartbeat in milliseconds
    pub heartbeat_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addrs: vec![DEFAULT_P2P_LISTEN_ADDR.to_string()],
            bootnodes: Vec::new(),
            text_protocol: meshlink_mesh::DEFAULT_TEXT_PROTOCOL.to_string(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
        }
    }
}

impl NetworkConfig {
    pub(crate) fn apply_args(&mut self, args: &NetworkArgs) {
        if let Some(listen) = &args.listen_addrs {
            self.listen_addrs = listen.clone();
        }
        if let Some(bootnodes) = &args.bootnodes {
            self.bootnodes = bootnodes.clone();
        }
        if let Some(protocol) = &args.text_protocol {
            self.text_protocol = protocol.clone();
        }
        if let Some(secs) = args.idle_timeout_secs {
            self.idle_timeout_secs = secs;
        }
        if let Some(ms) = args.heartbeat_ms {
            self.heartbeat_ms = ms;
        }
    }

    /// Build the runtime network settings.
    pub fn to_runtime(&self) -> Result<meshlink_net_node::NetworkConfig> {
        let listen_addrs = parse_addrs(&self.listen_addrs, "listen address")?;
        let bootnodes = parse_addrs(&self.bootnodes, "bootnode")?;
        if self.heartbeat_ms == 0 {
            eyre::bail!("heartbeat must be greater than zero");
        }

        Ok(meshlink_net_node::NetworkConfig {
            listen_addrs,
            bootnodes,
            protocol_version: PROTOCOL_VERSION.to_string(),
            agent_version: version::AGENT_VERSION.to_string(),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            heartbeat_interval: Duration::from_millis(self.heartbeat_ms),
            ..Default::default()
        })
    }
}

fn parse_addrs(addrs: &[String], what: &str) -> Result<Vec<Multiaddr>> {
    addrs
        .iter()
        .map(|addr| {
            addr.parse::<Multiaddr>()
                .wrap_err_with(|| format!("invalid {what} {addr:?}"))
        })
        .collect()
}
