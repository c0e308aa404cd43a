//! Control socket configuration.

use std::{net::SocketAddr, time::Duration};

use eyre::{Result, WrapErr};
use libp2p::StreamProtocol;
use meshlink_mesh::{ControlConfig as ServerConfig, MeshConfig};
use serde::{Deserialize, Serialize};

use crate::args::ControlArgs;

/// Control socket configuration (TOML-serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Address the control socket binds to
    pub addr: SocketAddr,

    /// Per-command deadline in seconds, 0 disables it
    pub timeout_secs: u64,

    /// Maximum request line size in bytes
    pub max_request_bytes: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            addr: meshlink_mesh::DEFAULT_CONTROL_ADDR,
            timeout_secs: meshlink_mesh::DEFAULT_COMMAND_TIMEOUT.as_secs(),
            max_request_bytes: meshlink_mesh::DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl ControlConfig {
    pub(crate) fn apply_args(&mut self, args: &ControlArgs) {
        if let Some(addr) = args.addr {
            self.addr = addr;
        }
        if let Some(secs) = args.timeout_secs {
            self.timeout_secs = secs;
        }
        if let Some(bytes) = args.max_request_bytes {
            self.max_request_bytes = bytes;
        }
    }

    /// Settings for the control server.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig { addr: self.addr, max_request_bytes: self.max_request_bytes }
    }

    /// Settings for the mesh node, using `text_protocol` for direct messages.
    pub fn mesh_config(&self, text_protocol: &str) -> Result<MeshConfig> {
        let text_protocol = StreamProtocol::try_from_owned(text_protocol.to_string())
            .wrap_err_with(|| format!("invalid text protocol {text_protocol:?}"))?;
        let command_timeout =
            (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));

        Ok(MeshConfig { text_protocol, command_timeout, ..MeshConfig::default() })
    }
}
