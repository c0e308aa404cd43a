//! Node configuration handling.
//!
//! Configuration is split into submodules:
//! - `network` - P2P overlay settings
//! - `control` - control socket and command deadline
//! - `metrics` - Prometheus endpoint
//!
//! Values come from the TOML file first, then CLI flags that were given.

mod control;
mod metrics;
mod network;

pub use control::ControlConfig;
pub use metrics::MetricsConfig;
pub use network::NetworkConfig;

use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::{cli::NodeArgs, constants::DEFAULT_CONFIG_FILE};

/// Configuration for the MeshLink node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Network configuration
    pub network: NetworkConfig,

    /// Control socket configuration
    pub control: ControlConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

impl NodeConfig {
    /// Path used when none is given on the command line.
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load the configuration from `path`, or the defaults if it doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse config {}", path.display()))
    }

    /// Save the configuration to the given path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)
            .wrap_err_with(|| format!("failed to write config {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply command line arguments to override the configuration.
    pub fn apply_cli_args(&mut self, args: &NodeArgs) {
        self.network.apply_args(&args.network);
        self.control.apply_args(&args.control);
        self.metrics.apply_args(&args.metrics);
    }

    /// Settings for the mesh node.
    pub fn mesh_config(&self) -> Result<meshlink_mesh::MeshConfig> {
        self.control.mesh_config(&self.network.text_protocol)
    }
}
