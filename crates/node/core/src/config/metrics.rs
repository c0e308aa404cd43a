use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::args::MetricsArgs;

/// Metrics endpoint configuration (TOML-serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false, addr: meshlink_metrics::DEFAULT_METRICS_ADDR }
    }
}

impl MetricsConfig {
    pub(crate) fn apply_args(&mut self, args: &MetricsArgs) {
        if args.metrics {
            self.enabled = true;
        }
        if let Some(addr) = args.addr {
            self.addr = addr;
        }
    }

    pub fn to_runtime(&self) -> meshlink_metrics::MetricsConfig {
        meshlink_metrics::MetricsConfig { enabled: self.enabled, addr: self.addr }
    }
}
