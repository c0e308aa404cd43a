//! Metrics export for MeshLink.
//!
//! Components record through the [`metrics`] facade; this crate installs the
//! global prometheus recorder and serves it over HTTP.

use std::net::SocketAddr;

mod prometheus;

pub use prometheus::PrometheusRecorder;

/// Re-export metrics crate for convenience
pub use metrics;

/// Default metrics endpoint.
pub const DEFAULT_METRICS_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 9090);

/// Metrics export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: DEFAULT_METRICS_ADDR,
        }
    }
}

/// Install the exporter if enabled. Returns `None` when metrics are off.
pub fn init(config: &MetricsConfig) -> eyre::Result<Option<PrometheusRecorder>> {
    if !config.enabled {
        return Ok(None);
    }
    PrometheusRecorder::install(config.addr).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_installs_nothing() {
        assert!(init(&MetricsConfig::default()).unwrap().is_none());
    }
}
