use std::net::SocketAddr;

use clap::Args;

/// Parameters for the Prometheus endpoint.
#[derive(Debug, Clone, Args, Default, PartialEq, Eq)]
#[command(next_help_heading = "Metrics")]
pub struct MetricsArgs {
    /// Enable the Prometheus metrics endpoint.
    #[arg(long)]
    pub metrics: bool,

    /// Address the metrics endpoint listens on.
    #[arg(id = "metrics.addr", long = "metrics.addr", value_name = "ADDR")]
    pub addr: Option<SocketAddr>,
}
