use std::net::SocketAddr;

use clap::Args;

/// Parameters for the control socket.
#[derive(Debug, Clone, Args, Default, PartialEq, Eq)]
#[command(next_help_heading = "Control")]
pub struct ControlArgs {
    /// Address the control socket binds to.
    #[arg(id = "control.addr", long = "control.addr", value_name = "ADDR")]
    pub addr: Option<SocketAddr>,

    /// Per-command deadline in seconds, 0 disables it.
    #[arg(long = "control.timeout", value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Maximum size of one request line in bytes.
    #[arg(long = "control.max-request-bytes", value_name = "BYTES")]
    pub max_request_bytes: Option<usize>,
}
