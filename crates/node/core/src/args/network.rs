use clap::Args;

/// Parameters for the P2P overlay.
#[derive(Debug, Clone, Args, Default, PartialEq, Eq)]
#[command(next_help_heading = "Networking")]
pub struct NetworkArgs {
    /// Comma separated multiaddrs to listen on.
    #[arg(long = "p2p.listen", value_name = "MULTIADDR", value_delimiter = ',')]
    pub listen_addrs: Option<Vec<String>>,

    /// Comma separated multiaddrs of peers to dial at startup.
    ///
    /// --bootnodes /ip4/10.0.0.2/tcp/4001/p2p/12D3KooW...
    #[arg(long, value_name = "MULTIADDR", value_delimiter = ',')]
    pub bootnodes: Option<Vec<String>>,

    /// Protocol id for direct text messages and broadcasts.
    #[arg(long = "p2p.text-protocol", value_name = "PROTOCOL")]
    pub text_protocol: Option<String>,

    /// Seconds before an idle connection is closed.
    #[arg(long = "p2p.idle-timeout", value_name = "SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Gossipsub heartbeat interval in milliseconds.
    #[arg(long = "p2p.heartbeat", value_name = "MILLIS")]
    pub heartbeat_ms: Option<u64>,
}
