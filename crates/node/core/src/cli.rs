//! Command-line interface for the MeshLink node.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    args::{ControlArgs, LogArgs, MetricsArgs, NetworkArgs},
    version,
};

/// MeshLink - libp2p mesh node driven over a local control socket
#[derive(Debug, Parser)]
#[command(
    author,
    version = version::VERSION,
    long_version = version::LONG_VERSION.as_str(),
    about,
    long_about = None
)]
pub struct Cli {
    /// Logging configuration
    #[command(flatten)]
    pub log_args: LogArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// MeshLink commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a mesh node
    Node(NodeArgs),

    /// Manage node configuration
    Config(ConfigArgs),
}

/// Arguments for the 'node' command
#[derive(Debug, Args)]
pub struct NodeArgs {
    /// Path to the config file. Missing files fall back to defaults.
    #[arg(long, short, value_name = "FILE", env = "MESHLINK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub network: NetworkArgs,

    #[command(flatten)]
    pub control: ControlArgs,

    #[command(flatten)]
    pub metrics: MetricsArgs,
}

/// Arguments for the 'config' command
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Path to the config file
    #[arg(long, short, value_name = "FILE", env = "MESHLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write a default configuration file
    #[arg(long, conflicts_with = "show")]
    pub init: bool,

    /// Show the effective configuration
    #[arg(long)]
    pub show: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn node_flags_are_optional_overrides() {
        let cli = Cli::try_parse_from(["meshlink", "node"]).unwrap();
        let Commands::Node(args) = cli.command else { panic!("expected node command") };
        assert_eq!(args.network, NetworkArgs::default());
        assert_eq!(args.control, ControlArgs::default());
        assert!(!args.metrics.metrics);
    }

    #[test]
    fn parses_node_flags() {
        let cli = Cli::try_parse_from([
            "meshlink",
            "-vv",
            "node",
            "--p2p.listen",
            "/ip4/0.0.0.0/tcp/4001,/ip6/::/tcp/4001",
            "--control.addr",
            "127.0.0.1:6000",
            "--control.timeout",
            "0",
            "--metrics",
        ])
        .unwrap();

        assert_eq!(cli.log_args.verbosity, 2);
        let Commands::Node(args) = cli.command else { panic!("expected node command") };
        assert_eq!(args.network.listen_addrs.as_ref().map(Vec::len), Some(2));
        assert_eq!(args.control.addr, Some("127.0.0.1:6000".parse().unwrap()));
        assert_eq!(args.control.timeout_secs, Some(0));
        assert!(args.metrics.metrics);
    }

    #[test]
    fn init_conflicts_with_show() {
        assert!(Cli::try_parse_from(["meshlink", "config", "--init", "--show"]).is_err());
    }
}
