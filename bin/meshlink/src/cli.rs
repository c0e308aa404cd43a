//! Command dispatch and node launch.

use std::sync::Arc;

use clap::Parser;
use eyre::{Result, WrapErr};
use meshlink_mesh::{ControlServer, MeshNode};
use meshlink_net_node::NetworkNode;
use meshlink_node_core::{
    cli::{Cli, Commands, ConfigArgs, NodeArgs},
    config::NodeConfig,
    logging::init_logging,
};
use tracing::{error, info, warn};

/// Parse the command line and run the selected command.
pub(crate) async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_args)?;

    match cli.command {
        Commands::Node(args) => run_node(args).await,
        Commands::Config(args) => run_config(args),
    }
}

async fn run_node(args: NodeArgs) -> Result<()> {
    let path = args.config.clone().unwrap_or_else(NodeConfig::default_path);
    let mut config = NodeConfig::load(&path)?;
    config.apply_cli_args(&args);

    let network_config = config.network.to_runtime()?;
    let mesh_config = config.mesh_config()?;

    let _recorder = meshlink_metrics::init(&config.metrics.to_runtime())?;
    meshlink_mesh::describe_metrics();

    let (network, handle) =
        NetworkNode::builder(network_config).build().wrap_err("failed to build network node")?;
    info!(peer_id = %network.local_peer_id(), "Network node built");
    let mut network_task = tokio::spawn(network.run());

    let node = Arc::new(MeshNode::new(Arc::new(handle.clone()), mesh_config));
    let direct = node.start_direct_handler()?;

    let server = ControlServer::bind(config.control.server_config()).await?;
    let shutdown = server.shutdown_handle();
    let mut server_task = tokio::spawn(server.serve(node.clone()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.wrap_err("failed to listen for ctrl-c")?;
            info!("Received ctrl-c, shutting down");
        }
        result = &mut network_task => {
            match result {
                Ok(Ok(())) => warn!("Network event loop exited"),
                Ok(Err(e)) => error!(%e, "Network event loop failed"),
                Err(e) => error!(%e, "Network task panicked"),
            }
        }
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => warn!("Control server exited"),
                Ok(Err(e)) => error!(%e, "Control server failed"),
                Err(e) => error!(%e, "Control server task panicked"),
            }
        }
    }

    shutdown.shutdown();
    node.shutdown().await;
    direct.abort();
    handle.shutdown();

    if !server_task.is_finished() {
        let _ = server_task.await;
    }
    if !network_task.is_finished() {
        let _ = network_task.await;
    }

    info!("MeshLink stopped");
    Ok(())
}

fn run_config(args: ConfigArgs) -> Result<()> {
    let path = args.config.unwrap_or_else(NodeConfig::default_path);

    if args.init {
        if path.exists() {
            eyre::bail!("config file {} already exists", path.display());
        }
        NodeConfig::default().save(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    // `--show` is the default action.
    let config = NodeConfig::load(&path)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
