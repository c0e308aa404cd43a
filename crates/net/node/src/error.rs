/// Errors raised while building or starting the libp2p node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("failed to build transport: {0}")]
    Transport(String),
    #[error("failed to build network behaviour: {0}")]
    Behaviour(String),
    #[error("failed to listen on any of the configured addresses")]
    Listen,
}
