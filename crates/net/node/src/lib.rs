//! libp2p implementation of the MeshLink overlay.
//!
//! A [`NetworkNode`] owns the libp2p [`Swarm`](libp2p::Swarm) and runs its
//! event loop. Everything else talks to it through a cloneable
//! [`NodeHandle`], which implements [`meshlink_net_api::Overlay`]:
//!
//! - actions that need the swarm (dial, disconnect, subscribe, publish) are
//!   sent to the event loop as [`NodeCommand`]s and answered on a oneshot
//! - read-only peer state is served from a shared [`PeerBook`] that the
//!   event loop keeps current
//! - direct streams go through a `libp2p_stream` control, which is safe to
//!   use from any task
//!
//! ```ignore
//! let (node, handle) = NetworkNode::builder(NetworkConfig::default()).build()?;
//! tokio::spawn(node.run());
//! handle.connect("/ip4/10.0.0.2/tcp/4001/p2p/12D3Koo...".parse()?).await?;
//! ```

mod behaviour;
mod command;
mod config;
mod error;
mod handle;
mod node;
mod peer_book;

pub use behaviour::{MeshBehaviour, MeshBehaviourEvent};
pub use command::NodeCommand;
pub use config::NetworkConfig;
pub use error::NodeError;
pub use handle::{Libp2pSubscription, Libp2pTopic, NodeHandle};
pub use node::{NetworkNode, NetworkNodeBuilder};
pub use peer_book::PeerBook;
