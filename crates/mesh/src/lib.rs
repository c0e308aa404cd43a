//! Mesh-node orchestrator.
//!
//! [`MeshNode`] turns control commands into overlay operations:
//!
//! - `connect` / `disconnect_peer` manage connections
//! - `join_topic` / `publish_to_topic` go through a topic registry with one
//!   background pump per joined topic
//! - `broadcast` and the direct-message handler exchange text lines over
//!   per-peer streams
//! - `get_address`, `get_peers` and `get_network_stats` read the overlay's
//!   live state
//!
//! [`ControlServer`] exposes a node to external processes as
//! newline-delimited JSON requests and responses:
//!
//! ```text
//! -> {"type":"join_topic","payload":"news"}
//! <- {"success":true}
//! -> {"type":"publish_to_topic","payload":{"topic":"news","data":"hello"}}
//! <- {"success":true}
//! ```

mod command;
mod direct;
mod error;
mod metrics;
mod node;
mod observer;
mod peers;
mod registry;
mod server;

pub use command::{Command, CommandError, Response};
pub use direct::BroadcastReport;
pub use error::MeshError;
pub use self::metrics::describe_metrics;
pub use node::{
    AddressInfo, DEFAULT_COMMAND_TIMEOUT, DEFAULT_MAX_DIRECT_LINE_BYTES, DEFAULT_PEER_SEND_TIMEOUT,
    DEFAULT_TEXT_PROTOCOL, MeshConfig, MeshNode,
};
pub use observer::{Observer, TracingObserver};
pub use peers::{NetworkStats, PeerRecord};
pub use server::{
    ControlConfig, ControlServer, DEFAULT_CONTROL_ADDR, DEFAULT_MAX_REQUEST_BYTES, ServerError,
    ShutdownHandle,
};
