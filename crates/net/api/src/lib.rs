//! Overlay network capability surface for MeshLink.
//!
//! The mesh orchestrator never talks to libp2p directly. It consumes the
//! traits in this crate, which describe what a peer-to-peer overlay must
//! provide:
//!
//! - identity and listen addresses ([`Overlay::local_peer_id`], [`Overlay::listen_addrs`])
//! - connection management ([`Overlay::connect`], [`Overlay::close_peer`])
//! - direct byte streams on named protocols ([`Overlay::open_stream`], [`Overlay::accept_streams`])
//! - a live peer view ([`Overlay::connected_peers`] and friends)
//! - topic pub/sub ([`Overlay::join_topic`], [`OverlayTopic`], [`OverlaySubscription`])
//!
//! `meshlink-net-node` implements these traits on top of a libp2p swarm and
//! `meshlink-test-utils` provides an in-memory implementation for tests.

mod addr;
mod error;
mod overlay;

pub use addr::{PeerAddrError, PeerAddrInfo, dialable_addr};
pub use error::{OverlayError, SubscriptionError};
pub use overlay::{Overlay, OverlaySubscription, OverlayTopic, TopicMessage};

pub use libp2p::{Multiaddr, PeerId, StreamProtocol};
