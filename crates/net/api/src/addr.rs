//! Peer address parsing.

use std::str::FromStr;

use libp2p::{Multiaddr, PeerId, multiaddr::Protocol};

/// Failure modes when turning a string into something dialable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerAddrError {
    /// The string is not a multiaddr.
    #[error("{0}")]
    Multiaddr(String),
    /// The multiaddr does not end in a `/p2p/<peer-id>` component.
    #[error("multiaddr does not end with a /p2p/<peer-id> component: {0}")]
    MissingPeerId(Multiaddr),
}

/// A peer identity together with the transport addresses it can be reached on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddrInfo {
    pub peer_id: PeerId,
    pub addrs: Vec<Multiaddr>,
}

impl PeerAddrInfo {
    /// Split a `/.../p2p/<peer-id>` multiaddr into identity and transport address.
    ///
    /// A bare `/p2p/<peer-id>` yields an empty address list.
    pub fn from_p2p_addr(addr: &Multiaddr) -> Result<Self, PeerAddrError> {
        let mut transport = addr.clone();
        match transport.pop() {
            Some(Protocol::P2p(peer_id)) => {
                let addrs = if transport.is_empty() {
                    Vec::new()
                } else {
                    vec![transport]
                };
                Ok(Self { peer_id, addrs })
            }
            _ => Err(PeerAddrError::MissingPeerId(addr.clone())),
        }
    }
}

impl FromStr for PeerAddrInfo {
    type Err = PeerAddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr = s
            .parse::<Multiaddr>()
            .map_err(|e| PeerAddrError::Multiaddr(e.to_string()))?;
        Self::from_p2p_addr(&addr)
    }
}

/// Render `addr` with the `/p2p/<peer-id>` suffix other nodes need to dial it.
pub fn dialable_addr(addr: &Multiaddr, peer_id: PeerId) -> Multiaddr {
    match addr.iter().last() {
        Some(Protocol::P2p(_)) => addr.clone(),
        _ => addr.clone().with(Protocol::P2p(peer_id)),
    }
}
