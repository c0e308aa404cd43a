//! Peer directory view, computed fresh from the overlay on every request.

use meshlink_net_api::Overlay;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One connected peer as reported by `get_peers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: String,
    pub addresses: Vec<String>,
    pub protocols: Vec<String>,
    /// Last measured round-trip time, e.g. `"1.503ms"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
}

/// Reply data of `get_network_stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub connected_peers: usize,
    /// Not collected; always zero.
    pub bandwidth: u64,
    pub peer_list: Vec<String>,
}

pub(crate) fn peer_records<O: Overlay>(overlay: &O) -> Vec<PeerRecord> {
    overlay
        .connected_peers()
        .into_iter()
        .map(|peer| {
            let protocols = overlay.protocols_of(&peer).unwrap_or_else(|e| {
                trace!(%peer, %e, "No protocol information");
                Vec::new()
            });
            let latency = overlay
                .latency_of(&peer)
                .filter(|rtt| !rtt.is_zero())
                .map(|rtt| format!("{rtt:?}"));

            PeerRecord {
                id: peer.to_string(),
                addresses: overlay
                    .addresses_of(&peer)
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                protocols,
                latency,
            }
        })
        .collect()
}

pub(crate) fn network_stats<O: Overlay>(overlay: &O) -> NetworkStats {
    let peer_list: Vec<String> = overlay
        .connected_peers()
        .iter()
        .map(ToString::to_string)
        .collect();

    NetworkStats {
        connected_peers: peer_list.len(),
        bandwidth: 0,
        peer_list,
    }
}
