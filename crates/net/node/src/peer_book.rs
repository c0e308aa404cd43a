//! Shared peer state, written by the event loop and read by handles.

use std::{collections::HashMap, time::Duration};

use libp2p::{Multiaddr, PeerId};
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct PeerEntry {
    connections: u32,
    addrs: Vec<Multiaddr>,
    protocols: Option<Vec<String>>,
    rtt: Option<Duration>,
}

/// Listen addresses plus per-peer connection, address, protocol and latency state.
///
/// Only connected peers have an entry; it is dropped with the last connection.
#[derive(Debug, Default)]
pub struct PeerBook {
    listen_addrs: RwLock<Vec<Multiaddr>>,
    peers: RwLock<HashMap<PeerId, PeerEntry>>,
}

impl PeerBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listen_addr(&self, addr: Multiaddr) {
        let mut addrs = self.listen_addrs.write();
        if !addrs.contains(&addr) {
            addrs.push(addr);
        }
    }

    pub fn remove_listen_addr(&self, addr: &Multiaddr) {
        self.listen_addrs.write().retain(|a| a != addr);
    }

    pub fn listen_addrs(&self) -> Vec<Multiaddr> {
        self.listen_addrs.read().clone()
    }

    pub fn on_connection_established(&self, peer: PeerId, remote_addr: Multiaddr) {
        let mut peers = self.peers.write();
        let entry = peers.entry(peer).or_default();
        entry.connections += 1;
        if !entry.addrs.contains(&remote_addr) {
            entry.addrs.push(remote_addr);
        }
    }

    /// Record a closed connection; `remaining` is the number still open.
    pub fn on_connection_closed(&self, peer: &PeerId, remaining: u32) {
        let mut peers = self.peers.write();
        if remaining == 0 {
            peers.remove(peer);
        } else if let Some(entry) = peers.get_mut(peer) {
            entry.connections = remaining;
        }
    }

    /// Merge identify info. Ignored for peers that are no longer connected.
    pub fn on_identify(&self, peer: PeerId, listen_addrs: Vec<Multiaddr>, protocols: Vec<String>) {
        let mut peers = self.peers.write();
        let Some(entry) = peers.get_mut(&peer) else {
            return;
        };
        for addr in listen_addrs {
            if !entry.addrs.contains(&addr) {
                entry.addrs.push(addr);
            }
        }
        entry.protocols = Some(protocols);
    }

    pub fn on_rtt(&self, peer: PeerId, rtt: Duration) {
        if let Some(entry) = self.peers.write().get_mut(&peer) {
            entry.rtt = Some(rtt);
        }
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.peers
            .read()
            .iter()
            .filter(|(_, entry)| entry.connections > 0)
            .map(|(peer, _)| *peer)
            .collect()
    }

    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.peers
            .read()
            .get(peer)
            .is_some_and(|entry| entry.connections > 0)
    }

    /// Number of tracked peers.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    pub fn addresses_of(&self, peer: &PeerId) -> Vec<Multiaddr> {
        self.peers
            .read()
            .get(peer)
            .map(|entry| entry.addrs.clone())
            .unwrap_or_default()
    }

    pub fn protocols_of(&self, peer: &PeerId) -> Option<Vec<String>> {
        self.peers.read().get(peer).and_then(|entry| entry.protocols.clone())
    }

    pub fn latency_of(&self, peer: &PeerId) -> Option<Duration> {
        self.peers.read().get(peer).and_then(|entry| entry.rtt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> Multiaddr {
        format!("/ip4/127.0.0.1/tcp/{port}").parse().unwrap()
    }

    #[test]
    fn test_connection_lifecycle() {
        let book = PeerBook::new();
        let peer = PeerId::random();

        book.on_connection_established(peer, addr(1));
        book.on_connection_established(peer, addr(1));
        assert_eq!(book.connected_peers(), vec![peer]);
        assert_eq!(book.addresses_of(&peer), vec![addr(1)]);

        book.on_rtt(peer, Duration::from_millis(3));
        book.on_connection_closed(&peer, 1);
        assert!(book.is_connected(&peer));
        assert_eq!(book.latency_of(&peer), Some(Duration::from_millis(3)));

        book.on_connection_closed(&peer, 0);
        assert!(book.connected_peers().is_empty());
        assert_eq!(book.latency_of(&peer), None);
        assert!(book.addresses_of(&peer).is_empty());
        assert_eq!(book.len(), 0);
    }

    #[test]
    fn test_closed_peers_are_forgotten() {
        let book = PeerBook::new();
        for _ in 0..1000 {
            let peer = PeerId::random();
            book.on_connection_established(peer, addr(1));
            book.on_identify(peer, vec![addr(2)], vec!["/ipfs/ping/1.0.0".to_string()]);
            book.on_connection_closed(&peer, 0);
        }
        assert_eq!(book.len(), 0);
    }

    #[test]
    fn test_identify_ignored_for_disconnected_peer() {
        let book = PeerBook::new();
        let peer = PeerId::random();
        book.on_identify(peer, vec![addr(1)], vec!["/ipfs/ping/1.0.0".to_string()]);
        assert_eq!(book.protocols_of(&peer), None);
        assert_eq!(book.len(), 0);
    }

    #[test]
    fn test_identify_merges_addresses() {
        let book = PeerBook::new();
        let peer = PeerId::random();

        assert_eq!(book.protocols_of(&peer), None);
        book.on_connection_established(peer, addr(1));
        book.on_identify(
            peer,
            vec![addr(1), addr(2)],
            vec!["/ipfs/ping/1.0.0".to_string()],
        );

        assert_eq!(book.addresses_of(&peer), vec![addr(1), addr(2)]);
        assert_eq!(
            book.protocols_of(&peer),
            Some(vec!["/ipfs/ping/1.0.0".to_string()])
        );
    }

    #[test]
    fn test_rtt_ignored_for_unknown_peer() {
        let book = PeerBook::new();
        let peer = PeerId::random();
        book.on_rtt(peer, Duration::from_millis(1));
        assert_eq!(book.latency_of(&peer), None);
        assert!(book.addresses_of(&peer).is_empty());
    }

    #[test]
    fn test_listen_addrs_deduplicated() {
        let book = PeerBook::new();
        book.add_listen_addr(addr(1));
        book.add_listen_addr(addr(1));
        book.add_listen_addr(addr(2));
        assert_eq!(book.listen_addrs(), vec![addr(1), addr(2)]);

        book.remove_listen_addr(&addr(1));
        assert_eq!(book.listen_addrs(), vec![addr(2)]);
    }
}
