//! Test utilities for MeshLink crates.
//!
//! [`MockOverlay`] is an in-memory [`Overlay`](meshlink_net_api::Overlay)
//! whose peers, failures and topic traffic are scripted by the test.

mod overlay;

pub use overlay::{MockOverlay, MockStream, MockSubscription, MockTopic};

use std::time::Duration;

use libp2p::Multiaddr;

/// Build a TCP multiaddr on localhost.
pub fn local_addr(port: u16) -> Multiaddr {
    format!("/ip4/127.0.0.1/tcp/{port}")
        .parse()
        .unwrap_or_else(|_| Multiaddr::empty())
}

/// Poll `check` until it returns `Some` or `timeout` elapses.
pub async fn eventually<T>(timeout: Duration, mut check: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
