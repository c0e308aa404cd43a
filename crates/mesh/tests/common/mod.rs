#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use libp2p::PeerId;
use meshlink_mesh::{MeshConfig, MeshNode, Observer};
use meshlink_test_utils::{MockOverlay, eventually};
use parking_lot::Mutex;

/// Observer that keeps everything it sees.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub topic: Mutex<Vec<(String, PeerId, Vec<u8>)>>,
    pub direct: Mutex<Vec<(PeerId, String)>>,
}

impl Observer for RecordingObserver {
    fn topic_message(&self, topic: &str, origin: &PeerId, data: &[u8]) {
        self.topic
            .lock()
            .push((topic.to_string(), *origin, data.to_vec()));
    }

    fn direct_message(&self, peer: &PeerId, line: &str) {
        self.direct.lock().push((*peer, line.to_string()));
    }
}

impl RecordingObserver {
    pub async fn wait_for_topic(&self, count: usize) -> Vec<(String, PeerId, Vec<u8>)> {
        eventually(Duration::from_secs(5), || {
            let seen = self.topic.lock();
            (seen.len() >= count).then(|| seen.clone())
        })
        .await
        .unwrap_or_else(|| panic!("expected {count} topic messages, got {:?}", self.topic.lock()))
    }

    pub async fn wait_for_direct(&self, count: usize) -> Vec<(PeerId, String)> {
        eventually(Duration::from_secs(5), || {
            let seen = self.direct.lock();
            (seen.len() >= count).then(|| seen.clone())
        })
        .await
        .unwrap_or_else(|| panic!("expected {count} direct messages, got {:?}", self.direct.lock()))
    }
}

pub struct Harness {
    pub overlay: MockOverlay,
    pub observer: Arc<RecordingObserver>,
    pub node: Arc<MeshNode<MockOverlay>>,
}

pub fn harness() -> Harness {
    harness_with(MockOverlay::new(), MeshConfig::default())
}

pub fn harness_with(overlay: MockOverlay, config: MeshConfig) -> Harness {
    let observer = Arc::new(RecordingObserver::default());
    let node = MeshNode::new(Arc::new(overlay.clone()), config).with_observer(observer.clone());
    Harness {
        overlay,
        observer,
        node: Arc::new(node),
    }
}
