//! Joined topics and their subscription pumps.

use std::{collections::HashMap, sync::Arc};

use libp2p::PeerId;
use meshlink_net_api::{Overlay, OverlaySubscription, OverlayTopic};
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{MeshError, Observer, metrics::MeshMetrics};

struct TopicEntry<T> {
    topic: Arc<T>,
    pump: JoinHandle<()>,
}

/// Everything a pump needs, handed over at spawn time.
#[derive(Clone)]
pub(crate) struct PumpContext {
    pub(crate) local_peer_id: PeerId,
    pub(crate) observer: Arc<dyn Observer>,
    pub(crate) metrics: MeshMetrics,
}

/// Topic name to joined topic, one pump per entry.
///
/// Pumps own their subscription and never touch the registry, so the lock
/// only guards the map itself.
pub(crate) struct TopicRegistry<O: Overlay> {
    topics: RwLock<HashMap<String, TopicEntry<O::Topic>>>,
}

impl<O: Overlay> Default for TopicRegistry<O> {
    fn default() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }
}

impl<O: Overlay> TopicRegistry<O> {
    /// Join `name` and start its pump. Joining a known topic is a no-op.
    ///
    /// Returns whether the topic was newly joined. The write lock is held
    /// across `join_topic` and `subscribe`; both are local event-loop calls,
    /// not network I/O.
    pub(crate) async fn join(
        &self,
        overlay: &O,
        name: &str,
        ctx: PumpContext,
    ) -> Result<bool, MeshError> {
        let mut topics = self.topics.write().await;
        if topics.contains_key(name) {
            debug!(topic = name, "Topic already joined");
            return Ok(false);
        }

        let topic = overlay.join_topic(name).await.map_err(MeshError::JoinTopic)?;
        let subscription = topic.subscribe().await.map_err(MeshError::Subscribe)?;
        let pump = tokio::spawn(run_pump(name.to_string(), subscription, ctx));

        topics.insert(
            name.to_string(),
            TopicEntry {
                topic: Arc::new(topic),
                pump,
            },
        );
        info!(topic = name, "Joined topic");
        Ok(true)
    }

    /// Topic handle for `name`, if joined. The lock is released on return.
    pub(crate) async fn get(&self, name: &str) -> Option<Arc<O::Topic>> {
        self.topics
            .read()
            .await
            .get(name)
            .map(|entry| entry.topic.clone())
    }

    /// Names of all joined topics, sorted.
    pub(crate) async fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.topics.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether the pump for `name` is still running.
    pub(crate) async fn is_pumping(&self, name: &str) -> bool {
        self.topics
            .read()
            .await
            .get(name)
            .is_some_and(|entry| !entry.pump.is_finished())
    }

    /// Stop every pump and forget all topics.
    pub(crate) async fn clear(&self) {
        for (name, entry) in self.topics.write().await.drain() {
            entry.pump.abort();
            debug!(topic = %name, "Stopped topic pump");
        }
    }
}

impl<O: Overlay> Drop for TopicRegistry<O> {
    fn drop(&mut self) {
        for entry in self.topics.get_mut().values() {
            entry.pump.abort();
        }
    }
}

/// Drain `subscription` into the observer until it closes.
async fn run_pump<S: OverlaySubscription>(topic: String, mut subscription: S, ctx: PumpContext) {
    debug!(%topic, "Topic pump started");
    loop {
        match subscription.next().await {
            Ok(message) if message.origin == ctx.local_peer_id => {
                ctx.metrics.topic_messages_suppressed_total.increment(1);
            }
            Ok(message) => {
                ctx.metrics.topic_messages_total.increment(1);
                ctx.observer
                    .topic_message(&topic, &message.origin, &message.data);
            }
            Err(e) if e.is_terminal() => {
                debug!(%topic, %e, "Topic pump stopped");
                break;
            }
            Err(e) => warn!(%topic, %e, "Topic subscription error"),
        }
    }
}
