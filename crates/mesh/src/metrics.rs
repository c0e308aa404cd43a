//! Mesh node metrics.

use metrics::Counter;

/// Counters shared by the dispatcher and background tasks.
#[derive(Clone, Debug)]
pub(crate) struct MeshMetrics {
    /// Topic messages handed to the observer.
    pub(crate) topic_messages_total: Counter,
    /// Topic messages dropped because this node published them.
    pub(crate) topic_messages_suppressed_total: Counter,
    /// Direct-stream lines handed to the observer.
    pub(crate) direct_messages_total: Counter,
    /// Peers skipped by a broadcast.
    pub(crate) broadcast_skipped_total: Counter,
}

impl Default for MeshMetrics {
    fn default() -> Self {
        Self {
            topic_messages_total: metrics::counter!("meshlink_topic_messages_total"),
            topic_messages_suppressed_total: metrics::counter!(
                "meshlink_topic_messages_suppressed_total"
            ),
            direct_messages_total: metrics::counter!("meshlink_direct_messages_total"),
            broadcast_skipped_total: metrics::counter!("meshlink_broadcast_skipped_total"),
        }
    }
}

impl MeshMetrics {
    /// Count one executed command.
    pub(crate) fn record_command(&self, command: &'static str, success: bool) {
        let outcome = if success { "success" } else { "error" };
        metrics::counter!("meshlink_commands_total", "command" => command, "outcome" => outcome)
            .increment(1);
    }
}

/// Register descriptions for every mesh metric with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "meshlink_commands_total",
        "Control commands executed, by command and outcome"
    );
    metrics::describe_counter!(
        "meshlink_topic_messages_total",
        "Topic messages delivered to the observer"
    );
    metrics::describe_counter!(
        "meshlink_topic_messages_suppressed_total",
        "Topic messages dropped because they were published by this node"
    );
    metrics::describe_counter!(
        "meshlink_direct_messages_total",
        "Direct-stream lines delivered to the observer"
    );
    metrics::describe_counter!(
        "meshlink_broadcast_skipped_total",
        "Peers skipped by broadcasts because no stream could be opened"
    );
}
