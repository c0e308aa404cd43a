//! Line-oriented direct messaging over per-peer streams.

use std::{sync::Arc, time::Duration};

use futures::{AsyncRead, AsyncWriteExt, StreamExt, future::join_all};
use libp2p::{PeerId, StreamProtocol};
use meshlink_net_api::{Overlay, OverlayError};
use tokio::task::JoinHandle;
use tokio_util::{
    codec::{FramedRead, LinesCodec},
    compat::FuturesAsyncReadCompatExt,
};
use tracing::{debug, trace};

use crate::{Observer, metrics::MeshMetrics};

/// Outcome of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers the line was written to.
    pub delivered: Vec<PeerId>,
    /// Peers that could not be reached in time.
    pub skipped: Vec<PeerId>,
}

/// Accept inbound streams on `protocol` and relay their lines to `observer`.
///
/// Every stream gets its own reader task; a failing stream only ends its own reader.
/// Lines longer than `max_line_bytes` end the stream.
pub(crate) fn spawn_direct_handler<O: Overlay>(
    overlay: &O,
    protocol: StreamProtocol,
    max_line_bytes: usize,
    observer: Arc<dyn Observer>,
    metrics: MeshMetrics,
) -> Result<JoinHandle<()>, OverlayError> {
    let mut incoming = overlay.accept_streams(protocol.clone())?;
    debug!(%protocol, "Direct message handler registered");

    Ok(tokio::spawn(async move {
        while let Some((peer, stream)) = incoming.next().await {
            trace!(%peer, "Inbound direct stream");
            tokio::spawn(read_lines(
                peer,
                stream,
                max_line_bytes,
                observer.clone(),
                metrics.clone(),
            ));
        }
        debug!(%protocol, "Direct message handler stopped");
    }))
}

async fn read_lines<S: AsyncRead + Unpin>(
    peer: PeerId,
    stream: S,
    max_line_bytes: usize,
    observer: Arc<dyn Observer>,
    metrics: MeshMetrics,
) {
    let mut lines = FramedRead::new(stream.compat(), LinesCodec::new_with_max_length(max_line_bytes));
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) if line.is_empty() => {}
            Ok(line) => {
                metrics.direct_messages_total.increment(1);
                observer.direct_message(&peer, &line);
            }
            Err(e) => {
                debug!(%peer, %e, "Error reading direct stream");
                return;
            }
        }
    }
    trace!(%peer, "Direct stream closed");
}

/// Write `message` as one line to every connected peer at once.
///
/// Each peer gets at most `per_peer` to accept the line; peers that fail or
/// run out of time are skipped.
pub(crate) async fn broadcast<O: Overlay>(
    overlay: &O,
    protocol: &StreamProtocol,
    message: &str,
    per_peer: Duration,
    metrics: &MeshMetrics,
) -> BroadcastReport {
    let line = format!("{message}\n");

    let sends = overlay.connected_peers().into_iter().map(|peer| {
        let line = line.as_bytes();
        async move {
            let result =
                tokio::time::timeout(per_peer, send_line(overlay, peer, protocol, line)).await;
            (peer, result)
        }
    });

    let mut report = BroadcastReport::default();
    for (peer, result) in join_all(sends).await {
        match result {
            Ok(Ok(())) => report.delivered.push(peer),
            Ok(Err(e)) => {
                debug!(%peer, %e, "Skipping peer in broadcast");
                metrics.broadcast_skipped_total.increment(1);
                report.skipped.push(peer);
            }
            Err(_) => {
                debug!(%peer, ?per_peer, "Peer did not accept broadcast in time");
                metrics.broadcast_skipped_total.increment(1);
                report.skipped.push(peer);
            }
        }
    }

    debug!(
        delivered = report.delivered.len(),
        skipped = report.skipped.len(),
        "Broadcast finished"
    );
    report
}

async fn send_line<O: Overlay>(
    overlay: &O,
    peer: PeerId,
    protocol: &StreamProtocol,
    line: &[u8],
) -> std::io::Result<()> {
    let mut stream = overlay
        .open_stream(peer, protocol.clone())
        .await
        .map_err(std::io::Error::other)?;
    stream.write_all(line).await?;
    stream.flush().await?;
    stream.close().await
}
