//! Prometheus recorder and HTTP exporter.

use std::{
    net::SocketAddr,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use eyre::WrapErr;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, info, warn};

/// How often histograms are drained.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Handle to the installed prometheus recorder.
pub struct PrometheusRecorder {
    handle: PrometheusHandle,
    upkeep_started: AtomicBool,
}

impl std::fmt::Debug for PrometheusRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusRecorder")
            .field("upkeep_started", &self.upkeep_started.load(Ordering::Relaxed))
            .finish()
    }
}

impl PrometheusRecorder {
    /// Install the global recorder and serve `/metrics` on `addr`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install(addr: SocketAddr) -> eyre::Result<Self> {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(addr)
            .build()
            .wrap_err_with(|| format!("failed to build prometheus exporter on {addr}"))?;
        let handle = recorder.handle();

        metrics::set_global_recorder(recorder)
            .map_err(|e| eyre::eyre!("failed to install metrics recorder: {e}"))?;

        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                warn!(?e, "Prometheus exporter stopped");
            }
        });
        info!(%addr, "Metrics endpoint started");

        let recorder = Self {
            handle,
            upkeep_started: AtomicBool::new(false),
        };
        recorder.spawn_upkeep(UPKEEP_INTERVAL);
        Ok(recorder)
    }

    /// Periodically run recorder upkeep. Only the first call has an effect.
    pub fn spawn_upkeep(&self, interval: Duration) {
        if self
            .upkeep_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let handle = self.handle.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                handle.run_upkeep();
            }
        });
        debug!(?interval, "Metrics upkeep started");
    }
}
