//! Wires the kernel, pruner loop and snapshot loop together behind a
//! single cancellation token, and drives graceful shutdown. Grounded on
//! the spec's own concurrency model: prune, snapshot, and per-subscriber
//! delivery are independent cooperative tasks sharing a root token
//! (`tokio_util::sync::CancellationToken`), the way the teacher's
//! `kv-cli` uses `ctrlc` for a single shutdown flag generalized here to a
//! proper multi-task cancellation tree since the whole binary already
//! runs under a `tokio` runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::kernel::Kernel;
use crate::snapshot::SnapshotEngine;

pub struct Server {
    kernel: Arc<Kernel>,
    snapshot_engine: Option<Arc<SnapshotEngine>>,
    cancellation: CancellationToken,
}

impl Server {
    pub fn new(kernel: Arc<Kernel>) -> Self {
        let snapshot_engine = SnapshotEngine::from_config(kernel.config()).map(Arc::new);
        Server { kernel, snapshot_engine, cancellation: CancellationToken::new() }
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Restores from the newest readable snapshot, unless `StartFresh`.
    /// Returns whether a restore actually happened.
    pub fn restore_on_startup(&self) -> Result<bool, crate::error::Error> {
        if self.kernel.config().is_start_fresh() {
            return Ok(false);
        }
        match &self.snapshot_engine {
            Some(engine) => engine.restore(&self.kernel),
            None => Ok(false),
        }
    }

    /// Spawns the background pruning and snapshot loops, and a task that
    /// waits for either SIGINT or the cancellation token to fire the
    /// graceful shutdown sequence. Returns once shutdown has completed
    /// or `GracefulShutdownTimeout` has elapsed.
    pub async fn run(self) {
        let prune_loop = tokio::spawn(prune_loop(self.kernel.clone(), self.cancellation.clone()));
        let snapshot_loop = self.snapshot_engine.clone().map(|engine| {
            tokio::spawn(snapshot_loop(self.kernel.clone(), engine, self.cancellation.clone()))
        });

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("received interrupt signal, starting graceful shutdown");
            }
            _ = self.cancellation.cancelled() => {}
        }
        self.cancellation.cancel();

        let shutdown_timeout = self.kernel.config().graceful_shutdown_timeout();
        let drain = async {
            let _ = prune_loop.await;
            if let Some(handle) = snapshot_loop {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            log::warn!("background loops did not drain within the graceful shutdown timeout");
        }

        if let Some(engine) = &self.snapshot_engine {
            match engine.emit(&self.kernel) {
                Ok(path) => log::info!("wrote final snapshot to {}", path.display()),
                Err(e) => log::error!("final snapshot failed: {e}"),
            }
        }
    }
}

async fn prune_loop(kernel: Arc<Kernel>, cancellation: CancellationToken) {
    let mut ticker = interval(kernel.config().prune_interval());
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => break,
            _ = ticker.tick() => {
                let at = kernel.config().prune_at();
                if at > 0 {
                    kernel.prune_to(kernel.config().prune_to(), false).await;
                }
            }
        }
    }
}

async fn snapshot_loop(kernel: Arc<Kernel>, engine: Arc<SnapshotEngine>, cancellation: CancellationToken) {
    let mut ticker = interval(kernel.config().snapshot.interval());
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => break,
            _ = ticker.tick() => {
                match engine.emit(&kernel) {
                    Ok(_) => kernel.metrics().record_snapshot_written(),
                    Err(e) => {
                        log::error!("periodic snapshot failed: {e}");
                        kernel.metrics().record_snapshot_failure();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    #[tokio::test]
    async fn cancellation_stops_prune_loop_promptly() {
        let mut cfg = Configuration::default();
        cfg.prune_interval_secs = Some(3600);
        let kernel = Arc::new(Kernel::new(cfg));
        let token = CancellationToken::new();
        let handle = tokio::spawn(prune_loop(kernel, token.clone()));
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
