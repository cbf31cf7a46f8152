//! Process lifecycle: start the pools, serve one recycle interval, then drain.

use crate::pool::Drainable;
use sigwarden_core::config::WorkerConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// How often the drain loop samples the in-flight count.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Result of a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing was left in flight.
    Drained,
    /// The shutdown wait expired with work still running.
    TimedOut { remaining: usize },
}

/// Starts workers, runs them for a bounded interval and then drains them.
///
/// The runner never cancels a handler. Work still running when the shutdown
/// wait expires is left to finish or to be redelivered after its lease.
#[derive(Debug, Clone, Copy)]
pub struct Runner {
    recycle_interval: Duration,
    max_shutdown_wait: Duration,
    poll_interval: Duration,
}

impl Runner {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            recycle_interval: config.recycle_interval(),
            max_shutdown_wait: config.max_shutdown_wait(),
            poll_interval: DRAIN_POLL_INTERVAL,
        }
    }

    /// Start the workers with `start`, serve until the recycle interval
    /// elapses or `shutdown` resolves, then drain.
    ///
    /// The workers are handed back so the caller can join them.
    pub async fn run<D, S, F>(&self, start: S, shutdown: F) -> (D, DrainOutcome)
    where
        D: Drainable,
        S: FnOnce() -> D,
        F: Future<Output = ()>,
    {
        let workers = start();
        tracing::info!(
            recycle_interval_secs = self.recycle_interval.as_secs(),
            "Workers started"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.recycle_interval) => {
                tracing::info!(
                    recycle_interval_secs = self.recycle_interval.as_secs(),
                    "Recycle interval elapsed, shutting down"
                );
            }
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
        }

        let outcome = self.drain(&workers).await;
        (workers, outcome)
    }

    /// Stop intake and wait for in-flight work, bounded by the shutdown wait.
    pub async fn drain<D>(&self, workers: &D) -> DrainOutcome
    where
        D: Drainable + ?Sized,
    {
        workers.stop_accepting();
        let started = Instant::now();

        loop {
            let remaining = workers.in_flight();
            if remaining == 0 {
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "All in-flight messages completed, shutdown clean"
                );
                return DrainOutcome::Drained;
            }

            if started.elapsed() >= self.max_shutdown_wait {
                tracing::warn!(
                    remaining,
                    max_shutdown_wait_secs = self.max_shutdown_wait.as_secs(),
                    "Shutdown wait expired with messages still in flight"
                );
                return DrainOutcome::TimedOut { remaining };
            }

            tracing::debug!(remaining, "Waiting for in-flight messages");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
