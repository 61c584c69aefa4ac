//! Sweep scheduling - on-demand and periodic.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::sweeper::SweepReport;
use vpsgate_common::{Error, Result};

/// Requests accepted by the scheduler task.
#[derive(Debug)]
pub enum SweepRequest {
    /// Sweep now.
    Sweep,
    /// Stop the scheduler.
    Shutdown,
}

type Envelope = (SweepRequest, oneshot::Sender<SweepReport>);

/// Client side of the scheduler.
#[derive(Clone)]
pub struct SweepScheduler {
    request_tx: mpsc::Sender<Envelope>,
    shutdown: Arc<RwLock<bool>>,
}

impl SweepScheduler {
    /// Create a scheduler ticking every `period`.
    ///
    /// The first periodic sweep happens one full period after the handle
    /// starts running.
    pub fn new(period: Duration) -> (Self, SweepSchedulerHandle) {
        let (request_tx, request_rx) = mpsc::channel(16);
        let shutdown = Arc::new(RwLock::new(false));

        let scheduler = Self {
            request_tx,
            shutdown: shutdown.clone(),
        };
        let handle = SweepSchedulerHandle {
            period,
            request_rx,
            shutdown,
        };
        (scheduler, handle)
    }

    /// Run a sweep now and wait for its report.
    ///
    /// # Errors
    /// - The scheduler task is not running
    pub async fn request_sweep(&self) -> Result<SweepReport> {
        let (response_tx, response_rx) = oneshot::channel();

        self.request_tx
            .send((SweepRequest::Sweep, response_tx))
            .await
            .map_err(|_| Error::Scheduler("sweep scheduler not running".to_string()))?;

        response_rx
            .await
            .map_err(|_| Error::Scheduler("sweep scheduler dropped the request".to_string()))
    }

    /// Stop the scheduler. A sweep in progress finishes first.
    pub async fn shutdown(&self) {
        *self.shutdown.write().await = true;

        let (response_tx, _) = oneshot::channel();
        let _ = self
            .request_tx
            .send((SweepRequest::Shutdown, response_tx))
            .await;
    }
}

/// Scheduler background task.
pub struct SweepSchedulerHandle {
    period: Duration,
    request_rx: mpsc::Receiver<Envelope>,
    shutdown: Arc<RwLock<bool>>,
}

impl SweepSchedulerHandle {
    /// Run until shut down. Spawn this on a tokio task.
    ///
    /// `sweep_fn` is called with the current time for every periodic tick
    /// and every request.
    pub async fn run<F, Fut>(mut self, sweep_fn: F)
    where
        F: Fn(DateTime<Utc>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SweepReport> + Send,
    {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = self.period.as_secs(), "sweep scheduler started");

        loop {
            if *self.shutdown.read().await {
                break;
            }

            tokio::select! {
                request = self.request_rx.recv() => {
                    match request {
                        Some((SweepRequest::Sweep, response_tx)) => {
                            debug!("processing sweep request");
                            let report = sweep_fn(Utc::now()).await;
                            let _ = response_tx.send(report);
                        }
                        Some((SweepRequest::Shutdown, _)) => {
                            info!("received shutdown request");
                            break;
                        }
                        // Every client is gone.
                        None => break,
                    }
                }

                _ = ticker.tick() => {
                    debug!("triggering periodic sweep");
                    let report = sweep_fn(Utc::now()).await;
                    if !report.is_clean() {
                        for failure in &report.failed {
                            error!(
                                username = %failure.username,
                                error = %failure.error,
                                "periodic sweep could not fully remove account"
                            );
                        }
                    }
                }
            }
        }

        info!("sweep scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vpsgate_common::Username;

    fn counting(count: Arc<AtomicU32>) -> impl Fn(DateTime<Utc>) -> std::future::Ready<SweepReport> {
        move |_now| {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(SweepReport {
                attempted: vec![Username::new("expired").unwrap()],
                failed: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_request_sweep() {
        let (scheduler, handle) = SweepScheduler::new(Duration::from_secs(3600));
        let count = Arc::new(AtomicU32::new(0));
        let task = tokio::spawn(handle.run(counting(count.clone())));

        let report = scheduler.request_sweep().await.unwrap();
        assert_eq!(report.attempted.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_periodic_ticks() {
        let (scheduler, handle) = SweepScheduler::new(Duration::from_millis(20));
        let count = Arc::new(AtomicU32::new(0));
        let task = tokio::spawn(handle.run(counting(count.clone())));

        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.shutdown().await;
        task.await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_request_after_shutdown_fails() {
        let (scheduler, handle) = SweepScheduler::new(Duration::from_secs(3600));
        let task = tokio::spawn(handle.run(counting(Arc::new(AtomicU32::new(0)))));

        scheduler.shutdown().await;
        task.await.unwrap();

        let result = scheduler.request_sweep().await;
        assert!(matches!(result, Err(Error::Scheduler(_))));
    }
}
