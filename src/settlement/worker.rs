// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rampline

//! # Settlement Worker Pool
//!
//! Settlement work (chain submission, swap execution) is decoupled from the
//! webhook request path through a bounded queue feeding a fixed number of
//! worker tasks, so the number of concurrent chain submissions stays
//! controllable and failures surface in one place instead of scattered
//! fire-and-forget spawns.
//!
//! ## Shutdown
//!
//! Workers run until the `CancellationToken` fires, the same pattern the
//! HTTP server uses for graceful shutdown.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::engine::SettlementError;

/// One unit of settlement work.
#[derive(Debug, Clone)]
pub struct SettlementJob {
    pub order_id: String,
}

/// Capability to settle an order; implemented by the settlement engine and
/// by stubs in tests.
#[async_trait]
pub trait Settle: Send + Sync {
    async fn settle(&self, order_id: &str) -> Result<(), SettlementError>;
}

/// Handle for submitting settlement jobs.
#[derive(Clone)]
pub struct SettlementQueue {
    tx: mpsc::Sender<SettlementJob>,
}

impl SettlementQueue {
    /// Submit an order for settlement.
    ///
    /// Non-blocking: returns `false` when the queue is full or the pool has
    /// shut down, which is logged rather than propagated because webhook
    /// acks must not fail on backpressure.
    pub fn submit(&self, order_id: impl Into<String>) -> bool {
        let job = SettlementJob {
            order_id: order_id.into(),
        };
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(order_id = %job.order_id, "settlement queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(order_id = %job.order_id, "settlement pool is shut down, dropping job");
                false
            }
        }
    }
}

/// Bounded settlement worker pool.
pub struct SettlementPool;

impl SettlementPool {
    /// Spawn `workers` tasks draining a queue of the given depth.
    ///
    /// Returns the submission handle; the workers live until `shutdown`
    /// fires.
    pub fn start(
        settler: Arc<dyn Settle>,
        workers: usize,
        queue_depth: usize,
        shutdown: CancellationToken,
    ) -> SettlementQueue {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers {
            tokio::spawn(worker_loop(
                worker_id,
                settler.clone(),
                rx.clone(),
                shutdown.clone(),
            ));
        }

        SettlementQueue { tx }
    }
}

async fn worker_loop(
    worker_id: usize,
    settler: Arc<dyn Settle>,
    rx: Arc<Mutex<mpsc::Receiver<SettlementJob>>>,
    shutdown: CancellationToken,
) {
    info!(worker = worker_id, "settlement worker starting");

    loop {
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                job = rx.recv() => job,
                _ = shutdown.cancelled() => {
                    info!(worker = worker_id, "settlement worker shutting down");
                    return;
                }
            }
        };

        let Some(job) = job else {
            info!(worker = worker_id, "settlement queue closed");
            return;
        };

        match settler.settle(&job.order_id).await {
            Ok(()) => {
                info!(
                    worker = worker_id,
                    order_id = %job.order_id,
                    "settlement finished"
                );
            }
            Err(e) => {
                warn!(
                    worker = worker_id,
                    order_id = %job.order_id,
                    error = %e,
                    "settlement failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSettler {
        settled: AtomicUsize,
    }

    #[async_trait]
    impl Settle for CountingSettler {
        async fn settle(&self, _order_id: &str) -> Result<(), SettlementError> {
            self.settled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn workers_drain_submitted_jobs() {
        let settler = Arc::new(CountingSettler {
            settled: AtomicUsize::new(0),
        });
        let shutdown = CancellationToken::new();
        let queue = SettlementPool::start(settler.clone(), 2, 16, shutdown.clone());

        assert!(queue.submit("ord-1"));
        assert!(queue.submit("ord-2"));
        assert!(queue.submit("ord-3"));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while settler.settled.load(Ordering::SeqCst) < 3 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "jobs were not drained in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        shutdown.cancel();
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let settler = Arc::new(CountingSettler {
            settled: AtomicUsize::new(0),
        });
        // No workers: nothing drains, so the bound is deterministic.
        let queue = SettlementPool::start(settler, 0, 1, CancellationToken::new());

        assert!(queue.submit("ord-1"));
        assert!(!queue.submit("ord-2"));
    }

    #[tokio::test]
    async fn cancellation_stops_idle_workers() {
        let settler = Arc::new(CountingSettler {
            settled: AtomicUsize::new(0),
        });
        let shutdown = CancellationToken::new();
        let queue = SettlementPool::start(settler.clone(), 1, 4, shutdown.clone());

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The worker is gone; submission still succeeds into the queue but
        // nothing drains it.
        queue.submit("ord-after-shutdown");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(settler.settled.load(Ordering::SeqCst), 0);
    }
}
