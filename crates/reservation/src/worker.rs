//! Bounded worker pool for order placement
//!
//! Callers submit a job and receive an [`OrderTicket`] that resolves once with
//! the job's outcome. Each job runs exactly once. Dropping the ticket does not
//! cancel a job that a worker already picked up; its result is discarded.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::coordinator::ReservationCoordinator;
use crate::error::{ReservationError, Result};
use crate::identity::Identity;
use crate::metrics::ReservationMetrics;
use crate::types::{Order, OrderItem, UserId};

struct Job {
    identity: Identity,
    user_id: UserId,
    items: Vec<OrderItem>,
    reply: oneshot::Sender<Result<Order>>,
}

/// Pending outcome of a submitted order
#[derive(Debug)]
#[must_use = "an OrderTicket does nothing unless awaited"]
pub struct OrderTicket {
    rx: oneshot::Receiver<Result<Order>>,
}

impl Future for OrderTicket {
    type Output = Result<Order>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(ReservationError::Internal(
                    "reservation worker stopped before replying".to_string(),
                ))
            })
        })
    }
}

/// Fixed set of workers draining a bounded job queue
pub struct ReservationPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    metrics: ReservationMetrics,
}

impl ReservationPool {
    /// Spawn `workers` tasks sharing a queue of `queue_capacity` jobs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        coordinator: Arc<ReservationCoordinator>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(queue_capacity.max(1));
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let metrics = ReservationMetrics::new();

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&coordinator),
                    metrics.clone(),
                ))
            })
            .collect();

        info!(workers, queue_capacity, "Reservation pool started");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            metrics,
        }
    }

    /// Queue an order placement.
    ///
    /// Waits while the queue is full. Fails with `Unavailable` once the pool
    /// has been shut down.
    pub async fn submit(
        &self,
        identity: Identity,
        user_id: UserId,
        items: Vec<OrderItem>,
    ) -> Result<OrderTicket> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| ReservationError::Unavailable("reservation pool is shut down".to_string()))?;

        let (reply, rx) = oneshot::channel();
        let job = Job {
            identity,
            user_id,
            items,
            reply,
        };

        sender
            .send(job)
            .await
            .map_err(|_| ReservationError::Unavailable("reservation pool is shut down".to_string()))?;
        self.metrics.job_queued();

        Ok(OrderTicket { rx })
    }

    /// Submit and wait for the outcome
    pub async fn create_order(
        &self,
        identity: Identity,
        user_id: UserId,
        items: Vec<OrderItem>,
    ) -> Result<Order> {
        self.submit(identity, user_id, items).await?.await
    }

    /// Stop accepting jobs, let workers drain the queue, then wait for them
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Reservation worker ended abnormally");
            }
        }
        info!("Reservation pool stopped");
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    coordinator: Arc<ReservationCoordinator>,
    metrics: ReservationMetrics,
) {
    debug!(worker_id, "Reservation worker started");

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else { break };
        metrics.job_started();

        let Job {
            identity,
            user_id,
            items,
            reply,
        } = job;

        // A panicking job must not take the worker down with it
        let coordinator = Arc::clone(&coordinator);
        let outcome = tokio::spawn(async move {
            coordinator.create_order(&identity, user_id, items).await
        })
        .await
        .unwrap_or_else(|e| Err(ReservationError::Internal(format!("reservation job failed: {}", e))));

        if reply.send(outcome).is_err() {
            debug!(worker_id, user_id = %user_id, "Caller went away; order result discarded");
        }
    }

    debug!(worker_id, "Reservation worker stopped");
}
