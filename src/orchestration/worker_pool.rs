//! # Worker Pools
//!
//! Bounded parallelism for generation calls, one pool per generation kind so
//! slow image calls cannot starve description calls.
//!
//! ```text
//! submit() → spawn → [job slots] → [Semaphore] → runner.run() → completion_sender
//!                         │              │
//!                         │              └─→ at most `max_workers` runners per kind
//!                         └─→ optional per-job cap below the pool size
//! ```
//!
//! The job's own slot is taken first so a capped job never parks a pool slot
//! while it waits.
//!
//! Submission never waits for a slot: the spawned task does. Panics inside a
//! runner are caught and turned into a faulted completion so the job's
//! collector can still account for the item.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info};

use crate::config::{GenerationConfig, PoolConfig};
use crate::generation::GenerationFailure;
use crate::models::{GenerationKind, ItemOutcome};

use super::job_runner::JobRunner;
use super::types::{panic_message, ItemCompletion, WorkUnit, WorkerFault};

/// Counters for one pool
#[derive(Debug, Default)]
pub struct PoolStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    faulted: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub faulted: u64,
    pub in_flight: usize,
}

pub struct WorkerPool {
    kind: GenerationKind,
    semaphore: Arc<Semaphore>,
    max_workers: usize,
    timeout: Duration,
    stats: Arc<PoolStats>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("kind", &self.kind)
            .field("max_workers", &self.max_workers)
            .field("timeout", &self.timeout)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(kind: GenerationKind, config: &PoolConfig) -> Self {
        Self {
            kind,
            semaphore: Arc::new(Semaphore::new(config.max_workers)),
            max_workers: config.max_workers,
            timeout: config.timeout(),
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn kind(&self) -> GenerationKind {
        self.kind
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runners currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_workers.saturating_sub(self.semaphore.available_permits())
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            faulted: self.stats.faulted.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Stop accepting work. Queued runners that have not started report a
    /// [`WorkerFault::PoolClosed`] completion instead of running.
    pub fn close(&self) {
        self.semaphore.close();
        info!(kind = %self.kind, "🏊 POOL: Closed");
    }

    /// Hand a claimed item to the pool; returns as soon as the work is queued
    pub fn submit(
        &self,
        runner: Arc<JobRunner>,
        unit: WorkUnit,
        completion_sender: mpsc::Sender<ItemCompletion>,
    ) -> Result<(), WorkerFault> {
        if self.is_closed() {
            return Err(WorkerFault::PoolClosed { kind: self.kind });
        }

        let kind = self.kind;
        let semaphore = self.semaphore.clone();
        let timeout = self.timeout;
        let stats = self.stats.clone();
        stats.submitted.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let queued_at = Instant::now();
            let job_id = unit.job_id;
            let item_id = unit.item_id();

            // Job semaphores are never closed
            let job_permit = match unit.job_slots.clone() {
                Some(slots) => slots.acquire_owned().await.ok(),
                None => None,
            };

            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!(
                        kind = %kind,
                        job_id = %job_id,
                        item_id = %item_id,
                        "🏊 POOL: Semaphore closed before the item ran"
                    );
                    stats.faulted.fetch_add(1, Ordering::Relaxed);
                    let fault = WorkerFault::PoolClosed { kind };
                    let completion = ItemCompletion::faulted(
                        job_id,
                        item_id,
                        ItemOutcome::failed(GenerationFailure::transient(fault.to_string())),
                        fault,
                        0,
                    );
                    if completion_sender.send(completion).await.is_err() {
                        error!(job_id = %job_id, "🏊 POOL: Completion channel closed");
                    }
                    return;
                }
            };

            debug!(
                kind = %kind,
                job_id = %job_id,
                item_id = %item_id,
                waited_ms = queued_at.elapsed().as_millis() as u64,
                "🏊 POOL: Slot acquired"
            );

            let started = Instant::now();
            let completion = match AssertUnwindSafe(runner.run(&unit, timeout))
                .catch_unwind()
                .await
            {
                Ok(completion) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                    completion
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(
                        kind = %kind,
                        job_id = %job_id,
                        item_id = %item_id,
                        panic_msg = %message,
                        "🏊 POOL: Runner panicked"
                    );
                    stats.faulted.fetch_add(1, Ordering::Relaxed);
                    let fault = WorkerFault::Panicked(message);
                    ItemCompletion::faulted(
                        job_id,
                        item_id,
                        ItemOutcome::failed(GenerationFailure::permanent(fault.to_string())),
                        fault,
                        started.elapsed().as_millis() as u64,
                    )
                }
            };

            // Free the slots before a possibly blocking send
            drop(permit);
            drop(job_permit);

            if completion_sender.send(completion).await.is_err() {
                error!(
                    job_id = %job_id,
                    item_id = %item_id,
                    "🏊 POOL: Completion channel closed, outcome dropped"
                );
            }
        });

        Ok(())
    }
}

/// The two per-kind pools
#[derive(Debug)]
pub struct WorkerPools {
    description: WorkerPool,
    image: WorkerPool,
}

impl WorkerPools {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            description: WorkerPool::new(GenerationKind::Description, &config.description),
            image: WorkerPool::new(GenerationKind::Image, &config.image),
        }
    }

    pub fn pool(&self, kind: GenerationKind) -> &WorkerPool {
        match kind {
            GenerationKind::Description => &self.description,
            GenerationKind::Image => &self.image,
        }
    }

    pub fn close(&self) {
        self.description.close();
        self.image.close();
    }
}
