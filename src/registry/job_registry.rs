//! # Job Registry
//!
//! Create, look up and advance job records. Pollers only ever read from here.
//!
//! ## Concurrency
//!
//! Each job lives behind its own mutex, so every operation on a single job is
//! linearized while operations on different jobs never contend. A second map
//! holds the single in-flight batch per (container, kind); claiming that slot
//! and creating the job happen under the slot's shard lock, which makes the
//! batch guard atomic under concurrent `create` calls.
//!
//! Lock order is always slot shard → job mutex. Finalization drops the job
//! mutex before releasing the slot.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{GenerationKind, ItemOutcome, Job, JobScope, JobStatusView};
use crate::state_machine::{transition, JobEvent, JobState, StateMachineError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("A {kind} batch is already active for container {container_id}: job {job_id}")]
    AlreadyActive {
        container_id: Uuid,
        kind: GenerationKind,
        job_id: Uuid,
    },

    #[error("Job {job_id} is already {state}")]
    Terminal { job_id: Uuid, state: JobState },

    #[error("Job must cover at least one item")]
    EmptyJob,

    #[error("Outcome for item {item_id} already recorded on job {job_id}")]
    DuplicateOutcome { job_id: Uuid, item_id: Uuid },

    #[error("Job {job_id} cannot accept outcomes while {state}")]
    NotProcessing { job_id: Uuid, state: JobState },

    #[error("Job {job_id} already left PENDING ({state}) and cannot be discarded")]
    NotPending { job_id: Uuid, state: JobState },

    #[error(transparent)]
    Transition(#[from] StateMachineError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Storage for job records.
///
/// The in-memory implementation serves a single process; a durable store can
/// implement the same trait without changes to the orchestrator.
#[async_trait]
pub trait JobRegistry: Send + Sync + 'static {
    /// Create a PENDING job with progress `0/total`.
    ///
    /// Batch-scoped jobs fail with [`RegistryError::AlreadyActive`] while
    /// another batch of the same kind is active for the container.
    async fn create(
        &self,
        kind: GenerationKind,
        container_id: Uuid,
        scope: JobScope,
        total: usize,
    ) -> RegistryResult<Job>;

    /// Snapshot of a job. Never mutates.
    async fn get(&self, job_id: Uuid) -> RegistryResult<Job>;

    /// PENDING → PROCESSING
    async fn start(&self, job_id: Uuid) -> RegistryResult<Job>;

    /// Record one item outcome; finalizes the job when the last item resolves.
    async fn advance(
        &self,
        job_id: Uuid,
        item_id: Uuid,
        outcome: ItemOutcome,
    ) -> RegistryResult<Job>;

    /// Fail the job immediately because of an orchestration fault
    async fn fail(&self, job_id: Uuid, fault: &str) -> RegistryResult<Job>;

    /// Remove a job that never started, releasing its batch slot.
    ///
    /// Used when a request turns into a rejection after the job was created,
    /// so no trace of it stays visible to pollers.
    async fn discard(&self, job_id: Uuid) -> RegistryResult<()>;

    /// The active batch job of `kind` for the container, if any
    async fn active_batch(&self, container_id: Uuid, kind: GenerationKind) -> Option<Uuid>;

    /// All jobs created for a container, newest first
    async fn jobs_for_container(&self, container_id: Uuid) -> Vec<Job>;

    /// Drop terminal jobs that finished more than `older_than` ago
    async fn prune_terminal(&self, older_than: Duration) -> usize;

    /// Poller view of a job
    async fn status(&self, job_id: Uuid) -> RegistryResult<JobStatusView> {
        Ok(self.get(job_id).await?.status_view())
    }
}

type SlotKey = (Uuid, GenerationKind);

/// Process-local registry backed by concurrent maps
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: DashMap<Uuid, Arc<Mutex<Job>>>,
    active_batches: DashMap<SlotKey, Uuid>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn job_cell(&self, job_id: Uuid) -> RegistryResult<Arc<Mutex<Job>>> {
        self.jobs
            .get(&job_id)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::NotFound(job_id))
    }

    fn is_job_active(&self, job_id: Uuid) -> bool {
        self.jobs
            .get(&job_id)
            .map(|entry| entry.value().lock().state.is_active())
            .unwrap_or(false)
    }

    fn insert_job(&self, job: Job) -> Job {
        let snapshot = job.clone();
        self.jobs.insert(job.id, Arc::new(Mutex::new(job)));
        snapshot
    }

    /// Release the batch slot held by a job that just became terminal
    fn release_slot(&self, job: &Job) {
        if job.scope == JobScope::Batch {
            self.active_batches
                .remove_if(&(job.container_id, job.kind), |_, holder| *holder == job.id);
        }
    }

    fn finalize(job: &mut Job) -> RegistryResult<()> {
        let final_state = job.aggregate_state();
        let event = match final_state {
            JobState::Failed => JobEvent::fail_with_error("all items failed"),
            _ => JobEvent::Complete,
        };
        job.state = transition(job.state, &event)?;
        job.error_summary = job.summarize_failures();
        job.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl JobRegistry for InMemoryJobRegistry {
    async fn create(
        &self,
        kind: GenerationKind,
        container_id: Uuid,
        scope: JobScope,
        total: usize,
    ) -> RegistryResult<Job> {
        if total == 0 {
            return Err(RegistryError::EmptyJob);
        }

        let job = Job::new(kind, container_id, scope, total);

        let snapshot = match scope {
            JobScope::Item(_) => self.insert_job(job),
            JobScope::Batch => match self.active_batches.entry((container_id, kind)) {
                Entry::Occupied(mut slot) => {
                    let holder = *slot.get();
                    if self.is_job_active(holder) {
                        return Err(RegistryError::AlreadyActive {
                            container_id,
                            kind,
                            job_id: holder,
                        });
                    }
                    // Holder finished or was pruned before releasing its slot
                    slot.insert(job.id);
                    self.insert_job(job)
                }
                Entry::Vacant(slot) => {
                    slot.insert(job.id);
                    self.insert_job(job)
                }
            },
        };

        info!(
            job_id = %snapshot.id,
            container_id = %container_id,
            kind = %kind,
            total = total,
            "📋 REGISTRY: Job created"
        );
        Ok(snapshot)
    }

    async fn get(&self, job_id: Uuid) -> RegistryResult<Job> {
        let cell = self.job_cell(job_id)?;
        let job = cell.lock().clone();
        Ok(job)
    }

    async fn start(&self, job_id: Uuid) -> RegistryResult<Job> {
        let cell = self.job_cell(job_id)?;
        let mut job = cell.lock();
        job.state = transition(job.state, &JobEvent::Start)?;
        job.started_at = Some(Utc::now());
        debug!(job_id = %job_id, "📋 REGISTRY: Job processing");
        Ok(job.clone())
    }

    async fn advance(
        &self,
        job_id: Uuid,
        item_id: Uuid,
        outcome: ItemOutcome,
    ) -> RegistryResult<Job> {
        let cell = self.job_cell(job_id)?;
        let snapshot = {
            let mut job = cell.lock();

            if job.state.is_terminal() {
                return Err(RegistryError::Terminal {
                    job_id,
                    state: job.state,
                });
            }
            if job.state != JobState::Processing {
                return Err(RegistryError::NotProcessing {
                    job_id,
                    state: job.state,
                });
            }
            if job.results.iter().any(|result| result.item_id == item_id) {
                return Err(RegistryError::DuplicateOutcome { job_id, item_id });
            }

            job.record_outcome(item_id, outcome);
            debug!(
                job_id = %job_id,
                item_id = %item_id,
                completed = job.progress.completed,
                total = job.progress.total,
                "📋 REGISTRY: Job advanced"
            );

            if job.progress.is_done() {
                Self::finalize(&mut job)?;
                info!(
                    job_id = %job_id,
                    state = %job.state,
                    succeeded = job.progress.succeeded,
                    failed = job.progress.failed,
                    skipped = job.progress.skipped,
                    "✅ REGISTRY: Job finalized"
                );
            }
            job.clone()
        };

        if snapshot.is_terminal() {
            self.release_slot(&snapshot);
        }
        Ok(snapshot)
    }

    async fn fail(&self, job_id: Uuid, fault: &str) -> RegistryResult<Job> {
        let cell = self.job_cell(job_id)?;
        let snapshot = {
            let mut job = cell.lock();
            if job.state.is_terminal() {
                return Err(RegistryError::Terminal {
                    job_id,
                    state: job.state,
                });
            }
            job.state = transition(job.state, &JobEvent::fail_with_error(fault))?;
            job.error_summary = Some(match job.summarize_failures() {
                Some(failures) => format!("Orchestration fault: {fault}\n{failures}"),
                None => format!("Orchestration fault: {fault}"),
            });
            job.completed_at = Some(Utc::now());
            job.clone()
        };

        warn!(job_id = %job_id, fault = %fault, "❌ REGISTRY: Job failed by orchestration fault");
        self.release_slot(&snapshot);
        Ok(snapshot)
    }

    async fn discard(&self, job_id: Uuid) -> RegistryResult<()> {
        let cell = self.job_cell(job_id)?;
        let snapshot = {
            let job = cell.lock();
            if job.state != JobState::Pending {
                return Err(RegistryError::NotPending {
                    job_id,
                    state: job.state,
                });
            }
            job.clone()
        };

        self.jobs.remove(&job_id);
        self.release_slot(&snapshot);
        debug!(job_id = %job_id, "📋 REGISTRY: Pending job discarded");
        Ok(())
    }

    async fn active_batch(&self, container_id: Uuid, kind: GenerationKind) -> Option<Uuid> {
        let holder = self
            .active_batches
            .get(&(container_id, kind))
            .map(|entry| *entry.value())?;
        self.is_job_active(holder).then_some(holder)
    }

    async fn jobs_for_container(&self, container_id: Uuid) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .map(|entry| entry.value().lock().clone())
            .filter(|job| job.container_id == container_id)
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    async fn prune_terminal(&self, older_than: Duration) -> usize {
        let cutoff = match chrono::Duration::from_std(older_than) {
            Ok(age) => Utc::now() - age,
            Err(_) => return 0,
        };

        let before = self.jobs.len();
        self.jobs.retain(|_, cell| {
            let job = cell.lock();
            !(job.state.is_terminal() && job.completed_at.is_some_and(|done| done < cutoff))
        });
        let pruned = before.saturating_sub(self.jobs.len());

        if pruned > 0 {
            info!(pruned = pruned, "🧹 REGISTRY: Pruned terminal jobs");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationFailure;

    async fn processing_batch(registry: &InMemoryJobRegistry, total: usize) -> Job {
        let job = registry
            .create(GenerationKind::Description, Uuid::new_v4(), JobScope::Batch, total)
            .await
            .unwrap();
        registry.start(job.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_starts_pending_with_zero_progress() {
        let registry = InMemoryJobRegistry::new();
        let job = registry
            .create(GenerationKind::Image, Uuid::new_v4(), JobScope::Batch, 4)
            .await
            .unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.progress.completed, 0);
        assert_eq!(job.progress.total, 4);
    }

    #[tokio::test]
    async fn test_batch_guard_per_container_and_kind() {
        let registry = InMemoryJobRegistry::new();
        let container_id = Uuid::new_v4();

        let first = registry
            .create(GenerationKind::Description, container_id, JobScope::Batch, 2)
            .await
            .unwrap();

        let err = registry
            .create(GenerationKind::Description, container_id, JobScope::Batch, 2)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::AlreadyActive {
                container_id,
                kind: GenerationKind::Description,
                job_id: first.id
            }
        );

        // Other kind and single-item jobs are unaffected
        assert!(registry
            .create(GenerationKind::Image, container_id, JobScope::Batch, 2)
            .await
            .is_ok());
        assert!(registry
            .create(
                GenerationKind::Description,
                container_id,
                JobScope::Item(Uuid::new_v4()),
                1
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_slot_released_after_finalization() {
        let registry = InMemoryJobRegistry::new();
        let job = processing_batch(&registry, 1).await;

        let done = registry
            .advance(job.id, Uuid::new_v4(), ItemOutcome::Succeeded)
            .await
            .unwrap();
        assert_eq!(done.state, JobState::Completed);
        assert_eq!(
            registry
                .active_batch(job.container_id, GenerationKind::Description)
                .await,
            None
        );

        assert!(registry
            .create(GenerationKind::Description, job.container_id, JobScope::Batch, 1)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_advance_rejects_after_terminal() {
        let registry = InMemoryJobRegistry::new();
        let job = processing_batch(&registry, 1).await;
        registry
            .advance(
                job.id,
                Uuid::new_v4(),
                ItemOutcome::failed(GenerationFailure::permanent("bad")),
            )
            .await
            .unwrap();

        let err = registry
            .advance(job.id, Uuid::new_v4(), ItemOutcome::Succeeded)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Terminal {
                state: JobState::Failed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_advance_requires_processing_and_unique_items() {
        let registry = InMemoryJobRegistry::new();
        let pending = registry
            .create(GenerationKind::Description, Uuid::new_v4(), JobScope::Batch, 2)
            .await
            .unwrap();
        assert!(matches!(
            registry
                .advance(pending.id, Uuid::new_v4(), ItemOutcome::Succeeded)
                .await,
            Err(RegistryError::NotProcessing { .. })
        ));

        let job = registry.start(pending.id).await.unwrap();
        let item_id = Uuid::new_v4();
        registry
            .advance(job.id, item_id, ItemOutcome::Succeeded)
            .await
            .unwrap();
        assert_eq!(
            registry
                .advance(job.id, item_id, ItemOutcome::Succeeded)
                .await
                .unwrap_err(),
            RegistryError::DuplicateOutcome {
                job_id: job.id,
                item_id
            }
        );
    }

    #[tokio::test]
    async fn test_fault_fails_job_and_frees_slot() {
        let registry = InMemoryJobRegistry::new();
        let job = processing_batch(&registry, 3).await;
        registry
            .advance(job.id, Uuid::new_v4(), ItemOutcome::Succeeded)
            .await
            .unwrap();

        let failed = registry.fail(job.id, "worker pool closed").await.unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.progress.completed, 1);
        assert!(failed
            .error_summary
            .as_deref()
            .unwrap()
            .contains("worker pool closed"));
        assert!(registry.fail(job.id, "again").await.is_err());
        assert_eq!(
            registry
                .active_batch(job.container_id, GenerationKind::Description)
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_discard_removes_pending_job_and_frees_slot() {
        let registry = InMemoryJobRegistry::new();
        let container_id = Uuid::new_v4();
        let kind = GenerationKind::Image;
        let job = registry
            .create(kind, container_id, JobScope::Batch, 2)
            .await
            .unwrap();

        registry.discard(job.id).await.unwrap();
        assert!(matches!(
            registry.get(job.id).await,
            Err(RegistryError::NotFound(_))
        ));
        assert_eq!(registry.active_batch(container_id, kind).await, None);
        assert!(registry.is_empty());

        // A started job stays; it has to be failed instead
        let started = registry
            .create(kind, container_id, JobScope::Batch, 2)
            .await
            .unwrap();
        registry.start(started.id).await.unwrap();
        assert_eq!(
            registry.discard(started.id).await.unwrap_err(),
            RegistryError::NotPending {
                job_id: started.id,
                state: JobState::Processing
            }
        );
        assert_eq!(
            registry.active_batch(container_id, kind).await,
            Some(started.id)
        );
    }

    #[tokio::test]
    async fn test_prune_only_removes_old_terminal_jobs() {
        let registry = InMemoryJobRegistry::new();
        let done = processing_batch(&registry, 1).await;
        registry
            .advance(done.id, Uuid::new_v4(), ItemOutcome::Succeeded)
            .await
            .unwrap();
        let active = processing_batch(&registry, 1).await;

        assert_eq!(registry.prune_terminal(Duration::from_secs(60)).await, 0);
        assert_eq!(registry.prune_terminal(Duration::ZERO).await, 1);
        assert!(matches!(
            registry.get(done.id).await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(registry.get(active.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_is_idempotent() {
        let registry = InMemoryJobRegistry::new();
        let job = processing_batch(&registry, 2).await;
        let first = registry.status(job.id).await.unwrap();
        let second = registry.status(job.id).await.unwrap();
        assert_eq!(first, second);
    }
}
