//! # Batch Orchestrator
//!
//! Accepts generation requests, owns the resulting jobs until they finalize,
//! and is the only writer of job progress.
//!
//! ## Flow
//!
//! ```text
//! start_batch ─→ select targets ─→ registry.create (batch guard)
//!             ─→ store.claim_items (GENERATING, atomic per container)
//!             ─→ registry.start ─→ spawn collector ─→ pool.submit × N
//!
//! worker ──ItemCompletion──→ collector ─→ (last outcome) stage advance
//!                                      └─→ registry.advance ─→ finalize
//! ```
//!
//! Every job gets its own completion channel read by exactly one collector
//! task, so outcomes are applied one at a time without shared counters.
//! The container stage is settled before the last outcome is recorded, so a
//! poller that sees a terminal job also sees the stage it produced.
//! The request returns once the work is handed to the pool.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{OrchestrationConfig, SlidegenConfig};
use crate::constants::events;
use crate::error::{RejectionError, SlidegenError, SlidegenResult};
use crate::generation::{GenerationAdapter, GenerationFailure};
use crate::logging::{log_error, log_item_operation, log_job_operation};
use crate::models::{GenerationKind, ItemOutcome, JobScope, JobStatusView};
use crate::registry::{JobRegistry, RegistryError};
use crate::state_machine::JobState;
use crate::store::{ContainerStore, StoreError, WriteOutcome};

use super::job_runner::JobRunner;
use super::types::{BatchOptions, ItemCompletion, ItemOptions, WorkUnit, WorkerFault};
use super::worker_pool::WorkerPools;

pub struct BatchOrchestrator {
    registry: Arc<dyn JobRegistry>,
    store: Arc<dyn ContainerStore>,
    runner: Arc<JobRunner>,
    pools: Arc<WorkerPools>,
    config: OrchestrationConfig,
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("runner", &self.runner)
            .field("pools", &self.pools)
            .field("config", &self.config)
            .finish()
    }
}

/// Translate a store refusal into the caller-facing rejection
fn reject(error: StoreError) -> SlidegenError {
    match error {
        StoreError::ContainerNotFound(container_id) => {
            RejectionError::ContainerNotFound(container_id).into()
        }
        StoreError::ItemNotFound {
            container_id,
            item_id,
        } => RejectionError::ItemNotFound {
            container_id,
            item_id,
        }
        .into(),
        StoreError::ContentExists { item_id, kind } => {
            RejectionError::ContentExists { item_id, kind }.into()
        }
        StoreError::ItemBusy { item_id } => RejectionError::ItemBusy { item_id }.into(),
        StoreError::Transition(transition) => {
            RejectionError::InvalidTransition(transition.to_string()).into()
        }
        other => other.into(),
    }
}

impl BatchOrchestrator {
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        store: Arc<dyn ContainerStore>,
        adapter: Arc<dyn GenerationAdapter>,
        config: &SlidegenConfig,
    ) -> Self {
        let runner = Arc::new(JobRunner::new(adapter, store.clone()));
        let pools = Arc::new(WorkerPools::from_config(&config.generation));
        Self {
            registry,
            store,
            runner,
            pools,
            config: config.orchestration.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn JobRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ContainerStore> {
        &self.store
    }

    pub fn pools(&self) -> &WorkerPools {
        &self.pools
    }

    /// Generate `kind` content for every eligible item of a container.
    ///
    /// Returns the job id as soon as the work is handed to the worker pool.
    #[instrument(skip(self), fields(container_id = %container_id, kind = %kind))]
    pub async fn start_batch(
        &self,
        container_id: Uuid,
        kind: GenerationKind,
        options: BatchOptions,
    ) -> SlidegenResult<Uuid> {
        let items = self.store.list_items(container_id).await.map_err(reject)?;

        // Fast path; registry.create repeats the check atomically
        if let Some(job_id) = self.registry.active_batch(container_id, kind).await {
            return Err(RejectionError::AlreadyInProgress {
                container_id,
                kind,
                job_id,
            }
            .into());
        }

        let targets: Vec<Uuid> = items
            .iter()
            .filter(|item| !item.state.is_active())
            .filter(|item| options.force_regenerate_all || !item.has_payload(kind))
            .map(|item| item.id)
            .collect();

        if targets.is_empty() {
            return Err(RejectionError::NothingToGenerate { container_id, kind }.into());
        }

        let job = self
            .registry
            .create(kind, container_id, JobScope::Batch, targets.len())
            .await
            .map_err(|error| match error {
                RegistryError::AlreadyActive {
                    container_id,
                    kind,
                    job_id,
                } => RejectionError::AlreadyInProgress {
                    container_id,
                    kind,
                    job_id,
                }
                .into(),
                other => SlidegenError::from(other),
            })?;
        let job_id = job.id;
        log_job_operation(
            events::JOB_CREATED,
            job_id,
            kind,
            container_id,
            "PENDING",
            Some(&format!("{} target items", targets.len())),
        );

        let claim = match self
            .store
            .claim_items(container_id, kind, &targets, options.force_regenerate_all)
            .await
        {
            Ok(claim) => claim,
            Err(error) => {
                // Nothing was claimed, so this is a rejection and the job goes too
                if let Err(discard_error) = self.registry.discard(job_id).await {
                    warn!(job_id = %job_id, error = %discard_error, "Could not discard job");
                }
                return Err(reject(error));
            }
        };

        if let Err(error) = self.registry.start(job_id).await {
            let fault = format!("Failed to start job: {error}");
            self.fail_job(job_id, &fault).await;
            for item in &claim.claimed {
                self.release_item(container_id, item.item_id, &fault).await;
            }
            return Err(SlidegenError::Orchestration(fault));
        }

        let job_limit = options.job_limit(self.pools.pool(kind).max_workers());
        log_job_operation(
            events::JOB_STARTED,
            job_id,
            kind,
            container_id,
            "PROCESSING",
            Some(&format!(
                "{} claimed, {} skipped, job limit {}",
                claim.claimed.len(),
                claim.skipped.len(),
                job_limit.map_or_else(|| "none".to_string(), |limit| limit.to_string())
            )),
        );

        let completion_sender = self.spawn_collector(job_id, container_id, kind, targets.len());

        // Skips travel through the channel so the collector stays the only writer
        for (item_id, reason) in claim.skipped {
            let completion = ItemCompletion::new(job_id, item_id, ItemOutcome::skipped(reason), 0);
            if completion_sender.send(completion).await.is_err() {
                error!(job_id = %job_id, "Collector stopped before skips were recorded");
                break;
            }
        }

        let job_slots = job_limit.map(|limit| Arc::new(Semaphore::new(limit)));
        let container = Arc::new(claim.container);
        let units = claim
            .claimed
            .into_iter()
            .map(|item| {
                WorkUnit::new(job_id, kind, container.clone(), item)
                    .with_job_slots(job_slots.clone())
            })
            .collect();
        self.dispatch(job_id, kind, container_id, units, completion_sender)
            .await;

        Ok(job_id)
    }

    /// Generate `kind` content for one item.
    ///
    /// The claim is authoritative: a busy item or existing content without the
    /// overwrite flag rejects the request before any job exists.
    #[instrument(
        skip(self),
        fields(container_id = %container_id, item_id = %item_id, kind = %kind)
    )]
    pub async fn start_item(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        kind: GenerationKind,
        options: ItemOptions,
    ) -> SlidegenResult<Uuid> {
        self.start_single(container_id, item_id, kind, options.force_regenerate, None)
            .await
    }

    /// Edit one item's current image with a natural-language instruction.
    ///
    /// The current image is the reference of the call and the result replaces
    /// it, so the overwrite is implied. An item without an image is rejected.
    #[instrument(
        skip(self, instruction),
        fields(container_id = %container_id, item_id = %item_id)
    )]
    pub async fn start_image_edit(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        instruction: impl Into<String>,
    ) -> SlidegenResult<Uuid> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(RejectionError::InvalidRequest(
                "edit instruction must not be empty".to_string(),
            )
            .into());
        }

        let item = self
            .store
            .get_item(container_id, item_id)
            .await
            .map_err(reject)?;
        if item.image_ref().is_none() {
            return Err(RejectionError::NothingToEdit { item_id }.into());
        }

        self.start_single(
            container_id,
            item_id,
            GenerationKind::Image,
            true,
            Some(instruction),
        )
        .await
    }

    async fn start_single(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        kind: GenerationKind,
        overwrite: bool,
        instruction: Option<String>,
    ) -> SlidegenResult<Uuid> {
        let (container, claimed) = self
            .store
            .claim_item(container_id, item_id, kind, overwrite)
            .await
            .map_err(reject)?;

        let job = match self
            .registry
            .create(kind, container_id, JobScope::Item(item_id), 1)
            .await
        {
            Ok(job) => job,
            Err(error) => {
                self.release_item(container_id, item_id, &format!("Job not created: {error}"))
                    .await;
                return Err(error.into());
            }
        };
        let job_id = job.id;
        log_job_operation(
            events::JOB_CREATED,
            job_id,
            kind,
            container_id,
            "PENDING",
            Some(if instruction.is_some() {
                "single item edit"
            } else {
                "single item"
            }),
        );

        if let Err(error) = self.registry.start(job_id).await {
            let fault = format!("Failed to start job: {error}");
            self.fail_job(job_id, &fault).await;
            self.release_item(container_id, item_id, &fault).await;
            return Err(SlidegenError::Orchestration(fault));
        }

        let completion_sender = self.spawn_collector(job_id, container_id, kind, 1);
        let unit =
            WorkUnit::new(job_id, kind, Arc::new(container), claimed).with_instruction(instruction);
        self.dispatch(job_id, kind, container_id, vec![unit], completion_sender)
            .await;

        Ok(job_id)
    }

    /// Poller view of a job. Never mutates.
    pub async fn get_job(&self, job_id: Uuid) -> SlidegenResult<JobStatusView> {
        Ok(self.registry.status(job_id).await?)
    }

    /// Drop terminal jobs older than the configured retention
    pub async fn prune_jobs(&self) -> usize {
        self.registry
            .prune_terminal(self.config.job_retention())
            .await
    }

    /// Close both pools; queued items resolve as faulted failures
    pub fn shutdown(&self) {
        self.pools.close();
    }

    /// Submit claimed items to the kind's pool.
    ///
    /// A submission fault fails the job at once and releases every item that
    /// never reached a worker.
    async fn dispatch(
        &self,
        job_id: Uuid,
        kind: GenerationKind,
        container_id: Uuid,
        units: Vec<WorkUnit>,
        completion_sender: mpsc::Sender<ItemCompletion>,
    ) {
        let pool = self.pools.pool(kind);
        let mut pending = units.into_iter();

        while let Some(unit) = pending.next() {
            let item_id = unit.item_id();

            match pool.submit(self.runner.clone(), unit, completion_sender.clone()) {
                Ok(()) => {
                    log_item_operation(
                        events::ITEM_CLAIMED,
                        Some(job_id),
                        item_id,
                        kind,
                        "GENERATING",
                        None,
                        None,
                    );
                }
                Err(fault) => {
                    let message = format!("Worker pool submission failed: {fault}");
                    log_error("batch_orchestrator", "dispatch", &message, None);
                    self.fail_job(job_id, &message).await;

                    self.release_item(container_id, item_id, &message).await;
                    for unsent in pending.by_ref() {
                        self.release_item(container_id, unsent.item_id(), &message)
                            .await;
                    }
                    break;
                }
            }
        }
        // The collector exits once every worker has dropped its clone
        drop(completion_sender);
    }

    fn spawn_collector(
        &self,
        job_id: Uuid,
        container_id: Uuid,
        kind: GenerationKind,
        total: usize,
    ) -> mpsc::Sender<ItemCompletion> {
        let (sender, receiver) = mpsc::channel(self.config.completion_buffer_size);
        tokio::spawn(collect_completions(
            CollectorScope {
                job_id,
                container_id,
                kind,
                total,
            },
            self.registry.clone(),
            self.store.clone(),
            receiver,
        ));
        sender
    }

    async fn fail_job(&self, job_id: Uuid, fault: &str) {
        if let Err(error) = self.registry.fail(job_id, fault).await {
            warn!(job_id = %job_id, error = %error, "Could not fail job after fault");
        }
    }

    /// Move an item that never reached a runner out of GENERATING
    async fn release_item(&self, container_id: Uuid, item_id: Uuid, reason: &str) {
        if let Err(error) = self
            .store
            .record_failure(container_id, item_id, GenerationFailure::transient(reason))
            .await
        {
            warn!(item_id = %item_id, error = %error, "Could not release item");
        }
    }
}

/// The job a collector accounts for
#[derive(Debug, Clone, Copy)]
struct CollectorScope {
    job_id: Uuid,
    container_id: Uuid,
    kind: GenerationKind,
    /// Distinct outcomes that finalize the job
    total: usize,
}

/// Single consumer of a job's completion channel
async fn collect_completions(
    scope: CollectorScope,
    registry: Arc<dyn JobRegistry>,
    store: Arc<dyn ContainerStore>,
    mut receiver: mpsc::Receiver<ItemCompletion>,
) {
    let CollectorScope {
        job_id,
        container_id,
        kind,
        total,
    } = scope;
    let started = Instant::now();
    let mut seen = HashSet::new();

    while let Some(completion) = receiver.recv().await {
        let ItemCompletion {
            item_id,
            mut outcome,
            worker_fault,
            duration_ms,
            ..
        } = completion;

        if !seen.insert(item_id) {
            warn!(job_id = %job_id, item_id = %item_id, "Duplicate completion ignored");
            continue;
        }

        if let Some(fault) = worker_fault {
            outcome = release_faulted_item(&store, container_id, item_id, outcome, &fault).await;
        }

        let (event, status) = match &outcome {
            ItemOutcome::Succeeded => (events::ITEM_COMPLETED, "COMPLETED"),
            ItemOutcome::Failed { .. } => (events::ITEM_FAILED, "FAILED"),
            ItemOutcome::Skipped { .. } => (events::ITEM_SKIPPED, "SKIPPED"),
        };
        let details = match &outcome {
            ItemOutcome::Failed { failure } => Some(failure.to_string()),
            ItemOutcome::Skipped { reason } => Some(reason.to_string()),
            ItemOutcome::Succeeded => None,
        };
        log_item_operation(
            event,
            Some(job_id),
            item_id,
            kind,
            status,
            Some(duration_ms),
            details.as_deref(),
        );

        // Every item write has landed; settle the stage before the job turns terminal
        if seen.len() == total {
            advance_container_stage(&store, container_id).await;
        }

        match registry.advance(job_id, item_id, outcome).await {
            Ok(job) if job.is_terminal() => {
                log_job_operation(
                    if job.state == JobState::Failed {
                        events::JOB_FAILED
                    } else {
                        events::JOB_COMPLETED
                    },
                    job_id,
                    kind,
                    container_id,
                    &job.state.to_string(),
                    job.error_summary.as_deref(),
                );
            }
            Ok(job) => {
                debug!(
                    event = events::JOB_ADVANCED,
                    job_id = %job_id,
                    completed = job.progress.completed,
                    total = job.progress.total,
                    "Job progress"
                );
            }
            Err(RegistryError::Terminal { state, .. }) => {
                // Failed by an orchestration fault; late outcomes are only drained
                debug!(
                    job_id = %job_id,
                    item_id = %item_id,
                    state = %state,
                    "Outcome after job ended"
                );
            }
            Err(error) => {
                log_error(
                    "batch_orchestrator",
                    "collect_completions",
                    &error.to_string(),
                    Some(&format!("job_id={job_id} item_id={item_id}")),
                );
            }
        }
    }

    // Every sender is gone; a job still open here lost outcomes
    match registry.get(job_id).await {
        Ok(job) if !job.is_terminal() => {
            let fault = format!(
                "Completion channel closed with {}/{} items resolved",
                job.progress.completed, job.progress.total
            );
            error!(job_id = %job_id, fault = %fault, "Job abandoned by its workers");
            if let Err(error) = registry.fail(job_id, &fault).await {
                warn!(job_id = %job_id, error = %error, "Could not fail abandoned job");
            }
        }
        Ok(_) => {}
        Err(error) => {
            warn!(job_id = %job_id, error = %error, "Job vanished before collection ended")
        }
    }

    info!(
        job_id = %job_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "📋 COLLECTOR: Completion channel drained"
    );
}

/// The runner never wrote this item; record the fault on it ourselves
async fn release_faulted_item(
    store: &Arc<dyn ContainerStore>,
    container_id: Uuid,
    item_id: Uuid,
    outcome: ItemOutcome,
    fault: &WorkerFault,
) -> ItemOutcome {
    let failure = match &outcome {
        ItemOutcome::Failed { failure } => failure.clone(),
        _ => GenerationFailure::permanent(fault.to_string()),
    };

    match store.record_failure(container_id, item_id, failure).await {
        Ok(WriteOutcome::Applied) => outcome,
        Ok(WriteOutcome::Discarded(reason)) => ItemOutcome::skipped(reason),
        Err(error) => {
            warn!(item_id = %item_id, error = %error, "Could not release faulted item");
            outcome
        }
    }
}

async fn advance_container_stage(store: &Arc<dyn ContainerStore>, container_id: Uuid) {
    match store.advance_stage_if_complete(container_id).await {
        Ok(Some(state)) => {
            debug!(container_id = %container_id, state = %state, "Stage settled by collector")
        }
        Ok(None) => {}
        Err(StoreError::ContainerNotFound(_)) => {
            debug!(container_id = %container_id, "Container deleted before stage check");
        }
        Err(error) => warn!(container_id = %container_id, error = %error, "Stage check failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationRequest;
    use crate::models::{ItemPayload, Job, NewContainer, Outline, OutlineEntry, PageOutline};
    use crate::registry::{InMemoryJobRegistry, RegistryResult};
    use crate::state_machine::ContainerState;
    use crate::store::InMemoryContainerStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoAdapter;

    #[async_trait]
    impl GenerationAdapter for EchoAdapter {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<ItemPayload, GenerationFailure> {
            Ok(match request.kind {
                GenerationKind::Description => {
                    ItemPayload::description(format!("About {}", request.item.outline.title))
                }
                GenerationKind::Image => ItemPayload::image(
                    format!("mem://{}", request.item.item_id),
                    request.prompt.clone(),
                ),
            })
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    async fn setup(pages: usize) -> (BatchOrchestrator, Uuid) {
        setup_with(pages, &SlidegenConfig::default()).await
    }

    async fn setup_with(pages: usize, config: &SlidegenConfig) -> (BatchOrchestrator, Uuid) {
        let store = Arc::new(InMemoryContainerStore::new());
        let container = store
            .create_container(NewContainer::new("orchestrator test"))
            .await
            .unwrap();
        let outline = Outline::new(
            (1..=pages)
                .map(|n| OutlineEntry::Page(PageOutline::new(format!("Page {n}"), vec![])))
                .collect(),
        );
        store.set_outline(container.id, outline).await.unwrap();

        let orchestrator = BatchOrchestrator::new(
            Arc::new(InMemoryJobRegistry::new()),
            store,
            Arc::new(EchoAdapter),
            config,
        );
        (orchestrator, container.id)
    }

    async fn wait_terminal(orchestrator: &BatchOrchestrator, job_id: Uuid) -> JobStatusView {
        for _ in 0..200 {
            let view = orchestrator.get_job(job_id).await.unwrap();
            if view.is_terminal() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} did not finish");
    }

    #[tokio::test]
    async fn test_description_then_image_batches_advance_stages() {
        let (orchestrator, container_id) = setup(3).await;

        let job_id = orchestrator
            .start_batch(container_id, GenerationKind::Description, BatchOptions::default())
            .await
            .unwrap();
        let view = wait_terminal(&orchestrator, job_id).await;
        assert_eq!(view.status, JobState::Completed);
        assert_eq!(view.progress.completed, 3);

        // Settled before the job became visible as terminal
        let container = orchestrator.store().get_container(container_id).await.unwrap();
        assert_eq!(container.state, ContainerState::DescriptionsGenerated);

        let job_id = orchestrator
            .start_batch(container_id, GenerationKind::Image, BatchOptions::default())
            .await
            .unwrap();
        wait_terminal(&orchestrator, job_id).await;
        let container = orchestrator.store().get_container(container_id).await.unwrap();
        assert_eq!(container.state, ContainerState::Completed);
    }

    #[tokio::test]
    async fn test_image_edit_replaces_current_image() {
        let (orchestrator, container_id) = setup(1).await;
        let item_id = orchestrator.store().list_items(container_id).await.unwrap()[0].id;

        let error = orchestrator
            .start_image_edit(container_id, item_id, "warmer colors")
            .await
            .unwrap_err();
        assert_eq!(error.rejection_code(), Some("NOTHING_TO_EDIT"));

        for kind in [GenerationKind::Description, GenerationKind::Image] {
            let job_id = orchestrator
                .start_batch(container_id, kind, BatchOptions::default())
                .await
                .unwrap();
            wait_terminal(&orchestrator, job_id).await;
        }

        let error = orchestrator
            .start_image_edit(container_id, item_id, "   ")
            .await
            .unwrap_err();
        assert_eq!(error.rejection_code(), Some("INVALID_REQUEST"));

        let job_id = orchestrator
            .start_image_edit(container_id, item_id, "warmer colors")
            .await
            .unwrap();
        let view = wait_terminal(&orchestrator, job_id).await;
        assert_eq!(view.status, JobState::Completed);
        assert_eq!(view.progress.succeeded, 1);

        let item = orchestrator
            .store()
            .get_item(container_id, item_id)
            .await
            .unwrap();
        match item.payload(GenerationKind::Image) {
            Some(ItemPayload::Image { prompt, .. }) => {
                assert!(prompt.contains("Edit instruction:\nwarmer colors"))
            }
            other => panic!("expected an image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_nothing_to_generate_is_rejected() {
        let (orchestrator, container_id) = setup(1).await;
        let job_id = orchestrator
            .start_batch(container_id, GenerationKind::Description, BatchOptions::default())
            .await
            .unwrap();
        wait_terminal(&orchestrator, job_id).await;

        let error = orchestrator
            .start_batch(container_id, GenerationKind::Description, BatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(error.rejection_code(), Some("NOTHING_TO_GENERATE"));

        // Regenerate-all still has targets
        assert!(orchestrator
            .start_batch(
                container_id,
                GenerationKind::Description,
                BatchOptions::regenerate_all()
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unknown_container_and_item_are_rejected() {
        let (orchestrator, container_id) = setup(1).await;
        let error = orchestrator
            .start_batch(Uuid::new_v4(), GenerationKind::Description, BatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(error.rejection_code(), Some("CONTAINER_NOT_FOUND"));

        let error = orchestrator
            .start_item(
                container_id,
                Uuid::new_v4(),
                GenerationKind::Description,
                ItemOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(error.rejection_code(), Some("ITEM_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_closed_pool_fails_job_and_releases_items() {
        let (orchestrator, container_id) = setup(2).await;
        orchestrator.shutdown();

        let job_id = orchestrator
            .start_batch(container_id, GenerationKind::Description, BatchOptions::default())
            .await
            .unwrap();
        let view = wait_terminal(&orchestrator, job_id).await;
        assert_eq!(view.status, JobState::Failed);
        assert!(view
            .error_summary
            .as_deref()
            .unwrap_or_default()
            .starts_with("Orchestration fault"));

        let items = orchestrator.store().list_items(container_id).await.unwrap();
        assert!(items.iter().all(|item| !item.state.is_active()));
        assert!(orchestrator
            .registry()
            .active_batch(container_id, GenerationKind::Description)
            .await
            .is_none());
    }

    /// Registry whose `start` always fails
    struct UnstartableRegistry(InMemoryJobRegistry);

    #[async_trait]
    impl JobRegistry for UnstartableRegistry {
        async fn create(
            &self,
            kind: GenerationKind,
            container_id: Uuid,
            scope: JobScope,
            total: usize,
        ) -> RegistryResult<Job> {
            self.0.create(kind, container_id, scope, total).await
        }

        async fn get(&self, job_id: Uuid) -> RegistryResult<Job> {
            self.0.get(job_id).await
        }

        async fn start(&self, job_id: Uuid) -> RegistryResult<Job> {
            Err(RegistryError::NotFound(job_id))
        }

        async fn advance(
            &self,
            job_id: Uuid,
            item_id: Uuid,
            outcome: ItemOutcome,
        ) -> RegistryResult<Job> {
            self.0.advance(job_id, item_id, outcome).await
        }

        async fn fail(&self, job_id: Uuid, fault: &str) -> RegistryResult<Job> {
            self.0.fail(job_id, fault).await
        }

        async fn discard(&self, job_id: Uuid) -> RegistryResult<()> {
            self.0.discard(job_id).await
        }

        async fn active_batch(&self, container_id: Uuid, kind: GenerationKind) -> Option<Uuid> {
            self.0.active_batch(container_id, kind).await
        }

        async fn jobs_for_container(&self, container_id: Uuid) -> Vec<Job> {
            self.0.jobs_for_container(container_id).await
        }

        async fn prune_terminal(&self, older_than: Duration) -> usize {
            self.0.prune_terminal(older_than).await
        }
    }

    #[tokio::test]
    async fn test_start_failure_is_an_orchestration_error() {
        let (seeded, container_id) = setup(2).await;
        let orchestrator = BatchOrchestrator::new(
            Arc::new(UnstartableRegistry(InMemoryJobRegistry::new())),
            seeded.store().clone(),
            Arc::new(EchoAdapter),
            &SlidegenConfig::default(),
        );

        let error = orchestrator
            .start_batch(container_id, GenerationKind::Description, BatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(error, SlidegenError::Orchestration(_)));
        assert_eq!(error.rejection_code(), None);

        // The job is visible as failed and its items are released
        let jobs = orchestrator.registry().jobs_for_container(container_id).await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].state, JobState::Failed);
        let items = orchestrator.store().list_items(container_id).await.unwrap();
        assert!(items.iter().all(|item| !item.state.is_active()));
    }

    #[tokio::test]
    async fn test_prune_drops_jobs_past_retention() {
        let mut config = SlidegenConfig::default();
        config.orchestration.job_retention_seconds = 0;
        let (orchestrator, container_id) = setup_with(2, &config).await;

        let job_id = orchestrator
            .start_batch(container_id, GenerationKind::Description, BatchOptions::default())
            .await
            .unwrap();
        wait_terminal(&orchestrator, job_id).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(orchestrator.prune_jobs().await, 1);
        assert!(orchestrator.get_job(job_id).await.is_err());
    }
}
