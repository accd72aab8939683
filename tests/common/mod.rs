//! Shared fixtures for the integration tests: a scripted generation adapter,
//! a store wrapper with injectable latency and races, and helpers that build a
//! deck and an orchestrator around them.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use slidegen_core::config::{PoolConfig, SlidegenConfig};
use slidegen_core::generation::{GenerationAdapter, GenerationFailure, GenerationRequest};
use slidegen_core::models::{
    Container, ContainerContext, Item, NewContainer, Outline, OutlineEntry, PageOutline,
};
use slidegen_core::orchestration::{BatchOrchestrator, StatusPoller};
use slidegen_core::store::{ClaimBatch, ClaimedItem, StoreResult, WriteOutcome};
use slidegen_core::{
    ContainerState, ContainerStore, GenerationKind, InMemoryContainerStore, InMemoryJobRegistry,
    ItemPayload, JobStatusView,
};

/// What the scripted adapter does for one page
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    /// Succeed after a delay
    Slow(Duration),
    /// Sleep far past any configured timeout
    Hang,
    Fail(GenerationFailure),
    Panic,
}

/// Adapter whose behavior is scripted per 1-based page index.
///
/// Also counts calls and records the highest concurrency it observed.
#[derive(Default)]
pub struct ScriptedAdapter {
    scripts: Mutex<HashMap<usize, Script>>,
    default_delay: Duration,
    calls: AtomicUsize,
    current: AtomicUsize,
    peak: AtomicUsize,
    generation: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every unscripted page succeeds after `delay`
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            default_delay: delay,
            ..Self::default()
        }
    }

    pub fn script(self, page_index: usize, script: Script) -> Self {
        self.scripts.lock().insert(page_index, script);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn payload(&self, request: &GenerationRequest) -> ItemPayload {
        // Each call produces distinct content so overwrites are observable
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        match request.kind {
            GenerationKind::Description => ItemPayload::description(format!(
                "{} (take {generation})",
                request.item.outline.title
            )),
            GenerationKind::Image if request.is_edit() => ItemPayload::image(
                format!("memory://{}/edit-{generation}.png", request.item.item_id),
                request.prompt.clone(),
            ),
            GenerationKind::Image => ItemPayload::image(
                format!("memory://{}/{generation}.png", request.item.item_id),
                request.prompt.clone(),
            ),
        }
    }
}

#[async_trait]
impl GenerationAdapter for ScriptedAdapter {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ItemPayload, GenerationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .get(&request.item.page_index)
            .cloned()
            .unwrap_or(Script::Slow(self.default_delay));

        let result = match script {
            Script::Succeed => Ok(self.payload(request)),
            Script::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.payload(request))
            }
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(self.payload(request))
            }
            Script::Fail(failure) => Err(failure),
            Script::Panic => {
                self.current.fetch_sub(1, Ordering::SeqCst);
                panic!("scripted adapter panic on page {}", request.item.page_index);
            }
        };

        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Faults injected by [`HookedStore`]
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreHooks {
    /// Added to every stage check, like a database round trip
    pub stage_check_delay: Duration,
    /// Delete the container right before a batch claims its items
    pub delete_before_claim: bool,
}

/// Delegates to the in-memory store, applying [`StoreHooks`] on the way
pub struct HookedStore {
    inner: Arc<InMemoryContainerStore>,
    hooks: StoreHooks,
}

#[async_trait]
impl ContainerStore for HookedStore {
    async fn create_container(&self, params: NewContainer) -> StoreResult<Container> {
        self.inner.create_container(params).await
    }

    async fn get_container(&self, container_id: Uuid) -> StoreResult<Container> {
        self.inner.get_container(container_id).await
    }

    async fn list_items(&self, container_id: Uuid) -> StoreResult<Vec<Item>> {
        self.inner.list_items(container_id).await
    }

    async fn get_item(&self, container_id: Uuid, item_id: Uuid) -> StoreResult<Item> {
        self.inner.get_item(container_id, item_id).await
    }

    async fn set_outline(&self, container_id: Uuid, outline: Outline) -> StoreResult<Vec<Item>> {
        self.inner.set_outline(container_id, outline).await
    }

    async fn claim_items(
        &self,
        container_id: Uuid,
        kind: GenerationKind,
        item_ids: &[Uuid],
        overwrite: bool,
    ) -> StoreResult<ClaimBatch> {
        if self.hooks.delete_before_claim {
            let _ = self.inner.delete_container(container_id).await;
        }
        self.inner
            .claim_items(container_id, kind, item_ids, overwrite)
            .await
    }

    async fn claim_item(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        kind: GenerationKind,
        overwrite: bool,
    ) -> StoreResult<(ContainerContext, ClaimedItem)> {
        self.inner
            .claim_item(container_id, item_id, kind, overwrite)
            .await
    }

    async fn record_success(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        payload: ItemPayload,
    ) -> StoreResult<WriteOutcome> {
        self.inner
            .record_success(container_id, item_id, payload)
            .await
    }

    async fn record_failure(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        failure: GenerationFailure,
    ) -> StoreResult<WriteOutcome> {
        self.inner
            .record_failure(container_id, item_id, failure)
            .await
    }

    async fn advance_stage_if_complete(
        &self,
        container_id: Uuid,
    ) -> StoreResult<Option<ContainerState>> {
        tokio::time::sleep(self.hooks.stage_check_delay).await;
        self.inner.advance_stage_if_complete(container_id).await
    }

    async fn update_item_outline(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        outline: PageOutline,
    ) -> StoreResult<Item> {
        self.inner
            .update_item_outline(container_id, item_id, outline)
            .await
    }

    async fn set_item_payload(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        payload: ItemPayload,
    ) -> StoreResult<Item> {
        self.inner
            .set_item_payload(container_id, item_id, payload)
            .await
    }

    async fn reset_item(&self, container_id: Uuid, item_id: Uuid) -> StoreResult<Item> {
        self.inner.reset_item(container_id, item_id).await
    }

    async fn delete_item(&self, container_id: Uuid, item_id: Uuid) -> StoreResult<()> {
        self.inner.delete_item(container_id, item_id).await
    }

    async fn delete_container(&self, container_id: Uuid) -> StoreResult<()> {
        self.inner.delete_container(container_id).await
    }
}

/// Everything a test needs to drive and inspect one orchestrator
pub struct Harness {
    pub orchestrator: BatchOrchestrator,
    pub registry: Arc<InMemoryJobRegistry>,
    pub store: Arc<InMemoryContainerStore>,
    pub adapter: Arc<ScriptedAdapter>,
    pub poller: StatusPoller,
}

impl Harness {
    pub fn new(adapter: ScriptedAdapter, config: SlidegenConfig) -> Self {
        Self::with_hooks(adapter, config, StoreHooks::default())
    }

    /// The orchestrator sees the store through `hooks`; `harness.store` does not
    pub fn with_hooks(
        adapter: ScriptedAdapter,
        config: SlidegenConfig,
        hooks: StoreHooks,
    ) -> Self {
        let registry = Arc::new(InMemoryJobRegistry::new());
        let store = Arc::new(InMemoryContainerStore::new());
        let adapter = Arc::new(adapter);
        let hooked = Arc::new(HookedStore {
            inner: store.clone(),
            hooks,
        });
        let orchestrator =
            BatchOrchestrator::new(registry.clone(), hooked, adapter.clone(), &config);
        let poller = StatusPoller::new(registry.clone(), Duration::from_millis(5));
        Self {
            orchestrator,
            registry,
            store,
            adapter,
            poller,
        }
    }

    /// A container with `pages` outlined items, in deck order
    pub async fn deck(&self, pages: usize) -> (Uuid, Vec<Uuid>) {
        let container = self
            .store
            .create_container(NewContainer::new("Integration test deck"))
            .await
            .unwrap();
        let items = self
            .store
            .set_outline(container.id, outline(pages))
            .await
            .unwrap();
        (container.id, items.iter().map(|item| item.id).collect())
    }

    /// The stage is settled before a job turns terminal, so no waiting here
    pub async fn assert_stage(&self, container_id: Uuid, expected: ContainerState) {
        let container = self.store.get_container(container_id).await.unwrap();
        assert_eq!(container.state, expected, "stage of container {container_id}");
    }

    pub async fn wait(&self, job_id: Uuid) -> JobStatusView {
        self.poller
            .wait_for_terminal(job_id, Duration::from_secs(10))
            .await
            .unwrap()
    }
}

pub fn outline(pages: usize) -> Outline {
    Outline::new(
        (1..=pages)
            .map(|n| {
                OutlineEntry::Page(PageOutline::new(
                    format!("Page {n}"),
                    vec![format!("point {n}")],
                ))
            })
            .collect(),
    )
}

/// Config with both pools sized to `max_workers` and short timeouts
pub fn test_config(max_workers: usize, timeout_seconds: u64) -> SlidegenConfig {
    let mut config = SlidegenConfig::default();
    let pool = PoolConfig {
        max_workers,
        timeout_seconds,
    };
    config.generation.description = pool;
    config.generation.image = pool;
    config.orchestration.poll_interval_ms = 5;
    config
}
