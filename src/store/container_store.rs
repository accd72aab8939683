//! # Container Store
//!
//! Containers and their items. Persistent storage is an external concern; the
//! in-memory implementation here is what the orchestrator runs against in a
//! single process, and a database-backed store implements the same trait.
//!
//! Every container and its items share one mutex, so claiming items for a job
//! (checking and setting GENERATING) is atomic with respect to other claims,
//! runner writes and resets of the same container.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::events;
use crate::constants::system::MAX_ITEMS_PER_CONTAINER;
use crate::generation::GenerationFailure;
use crate::models::{
    Container, ContainerContext, GenerationKind, Item, ItemContext, ItemPayload, NewContainer,
    Outline, PageOutline, SkipReason,
};
use crate::state_machine::{
    transition, ContainerEvent, ContainerState, ItemEvent, ItemState, StateMachineError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Container {0} not found")]
    ContainerNotFound(Uuid),

    #[error("Item {item_id} not found in container {container_id}")]
    ItemNotFound { container_id: Uuid, item_id: Uuid },

    #[error("Item {item_id} already has {kind} content")]
    ContentExists { item_id: Uuid, kind: GenerationKind },

    #[error("Item {item_id} is already generating")]
    ItemBusy { item_id: Uuid },

    #[error("Invalid outline: {0}")]
    InvalidOutline(String),

    #[error(transparent)]
    Transition(#[from] StateMachineError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An item moved to GENERATING for a job, with its prompt context
#[derive(Debug, Clone)]
pub struct ClaimedItem {
    pub item_id: Uuid,
    pub context: ItemContext,
}

/// Result of claiming a set of items for one job
#[derive(Debug, Clone)]
pub struct ClaimBatch {
    pub container: ContainerContext,
    pub claimed: Vec<ClaimedItem>,
    pub skipped: Vec<(Uuid, SkipReason)>,
}

/// What happened to a runner's write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The item or its container no longer exists; the result was dropped
    Discarded(SkipReason),
}

#[async_trait]
pub trait ContainerStore: Send + Sync + 'static {
    async fn create_container(&self, params: NewContainer) -> StoreResult<Container>;

    async fn get_container(&self, container_id: Uuid) -> StoreResult<Container>;

    /// Items ordered by position
    async fn list_items(&self, container_id: Uuid) -> StoreResult<Vec<Item>>;

    async fn get_item(&self, container_id: Uuid, item_id: Uuid) -> StoreResult<Item>;

    /// Synchronous outline stage: flatten the outline into CONTENT_READY
    /// items and move the container to OUTLINE_GENERATED.
    async fn set_outline(&self, container_id: Uuid, outline: Outline) -> StoreResult<Vec<Item>>;

    /// Atomically move every claimable item to GENERATING.
    ///
    /// Items that are gone, busy, or hold content without `overwrite` are
    /// reported as skipped instead of failing the whole claim.
    async fn claim_items(
        &self,
        container_id: Uuid,
        kind: GenerationKind,
        item_ids: &[Uuid],
        overwrite: bool,
    ) -> StoreResult<ClaimBatch>;

    /// Claim a single item, failing with a typed error when it cannot be claimed
    async fn claim_item(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        kind: GenerationKind,
        overwrite: bool,
    ) -> StoreResult<(ContainerContext, ClaimedItem)>;

    /// Write generated content; no-op when the item was deleted meanwhile
    async fn record_success(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        payload: ItemPayload,
    ) -> StoreResult<WriteOutcome>;

    /// Mark the item FAILED keeping any previous payload; no-op when deleted
    async fn record_failure(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        failure: GenerationFailure,
    ) -> StoreResult<WriteOutcome>;

    /// Advance the container through every stage whose content all items
    /// already hold; returns the furthest stage reached, if it moved.
    ///
    /// Catching up means a check that ran while the next kind's batch held
    /// the items is repaired by the next check.
    async fn advance_stage_if_complete(
        &self,
        container_id: Uuid,
    ) -> StoreResult<Option<ContainerState>>;

    /// Replace one item's page outline. Generated content is kept; callers
    /// regenerate it with the overwrite flag when they want it to follow.
    async fn update_item_outline(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        outline: PageOutline,
    ) -> StoreResult<Item>;

    /// Store user-written content of the payload's kind in place of any
    /// generated content. Regenerating it later requires the overwrite flag.
    async fn set_item_payload(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        payload: ItemPayload,
    ) -> StoreResult<Item>;

    /// Drop generated content of one item and demote the container one stage
    /// if it had moved past the outline
    async fn reset_item(&self, container_id: Uuid, item_id: Uuid) -> StoreResult<Item>;

    async fn delete_item(&self, container_id: Uuid, item_id: Uuid) -> StoreResult<()>;

    async fn delete_container(&self, container_id: Uuid) -> StoreResult<()>;
}

#[derive(Debug)]
struct ContainerRecord {
    container: Container,
    /// Kept sorted by position
    items: Vec<Item>,
}

impl ContainerRecord {
    fn item_index(&self, item_id: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.id == item_id)
    }

    fn item_mut(&mut self, item_id: Uuid) -> StoreResult<&mut Item> {
        let container_id = self.container.id;
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(StoreError::ItemNotFound {
                container_id,
                item_id,
            })
    }

    /// Rebuild the container outline from the current items
    fn sync_outline(&mut self) {
        self.container.outline = Outline::from_pages(self.items.iter().map(|item| &item.outline));
        self.container.updated_at = Utc::now();
    }

    /// Advance through every stage whose kind is present on all items
    fn catch_up_stage(&mut self) -> StoreResult<Option<ContainerState>> {
        let mut reached = None;
        while let Some(target) = self.container.state.next() {
            let Some(kind) = target.generated_by() else {
                break;
            };
            let stage_done =
                !self.items.is_empty() && self.items.iter().all(|item| item.has_payload(kind));
            if !stage_done {
                break;
            }
            self.container.state = transition(
                self.container.state,
                &ContainerEvent::StageCompleted(target),
            )?;
            reached = Some(target);
        }

        if let Some(state) = reached {
            self.container.updated_at = Utc::now();
            info!(
                event = events::CONTAINER_STAGE_ADVANCED,
                container_id = %self.container.id,
                state = %state,
                "📁 STORE: Container stage advanced"
            );
        }
        Ok(reached)
    }

    /// Claim one item in place; the caller holds the container lock
    fn claim(
        &mut self,
        item_id: Uuid,
        kind: GenerationKind,
        overwrite: bool,
    ) -> StoreResult<ClaimedItem> {
        let container_id = self.container.id;
        let index = self.item_index(item_id).ok_or(StoreError::ItemNotFound {
            container_id,
            item_id,
        })?;
        let item = &mut self.items[index];

        // Nothing of this kind to discard, so the overwrite is implied
        let overwrite = overwrite || !item.has_payload(kind);
        item.state = match transition(item.state, &ItemEvent::generate(overwrite)) {
            Ok(state) => state,
            Err(StateMachineError::AlreadyGenerating) => {
                return Err(StoreError::ItemBusy { item_id })
            }
            Err(StateMachineError::ContentExists { .. }) => {
                return Err(StoreError::ContentExists { item_id, kind })
            }
            Err(other) => return Err(other.into()),
        };
        item.active_kind = Some(kind);
        item.updated_at = Utc::now();

        Ok(ClaimedItem {
            item_id,
            context: item.context(index + 1),
        })
    }
}

/// Process-local container store
#[derive(Debug, Default)]
pub struct InMemoryContainerStore {
    containers: DashMap<Uuid, Arc<Mutex<ContainerRecord>>>,
}

impl InMemoryContainerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, container_id: Uuid) -> StoreResult<Arc<Mutex<ContainerRecord>>> {
        self.containers
            .get(&container_id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::ContainerNotFound(container_id))
    }

    /// Apply a runner outcome to an item still owned by a runner
    fn write_outcome(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        apply: impl FnOnce(&mut Item) -> StoreResult<()>,
    ) -> StoreResult<WriteOutcome> {
        let Ok(cell) = self.record(container_id) else {
            warn!(
                event = events::ITEM_WRITE_DISCARDED,
                container_id = %container_id,
                item_id = %item_id,
                "🗑️ STORE: Container deleted during generation, discarding write"
            );
            return Ok(WriteOutcome::Discarded(SkipReason::ContainerMissing));
        };

        let mut record = cell.lock();
        match record.item_mut(item_id) {
            Ok(item) => {
                apply(item)?;
                item.active_kind = None;
                item.updated_at = Utc::now();
                Ok(WriteOutcome::Applied)
            }
            Err(_) => {
                warn!(
                    event = events::ITEM_WRITE_DISCARDED,
                    container_id = %container_id,
                    item_id = %item_id,
                    "🗑️ STORE: Item deleted during generation, discarding write"
                );
                Ok(WriteOutcome::Discarded(SkipReason::ItemMissing))
            }
        }
    }
}

#[async_trait]
impl ContainerStore for InMemoryContainerStore {
    async fn create_container(&self, params: NewContainer) -> StoreResult<Container> {
        let container = Container::new(params);
        let snapshot = container.clone();
        self.containers.insert(
            container.id,
            Arc::new(Mutex::new(ContainerRecord {
                container,
                items: Vec::new(),
            })),
        );
        info!(container_id = %snapshot.id, "📁 STORE: Container created");
        Ok(snapshot)
    }

    async fn get_container(&self, container_id: Uuid) -> StoreResult<Container> {
        let cell = self.record(container_id)?;
        let container = cell.lock().container.clone();
        Ok(container)
    }

    async fn list_items(&self, container_id: Uuid) -> StoreResult<Vec<Item>> {
        let cell = self.record(container_id)?;
        let items = cell.lock().items.clone();
        Ok(items)
    }

    async fn get_item(&self, container_id: Uuid, item_id: Uuid) -> StoreResult<Item> {
        let cell = self.record(container_id)?;
        let mut record = cell.lock();
        record.item_mut(item_id).map(|item| item.clone())
    }

    async fn set_outline(&self, container_id: Uuid, outline: Outline) -> StoreResult<Vec<Item>> {
        let pages = outline.flatten();
        if pages.is_empty() {
            return Err(StoreError::InvalidOutline(
                "outline contains no pages".to_string(),
            ));
        }
        if pages.len() > MAX_ITEMS_PER_CONTAINER {
            return Err(StoreError::InvalidOutline(format!(
                "outline has {} pages, limit is {MAX_ITEMS_PER_CONTAINER}",
                pages.len()
            )));
        }

        let cell = self.record(container_id)?;
        let mut record = cell.lock();

        let next_state = transition(
            record.container.state,
            &ContainerEvent::StageCompleted(ContainerState::OutlineGenerated),
        )?;

        let mut items = Vec::with_capacity(pages.len());
        for (index, page) in pages.into_iter().enumerate() {
            let mut item = Item::new(container_id, (index + 1) as i32, page);
            item.state = transition(item.state, &ItemEvent::ProvideContent)?;
            items.push(item);
        }

        record.items = items.clone();
        record.container.outline = outline;
        record.container.state = next_state;
        record.container.updated_at = Utc::now();

        info!(
            container_id = %container_id,
            pages = items.len(),
            "📁 STORE: Outline applied"
        );
        Ok(items)
    }

    async fn claim_items(
        &self,
        container_id: Uuid,
        kind: GenerationKind,
        item_ids: &[Uuid],
        overwrite: bool,
    ) -> StoreResult<ClaimBatch> {
        let cell = self.record(container_id)?;
        let mut record = cell.lock();

        let mut claimed = Vec::with_capacity(item_ids.len());
        let mut skipped = Vec::new();
        for &item_id in item_ids {
            match record.claim(item_id, kind, overwrite) {
                Ok(item) => claimed.push(item),
                Err(StoreError::ItemNotFound { .. }) => {
                    skipped.push((item_id, SkipReason::ItemMissing))
                }
                Err(StoreError::ItemBusy { .. }) => skipped.push((item_id, SkipReason::ItemBusy)),
                Err(StoreError::ContentExists { .. }) => {
                    skipped.push((item_id, SkipReason::ContentExists))
                }
                Err(other) => return Err(other),
            }
        }

        debug!(
            container_id = %container_id,
            kind = %kind,
            claimed = claimed.len(),
            skipped = skipped.len(),
            "📁 STORE: Items claimed"
        );

        Ok(ClaimBatch {
            container: record.container.context(),
            claimed,
            skipped,
        })
    }

    async fn claim_item(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        kind: GenerationKind,
        overwrite: bool,
    ) -> StoreResult<(ContainerContext, ClaimedItem)> {
        let cell = self.record(container_id)?;
        let mut record = cell.lock();
        let claimed = record.claim(item_id, kind, overwrite)?;
        Ok((record.container.context(), claimed))
    }

    async fn record_success(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        payload: ItemPayload,
    ) -> StoreResult<WriteOutcome> {
        self.write_outcome(container_id, item_id, |item| {
            item.state = transition(item.state, &ItemEvent::Succeed)?;
            item.payloads.insert(payload.kind(), payload);
            item.last_failure = None;
            Ok(())
        })
    }

    async fn record_failure(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        failure: GenerationFailure,
    ) -> StoreResult<WriteOutcome> {
        self.write_outcome(container_id, item_id, |item| {
            item.state = transition(item.state, &ItemEvent::Fail(failure.message.clone()))?;
            item.last_failure = Some(failure);
            Ok(())
        })
    }

    async fn advance_stage_if_complete(
        &self,
        container_id: Uuid,
    ) -> StoreResult<Option<ContainerState>> {
        let cell = self.record(container_id)?;
        let mut record = cell.lock();
        record.catch_up_stage()
    }

    async fn update_item_outline(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        outline: PageOutline,
    ) -> StoreResult<Item> {
        if outline.title.trim().is_empty() {
            return Err(StoreError::InvalidOutline(
                "page title must not be empty".to_string(),
            ));
        }

        let cell = self.record(container_id)?;
        let mut record = cell.lock();

        let item = record.item_mut(item_id)?;
        if item.state.is_active() {
            return Err(StoreError::ItemBusy { item_id });
        }
        if item.state == ItemState::Draft {
            item.state = transition(item.state, &ItemEvent::ProvideContent)?;
        }
        // The part comes from the deck structure, not from the page edit
        let part = item.outline.part.take();
        item.outline = PageOutline {
            part: outline.part.or(part),
            ..outline
        };
        item.updated_at = Utc::now();
        let snapshot = item.clone();

        record.sync_outline();
        debug!(
            container_id = %container_id,
            item_id = %item_id,
            "📁 STORE: Item outline edited"
        );
        Ok(snapshot)
    }

    async fn set_item_payload(
        &self,
        container_id: Uuid,
        item_id: Uuid,
        payload: ItemPayload,
    ) -> StoreResult<Item> {
        let cell = self.record(container_id)?;
        let mut record = cell.lock();

        let item = record.item_mut(item_id)?;
        item.state = match transition(item.state, &ItemEvent::Edit) {
            Ok(state) => state,
            Err(StateMachineError::AlreadyGenerating) => {
                return Err(StoreError::ItemBusy { item_id })
            }
            Err(other) => return Err(other.into()),
        };
        let kind = payload.kind();
        item.payloads.insert(kind, payload);
        item.last_failure = None;
        item.updated_at = Utc::now();
        let snapshot = item.clone();
        debug!(
            container_id = %container_id,
            item_id = %item_id,
            kind = %kind,
            "📁 STORE: Item content edited"
        );

        // The edit may supply the last missing piece of a stage
        record.catch_up_stage()?;
        Ok(snapshot)
    }

    async fn reset_item(&self, container_id: Uuid, item_id: Uuid) -> StoreResult<Item> {
        let cell = self.record(container_id)?;
        let mut record = cell.lock();

        let item = record.item_mut(item_id)?;
        item.state = transition(item.state, &ItemEvent::Reset)?;
        item.payloads.clear();
        item.last_failure = None;
        item.active_kind = None;
        item.updated_at = Utc::now();
        let snapshot = item.clone();
        debug!(
            event = events::ITEM_RESET,
            container_id = %container_id,
            item_id = %item_id,
            "📁 STORE: Item reset"
        );

        if record.container.state > ContainerState::OutlineGenerated {
            let demoted = transition(record.container.state, &ContainerEvent::ItemRegressed)?;
            info!(
                event = events::CONTAINER_STAGE_DEMOTED,
                container_id = %container_id,
                from = %record.container.state,
                to = %demoted,
                "📁 STORE: Container stage demoted by item reset"
            );
            record.container.state = demoted;
            record.container.updated_at = Utc::now();
        }

        Ok(snapshot)
    }

    async fn delete_item(&self, container_id: Uuid, item_id: Uuid) -> StoreResult<()> {
        let cell = self.record(container_id)?;
        let mut record = cell.lock();
        let index = record.item_index(item_id).ok_or(StoreError::ItemNotFound {
            container_id,
            item_id,
        })?;
        record.items.remove(index);
        record.sync_outline();
        info!(container_id = %container_id, item_id = %item_id, "📁 STORE: Item deleted");
        Ok(())
    }

    async fn delete_container(&self, container_id: Uuid) -> StoreResult<()> {
        self.containers
            .remove(&container_id)
            .map(|_| ())
            .ok_or(StoreError::ContainerNotFound(container_id))?;
        info!(container_id = %container_id, "📁 STORE: Container deleted");
        Ok(())
    }
}
