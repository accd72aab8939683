//! Messages and options shared by the orchestrator, the pools and the runners.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::models::{ContainerContext, GenerationKind, ItemOutcome};
use crate::store::ClaimedItem;

/// Options for `start_batch`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Target every item instead of only those lacking content
    #[serde(default)]
    pub force_regenerate_all: bool,
    /// Cap on this job's concurrent runners, within the kind's pool size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

impl BatchOptions {
    pub fn regenerate_all() -> Self {
        Self {
            force_regenerate_all: true,
            ..Self::default()
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Effective per-job limit for a pool of `pool_size` workers; `None` when
    /// the pool bound alone applies
    pub fn job_limit(&self, pool_size: usize) -> Option<usize> {
        self.max_workers
            .map(|requested| requested.clamp(1, pool_size.max(1)))
            .filter(|limit| *limit < pool_size)
    }
}

/// Options for `start_item`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOptions {
    /// Discard existing content of the requested kind
    #[serde(default)]
    pub force_regenerate: bool,
}

impl ItemOptions {
    pub fn overwrite() -> Self {
        Self {
            force_regenerate: true,
        }
    }
}

/// One claimed item handed to a worker pool
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub job_id: Uuid,
    pub kind: GenerationKind,
    pub container: Arc<ContainerContext>,
    pub item: ClaimedItem,
    /// Natural-language edit of the item's current image
    pub instruction: Option<String>,
    /// Per-job slots taken before the pool's own; shared by the job's units
    pub job_slots: Option<Arc<Semaphore>>,
}

impl WorkUnit {
    pub fn new(
        job_id: Uuid,
        kind: GenerationKind,
        container: Arc<ContainerContext>,
        item: ClaimedItem,
    ) -> Self {
        Self {
            job_id,
            kind,
            container,
            item,
            instruction: None,
            job_slots: None,
        }
    }

    pub fn with_instruction(mut self, instruction: Option<String>) -> Self {
        self.instruction = instruction;
        self
    }

    pub fn with_job_slots(mut self, job_slots: Option<Arc<Semaphore>>) -> Self {
        self.job_slots = job_slots;
        self
    }

    pub fn item_id(&self) -> Uuid {
        self.item.item_id
    }
}

/// Why a worker could not deliver a runner's own result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerFault {
    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("{kind} worker pool is closed")]
    PoolClosed { kind: GenerationKind },
}

/// Completion message sent by a worker to the job's collector
#[derive(Debug, Clone)]
pub struct ItemCompletion {
    pub job_id: Uuid,
    pub item_id: Uuid,
    pub outcome: ItemOutcome,
    /// Set when the runner never wrote its result; the collector then
    /// releases the item from GENERATING itself
    pub worker_fault: Option<WorkerFault>,
    pub duration_ms: u64,
}

impl ItemCompletion {
    pub fn new(job_id: Uuid, item_id: Uuid, outcome: ItemOutcome, duration_ms: u64) -> Self {
        Self {
            job_id,
            item_id,
            outcome,
            worker_fault: None,
            duration_ms,
        }
    }

    pub fn faulted(
        job_id: Uuid,
        item_id: Uuid,
        outcome: ItemOutcome,
        fault: WorkerFault,
        duration_ms: u64,
    ) -> Self {
        Self {
            job_id,
            item_id,
            outcome,
            worker_fault: Some(fault),
            duration_ms,
        }
    }
}

/// Extract a readable message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_downcasts() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(payload.as_ref()), "kaboom");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }

    #[test]
    fn test_options_default_to_no_overwrite() {
        assert!(!BatchOptions::default().force_regenerate_all);
        assert!(ItemOptions::overwrite().force_regenerate);
        let parsed: BatchOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, BatchOptions::default());

        let parsed: BatchOptions = serde_json::from_str(r#"{"max_workers": 3}"#).unwrap();
        assert_eq!(parsed.max_workers, Some(3));
        assert!(!parsed.force_regenerate_all);
    }

    #[test]
    fn test_job_limit_stays_within_pool() {
        assert_eq!(BatchOptions::default().job_limit(5), None);
        assert_eq!(BatchOptions::default().with_max_workers(3).job_limit(5), Some(3));
        // At or above the pool size the pool bound is enough
        assert_eq!(BatchOptions::default().with_max_workers(5).job_limit(5), None);
        assert_eq!(BatchOptions::default().with_max_workers(50).job_limit(5), None);
        assert_eq!(BatchOptions::default().with_max_workers(0).job_limit(5), Some(1));
    }
}
