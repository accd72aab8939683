use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::GenerationKind;
use crate::generation::GenerationFailure;
use crate::state_machine::JobState;

/// Whether a job covers a whole container or a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "item_id", rename_all = "snake_case")]
pub enum JobScope {
    Batch,
    Item(Uuid),
}

/// Why an item was counted without being generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Deleted before or during generation
    ItemMissing,
    /// The container was deleted
    ContainerMissing,
    /// Another runner held the item
    ItemBusy,
    /// Content appeared between selection and claim
    ContentExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ItemMissing => write!(f, "ITEM_MISSING"),
            Self::ContainerMissing => write!(f, "CONTAINER_MISSING"),
            Self::ItemBusy => write!(f, "ITEM_BUSY"),
            Self::ContentExists => write!(f, "CONTENT_EXISTS"),
        }
    }
}

/// Resolution of one item within a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemOutcome {
    Succeeded,
    Failed { failure: GenerationFailure },
    Skipped { reason: SkipReason },
}

impl ItemOutcome {
    pub fn failed(failure: GenerationFailure) -> Self {
        Self::Failed { failure }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome recorded against a specific item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub item_id: Uuid,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// Job progress; `completed` counts every resolved item whatever its outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl JobProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        self.completed += 1;
        match outcome {
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// A tracked generation request covering one or many items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: GenerationKind,
    pub container_id: Uuid,
    pub scope: JobScope,
    pub state: JobState,
    pub progress: JobProgress,
    pub results: Vec<ItemResult>,
    pub error_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(kind: GenerationKind, container_id: Uuid, scope: JobScope, total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            container_id,
            scope,
            state: JobState::Pending,
            progress: JobProgress::new(total),
            results: Vec::with_capacity(total),
            error_summary: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Count one outcome and remember it against its item
    pub(crate) fn record_outcome(&mut self, item_id: Uuid, outcome: ItemOutcome) {
        self.progress.record(&outcome);
        self.results.push(ItemResult {
            item_id,
            outcome,
            recorded_at: Utc::now(),
        });
    }

    /// Aggregation policy: FAILED only when nothing succeeded and something failed.
    /// Partial failure is a COMPLETED job whose results list the failed items.
    pub fn aggregate_state(&self) -> JobState {
        if self.progress.succeeded == 0 && self.progress.failed > 0 {
            JobState::Failed
        } else {
            JobState::Completed
        }
    }

    /// One line per failed item, prefixed with a count
    pub fn summarize_failures(&self) -> Option<String> {
        let lines: Vec<String> = self
            .results
            .iter()
            .filter_map(|result| match &result.outcome {
                ItemOutcome::Failed { failure } => {
                    Some(format!("item {}: {failure}", result.item_id))
                }
                _ => None,
            })
            .collect();

        if lines.is_empty() {
            return None;
        }

        Some(format!(
            "{} of {} items failed\n{}",
            lines.len(),
            self.progress.total,
            lines.join("\n")
        ))
    }

    /// Items whose generation failed, for selective retry
    pub fn failed_item_ids(&self) -> Vec<Uuid> {
        self.results
            .iter()
            .filter(|result| result.outcome.is_failure())
            .map(|result| result.item_id)
            .collect()
    }

    /// Read-only view handed to pollers
    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id,
            kind: self.kind,
            container_id: self.container_id,
            status: self.state,
            progress: self.progress,
            error_summary: self.error_summary.clone(),
            items: self.results.clone(),
        }
    }
}

/// `getJob` response: status, progress and optional error summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub kind: GenerationKind,
    pub container_id: Uuid,
    pub status: JobState,
    pub progress: JobProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<String>,
    pub items: Vec<ItemResult>,
}

impl JobStatusView {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
