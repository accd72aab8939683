//! # System Constants
//!
//! Core constants and status groupings that define the operational
//! boundaries of the batch generation engine.

// Re-export state types for convenience
pub use crate::state_machine::{ContainerState, ItemState, JobState};

/// Lifecycle event names attached to structured log records
pub mod events {
    // Job lifecycle events
    pub const JOB_CREATED: &str = "job.created";
    pub const JOB_STARTED: &str = "job.started";
    pub const JOB_ADVANCED: &str = "job.advanced";
    pub const JOB_COMPLETED: &str = "job.completed";
    pub const JOB_FAILED: &str = "job.failed";

    // Item lifecycle events
    pub const ITEM_CLAIMED: &str = "item.claimed";
    pub const ITEM_COMPLETED: &str = "item.completed";
    pub const ITEM_FAILED: &str = "item.failed";
    pub const ITEM_SKIPPED: &str = "item.skipped";
    pub const ITEM_RESET: &str = "item.reset";
    pub const ITEM_WRITE_DISCARDED: &str = "item.write_discarded";

    // Container lifecycle events
    pub const CONTAINER_STAGE_ADVANCED: &str = "container.stage_advanced";
    pub const CONTAINER_STAGE_DEMOTED: &str = "container.stage_demoted";
}

/// System-wide defaults
pub mod system {
    /// Default concurrent description generations (lighter text calls)
    pub const DEFAULT_DESCRIPTION_WORKERS: usize = 5;

    /// Default concurrent image generations (heavier calls)
    pub const DEFAULT_IMAGE_WORKERS: usize = 8;

    pub const DEFAULT_DESCRIPTION_TIMEOUT_SECONDS: u64 = 120;
    pub const DEFAULT_IMAGE_TIMEOUT_SECONDS: u64 = 300;

    /// Buffer for per-job completion channels
    pub const DEFAULT_COMPLETION_BUFFER_SIZE: usize = 256;

    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

    /// How long terminal jobs stay visible to pollers before pruning
    pub const DEFAULT_JOB_RETENTION_SECONDS: u64 = 3600;

    /// Upper bound on items in a single container
    pub const MAX_ITEMS_PER_CONTAINER: usize = 200;
}

/// Status groupings for common queries
pub mod status_groups {
    use super::JobState;

    /// Job states in which a job still accepts outcomes
    pub const JOB_ACTIVE_STATES: &[JobState] = &[JobState::Pending, JobState::Processing];

    pub const JOB_FINAL_STATES: &[JobState] = &[JobState::Completed, JobState::Failed];
}
