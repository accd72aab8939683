//! # Container Store
//!
//! Owns containers and items. Runners write results here and nowhere else;
//! the job registry only ever sees outcomes.

pub mod container_store;

pub use container_store::{
    ClaimBatch, ClaimedItem, ContainerStore, InMemoryContainerStore, StoreError, StoreResult,
    WriteOutcome,
};
