//! # Registry Infrastructure
//!
//! Job records and the lookups pollers rely on.
//!
//! ## Architecture
//!
//! ```text
//! Registry Infrastructure
//! └── JobRegistry           (trait; one mutual-exclusion domain per job)
//!     └── InMemoryJobRegistry  (DashMap + per-job parking_lot mutex)
//! ```

pub mod job_registry;

pub use job_registry::{InMemoryJobRegistry, JobRegistry, RegistryError, RegistryResult};
