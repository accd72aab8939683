//! # Orchestration Engine
//!
//! Turns generation requests into tracked jobs and runs them with bounded
//! concurrency.
//!
//! ## Core Components
//!
//! - **BatchOrchestrator**: accepts `start_batch` / `start_item`, owns each
//!   job's completion channel and finalizes jobs
//! - **WorkerPools**: one semaphore-bounded pool per generation kind
//! - **JobRunner**: one item, one adapter call, one store write
//! - **StatusPoller**: fixed-interval polling until a job is terminal

pub mod batch_orchestrator;
pub mod job_runner;
pub mod status_poller;
pub mod types;
pub mod worker_pool;

pub use batch_orchestrator::BatchOrchestrator;
pub use job_runner::JobRunner;
pub use status_poller::StatusPoller;
pub use types::{BatchOptions, ItemCompletion, ItemOptions, WorkUnit, WorkerFault};
pub use worker_pool::{PoolStatsSnapshot, WorkerPool, WorkerPools};
