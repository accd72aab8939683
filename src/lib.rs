#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Slidegen Core
//!
//! Asynchronous batch-generation engine for AI-produced slide decks.
//!
//! ## Overview
//!
//! A container (a deck) holds ordered items (pages). Each page's description
//! text and illustrative image come from independent calls to an external
//! generative model. This crate takes an N-item request such as "generate
//! images for every page", runs the N calls with bounded concurrency per
//! generation kind, isolates per-item failures, and exposes a pollable,
//! idempotent job status.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Pure transition rules for containers, items and jobs
//! - [`models`] - Containers, items, jobs and outlines
//! - [`registry`] - Job records; the only thing pollers read
//! - [`store`] - Containers and items; the only thing runners write
//! - [`generation`] - Adapter contract, typed failures, prompt assembly
//! - [`orchestration`] - Orchestrator, worker pools, job runner, poller
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use slidegen_core::config::SlidegenConfig;
//! use slidegen_core::generation::GenerationAdapter;
//! use slidegen_core::models::GenerationKind;
//! use slidegen_core::orchestration::{BatchOptions, BatchOrchestrator};
//! use slidegen_core::registry::InMemoryJobRegistry;
//! use slidegen_core::store::InMemoryContainerStore;
//!
//! # async fn example(adapter: Arc<dyn GenerationAdapter>, container_id: uuid::Uuid)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = BatchOrchestrator::new(
//!     Arc::new(InMemoryJobRegistry::new()),
//!     Arc::new(InMemoryContainerStore::new()),
//!     adapter,
//!     &SlidegenConfig::default(),
//! );
//!
//! let job_id = orchestrator
//!     .start_batch(container_id, GenerationKind::Description, BatchOptions::default())
//!     .await?;
//! let status = orchestrator.get_job(job_id).await?;
//! println!("{} {}/{}", status.status, status.progress.completed, status.progress.total);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod generation;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod store;

pub use config::{ConfigManager, SlidegenConfig};
pub use constants::{status_groups, system};
pub use error::{RejectionError, SlidegenError, SlidegenResult};
pub use generation::{FailureKind, GenerationAdapter, GenerationFailure, GenerationRequest};
pub use models::{
    Container, GenerationKind, Item, ItemOutcome, ItemPayload, Job, JobProgress, JobStatusView,
    NewContainer, Outline,
};
pub use orchestration::{BatchOptions, BatchOrchestrator, ItemOptions, StatusPoller};
pub use registry::{InMemoryJobRegistry, JobRegistry};
pub use state_machine::{ContainerState, ItemState, JobState};
pub use store::{ContainerStore, InMemoryContainerStore};
