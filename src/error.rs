//! Error types for the slide generation core.
//!

use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigurationError;
use crate::models::GenerationKind;
use crate::registry::RegistryError;
use crate::state_machine::StateMachineError;
use crate::store::StoreError;

/// Top-level error for every fallible operation exposed by this crate.
#[derive(Debug, Error)]
pub enum SlidegenError {
    #[error("Request rejected: {0}")]
    Rejected(#[from] RejectionError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Orchestration error: {0}")]
    Orchestration(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
}

pub type SlidegenResult<T> = Result<T, SlidegenError>;

/// Synchronous rejections reported to the caller of `start_batch` / `start_item`.
///
/// A rejection never creates a job and never touches the worker pools.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionError {
    #[error("A {kind} batch is already in progress for container {container_id} (job {job_id})")]
    AlreadyInProgress {
        container_id: Uuid,
        kind: GenerationKind,
        job_id: Uuid,
    },
    #[error("Item {item_id} already has {kind} content; set the overwrite flag to regenerate")]
    ContentExists { item_id: Uuid, kind: GenerationKind },
    #[error("Item {item_id} is already generating")]
    ItemBusy { item_id: Uuid },
    #[error("Container {0} not found")]
    ContainerNotFound(Uuid),
    #[error("Item {item_id} not found in container {container_id}")]
    ItemNotFound { container_id: Uuid, item_id: Uuid },
    #[error("Container {container_id} has no items that need {kind} generation")]
    NothingToGenerate {
        container_id: Uuid,
        kind: GenerationKind,
    },
    #[error("Item {item_id} has no image to edit")]
    NothingToEdit { item_id: Uuid },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl RejectionError {
    /// Stable machine-readable code for the request-handling layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyInProgress { .. } => "ALREADY_IN_PROGRESS",
            Self::ContentExists { .. } => "CONTENT_EXISTS",
            Self::ItemBusy { .. } => "ITEM_BUSY",
            Self::ContainerNotFound(_) => "CONTAINER_NOT_FOUND",
            Self::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            Self::NothingToGenerate { .. } => "NOTHING_TO_GENERATE",
            Self::NothingToEdit { .. } => "NOTHING_TO_EDIT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
        }
    }
}

impl SlidegenError {
    /// Machine code of the underlying rejection, if this error is one.
    pub fn rejection_code(&self) -> Option<&'static str> {
        match self {
            Self::Rejected(rejection) => Some(rejection.code()),
            _ => None,
        }
    }
}
