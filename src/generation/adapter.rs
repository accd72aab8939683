//! # Generation Adapter
//!
//! Contract for the external collaborator that calls the generative model.
//! One call produces the content of one item for one generation kind, or a
//! typed failure. Implementations must honor the timeout carried by the
//! request; the job runner enforces it as well.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::models::{ContainerContext, GenerationKind, ItemContext, ItemPayload};

/// Whether a failed generation is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Rate limited or timed out; eligible for caller-initiated retry
    Transient,
    /// Malformed or unsupported input; not retried automatically
    Permanent,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Permanent => write!(f, "PERMANENT"),
        }
    }
}

/// Typed failure of a single generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl GenerationFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self::transient(format!("Generation timed out after {}ms", timeout.as_millis()))
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.message)
    }
}

/// Everything an adapter needs for one call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    pub container: ContainerContext,
    pub item: ItemContext,
    /// Prompt assembled from the two contexts
    pub prompt: String,
    /// Current image to use as the reference of an edit; `None` for fresh
    /// generations
    pub source_image: Option<String>,
    pub timeout: Duration,
}

impl GenerationRequest {
    pub fn is_edit(&self) -> bool {
        self.source_image.is_some()
    }
}

/// The external model-calling collaborator
#[async_trait]
pub trait GenerationAdapter: Send + Sync + 'static {
    /// Produce content of `request.kind` for one item
    async fn generate(&self, request: &GenerationRequest) -> Result<ItemPayload, GenerationFailure>;

    /// Adapter name for logging
    fn name(&self) -> &str;
}
