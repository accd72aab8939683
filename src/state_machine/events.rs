use serde::{Deserialize, Serialize};

use super::states::ContainerState;

/// Events that can trigger container stage transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ContainerEvent {
    /// Every item finished the stage leading to the given container state
    StageCompleted(ContainerState),
    /// An item was reset, pulling the container back one stage
    ItemRegressed,
}

impl ContainerEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageCompleted(_) => "stage_completed",
            Self::ItemRegressed => "item_regressed",
        }
    }
}

/// Events that can trigger item state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ItemEvent {
    /// Synchronous content (the page outline) was provided
    ProvideContent,
    /// A job runner wants to generate content for this item
    Generate { overwrite: bool },
    /// The generation call produced content
    Succeed,
    /// The generation call failed or timed out
    Fail(String),
    /// Drop generated content and return to the outline
    Reset,
    /// The user wrote generated content directly
    Edit,
}

impl ItemEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ProvideContent => "provide_content",
            Self::Generate { .. } => "generate",
            Self::Succeed => "succeed",
            Self::Fail(_) => "fail",
            Self::Reset => "reset",
            Self::Edit => "edit",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a generation request event
    pub fn generate(overwrite: bool) -> Self {
        Self::Generate { overwrite }
    }
}

/// Events that can trigger job state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobEvent {
    /// Runners were handed to the worker pool
    Start,
    /// Every item resolved and the aggregation policy says success
    Complete,
    /// Every item failed, or an orchestration fault occurred
    Fail(String),
}

impl JobEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Fail(_))
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
