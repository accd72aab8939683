use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The three entity kinds governed by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Container,
    Item,
    Job,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container => write!(f, "container"),
            Self::Item => write!(f, "item"),
            Self::Job => write!(f, "job"),
        }
    }
}

/// Typed rejection of a transition. Returned, never panicked, so callers can
/// surface, ignore or retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid {entity} transition from {from} on event {event}")]
    InvalidTransition {
        entity: EntityKind,
        from: String,
        event: String,
    },

    #[error("Item in state {state} already has content; overwrite flag required")]
    ContentExists { state: String },

    #[error("Item is already generating")]
    AlreadyGenerating,

    #[error("{entity} is in terminal state {state}")]
    TerminalState { entity: EntityKind, state: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

impl StateMachineError {
    pub fn invalid(entity: EntityKind, from: impl ToString, event: &str) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            event: event.to_string(),
        }
    }
}
