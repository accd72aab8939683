// State machine module for batch generation
//
// Pure transition rules for the three linked entities (container, item, job).
// Stores and the registry apply these rules under their own locks.

pub mod errors;
pub mod events;
pub mod states;
pub mod transitions;

// Re-export main types for convenient access
pub use errors::{EntityKind, StateMachineError, StateMachineResult};
pub use events::{ContainerEvent, ItemEvent, JobEvent};
pub use states::{ContainerState, ItemState, JobState};
pub use transitions::{transition, Transition};
