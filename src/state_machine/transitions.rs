//! # Transition Rules
//!
//! Pure transition functions for containers, items and jobs. No I/O and no
//! shared state: given the current state and an event, each returns the next
//! state or a typed rejection.

use super::errors::{EntityKind, StateMachineError, StateMachineResult};
use super::events::{ContainerEvent, ItemEvent, JobEvent};
use super::states::{ContainerState, ItemState, JobState};

/// A state that can be advanced by an event of its entity kind
pub trait Transition: Copy + Sized {
    type Event;

    /// Which entity this state belongs to
    const ENTITY: EntityKind;

    /// Compute the next state, or reject the event
    fn transition(self, event: &Self::Event) -> StateMachineResult<Self>;
}

/// `transition(entityKind, currentState, event) → newState | rejected`, with
/// the entity kind carried by the state type.
pub fn transition<S: Transition>(current: S, event: &S::Event) -> StateMachineResult<S> {
    current.transition(event)
}

impl Transition for ContainerState {
    type Event = ContainerEvent;
    const ENTITY: EntityKind = EntityKind::Container;

    fn transition(self, event: &ContainerEvent) -> StateMachineResult<Self> {
        match event {
            // Strictly forward, one stage at a time
            ContainerEvent::StageCompleted(target) if self.next() == Some(*target) => Ok(*target),
            // Demotion never undoes the outline itself
            ContainerEvent::ItemRegressed if self > ContainerState::OutlineGenerated => self
                .previous()
                .ok_or_else(|| StateMachineError::invalid(Self::ENTITY, self, event.event_type())),
            _ => Err(StateMachineError::invalid(
                Self::ENTITY,
                self,
                event.event_type(),
            )),
        }
    }
}

impl Transition for ItemState {
    type Event = ItemEvent;
    const ENTITY: EntityKind = EntityKind::Item;

    fn transition(self, event: &ItemEvent) -> StateMachineResult<Self> {
        let target = match (self, event) {
            // Synchronous content
            (ItemState::Draft | ItemState::ContentReady, ItemEvent::ProvideContent) => {
                ItemState::ContentReady
            }

            // Generation claims
            (ItemState::Draft | ItemState::ContentReady, ItemEvent::Generate { .. }) => {
                ItemState::Generating
            }
            (ItemState::Completed | ItemState::Failed, ItemEvent::Generate { overwrite: true }) => {
                ItemState::Generating
            }
            (
                state @ (ItemState::Completed | ItemState::Failed),
                ItemEvent::Generate { overwrite: false },
            ) => {
                return Err(StateMachineError::ContentExists {
                    state: state.to_string(),
                })
            }
            (ItemState::Generating, ItemEvent::Generate { .. }) => {
                return Err(StateMachineError::AlreadyGenerating)
            }

            // Outcomes
            (ItemState::Generating, ItemEvent::Succeed) => ItemState::Completed,
            (ItemState::Generating, ItemEvent::Fail(_)) => ItemState::Failed,

            // User edits replace generated content, never a runner's claim
            (
                ItemState::ContentReady | ItemState::Completed | ItemState::Failed,
                ItemEvent::Edit,
            ) => ItemState::Completed,
            (ItemState::Generating, ItemEvent::Edit) => {
                return Err(StateMachineError::AlreadyGenerating)
            }

            // Reset
            (
                ItemState::ContentReady | ItemState::Completed | ItemState::Failed,
                ItemEvent::Reset,
            ) => ItemState::ContentReady,

            (from_state, _) => {
                return Err(StateMachineError::invalid(
                    Self::ENTITY,
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }
}

impl Transition for JobState {
    type Event = JobEvent;
    const ENTITY: EntityKind = EntityKind::Job;

    fn transition(self, event: &JobEvent) -> StateMachineResult<Self> {
        if self.is_terminal() {
            return Err(StateMachineError::TerminalState {
                entity: Self::ENTITY,
                state: self.to_string(),
            });
        }

        let target = match (self, event) {
            (JobState::Pending, JobEvent::Start) => JobState::Processing,
            (JobState::Processing, JobEvent::Complete) => JobState::Completed,
            // Orchestration faults may fail a job before it starts
            (JobState::Pending | JobState::Processing, JobEvent::Fail(_)) => JobState::Failed,
            (from_state, _) => {
                return Err(StateMachineError::invalid(
                    Self::ENTITY,
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }
}
