use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::status_groups;
use crate::models::GenerationKind;

/// Container (project) stage, strictly ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerState {
    /// Created, no outline yet
    Draft,
    /// Outline accepted and flattened into items
    OutlineGenerated,
    /// Every item holds a description
    DescriptionsGenerated,
    /// Every item holds an image
    Completed,
}

impl ContainerState {
    const ORDER: [ContainerState; 4] = [
        Self::Draft,
        Self::OutlineGenerated,
        Self::DescriptionsGenerated,
        Self::Completed,
    ];

    /// Position of this stage in the forward order
    pub fn stage_index(&self) -> usize {
        match self {
            Self::Draft => 0,
            Self::OutlineGenerated => 1,
            Self::DescriptionsGenerated => 2,
            Self::Completed => 3,
        }
    }

    /// The stage that directly follows this one, if any
    pub fn next(&self) -> Option<Self> {
        Self::ORDER.get(self.stage_index() + 1).copied()
    }

    /// The stage that directly precedes this one, if any
    pub fn previous(&self) -> Option<Self> {
        self.stage_index()
            .checked_sub(1)
            .and_then(|index| Self::ORDER.get(index).copied())
    }

    /// The generation kind every item must hold to reach this stage
    pub fn generated_by(&self) -> Option<GenerationKind> {
        match self {
            Self::DescriptionsGenerated => Some(GenerationKind::Description),
            Self::Completed => Some(GenerationKind::Image),
            Self::Draft | Self::OutlineGenerated => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::OutlineGenerated => write!(f, "OUTLINE_GENERATED"),
            Self::DescriptionsGenerated => write!(f, "DESCRIPTIONS_GENERATED"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl std::str::FromStr for ContainerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "OUTLINE_GENERATED" => Ok(Self::OutlineGenerated),
            "DESCRIPTIONS_GENERATED" => Ok(Self::DescriptionsGenerated),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(format!("Invalid container state: {s}")),
        }
    }
}

/// Item (page) state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemState {
    /// Created without content
    Draft,
    /// Holds synchronously produced content (its outline)
    ContentReady,
    /// A job runner is generating content for this item
    Generating,
    /// The latest generation succeeded
    Completed,
    /// The latest generation failed
    Failed,
}

impl ItemState {
    /// Check if a generation for this item has resolved
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if a job runner currently owns this item
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Generating)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::ContentReady => write!(f, "CONTENT_READY"),
            Self::Generating => write!(f, "GENERATING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for ItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "CONTENT_READY" => Ok(Self::ContentReady),
            "GENERATING" => Ok(Self::Generating),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid item state: {s}")),
        }
    }
}

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted, runners not yet submitted
    Pending,
    /// Runners submitted, outcomes arriving
    Processing,
    /// Every item resolved and at least one succeeded (or none failed)
    Completed,
    /// Every item failed, or an orchestration fault occurred
    Failed,
}

impl JobState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        status_groups::JOB_FINAL_STATES.contains(self)
    }

    pub fn is_active(&self) -> bool {
        status_groups::JOB_ACTIVE_STATES.contains(self)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid job state: {s}")),
        }
    }
}

impl Default for ContainerState {
    fn default() -> Self {
        Self::Draft
    }
}

impl Default for ItemState {
    fn default() -> Self {
        Self::Draft
    }
}

impl Default for JobState {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_stage_order() {
        assert_eq!(
            ContainerState::Draft.next(),
            Some(ContainerState::OutlineGenerated)
        );
        assert_eq!(ContainerState::Completed.next(), None);
        assert_eq!(ContainerState::Draft.previous(), None);
        assert_eq!(
            ContainerState::Completed.previous(),
            Some(ContainerState::DescriptionsGenerated)
        );
        assert!(ContainerState::Draft < ContainerState::Completed);
    }

    #[test]
    fn test_stage_generated_by_kind() {
        assert_eq!(
            ContainerState::DescriptionsGenerated.generated_by(),
            Some(GenerationKind::Description)
        );
        assert_eq!(
            ContainerState::Completed.generated_by(),
            Some(GenerationKind::Image)
        );
        assert_eq!(ContainerState::Draft.generated_by(), None);
        assert_eq!(ContainerState::OutlineGenerated.generated_by(), None);
    }

    #[test]
    fn test_terminal_checks() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());

        assert!(ItemState::Completed.is_terminal());
        assert!(ItemState::Failed.is_terminal());
        assert!(!ItemState::Generating.is_terminal());
        assert!(ItemState::Generating.is_active());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(ItemState::ContentReady.to_string(), "CONTENT_READY");
        assert_eq!("GENERATING".parse::<ItemState>().unwrap(), ItemState::Generating);
        assert_eq!(
            "DESCRIPTIONS_GENERATED".parse::<ContainerState>().unwrap(),
            ContainerState::DescriptionsGenerated
        );
        assert!("in_progress".parse::<JobState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&JobState::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");

        let parsed: JobState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, JobState::Processing);
    }
}
