use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::outline::Outline;
use crate::state_machine::ContainerState;

/// A project: the top-level unit that owns an ordered list of items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: Uuid,
    /// The user's original idea, outline text or description
    pub idea_prompt: String,
    /// Requirements appended to every image prompt
    pub extra_requirements: Option<String>,
    /// Reference/template image handed to image generation
    pub template_ref: Option<String>,
    pub outline: Outline,
    pub state: ContainerState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContainer {
    pub idea_prompt: String,
    #[serde(default)]
    pub extra_requirements: Option<String>,
    #[serde(default)]
    pub template_ref: Option<String>,
}

impl NewContainer {
    pub fn new(idea_prompt: impl Into<String>) -> Self {
        Self {
            idea_prompt: idea_prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_extra_requirements(mut self, requirements: impl Into<String>) -> Self {
        self.extra_requirements = Some(requirements.into());
        self
    }

    pub fn with_template_ref(mut self, template_ref: impl Into<String>) -> Self {
        self.template_ref = Some(template_ref.into());
        self
    }
}

impl Container {
    pub fn new(params: NewContainer) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            idea_prompt: params.idea_prompt,
            extra_requirements: params.extra_requirements,
            template_ref: params.template_ref,
            outline: Outline::default(),
            state: ContainerState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Container-level prompt context shared by every item of a job
    pub fn context(&self) -> ContainerContext {
        ContainerContext {
            container_id: self.id,
            idea_prompt: self.idea_prompt.clone(),
            outline: self.outline.clone(),
            extra_requirements: self.extra_requirements.clone(),
            template_ref: self.template_ref.clone(),
        }
    }
}

/// Snapshot of container data needed to build prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerContext {
    pub container_id: Uuid,
    pub idea_prompt: String,
    pub outline: Outline,
    pub extra_requirements: Option<String>,
    pub template_ref: Option<String>,
}
