//! # Data Models
//!
//! In-memory representations of the three linked entities: containers
//! (projects), items (pages) and jobs (tracked generation requests), plus the
//! nested outline a container is built from.

pub mod container;
pub mod item;
pub mod job;
pub mod outline;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use container::{Container, ContainerContext, NewContainer};
pub use item::{Item, ItemContext, ItemPayload};
pub use job::{ItemOutcome, ItemResult, Job, JobProgress, JobScope, JobStatusView, SkipReason};
pub use outline::{Outline, OutlineEntry, PageOutline};

/// Which stage of content a generation call produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// Page description text (lighter, text model)
    Description,
    /// Page image (heavier, image model)
    Image,
}

impl GenerationKind {
    pub const ALL: [GenerationKind; 2] = [Self::Description, Self::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GenerationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(Self::Description),
            "image" => Ok(Self::Image),
            _ => Err(format!("Invalid generation kind: {s}")),
        }
    }
}
