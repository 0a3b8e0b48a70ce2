//! Actors and the capabilities they hold

use crate::ActorId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Allows starting a workflow on a target.
pub const APPLY_WORKFLOW: &str = "APPLY_WORKFLOW";
/// Allows cancelling any workflow and editing definitions.
pub const ADMINISTER_WORKFLOW: &str = "ADMINISTER_WORKFLOW";
/// Allows editing content outside of a workflow.
pub const EDIT_CONTENT: &str = "EDIT_CONTENT";
/// Allows publishing content outside of a workflow.
pub const PUBLISH_CONTENT: &str = "PUBLISH_CONTENT";

/// A named permission held by an actor
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capability(pub String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Capability {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The principal performing an operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
}

impl Actor {
    pub const SYSTEM_ID: &'static str = "system";

    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            capabilities: BTreeSet::new(),
        }
    }

    /// The actor used by background jobs.
    pub fn system() -> Self {
        Self::new(Self::SYSTEM_ID)
            .with_capability(ADMINISTER_WORKFLOW)
            .with_capability(EDIT_CONTENT)
            .with_capability(PUBLISH_CONTENT)
    }

    pub fn with_capability(mut self, capability: impl Into<Capability>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn has(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c.as_str() == capability)
    }

    pub fn is_system(&self) -> bool {
        self.id.as_str() == Self::SYSTEM_ID
    }
}
