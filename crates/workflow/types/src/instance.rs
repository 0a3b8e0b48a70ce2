//! Workflow instances: runs of a definition against one target
//!
//! An instance only records where the target currently is. What happened
//! along the way lives in the [`ActionInstance`](crate::ActionInstance)
//! history.

use crate::{ActionId, ActorId, TargetRef, WorkflowDefinition, WorkflowDefinitionId, WorkflowInstanceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
    /// Reached a terminal action
    Completed,
    /// Cancelled by an actor or by a cancel action
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Active)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Active => write!(f, "active"),
            InstanceStatus::Completed => write!(f, "completed"),
            InstanceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A run of a workflow definition against a target
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: WorkflowInstanceId,
    pub target: TargetRef,
    pub definition_id: WorkflowDefinitionId,
    pub definition_version: u32,
    /// Always an action of the definition
    pub current_action: ActionId,
    pub status: InstanceStatus,
    pub initiator: ActorId,
    /// Bumped by the store on every committed change
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// Start a new run at `initial_action`
    pub fn new(
        target: TargetRef,
        definition: &WorkflowDefinition,
        initial_action: ActionId,
        initiator: ActorId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowInstanceId::generate(),
            target,
            definition_id: definition.id.clone(),
            definition_version: definition.version,
            current_action: initial_action,
            status: InstanceStatus::Active,
            initiator,
            revision: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn advance_to(&mut self, action: ActionId) {
        self.current_action = action;
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        self.finish(InstanceStatus::Completed);
    }

    pub fn cancel(&mut self) {
        self.finish(InstanceStatus::Cancelled);
    }

    fn finish(&mut self, status: InstanceStatus) {
        let now = Utc::now();
        self.status = status;
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}
