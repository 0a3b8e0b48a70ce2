//! Collaborator interfaces supplied by the host.
//!
//! The engine never reaches into the host's content model directly. It
//! resolves targets, publishes, notifies and queues jobs only through the
//! traits in this module.

pub mod memory;

use crate::scheduler::ScheduledJob;
use approval_workflow_types::{ActorId, Capability, JobId, TargetRef, WorkflowDefinitionId, WorkflowInstanceId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::{
    InMemoryJobQueue, InMemoryTargetDirectory, PublishEvent, RecordingNotifier, RecordingPublisher,
    SentNotification, TracingNotifier,
};

/// Failure reported by a host collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PortError {
    pub message: String,
}

impl PortError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ── Targets ──────────────────────────────────────────────────────────

/// Which of a target's scheduled dates a job serves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Publish,
    Unpublish,
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleKind::Publish => write!(f, "publish"),
            ScheduleKind::Unpublish => write!(f, "unpublish"),
        }
    }
}

/// Workflow definitions assigned to a target
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAssignment {
    /// The primary definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<WorkflowDefinitionId>,
    /// Secondary definitions, in preference order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional: Vec<WorkflowDefinitionId>,
}

/// What the engine needs to know about a target
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub target: TargetRef,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<TargetRef>,
    #[serde(default)]
    pub assignment: WorkflowAssignment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpublish_on: Option<DateTime<Utc>>,
}

impl TargetRecord {
    pub fn new(target: TargetRef, title: impl Into<String>) -> Self {
        Self {
            target,
            title: title.into(),
            parent: None,
            assignment: WorkflowAssignment::default(),
            publish_on: None,
            unpublish_on: None,
        }
    }

    pub fn with_parent(mut self, parent: TargetRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_definition(mut self, definition: WorkflowDefinitionId) -> Self {
        self.assignment.definition = Some(definition);
        self
    }

    pub fn with_additional_definition(mut self, definition: WorkflowDefinitionId) -> Self {
        self.assignment.additional.push(definition);
        self
    }

    pub fn with_publish_on(mut self, at: DateTime<Utc>) -> Self {
        self.publish_on = Some(at);
        self
    }

    pub fn with_unpublish_on(mut self, at: DateTime<Utc>) -> Self {
        self.unpublish_on = Some(at);
        self
    }

    pub fn scheduled_for(&self, kind: ScheduleKind) -> Option<DateTime<Utc>> {
        match kind {
            ScheduleKind::Publish => self.publish_on,
            ScheduleKind::Unpublish => self.unpublish_on,
        }
    }

    pub fn clear_scheduled(&mut self, kind: ScheduleKind) {
        match kind {
            ScheduleKind::Publish => self.publish_on = None,
            ScheduleKind::Unpublish => self.unpublish_on = None,
        }
    }
}

/// Resolves target references to host records.
#[async_trait]
pub trait TargetDirectory: Send + Sync {
    /// `None` if the target no longer exists.
    async fn get_target(&self, target: &TargetRef) -> Result<Option<TargetRecord>, PortError>;

    /// Clear the scheduled date of the given kind.
    async fn clear_schedule(&self, target: &TargetRef, kind: ScheduleKind) -> Result<(), PortError>;
}

// ── Publishing & Notification ────────────────────────────────────────

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, target: &TargetRef) -> Result<(), PortError>;
    async fn unpublish(&self, target: &TargetRef) -> Result<(), PortError>;
}

/// Values made available to notification templates
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub target: TargetRef,
    pub target_title: String,
    pub instance_id: WorkflowInstanceId,
    pub definition_title: String,
    pub action_title: String,
    /// Capabilities whose holders should also receive the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipient_capabilities: Vec<Capability>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        template: &str,
        recipients: &[ActorId],
        context: &NotificationContext,
    ) -> Result<(), PortError>;
}

// ── Job Queue ────────────────────────────────────────────────────────

/// Durable one-shot job storage.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job. A pending job for the same target and kind is replaced.
    async fn enqueue(&self, job: ScheduledJob) -> Result<JobId, PortError>;

    /// Pending jobs whose run time is at or before `now`, earliest first.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, PortError>;

    async fn get(&self, id: &JobId) -> Result<Option<ScheduledJob>, PortError>;

    async fn mark_complete(&self, id: &JobId) -> Result<(), PortError>;

    /// Pending jobs of one target.
    async fn pending_for(&self, target: &TargetRef) -> Result<Vec<ScheduledJob>, PortError>;
}
