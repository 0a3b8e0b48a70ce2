use crate::ports::ScheduleKind;
use approval_workflow_types::{JobId, TargetRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a scheduled job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Complete,
}

/// A one-shot publish or unpublish of a target at a given time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub target: TargetRef,
    pub kind: ScheduleKind,
    pub run_at: DateTime<Utc>,
    pub state: JobState,
    pub total_steps: u32,
    pub current_step: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduledJob {
    pub fn new(target: TargetRef, kind: ScheduleKind, run_at: DateTime<Utc>) -> Self {
        Self {
            id: JobId::generate(),
            target,
            kind,
            run_at,
            state: JobState::Pending,
            total_steps: 1,
            current_step: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Human-readable title, e.g. "Scheduled publish of About us"
    pub fn title(&self, target_title: &str) -> String {
        format!("Scheduled {} of {}", self.kind, target_title)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Pending && self.run_at <= now
    }

    pub fn is_complete(&self) -> bool {
        self.state == JobState::Complete
    }

    pub fn complete(&mut self) {
        self.state = JobState::Complete;
        self.current_step = self.total_steps;
        self.completed_at = Some(Utc::now());
    }
}
