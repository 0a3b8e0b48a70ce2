//! Action history: one record per visit to an action

use crate::{ActionId, ActionInstanceId, ActorId, TransitionId, WorkflowInstanceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A recorded visit of an instance to one action.
///
/// Entries are appended when an action is entered and closed when it is
/// left. Closed entries are never modified again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionInstance {
    pub id: ActionInstanceId,
    pub instance_id: WorkflowInstanceId,
    pub action_id: ActionId,
    pub opened_by: ActorId,
    pub opened_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<ActorId>,
    /// The transition that left this action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_taken: Option<TransitionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Form data accepted by the action's schema
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    /// Distinct approvers, in approval order
    #[serde(default)]
    pub approvals: Vec<ActorId>,
}

impl ActionInstance {
    pub fn open(instance_id: WorkflowInstanceId, action_id: ActionId, opened_by: ActorId) -> Self {
        Self {
            id: ActionInstanceId::generate(),
            instance_id,
            action_id,
            opened_by,
            opened_at: Utc::now(),
            closed_at: None,
            closed_by: None,
            transition_taken: None,
            comment: None,
            data: BTreeMap::new(),
            approvals: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn merge_fields(&mut self, fields: BTreeMap<String, Value>) {
        self.data.extend(fields);
    }

    /// Blank comments leave any earlier comment in place.
    pub fn set_comment(&mut self, comment: Option<String>) {
        if let Some(text) = comment.filter(|c| !c.trim().is_empty()) {
            self.comment = Some(text);
        }
    }

    pub fn has_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    /// Returns false if the actor already approved.
    pub fn record_approval(&mut self, approver: ActorId) -> bool {
        if self.approvals.contains(&approver) {
            return false;
        }
        self.approvals.push(approver);
        true
    }

    pub fn close(&mut self, closed_by: ActorId, transition: Option<TransitionId>) {
        self.closed_at = Some(Utc::now());
        self.closed_by = Some(closed_by);
        self.transition_taken = transition;
    }
}
