//! Workflow actions: the steps a target can be "at"

use crate::{ActionId, ActionInstance, Actor, ActorId, Capability, FieldSpec, FormSchema};
use serde::{Deserialize, Serialize};

// ── Action Kind ──────────────────────────────────────────────────────

/// The closed catalog of action behaviors.
///
/// The kind decides what happens when an instance enters the action and
/// when the action counts as complete for automatic advancement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// A plain step; complete once every required field is filled in
    Step,
    /// Collects approvals from assignees; complete at the threshold
    Approval { required_approvals: u32 },
    /// Sends a notification to the assignees on entry
    Notify { template: String },
    /// Schedules publish/unpublish jobs from the target's dates on entry
    SchedulePublish,
    /// Publishes the target on entry
    Publish,
    /// Terminal action that cancels the instance
    Cancel,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Step => "step",
            ActionKind::Approval { .. } => "approval",
            ActionKind::Notify { .. } => "notify",
            ActionKind::SchedulePublish => "schedule_publish",
            ActionKind::Publish => "publish",
            ActionKind::Cancel => "cancel",
        }
    }
}

/// Who may edit the target while an instance sits on an action
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditRule {
    #[default]
    AssigneesOnly,
    Anyone,
    Nobody,
}

/// Actors responsible for an action, by id or by capability
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignees {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<ActorId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
}

impl Assignees {
    pub fn contains(&self, actor: &Actor) -> bool {
        self.actors.contains(&actor.id)
            || self.capabilities.iter().any(|c| actor.has_capability(c))
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty() && self.capabilities.is_empty()
    }
}

// ── Workflow Action ──────────────────────────────────────────────────

/// A node in the workflow graph
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAction {
    /// Unique within the definition
    pub id: ActionId,
    pub title: String,
    pub kind: ActionKind,
    /// Exactly one action per definition is the initial action
    #[serde(default)]
    pub initial: bool,
    #[serde(default)]
    pub form: FormSchema,
    #[serde(default)]
    pub assignees: Assignees,
    #[serde(default)]
    pub edit_rule: EditRule,
    /// Whether the target may be published manually while here
    #[serde(default)]
    pub allow_publish: bool,
}

impl WorkflowAction {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: ActionId::new(id),
            title: title.into(),
            kind,
            initial: false,
            form: FormSchema::default(),
            assignees: Assignees::default(),
            edit_rule: EditRule::default(),
            allow_publish: false,
        }
    }

    pub fn step(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, ActionKind::Step)
    }

    pub fn approval(id: impl Into<String>, title: impl Into<String>, required_approvals: u32) -> Self {
        Self::new(id, title, ActionKind::Approval { required_approvals })
    }

    pub fn notify(id: impl Into<String>, title: impl Into<String>, template: impl Into<String>) -> Self {
        Self::new(
            id,
            title,
            ActionKind::Notify {
                template: template.into(),
            },
        )
    }

    pub fn schedule_publish(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, ActionKind::SchedulePublish)
    }

    pub fn publish(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, ActionKind::Publish)
    }

    pub fn cancel(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, ActionKind::Cancel)
    }

    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    pub fn with_form(mut self, form: FormSchema) -> Self {
        self.form = form;
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.form = self.form.with_field(field);
        self
    }

    pub fn with_assignee(mut self, actor: impl Into<String>) -> Self {
        self.assignees.actors.push(ActorId::new(actor));
        self
    }

    pub fn with_assignee_capability(mut self, capability: impl Into<Capability>) -> Self {
        self.assignees.capabilities.push(capability.into());
        self
    }

    pub fn with_edit_rule(mut self, rule: EditRule) -> Self {
        self.edit_rule = rule;
        self
    }

    pub fn allowing_publish(mut self) -> Self {
        self.allow_publish = true;
        self
    }

    pub fn is_assigned(&self, actor: &Actor) -> bool {
        self.assignees.contains(actor)
    }

    pub fn can_edit(&self, actor: &Actor) -> bool {
        match self.edit_rule {
            EditRule::Anyone => true,
            EditRule::AssigneesOnly => self.is_assigned(actor),
            EditRule::Nobody => false,
        }
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self.kind, ActionKind::Cancel)
    }

    /// Actions whose work is done by their entry side effect.
    pub fn completes_on_entry(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::Notify { .. } | ActionKind::SchedulePublish | ActionKind::Publish
        )
    }

    /// Whether the recorded visit satisfies this action's completion condition.
    pub fn completion_satisfied(&self, record: &ActionInstance) -> bool {
        match &self.kind {
            ActionKind::Step => self.form.required_fields_present(&record.data),
            ActionKind::Approval { required_approvals } => {
                record.approvals.len() >= *required_approvals as usize
            }
            ActionKind::Notify { .. } | ActionKind::SchedulePublish | ActionKind::Publish => true,
            ActionKind::Cancel => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WorkflowInstanceId, EDIT_CONTENT};

    #[test]
    fn test_edit_rules() {
        let alice = Actor::new("alice");
        let bob = Actor::new("bob");
        let action = WorkflowAction::step("draft", "Draft").with_assignee("alice");
        assert!(action.can_edit(&alice));
        assert!(!action.can_edit(&bob));

        let open = action.clone().with_edit_rule(EditRule::Anyone);
        assert!(open.can_edit(&bob));

        let locked = action.with_edit_rule(EditRule::Nobody);
        assert!(!locked.can_edit(&alice));
    }

    #[test]
    fn test_capability_assignees() {
        let action = WorkflowAction::approval("review", "Review", 1).with_assignee_capability(EDIT_CONTENT);
        assert!(action.is_assigned(&Actor::new("carol").with_capability(EDIT_CONTENT)));
        assert!(!action.is_assigned(&Actor::new("dave")));
    }

    #[test]
    fn test_approval_completion_threshold() {
        let action = WorkflowAction::approval("review", "Review", 2);
        let mut record = ActionInstance::open(
            WorkflowInstanceId::generate(),
            action.id.clone(),
            ActorId::new("alice"),
        );
        assert!(!action.completion_satisfied(&record));
        record.record_approval(ActorId::new("alice"));
        record.record_approval(ActorId::new("alice"));
        assert!(!action.completion_satisfied(&record));
        record.record_approval(ActorId::new("bob"));
        assert!(action.completion_satisfied(&record));
    }

    #[test]
    fn test_entry_completing_kinds() {
        assert!(WorkflowAction::notify("n", "Notify", "review-ready").completes_on_entry());
        assert!(WorkflowAction::publish("p", "Publish").completes_on_entry());
        assert!(!WorkflowAction::step("s", "Step").completes_on_entry());
        assert!(!WorkflowAction::cancel("c", "Cancel").completion_satisfied(&ActionInstance::open(
            WorkflowInstanceId::generate(),
            ActionId::new("c"),
            ActorId::new("x"),
        )));
    }

    #[test]
    fn test_kind_serializes_tagged() {
        let json = serde_json::to_value(ActionKind::Approval { required_approvals: 2 }).unwrap();
        assert_eq!(json["type"], "approval");
        assert_eq!(json["required_approvals"], 2);
    }
}
