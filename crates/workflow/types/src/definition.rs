//! Workflow definitions: the blueprint for approval workflows
//!
//! A WorkflowDefinition is a directed graph where:
//! - Nodes are actions (where a target can be "at")
//! - Edges are guarded transitions (how it moves on)
//!
//! Definitions are immutable once registered. To modify, register a new
//! version under a new id.

use crate::{
    ActionId, TransitionId, WorkflowAction, WorkflowDefinitionId, WorkflowError, WorkflowResult,
    WorkflowTransition,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ── Workflow Definition ──────────────────────────────────────────────

/// The blueprint for an approval process
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique identifier
    pub id: WorkflowDefinitionId,
    /// Human-readable name
    pub title: String,
    /// Description of what this workflow is for
    #[serde(default)]
    pub description: String,
    /// Version for tracking definition evolution
    #[serde(default = "default_version")]
    pub version: u32,
    /// Label for the "start workflow" button
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    /// The actions (nodes) of the graph
    pub actions: Vec<WorkflowAction>,
    /// The transitions (edges) of the graph
    #[serde(default)]
    pub transitions: Vec<WorkflowTransition>,
    /// When this definition was created
    pub created_at: DateTime<Utc>,
    /// Metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}

impl WorkflowDefinition {
    /// Create an empty definition
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: WorkflowDefinitionId::generate(),
            title: title.into(),
            description: String::new(),
            version: 1,
            button_text: None,
            actions: Vec::new(),
            transitions: Vec::new(),
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = WorkflowDefinitionId::new(id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_button_text(mut self, text: impl Into<String>) -> Self {
        self.button_text = Some(text.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add an action to the graph
    pub fn add_action(&mut self, action: WorkflowAction) -> WorkflowResult<()> {
        if self.contains_action(&action.id) {
            return Err(WorkflowError::DuplicateAction(action.id));
        }
        self.actions.push(action);
        Ok(())
    }

    /// Add a transition between two existing actions
    pub fn add_transition(&mut self, transition: WorkflowTransition) -> WorkflowResult<()> {
        if !self.contains_action(&transition.source) {
            return Err(WorkflowError::ActionNotFound(transition.source));
        }
        if !self.contains_action(&transition.target) {
            return Err(WorkflowError::ActionNotFound(transition.target));
        }
        if self.transition(&transition.id).is_some() {
            return Err(WorkflowError::DuplicateTransition(transition.id));
        }
        self.transitions.push(transition);
        Ok(())
    }

    /// The action every new instance starts at
    pub fn initial_action(&self) -> Option<&WorkflowAction> {
        self.actions.iter().find(|a| a.initial)
    }

    pub fn action(&self, id: &ActionId) -> Option<&WorkflowAction> {
        self.actions.iter().find(|a| &a.id == id)
    }

    pub fn contains_action(&self, id: &ActionId) -> bool {
        self.action(id).is_some()
    }

    pub fn transition(&self, id: &TransitionId) -> Option<&WorkflowTransition> {
        self.transitions.iter().find(|t| &t.id == id)
    }

    /// Transitions leaving an action, in declaration order
    pub fn outgoing(&self, action: &ActionId) -> Vec<&WorkflowTransition> {
        self.transitions.iter().filter(|t| &t.source == action).collect()
    }

    /// A named transition, only if it leaves `action`
    pub fn outgoing_transition(&self, action: &ActionId, id: &TransitionId) -> Option<&WorkflowTransition> {
        self.transitions
            .iter()
            .find(|t| &t.source == action && &t.id == id)
    }

    /// Reaching a terminal action ends the instance.
    pub fn is_terminal(&self, action: &ActionId) -> bool {
        match self.action(action) {
            Some(a) if a.is_cancel() => true,
            Some(_) => self.outgoing(action).is_empty(),
            None => false,
        }
    }

    /// Label for the "start workflow" button
    pub fn start_label(&self) -> &str {
        self.button_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.initial_action().map(|a| a.title.as_str()))
            .unwrap_or(&self.title)
    }

    /// Validate the definition for structural correctness
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.title.trim().is_empty() {
            return Err(WorkflowError::Validation("Workflow title must not be empty".into()));
        }

        if self.actions.is_empty() {
            return Err(WorkflowError::Validation(
                "Workflow must have at least one action".into(),
            ));
        }

        let initial_count = self.actions.iter().filter(|a| a.initial).count();
        if initial_count == 0 {
            return Err(WorkflowError::NoInitialAction);
        }
        if initial_count > 1 {
            return Err(WorkflowError::MultipleInitialActions);
        }

        let mut seen_actions = HashSet::new();
        for action in &self.actions {
            if !seen_actions.insert(&action.id) {
                return Err(WorkflowError::DuplicateAction(action.id.clone()));
            }
            if let crate::ActionKind::Approval { required_approvals: 0 } = action.kind {
                return Err(WorkflowError::Validation(format!(
                    "Approval action {} must require at least one approval",
                    action.id
                )));
            }
        }

        let mut seen_transitions = HashSet::new();
        for transition in &self.transitions {
            if !seen_transitions.insert(&transition.id) {
                return Err(WorkflowError::DuplicateTransition(transition.id.clone()));
            }
            if !self.contains_action(&transition.source) {
                return Err(WorkflowError::ActionNotFound(transition.source.clone()));
            }
            if !self.contains_action(&transition.target) {
                return Err(WorkflowError::ActionNotFound(transition.target.clone()));
            }
        }

        if let Some(initial) = self.initial_action() {
            let reachable = self.reachable_from(&initial.id);
            if let Some(orphan) = self.actions.iter().find(|a| !reachable.contains(&a.id)) {
                return Err(WorkflowError::UnreachableAction(orphan.id.clone()));
            }
        }

        Ok(())
    }

    /// Find all actions reachable from a given action
    fn reachable_from(&self, start: &ActionId) -> HashSet<ActionId> {
        let mut visited = HashSet::new();
        let mut queue = vec![start.clone()];

        while let Some(current) = queue.pop() {
            if visited.insert(current.clone()) {
                for transition in self.outgoing(&current) {
                    if !visited.contains(&transition.target) {
                        queue.push(transition.target.clone());
                    }
                }
            }
        }

        visited
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}
