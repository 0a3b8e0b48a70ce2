//! Workflow transitions: guarded edges between actions

use crate::{ActionId, Capability, TransitionId};
use serde::{Deserialize, Serialize};

/// A directed edge between two actions of the same definition.
///
/// Transitions are named so that a caller can choose one explicitly.
/// An `automatic` transition may also be taken by the engine on its own
/// once the source action's completion condition holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub id: TransitionId,
    /// Label shown on the button that triggers the transition
    pub title: String,
    pub source: ActionId,
    pub target: ActionId,
    #[serde(default)]
    pub guard: TransitionGuard,
    #[serde(default)]
    pub automatic: bool,
}

impl WorkflowTransition {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: TransitionId::new(id),
            title: title.into(),
            source: ActionId::new(source),
            target: ActionId::new(target),
            guard: TransitionGuard::Anyone,
            automatic: false,
        }
    }

    pub fn with_guard(mut self, guard: TransitionGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn automatic(mut self) -> Self {
        self.automatic = true;
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Who may take a transition.
///
/// Guards are evaluated against the acting actor, the source action and
/// the instance being moved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionGuard {
    /// No restriction
    #[default]
    Anyone,

    /// The actor holds a capability
    Capability { capability: Capability },

    /// The actor is assigned to the source action
    AssignedApprover,

    /// The actor started the instance
    Initiator,

    /// The actor did not start the instance (four-eyes review)
    NotInitiator,

    /// Composite: every sub-guard passes
    AllOf { guards: Vec<TransitionGuard> },

    /// Composite: at least one sub-guard passes
    AnyOf { guards: Vec<TransitionGuard> },
}

impl TransitionGuard {
    pub fn capability(capability: impl Into<Capability>) -> Self {
        Self::Capability {
            capability: capability.into(),
        }
    }

    pub fn all_of(guards: Vec<TransitionGuard>) -> Self {
        Self::AllOf { guards }
    }

    pub fn any_of(guards: Vec<TransitionGuard>) -> Self {
        Self::AnyOf { guards }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Anyone)
    }
}
