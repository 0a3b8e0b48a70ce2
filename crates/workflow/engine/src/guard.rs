//! Guard evaluator: checks whether an actor may take a transition
//!
//! Evaluation is a pure function of the guard, the actor, the action the
//! transition leaves and the instance being moved. It has no side effects.

use approval_workflow_types::{Actor, TransitionGuard, WorkflowAction, WorkflowInstance};

/// Everything a guard can look at
#[derive(Clone, Copy, Debug)]
pub struct GuardContext<'a> {
    pub actor: &'a Actor,
    /// The source action of the transition
    pub action: &'a WorkflowAction,
    pub instance: &'a WorkflowInstance,
}

/// Result of evaluating a guard
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardResult {
    Allowed,
    Denied { reason: String },
}

impl GuardResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardResult::Allowed)
    }
}

/// Evaluates transition guards
#[derive(Clone, Copy, Debug, Default)]
pub struct GuardEvaluator;

impl GuardEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, guard: &TransitionGuard, ctx: &GuardContext<'_>) -> GuardResult {
        match guard {
            TransitionGuard::Anyone => GuardResult::Allowed,

            TransitionGuard::Capability { capability } => {
                if ctx.actor.has_capability(capability) {
                    GuardResult::Allowed
                } else {
                    GuardResult::Denied {
                        reason: format!("actor {} lacks capability {}", ctx.actor.id, capability),
                    }
                }
            }

            TransitionGuard::AssignedApprover => {
                if ctx.action.is_assigned(ctx.actor) {
                    GuardResult::Allowed
                } else {
                    GuardResult::Denied {
                        reason: format!(
                            "actor {} is not assigned to action '{}'",
                            ctx.actor.id, ctx.action.id
                        ),
                    }
                }
            }

            TransitionGuard::Initiator => {
                if ctx.actor.id == ctx.instance.initiator {
                    GuardResult::Allowed
                } else {
                    GuardResult::Denied {
                        reason: format!("only the initiator {} may do this", ctx.instance.initiator),
                    }
                }
            }

            TransitionGuard::NotInitiator => {
                if ctx.actor.id != ctx.instance.initiator {
                    GuardResult::Allowed
                } else {
                    GuardResult::Denied {
                        reason: "the initiator may not review their own workflow".into(),
                    }
                }
            }

            TransitionGuard::AllOf { guards } => {
                let reasons: Vec<String> = guards
                    .iter()
                    .filter_map(|g| match self.evaluate(g, ctx) {
                        GuardResult::Allowed => None,
                        GuardResult::Denied { reason } => Some(reason),
                    })
                    .collect();
                if reasons.is_empty() {
                    GuardResult::Allowed
                } else {
                    GuardResult::Denied {
                        reason: reasons.join("; "),
                    }
                }
            }

            TransitionGuard::AnyOf { guards } => {
                if guards.iter().any(|g| self.evaluate(g, ctx).is_allowed()) {
                    GuardResult::Allowed
                } else {
                    GuardResult::Denied {
                        reason: "no alternative guard passed".into(),
                    }
                }
            }
        }
    }
}
