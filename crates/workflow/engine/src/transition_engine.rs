//! Transition engine: moves instances between actions
//!
//! The transition engine is the heart of the workflow engine. Every move
//! of an instance goes through [`TransitionEngine::advance`], which closes
//! the open history entry, moves the current-action pointer and opens the
//! next entry in one compare-and-swap commit. After the commit the entered
//! action's side effect runs, and the engine keeps advancing on its own
//! while exactly one automatic transition applies.

use crate::definition_store::DefinitionStore;
use crate::error::{EngineError, EngineResult, SideEffectFailure};
use crate::guard::{GuardContext, GuardEvaluator, GuardResult};
use crate::locks::TargetLocks;
use crate::side_effects::EntryEffects;
use crate::storage::{AdvanceCommit, StorageError, WorkflowStorage};
use approval_workflow_types::{
    ActionInstance, ActionKind, Actor, Submission, TransitionId, WorkflowAction, WorkflowDefinition,
    WorkflowInstance, WorkflowInstanceId, WorkflowTransition,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What an engine operation did
#[derive(Clone, Debug)]
pub struct TransitionOutcome {
    /// The instance after the operation
    pub instance: WorkflowInstance,
    /// Transitions taken, explicit and automatic, in order
    pub transitions_taken: Vec<TransitionId>,
    pub side_effect_failures: Vec<SideEffectFailure>,
    /// Chaining stopped with an automatic transition still applicable
    pub step_limit_reached: bool,
}

impl TransitionOutcome {
    pub(crate) fn new(instance: WorkflowInstance) -> Self {
        Self {
            instance,
            transitions_taken: Vec::new(),
            side_effect_failures: Vec::new(),
            step_limit_reached: false,
        }
    }

    pub fn advanced(&self) -> bool {
        !self.transitions_taken.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.instance.is_complete()
    }
}

/// Executes explicit and automatic transitions
#[derive(Clone)]
pub struct TransitionEngine {
    storage: Arc<dyn WorkflowStorage>,
    definitions: DefinitionStore,
    locks: TargetLocks,
    guards: GuardEvaluator,
    effects: EntryEffects,
    max_auto_steps: usize,
}

impl TransitionEngine {
    pub fn new(
        storage: Arc<dyn WorkflowStorage>,
        definitions: DefinitionStore,
        locks: TargetLocks,
        effects: EntryEffects,
        max_auto_steps: usize,
    ) -> Self {
        Self {
            storage,
            definitions,
            locks,
            guards: GuardEvaluator::new(),
            effects,
            max_auto_steps,
        }
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Take a named transition out of the instance's current action.
    ///
    /// Nothing is written unless the transition leaves the current action,
    /// its guard passes and every submitted field has the right type.
    pub async fn execute_transition(
        &self,
        instance: &WorkflowInstance,
        transition_id: &TransitionId,
        actor: &Actor,
        submission: Submission,
    ) -> EngineResult<TransitionOutcome> {
        let _lock = self.locks.lock(&instance.target).await;
        let current = self.reload(instance).await?;
        let definition = self.definitions.require(&current.definition_id).await?;
        let action = action_of(&definition, &current)?;

        let transition = definition
            .outgoing_transition(&action.id, transition_id)
            .ok_or_else(|| EngineError::UnknownTransition(transition_id.clone()))?;

        let ctx = GuardContext {
            actor,
            action,
            instance: &current,
        };
        if let GuardResult::Denied { reason } = self.guards.evaluate(&transition.guard, &ctx) {
            tracing::info!(
                instance_id = %current.id,
                transition = %transition.id,
                actor = %actor.id,
                reason = %reason,
                "Transition denied"
            );
            return Err(EngineError::Unauthorized(reason));
        }

        let fields = action.form.filter(&submission.fields)?;

        let mut outcome = TransitionOutcome::new(current.clone());
        let next = self
            .advance(&current, &definition, transition, actor, fields, submission.comment)
            .await?;
        outcome.transitions_taken.push(transition.id.clone());
        outcome.instance = self.settle(next, &definition, actor, &mut outcome).await?;
        Ok(outcome)
    }

    /// Save submitted fields on the open entry, then advance automatically
    /// if the current action is complete and exactly one automatic
    /// transition applies.
    pub async fn evaluate(
        &self,
        instance: &WorkflowInstance,
        actor: &Actor,
        submission: Submission,
    ) -> EngineResult<TransitionOutcome> {
        let _lock = self.locks.lock(&instance.target).await;
        let current = self.reload(instance).await?;
        let definition = self.definitions.require(&current.definition_id).await?;
        let action = action_of(&definition, &current)?;

        if !submission.is_empty() {
            if !action.can_edit(actor) {
                return Err(EngineError::Unauthorized(format!(
                    "actor {} may not edit action '{}'",
                    actor.id, action.id
                )));
            }
            let fields = action.form.filter(&submission.fields)?;
            let mut entry = self.open_entry(&current).await?;
            entry.merge_fields(fields);
            entry.set_comment(submission.comment);
            self.storage.update_open_entry(entry).await?;
            tracing::debug!(instance_id = %current.id, action = %action.id, "Submission saved");
        }

        let mut outcome = TransitionOutcome::new(current.clone());
        outcome.instance = self
            .auto_advance(current, &definition, actor, &mut outcome)
            .await?;
        Ok(outcome)
    }

    /// Record an approval on the current approval action, then re-evaluate.
    pub async fn approve(
        &self,
        instance: &WorkflowInstance,
        actor: &Actor,
        comment: Option<String>,
    ) -> EngineResult<TransitionOutcome> {
        let _lock = self.locks.lock(&instance.target).await;
        let current = self.reload(instance).await?;
        let definition = self.definitions.require(&current.definition_id).await?;
        let action = action_of(&definition, &current)?;

        let ActionKind::Approval { required_approvals } = action.kind else {
            return Err(EngineError::NotAnApprovalAction(action.id.clone()));
        };
        if !action.is_assigned(actor) {
            return Err(EngineError::Unauthorized(format!(
                "actor {} is not an approver of '{}'",
                actor.id, action.id
            )));
        }

        let mut entry = self.open_entry(&current).await?;
        let recorded = entry.record_approval(actor.id.clone());
        entry.set_comment(comment);
        let approvals = entry.approvals.len();
        self.storage.update_open_entry(entry).await?;

        if recorded {
            tracing::info!(
                instance_id = %current.id,
                action = %action.id,
                approver = %actor.id,
                approvals,
                required_approvals,
                "Approval recorded"
            );
        } else {
            tracing::debug!(instance_id = %current.id, approver = %actor.id, "Duplicate approval ignored");
        }

        let mut outcome = TransitionOutcome::new(current.clone());
        outcome.instance = self
            .auto_advance(current, &definition, actor, &mut outcome)
            .await?;
        Ok(outcome)
    }

    // ── Views ────────────────────────────────────────────────────────

    pub async fn current_action(&self, instance: &WorkflowInstance) -> EngineResult<WorkflowAction> {
        let definition = self.definitions.require(&instance.definition_id).await?;
        action_of(&definition, instance).cloned()
    }

    /// Transitions out of the current action whose guard passes for `actor`
    pub async fn available_transitions(
        &self,
        instance: &WorkflowInstance,
        actor: &Actor,
    ) -> EngineResult<Vec<WorkflowTransition>> {
        if instance.is_complete() {
            return Ok(Vec::new());
        }
        let definition = self.definitions.require(&instance.definition_id).await?;
        let action = action_of(&definition, instance)?;
        let ctx = GuardContext {
            actor,
            action,
            instance,
        };
        Ok(definition
            .outgoing(&action.id)
            .into_iter()
            .filter(|t| self.guards.evaluate(&t.guard, &ctx).is_allowed())
            .cloned()
            .collect())
    }

    // ── Internals (caller holds the target lock) ─────────────────────

    /// Run the current action's entry side effect, then auto-advance.
    pub(crate) async fn settle(
        &self,
        instance: WorkflowInstance,
        definition: &WorkflowDefinition,
        actor: &Actor,
        outcome: &mut TransitionOutcome,
    ) -> EngineResult<WorkflowInstance> {
        let entered = action_of(definition, &instance)?;
        let failures = self.effects.on_enter(&instance, definition, entered).await;
        outcome.side_effect_failures.extend(failures);
        self.auto_advance(instance, definition, actor, outcome).await
    }

    async fn auto_advance(
        &self,
        mut instance: WorkflowInstance,
        definition: &WorkflowDefinition,
        actor: &Actor,
        outcome: &mut TransitionOutcome,
    ) -> EngineResult<WorkflowInstance> {
        let mut steps = 0;
        while !instance.is_complete() {
            let Some(transition) = self.automatic_candidate(&instance, definition, actor).await? else {
                break;
            };
            if steps == self.max_auto_steps {
                tracing::warn!(
                    instance_id = %instance.id,
                    action = %instance.current_action,
                    max_auto_steps = self.max_auto_steps,
                    "Automatic advancement stopped at step limit"
                );
                outcome.step_limit_reached = true;
                break;
            }
            let next = self
                .advance(&instance, definition, &transition, actor, BTreeMap::new(), None)
                .await?;
            outcome.transitions_taken.push(transition.id.clone());
            let entered = action_of(definition, &next)?;
            let failures = self.effects.on_enter(&next, definition, entered).await;
            outcome.side_effect_failures.extend(failures);
            instance = next;
            steps += 1;
        }
        Ok(instance)
    }

    /// The single automatic transition to take, if the current action is
    /// complete and exactly one applies.
    async fn automatic_candidate(
        &self,
        instance: &WorkflowInstance,
        definition: &WorkflowDefinition,
        actor: &Actor,
    ) -> EngineResult<Option<WorkflowTransition>> {
        let action = action_of(definition, instance)?;
        let Some(entry) = self.storage.open_entry_for(&instance.id).await? else {
            return Ok(None);
        };
        if !action.completion_satisfied(&entry) {
            tracing::debug!(instance_id = %instance.id, action = %action.id, "Action incomplete; instance pending");
            return Ok(None);
        }

        let ctx = GuardContext {
            actor,
            action,
            instance,
        };
        let candidates: Vec<&WorkflowTransition> = definition
            .outgoing(&action.id)
            .into_iter()
            .filter(|t| t.automatic && self.guards.evaluate(&t.guard, &ctx).is_allowed())
            .collect();

        match candidates.as_slice() {
            [only] => Ok(Some((*only).clone())),
            [] => {
                tracing::debug!(instance_id = %instance.id, action = %action.id, "No automatic transition applies");
                Ok(None)
            }
            many => {
                tracing::debug!(
                    instance_id = %instance.id,
                    action = %action.id,
                    candidates = many.len(),
                    "Ambiguous automatic transitions; instance pending"
                );
                Ok(None)
            }
        }
    }

    /// Close the open entry, move the pointer and open the next entry in
    /// one commit. Entering a terminal action finishes the instance.
    async fn advance(
        &self,
        instance: &WorkflowInstance,
        definition: &WorkflowDefinition,
        transition: &WorkflowTransition,
        actor: &Actor,
        fields: BTreeMap<String, Value>,
        comment: Option<String>,
    ) -> EngineResult<WorkflowInstance> {
        let mut closed = self.open_entry(instance).await?;
        closed.merge_fields(fields);
        closed.set_comment(comment);
        closed.close(actor.id.clone(), Some(transition.id.clone()));

        let mut next = instance.clone();
        next.advance_to(transition.target.clone());
        let entered = action_of(definition, &next)?;
        let mut opened = ActionInstance::open(next.id.clone(), entered.id.clone(), actor.id.clone());
        if definition.is_terminal(&entered.id) {
            opened.close(actor.id.clone(), None);
            if entered.is_cancel() {
                next.cancel();
            } else {
                next.complete();
            }
        }

        let committed = self
            .storage
            .commit_advance(AdvanceCommit {
                instance: next,
                expected_revision: instance.revision,
                closed,
                opened: Some(opened),
            })
            .await
            .map_err(|e| commit_error(e, &instance.id))?;

        tracing::info!(
            instance_id = %committed.id,
            target = %committed.target,
            transition = %transition.id,
            from = %instance.current_action,
            to = %committed.current_action,
            actor = %actor.id,
            automatic = transition.automatic,
            revision = committed.revision,
            "Workflow transition committed"
        );
        if committed.is_complete() {
            tracing::info!(
                instance_id = %committed.id,
                target = %committed.target,
                status = %committed.status,
                "Workflow instance finished"
            );
        }
        Ok(committed)
    }

    /// Fetch the stored instance; a differing revision means the caller's
    /// snapshot is stale.
    async fn reload(&self, snapshot: &WorkflowInstance) -> EngineResult<WorkflowInstance> {
        let stored = self
            .storage
            .get_instance(&snapshot.id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("workflow instance {}", snapshot.id)))?;
        if stored.revision != snapshot.revision {
            return Err(EngineError::ConcurrentModification(stored.id));
        }
        if stored.is_complete() {
            return Err(EngineError::InstanceComplete(stored.id));
        }
        Ok(stored)
    }

    async fn open_entry(&self, instance: &WorkflowInstance) -> EngineResult<ActionInstance> {
        self.storage.open_entry_for(&instance.id).await?.ok_or_else(|| {
            StorageError::InvariantViolation(format!("instance {} has no open history entry", instance.id))
                .into()
        })
    }
}

pub(crate) fn action_of<'d>(
    definition: &'d WorkflowDefinition,
    instance: &WorkflowInstance,
) -> EngineResult<&'d WorkflowAction> {
    definition.action(&instance.current_action).ok_or_else(|| {
        StorageError::InvariantViolation(format!(
            "action {} is not part of definition {}",
            instance.current_action, definition.id
        ))
        .into()
    })
}

pub(crate) fn commit_error(err: StorageError, instance_id: &WorkflowInstanceId) -> EngineError {
    match err {
        StorageError::RevisionMismatch { .. } => EngineError::ConcurrentModification(instance_id.clone()),
        other => other.into(),
    }
}
