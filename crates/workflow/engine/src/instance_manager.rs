//! Instance manager: starts, finds and cancels workflow instances
//!
//! A target has at most one active instance. Completed and cancelled
//! instances stay in storage as the target's workflow log.

use crate::definition_store::DefinitionStore;
use crate::error::{EngineError, EngineResult};
use crate::locks::TargetLocks;
use crate::storage::{AdvanceCommit, QueryWindow, StorageError, WorkflowStorage};
use crate::transition_engine::{commit_error, TransitionEngine, TransitionOutcome};
use approval_workflow_types::{
    ActionInstance, Actor, TargetRef, WorkflowDefinitionId, WorkflowInstance, ADMINISTER_WORKFLOW,
};
use std::sync::Arc;

/// Lifecycle management of workflow instances
#[derive(Clone)]
pub struct InstanceManager {
    storage: Arc<dyn WorkflowStorage>,
    definitions: DefinitionStore,
    locks: TargetLocks,
    transitions: TransitionEngine,
    history_limit: usize,
}

impl InstanceManager {
    pub fn new(
        storage: Arc<dyn WorkflowStorage>,
        definitions: DefinitionStore,
        locks: TargetLocks,
        transitions: TransitionEngine,
    ) -> Self {
        Self {
            storage,
            definitions,
            locks,
            transitions,
            history_limit: 0,
        }
    }

    /// Number of entries history queries return when no limit is given
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// The active (non-complete) instance of a target
    pub async fn get_workflow_for(&self, target: &TargetRef) -> EngineResult<Option<WorkflowInstance>> {
        Ok(self.storage.active_instance_for(target).await?)
    }

    /// Every instance of a target, newest first
    pub async fn instances_for(&self, target: &TargetRef) -> EngineResult<Vec<WorkflowInstance>> {
        Ok(self.storage.instances_for(target).await?)
    }

    /// Start a workflow on a target.
    ///
    /// The instance and its first history entry are persisted before the
    /// initial action's side effect runs.
    pub async fn start_workflow(
        &self,
        target: &TargetRef,
        definition_id: &WorkflowDefinitionId,
        actor: &Actor,
    ) -> EngineResult<TransitionOutcome> {
        let _lock = self.locks.lock(target).await;

        if !self.definitions.is_applicable(target, definition_id).await? {
            return Err(EngineError::InvalidDefinition(format!(
                "definition {definition_id} does not apply to {target}"
            )));
        }
        if self.storage.active_instance_for(target).await?.is_some() {
            return Err(EngineError::AlreadyActive(target.clone()));
        }

        let definition = self.definitions.require(definition_id).await?;
        let initial = definition.initial_action().ok_or_else(|| {
            EngineError::InvalidDefinition(format!("definition {definition_id} has no initial action"))
        })?;

        let mut instance = WorkflowInstance::new(target.clone(), &definition, initial.id.clone(), actor.id.clone());
        let mut entry = ActionInstance::open(instance.id.clone(), initial.id.clone(), actor.id.clone());
        if definition.is_terminal(&initial.id) {
            entry.close(actor.id.clone(), None);
            if initial.is_cancel() {
                instance.cancel();
            } else {
                instance.complete();
            }
        }

        let instance = self
            .storage
            .create_instance(instance, entry)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(_) => EngineError::AlreadyActive(target.clone()),
                other => other.into(),
            })?;

        tracing::info!(
            instance_id = %instance.id,
            target = %target,
            definition_id = %definition.id,
            version = definition.version,
            action = %instance.current_action,
            actor = %actor.id,
            "Workflow started"
        );

        let mut outcome = TransitionOutcome::new(instance.clone());
        outcome.instance = self
            .transitions
            .settle(instance, &definition, actor, &mut outcome)
            .await?;
        Ok(outcome)
    }

    /// History across all instances of a target, most recent first.
    ///
    /// `None` uses the configured history limit; `Some(0)` returns everything.
    pub async fn get_workflow_history_for(
        &self,
        target: &TargetRef,
        limit: Option<usize>,
    ) -> EngineResult<Vec<ActionInstance>> {
        let window = QueryWindow::first(limit.unwrap_or(self.history_limit));
        Ok(self.storage.history_for_target(target, window).await?)
    }

    /// The most recent history entry with a comment, looking at most
    /// `limit` entries back
    pub async fn recent_comment(
        &self,
        target: &TargetRef,
        limit: Option<usize>,
    ) -> EngineResult<Option<ActionInstance>> {
        Ok(self
            .get_workflow_history_for(target, limit)
            .await?
            .into_iter()
            .find(|e| e.has_comment()))
    }

    /// Cancel the active workflow of a target.
    ///
    /// Allowed for the initiator and for holders of `ADMINISTER_WORKFLOW`.
    pub async fn cancel_workflow(
        &self,
        target: &TargetRef,
        actor: &Actor,
        reason: Option<String>,
    ) -> EngineResult<WorkflowInstance> {
        let _lock = self.locks.lock(target).await;

        let instance = self
            .storage
            .active_instance_for(target)
            .await?
            .ok_or_else(|| EngineError::NoActiveWorkflow(target.clone()))?;

        if instance.initiator != actor.id && !actor.has(ADMINISTER_WORKFLOW) {
            return Err(EngineError::Unauthorized(format!(
                "actor {} may not cancel the workflow on {target}",
                actor.id
            )));
        }

        let mut closed = self.storage.open_entry_for(&instance.id).await?.ok_or_else(|| {
            StorageError::InvariantViolation(format!("instance {} has no open history entry", instance.id))
        })?;
        closed.set_comment(reason);
        closed.close(actor.id.clone(), None);

        let mut next = instance.clone();
        next.cancel();
        let cancelled = self
            .storage
            .commit_advance(AdvanceCommit {
                instance: next,
                expected_revision: instance.revision,
                closed,
                opened: None,
            })
            .await
            .map_err(|e| commit_error(e, &instance.id))?;

        tracing::info!(
            instance_id = %cancelled.id,
            target = %target,
            actor = %actor.id,
            action = %cancelled.current_action,
            "Workflow cancelled"
        );
        Ok(cancelled)
    }
}
