//! Authorization gate: may an actor edit or publish a target right now?
//!
//! While a target has an active workflow, the current action decides who
//! may edit it and whether it may be published. Outside a workflow,
//! content that has an applicable definition cannot be published directly.

use crate::definition_store::DefinitionStore;
use crate::error::EngineResult;
use crate::storage::WorkflowStorage;
use approval_workflow_types::{Actor, TargetRef, WorkflowAction, WorkflowInstance};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type OverrideCounts = Arc<Mutex<HashMap<TargetRef, usize>>>;

/// Answers edit/publish questions for the host
#[derive(Clone)]
pub struct AuthorizationGate {
    storage: Arc<dyn WorkflowStorage>,
    definitions: DefinitionStore,
    overrides: OverrideCounts,
}

impl AuthorizationGate {
    pub fn new(storage: Arc<dyn WorkflowStorage>, definitions: DefinitionStore) -> Self {
        Self {
            storage,
            definitions,
            overrides: Arc::default(),
        }
    }

    /// Open a scope in which every check on `target` passes.
    ///
    /// The scope ends when the returned guard is dropped. Scopes nest.
    pub fn override_for(&self, target: &TargetRef) -> GateOverride {
        let mut counts = self.overrides.lock().unwrap_or_else(|p| p.into_inner());
        *counts.entry(target.clone()).or_insert(0) += 1;
        tracing::debug!(target = %target, "Authorization override opened");
        GateOverride {
            counts: self.overrides.clone(),
            target: target.clone(),
        }
    }

    pub fn is_overridden(&self, target: &TargetRef) -> bool {
        self.overrides
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(target)
            .is_some_and(|n| *n > 0)
    }

    pub async fn can_edit_target(&self, target: &TargetRef, actor: &Actor) -> EngineResult<bool> {
        if self.is_overridden(target) {
            return Ok(true);
        }
        match self.current_action(target).await? {
            Some((_, action)) => Ok(action.can_edit(actor)),
            None => Ok(true),
        }
    }

    pub async fn can_publish_target(&self, target: &TargetRef, actor: &Actor) -> EngineResult<bool> {
        if self.is_overridden(target) {
            return Ok(true);
        }
        match self.current_action(target).await? {
            Some((_, action)) => Ok(action.allow_publish && action.is_assigned(actor)),
            None => Ok(self.definitions.get_definitions_for(target).await?.is_empty()),
        }
    }

    /// Whether the actor may act on the active workflow at all
    pub async fn can_edit_workflow(&self, target: &TargetRef, actor: &Actor) -> EngineResult<bool> {
        match self.current_action(target).await? {
            Some((instance, action)) => Ok(action.can_edit(actor)
                || action.is_assigned(actor)
                || instance.initiator == actor.id),
            None => Ok(false),
        }
    }

    async fn current_action(
        &self,
        target: &TargetRef,
    ) -> EngineResult<Option<(WorkflowInstance, WorkflowAction)>> {
        let Some(instance) = self.storage.active_instance_for(target).await? else {
            return Ok(None);
        };
        let definition = self.definitions.require(&instance.definition_id).await?;
        let action = definition.action(&instance.current_action).cloned();
        Ok(action.map(|a| (instance, a)))
    }
}

/// Scoped authorization override; see [`AuthorizationGate::override_for`].
#[must_use = "the override ends when this guard is dropped"]
pub struct GateOverride {
    counts: OverrideCounts,
    target: TargetRef,
}

impl Drop for GateOverride {
    fn drop(&mut self) {
        let mut counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(n) = counts.get_mut(&self.target) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                counts.remove(&self.target);
            }
        }
        tracing::debug!(target = %self.target, "Authorization override closed");
    }
}
