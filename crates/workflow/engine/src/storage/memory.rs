//! In-memory reference implementation of the workflow storage traits.
//!
//! This adapter is deterministic and test-friendly. All collections live
//! behind one lock so that an [`AdvanceCommit`] is applied atomically.

use super::traits::{
    AdvanceCommit, DefinitionRepository, HistoryRepository, InstanceRepository, QueryWindow,
    TemplateRepository,
};
use super::{StorageError, StorageResult};
use approval_workflow_types::{
    ActionInstance, ImportedTemplate, TargetRef, WorkflowDefinition, WorkflowDefinitionId,
    WorkflowInstance, WorkflowInstanceId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    definitions: HashMap<WorkflowDefinitionId, WorkflowDefinition>,
    instances: HashMap<WorkflowInstanceId, WorkflowInstance>,
    /// Instance ids in creation order
    instance_order: Vec<WorkflowInstanceId>,
    /// History entries in append order
    entries: Vec<ActionInstance>,
    templates: Vec<ImportedTemplate>,
}

impl State {
    /// The stored definition must contain the instance's current action.
    fn check_current_action(&self, instance: &WorkflowInstance) -> StorageResult<()> {
        let definition = self.definitions.get(&instance.definition_id).ok_or_else(|| {
            StorageError::InvariantViolation(format!(
                "instance {} references unknown definition {}",
                instance.id, instance.definition_id
            ))
        })?;
        if !definition.contains_action(&instance.current_action) {
            return Err(StorageError::InvariantViolation(format!(
                "action {} is not part of definition {}",
                instance.current_action, instance.definition_id
            )));
        }
        Ok(())
    }

    fn open_entry_index(&self, instance_id: &WorkflowInstanceId) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|e| &e.instance_id == instance_id && e.is_open())
    }
}

/// In-memory workflow storage adapter.
#[derive(Default)]
pub struct InMemoryWorkflowStorage {
    state: RwLock<State>,
}

impl InMemoryWorkflowStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StorageError::Backend("workflow storage lock poisoned".to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StorageError::Backend("workflow storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl DefinitionRepository for InMemoryWorkflowStorage {
    async fn insert_definition(&self, definition: WorkflowDefinition) -> StorageResult<()> {
        let mut guard = self.write()?;
        if guard.definitions.contains_key(&definition.id) {
            return Err(StorageError::Conflict(format!(
                "definition {} already exists",
                definition.id
            )));
        }
        guard.definitions.insert(definition.id.clone(), definition);
        Ok(())
    }

    async fn get_definition(
        &self,
        id: &WorkflowDefinitionId,
    ) -> StorageResult<Option<WorkflowDefinition>> {
        Ok(self.read()?.definitions.get(id).cloned())
    }

    async fn list_definitions(&self) -> StorageResult<Vec<WorkflowDefinition>> {
        Ok(self.read()?.definitions.values().cloned().collect())
    }
}

#[async_trait]
impl InstanceRepository for InMemoryWorkflowStorage {
    async fn create_instance(
        &self,
        instance: WorkflowInstance,
        first_entry: ActionInstance,
    ) -> StorageResult<WorkflowInstance> {
        let mut guard = self.write()?;

        if guard
            .instances
            .values()
            .any(|i| i.target == instance.target && i.is_active())
        {
            return Err(StorageError::Conflict(format!(
                "target {} already has an active workflow",
                instance.target
            )));
        }
        if guard.instances.contains_key(&instance.id) {
            return Err(StorageError::Conflict(format!(
                "instance {} already exists",
                instance.id
            )));
        }
        guard.check_current_action(&instance)?;
        if first_entry.instance_id != instance.id || first_entry.action_id != instance.current_action {
            return Err(StorageError::InvariantViolation(format!(
                "first history entry does not match instance {}",
                instance.id
            )));
        }

        guard.instance_order.push(instance.id.clone());
        guard.instances.insert(instance.id.clone(), instance.clone());
        guard.entries.push(first_entry);
        Ok(instance)
    }

    async fn commit_advance(&self, commit: AdvanceCommit) -> StorageResult<WorkflowInstance> {
        let AdvanceCommit {
            mut instance,
            expected_revision,
            closed,
            opened,
        } = commit;
        let mut guard = self.write()?;

        let stored = guard
            .instances
            .get(&instance.id)
            .ok_or_else(|| StorageError::NotFound(format!("instance {} not found", instance.id)))?;
        if stored.revision != expected_revision {
            return Err(StorageError::RevisionMismatch {
                expected: expected_revision,
                found: stored.revision,
            });
        }
        if stored.is_complete() {
            return Err(StorageError::InvariantViolation(format!(
                "instance {} is already complete",
                instance.id
            )));
        }
        guard.check_current_action(&instance)?;

        let closed_index = guard
            .open_entry_index(&instance.id)
            .filter(|&i| guard.entries[i].id == closed.id)
            .ok_or_else(|| {
                StorageError::InvariantViolation(format!(
                    "history entry {} is not the open entry of instance {}",
                    closed.id, instance.id
                ))
            })?;
        if closed.is_open() {
            return Err(StorageError::InvariantViolation(format!(
                "history entry {} was not closed",
                closed.id
            )));
        }
        if let Some(entry) = &opened {
            if entry.instance_id != instance.id || entry.action_id != instance.current_action {
                return Err(StorageError::InvariantViolation(format!(
                    "new history entry does not match instance {}",
                    instance.id
                )));
            }
        }

        instance.revision = expected_revision + 1;
        guard.entries[closed_index] = closed;
        if let Some(entry) = opened {
            guard.entries.push(entry);
        }
        guard.instances.insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }

    async fn get_instance(&self, id: &WorkflowInstanceId) -> StorageResult<Option<WorkflowInstance>> {
        Ok(self.read()?.instances.get(id).cloned())
    }

    async fn active_instance_for(&self, target: &TargetRef) -> StorageResult<Option<WorkflowInstance>> {
        Ok(self
            .read()?
            .instances
            .values()
            .find(|i| &i.target == target && i.is_active())
            .cloned())
    }

    async fn instances_for(&self, target: &TargetRef) -> StorageResult<Vec<WorkflowInstance>> {
        let guard = self.read()?;
        Ok(guard
            .instance_order
            .iter()
            .rev()
            .filter_map(|id| guard.instances.get(id))
            .filter(|i| &i.target == target)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HistoryRepository for InMemoryWorkflowStorage {
    async fn open_entry_for(&self, instance_id: &WorkflowInstanceId) -> StorageResult<Option<ActionInstance>> {
        let guard = self.read()?;
        Ok(guard.open_entry_index(instance_id).map(|i| guard.entries[i].clone()))
    }

    async fn update_open_entry(&self, entry: ActionInstance) -> StorageResult<()> {
        let mut guard = self.write()?;
        let index = guard
            .open_entry_index(&entry.instance_id)
            .filter(|&i| guard.entries[i].id == entry.id)
            .ok_or_else(|| {
                StorageError::InvariantViolation(format!(
                    "history entry {} is closed or unknown",
                    entry.id
                ))
            })?;
        if !entry.is_open() {
            return Err(StorageError::InvariantViolation(format!(
                "history entry {} cannot be closed outside a commit",
                entry.id
            )));
        }
        guard.entries[index] = entry;
        Ok(())
    }

    async fn history_for_instance(
        &self,
        instance_id: &WorkflowInstanceId,
    ) -> StorageResult<Vec<ActionInstance>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .rev()
            .filter(|e| &e.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn history_for_target(
        &self,
        target: &TargetRef,
        window: QueryWindow,
    ) -> StorageResult<Vec<ActionInstance>> {
        let guard = self.read()?;
        let values = guard
            .entries
            .iter()
            .rev()
            .filter(|e| {
                guard
                    .instances
                    .get(&e.instance_id)
                    .is_some_and(|i| &i.target == target)
            })
            .cloned()
            .collect::<Vec<_>>();
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl TemplateRepository for InMemoryWorkflowStorage {
    async fn insert_template(
        &self,
        template: ImportedTemplate,
        definition: WorkflowDefinition,
    ) -> StorageResult<()> {
        let mut guard = self.write()?;
        if guard.templates.iter().any(|t| t.name == template.name) {
            return Err(StorageError::Conflict(format!(
                "template {} already imported",
                template.name
            )));
        }
        if guard.definitions.contains_key(&definition.id) {
            return Err(StorageError::Conflict(format!(
                "definition {} already exists",
                definition.id
            )));
        }
        guard.definitions.insert(definition.id.clone(), definition);
        guard.templates.push(template);
        Ok(())
    }

    async fn get_template(&self, name: &str) -> StorageResult<Option<ImportedTemplate>> {
        Ok(self.read()?.templates.iter().find(|t| t.name == name).cloned())
    }

    async fn list_templates(&self) -> StorageResult<Vec<ImportedTemplate>> {
        Ok(self.read()?.templates.clone())
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
