//! Definition store: registers definitions and resolves them for targets
//!
//! Definitions are immutable once registered. To change a workflow,
//! register a new version under a new id; running instances keep the
//! definition they started with.

use crate::error::{EngineError, EngineResult};
use crate::ports::{TargetDirectory, TargetRecord};
use crate::storage::{StorageError, WorkflowStorage};
use approval_workflow_types::{TargetRef, WorkflowDefinition, WorkflowDefinitionId};
use std::collections::HashSet;
use std::sync::Arc;

/// Registry and resolver of workflow definitions
#[derive(Clone)]
pub struct DefinitionStore {
    storage: Arc<dyn WorkflowStorage>,
    targets: Arc<dyn TargetDirectory>,
}

impl DefinitionStore {
    pub fn new(storage: Arc<dyn WorkflowStorage>, targets: Arc<dyn TargetDirectory>) -> Self {
        Self { storage, targets }
    }

    /// Register a workflow definition
    ///
    /// Validates the definition before storing. Returns the definition ID.
    pub async fn register(&self, definition: WorkflowDefinition) -> EngineResult<WorkflowDefinitionId> {
        definition
            .validate()
            .map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;

        let id = definition.id.clone();
        let title = definition.title.clone();
        let version = definition.version;

        self.storage
            .insert_definition(definition)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(_) => {
                    EngineError::InvalidDefinition(format!("definition {id} is already registered"))
                }
                other => other.into(),
            })?;

        tracing::info!(definition_id = %id, title = %title, version, "Workflow definition registered");
        Ok(id)
    }

    pub async fn get(&self, id: &WorkflowDefinitionId) -> EngineResult<Option<WorkflowDefinition>> {
        Ok(self.storage.get_definition(id).await?)
    }

    /// Like [`get`](Self::get), but a missing definition is an error.
    pub async fn require(&self, id: &WorkflowDefinitionId) -> EngineResult<WorkflowDefinition> {
        self.get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("workflow definition {id}")))
    }

    /// All definitions, sorted by title
    pub async fn get_definitions(&self) -> EngineResult<Vec<WorkflowDefinition>> {
        let mut definitions = self.storage.list_definitions().await?;
        definitions.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(definitions)
    }

    /// The effective definition of a target.
    ///
    /// Precedence: direct assignment, then additional assignments in order,
    /// then the nearest ancestor's effective definition.
    pub async fn get_definition_for(&self, target: &TargetRef) -> EngineResult<Option<WorkflowDefinition>> {
        let mut visited = HashSet::new();
        let mut current = self.targets.get_target(target).await?;

        while let Some(record) = current {
            if !visited.insert(record.target.clone()) {
                tracing::warn!(target = %target, "Cycle in target parent chain");
                break;
            }
            if let Some(definition) = self.first_assigned(&record).await? {
                return Ok(Some(definition));
            }
            current = match &record.parent {
                Some(parent) => self.targets.get_target(parent).await?,
                None => None,
            };
        }
        Ok(None)
    }

    /// The definitions a workflow may be started with on a target.
    ///
    /// The direct (or else inherited) definition comes first, followed by
    /// the target's additional definitions, without duplicates.
    pub async fn get_definitions_for(&self, target: &TargetRef) -> EngineResult<Vec<WorkflowDefinition>> {
        let Some(record) = self.targets.get_target(target).await? else {
            return Ok(Vec::new());
        };

        let mut result: Vec<WorkflowDefinition> = Vec::new();
        let primary = match &record.assignment.definition {
            Some(id) => self.get(id).await?,
            None => None,
        };
        let primary = match primary {
            Some(definition) => Some(definition),
            None => match &record.parent {
                Some(parent) => self.get_definition_for(parent).await?,
                None => None,
            },
        };
        if let Some(definition) = primary {
            result.push(definition);
        }

        for id in &record.assignment.additional {
            if result.iter().any(|d| &d.id == id) {
                continue;
            }
            if let Some(definition) = self.get(id).await? {
                result.push(definition);
            }
        }
        Ok(result)
    }

    pub async fn is_applicable(&self, target: &TargetRef, id: &WorkflowDefinitionId) -> EngineResult<bool> {
        Ok(self
            .get_definitions_for(target)
            .await?
            .iter()
            .any(|d| &d.id == id))
    }

    async fn first_assigned(&self, record: &TargetRecord) -> EngineResult<Option<WorkflowDefinition>> {
        let assigned = record
            .assignment
            .definition
            .iter()
            .chain(record.assignment.additional.iter());
        for id in assigned {
            if let Some(definition) = self.get(id).await? {
                return Ok(Some(definition));
            }
        }
        Ok(None)
    }
}
