use super::StorageResult;
use approval_workflow_types::{
    ActionInstance, ImportedTemplate, TargetRef, WorkflowDefinition, WorkflowDefinitionId,
    WorkflowInstance, WorkflowInstanceId,
};
use async_trait::async_trait;

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

/// One atomic step of an instance: close the open history entry, write
/// the new instance state, and optionally open the next entry.
#[derive(Debug, Clone)]
pub struct AdvanceCommit {
    pub instance: WorkflowInstance,
    /// Revision the caller read; the write fails if the stored one differs
    pub expected_revision: u64,
    pub closed: ActionInstance,
    pub opened: Option<ActionInstance>,
}

/// Storage interface for registered definitions.
#[async_trait]
pub trait DefinitionRepository: Send + Sync {
    /// Insert a definition; an existing id is a conflict.
    async fn insert_definition(&self, definition: WorkflowDefinition) -> StorageResult<()>;

    async fn get_definition(
        &self,
        id: &WorkflowDefinitionId,
    ) -> StorageResult<Option<WorkflowDefinition>>;

    async fn list_definitions(&self) -> StorageResult<Vec<WorkflowDefinition>>;
}

/// Storage interface for workflow instances.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Persist a new instance with its first history entry. Fails with a
    /// conflict if the target already has an active instance.
    async fn create_instance(
        &self,
        instance: WorkflowInstance,
        first_entry: ActionInstance,
    ) -> StorageResult<WorkflowInstance>;

    /// Apply an [`AdvanceCommit`] with compare-and-swap on the revision.
    async fn commit_advance(&self, commit: AdvanceCommit) -> StorageResult<WorkflowInstance>;

    async fn get_instance(&self, id: &WorkflowInstanceId) -> StorageResult<Option<WorkflowInstance>>;

    /// The single non-complete instance of a target.
    async fn active_instance_for(&self, target: &TargetRef) -> StorageResult<Option<WorkflowInstance>>;

    /// Every instance of a target, newest first.
    async fn instances_for(&self, target: &TargetRef) -> StorageResult<Vec<WorkflowInstance>>;
}

/// Storage interface for append-only action history.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// The open entry of an instance's current action.
    async fn open_entry_for(&self, instance_id: &WorkflowInstanceId) -> StorageResult<Option<ActionInstance>>;

    /// Replace the open entry (field edits, approvals). Closed entries
    /// cannot be updated.
    async fn update_open_entry(&self, entry: ActionInstance) -> StorageResult<()>;

    /// History of one instance, newest first.
    async fn history_for_instance(
        &self,
        instance_id: &WorkflowInstanceId,
    ) -> StorageResult<Vec<ActionInstance>>;

    /// History across all instances of a target, newest first.
    async fn history_for_target(
        &self,
        target: &TargetRef,
        window: QueryWindow,
    ) -> StorageResult<Vec<ActionInstance>>;
}

/// Storage interface for imported template records.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Store a template record together with the definition it produced.
    /// Nothing is written if either the name or the definition id is taken.
    async fn insert_template(
        &self,
        template: ImportedTemplate,
        definition: WorkflowDefinition,
    ) -> StorageResult<()>;
    async fn get_template(&self, name: &str) -> StorageResult<Option<ImportedTemplate>>;
    async fn list_templates(&self) -> StorageResult<Vec<ImportedTemplate>>;
}

/// Unified storage bundle used by the engine.
pub trait WorkflowStorage:
    DefinitionRepository + InstanceRepository + HistoryRepository + TemplateRepository + Send + Sync
{
}

impl<T> WorkflowStorage for T where
    T: DefinitionRepository + InstanceRepository + HistoryRepository + TemplateRepository + Send + Sync
{
}
