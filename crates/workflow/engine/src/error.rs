//! Error types for the workflow engine

use crate::ports::PortError;
use crate::storage::StorageError;
use approval_workflow_types::{
    ActionId, FieldError, TargetRef, TransitionId, WorkflowError, WorkflowInstanceId,
};

/// Errors returned by engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("Target {0} already has an active workflow")]
    AlreadyActive(TargetRef),

    #[error("Transition {0} does not leave the current action")]
    UnknownTransition(TransitionId),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Workflow instance {0} was modified concurrently")]
    ConcurrentModification(WorkflowInstanceId),

    #[error("Workflow instance {0} is already complete")]
    InstanceComplete(WorkflowInstanceId),

    #[error("No active workflow for target {0}")]
    NoActiveWorkflow(TargetRef),

    #[error("Action {0} does not collect approvals")]
    NotAnApprovalAction(ActionId),

    #[error("Invalid field: {0}")]
    InvalidField(#[from] FieldError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Definition error: {0}")]
    Definition(#[from] WorkflowError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Collaborator error: {0}")]
    Port(#[from] PortError),
}

impl EngineError {
    /// Whether re-fetching the instance and retrying can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrentModification(_))
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// An entry side effect that failed after its transition was committed.
///
/// Failures never undo the transition; they are logged and reported in
/// the operation outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Side effect of action {action_id} on instance {instance_id} failed: {reason}")]
pub struct SideEffectFailure {
    pub instance_id: WorkflowInstanceId,
    pub action_id: ActionId,
    pub reason: String,
}
