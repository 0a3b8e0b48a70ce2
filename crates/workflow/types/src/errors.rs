//! Error types for workflow definitions and templates

use crate::{ActionId, TransitionId};

/// Errors raised while building or validating a workflow definition
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Action not found: {0}")]
    ActionNotFound(ActionId),

    #[error("Transition not found: {0}")]
    TransitionNotFound(TransitionId),

    #[error("Duplicate action ID: {0}")]
    DuplicateAction(ActionId),

    #[error("Duplicate transition ID: {0}")]
    DuplicateTransition(TransitionId),

    #[error("No initial action defined")]
    NoInitialAction,

    #[error("More than one initial action defined")]
    MultipleInitialActions,

    #[error("Action is unreachable from the initial action: {0}")]
    UnreachableAction(ActionId),

    #[error("Workflow validation error: {0}")]
    Validation(String),

    #[error("Malformed workflow template: {0}")]
    Template(String),
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
