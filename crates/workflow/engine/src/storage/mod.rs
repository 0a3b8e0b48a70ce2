//! Workflow storage abstractions.
//!
//! The engine talks to persistence only through the repository traits
//! below. [`InMemoryWorkflowStorage`] is the deterministic reference
//! adapter; hosts plug a transactional backend behind the same traits.

mod error;
pub mod memory;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryWorkflowStorage;
pub use traits::{
    AdvanceCommit, DefinitionRepository, HistoryRepository, InstanceRepository, QueryWindow,
    TemplateRepository, WorkflowStorage,
};
