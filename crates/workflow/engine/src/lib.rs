//! Approval workflow engine
//!
//! Runs workflow definitions against editable content. Starting a
//! definition on a target creates a workflow instance that walks the
//! definition's actions through guarded transitions, keeps an append-only
//! history, gates edit and publish rights on the target while active, and
//! can defer publishing to scheduled jobs.
//!
//! # Architecture
//!
//! The [`WorkflowService`] composes specialized components:
//!
//! - [`DefinitionStore`]: registers definitions and resolves which apply to a target
//! - [`InstanceManager`]: starts, finds and cancels workflow instances
//! - [`TransitionEngine`]: explicit transitions, approvals and automatic advancement
//! - [`ScheduledActionRunner`]: idempotent publish/unpublish jobs
//! - [`AuthorizationGate`]: edit and publish checks for the host
//!
//! Host collaborators (target lookup, publishing, notification, job
//! storage) are reached through the traits in [`ports`]; persistence goes
//! through [`storage::WorkflowStorage`].
//!
//! # Example
//!
//! ```rust
//! use approval_workflow_engine::ports::{InMemoryTargetDirectory, RecordingPublisher, TargetRecord};
//! use approval_workflow_engine::storage::InMemoryWorkflowStorage;
//! use approval_workflow_engine::WorkflowService;
//! use approval_workflow_types::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let targets = Arc::new(InMemoryTargetDirectory::new());
//! let service = WorkflowService::builder(
//!     Arc::new(InMemoryWorkflowStorage::new()),
//!     targets.clone(),
//!     Arc::new(RecordingPublisher::new()),
//! )
//! .build();
//!
//! let mut def = WorkflowDefinition::new("Review").with_id("review");
//! def.add_action(WorkflowAction::step("draft", "Draft").initial().with_assignee("author"))?;
//! def.add_action(WorkflowAction::publish("live", "Live"))?;
//! def.add_transition(WorkflowTransition::new("submit", "Submit", "draft", "live"))?;
//! let def_id = service.definitions().register(def).await?;
//!
//! let page = TargetRef::page("42");
//! targets.upsert(TargetRecord::new(page.clone(), "Home").with_definition(def_id.clone()))?;
//!
//! let author = Actor::new("author");
//! let started = service.start_workflow(&page, &def_id, &author).await?;
//! assert_eq!(started.instance.current_action, ActionId::new("draft"));
//!
//! let submit = TransitionId::new("submit");
//! let done = service
//!     .update_workflow(&page, &author, Submission::default(), Some(&submit))
//!     .await?;
//! assert!(done.is_complete());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod authorization;
pub mod config;
pub mod definition_store;
pub mod error;
pub mod guard;
pub mod instance_manager;
pub mod locks;
pub mod ports;
pub mod scheduler;
pub mod service;
pub mod side_effects;
pub mod storage;
pub mod telemetry;
pub mod template_import;
pub mod transition_engine;

// Re-export main types
pub use authorization::{AuthorizationGate, GateOverride};
pub use config::EngineConfig;
pub use definition_store::DefinitionStore;
pub use error::{EngineError, EngineResult, SideEffectFailure};
pub use guard::GuardEvaluator;
pub use instance_manager::InstanceManager;
pub use locks::TargetLocks;
pub use scheduler::{JobOutcome, ScheduledActionRunner, ScheduledJob};
pub use service::{StartOption, WorkflowService, WorkflowServiceBuilder, WorkflowStatus};
pub use template_import::TemplateImporter;
pub use transition_engine::{TransitionEngine, TransitionOutcome};
