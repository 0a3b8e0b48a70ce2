//! Approval Workflow Domain Types
//!
//! An approval workflow attaches a reviewable path to an editable content
//! item (the *target*). The path is described once, as a definition, and
//! walked many times, once per instance.
//!
//! # Key Concepts
//!
//! - **WorkflowDefinition**: A reusable graph of actions and transitions.
//! - **WorkflowAction**: A step a target can be "at". Each action has a
//!   kind (plain step, approval, notification, publish scheduling, ...),
//!   an explicit form schema and an assignee list.
//! - **WorkflowTransition**: A guarded, directed edge between two actions
//!   of the same definition.
//! - **WorkflowInstance**: A live or finished run of a definition against
//!   one target. At most one instance per target is active.
//! - **ActionInstance**: An append-only history record of one visit to an
//!   action, holding submitted form data, comment and approvals.
//! - **WorkflowTemplate**: The serialized import format for definitions.
//!
//! # Design Principles
//!
//! 1. Definitions are immutable once registered.
//! 2. Transitions are the only legal way to move an instance.
//! 3. Submitted data is filtered through an explicit per-action schema.
//! 4. Targets are addressed by a typed reference, never by class name.

#![deny(unsafe_code)]

mod action;
mod actor;
mod definition;
mod errors;
mod form;
mod history;
mod ids;
mod instance;
mod target;
mod template;
mod transition;

pub use action::*;
pub use actor::*;
pub use definition::*;
pub use errors::*;
pub use form::*;
pub use history::*;
pub use ids::*;
pub use instance::*;
pub use target::*;
pub use template::*;
pub use transition::*;
