//! Scheduled publishing
//!
//! Publish and unpublish dates on a target become one-shot jobs in a
//! [`JobQueue`](crate::ports::JobQueue). The runner executes due jobs
//! idempotently: the target's scheduled-date field is cleared before the
//! publisher is called, so a redelivered job finds nothing to do.

mod job;
mod runner;

pub use job::{JobState, ScheduledJob};
pub use runner::{JobOutcome, JobRunReport, PollerHandle, ScheduledActionRunner};
