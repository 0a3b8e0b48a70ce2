//! In-memory collaborators for tests and embedding.

use super::{
    JobQueue, NotificationContext, Notifier, PortError, Publisher, ScheduleKind, TargetDirectory,
    TargetRecord,
};
use crate::scheduler::ScheduledJob;
use approval_workflow_types::{ActorId, JobId, TargetRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

fn poisoned(what: &str) -> PortError {
    PortError::new(format!("{what} lock poisoned"))
}

// ── Target Directory ─────────────────────────────────────────────────

/// Target directory backed by a map.
#[derive(Default)]
pub struct InMemoryTargetDirectory {
    targets: RwLock<HashMap<TargetRef, TargetRecord>>,
}

impl InMemoryTargetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, record: TargetRecord) -> Result<(), PortError> {
        self.targets
            .write()
            .map_err(|_| poisoned("targets"))?
            .insert(record.target.clone(), record);
        Ok(())
    }

    pub fn remove(&self, target: &TargetRef) -> Result<Option<TargetRecord>, PortError> {
        Ok(self.targets.write().map_err(|_| poisoned("targets"))?.remove(target))
    }

    pub fn record(&self, target: &TargetRef) -> Result<Option<TargetRecord>, PortError> {
        Ok(self.targets.read().map_err(|_| poisoned("targets"))?.get(target).cloned())
    }
}

#[async_trait]
impl TargetDirectory for InMemoryTargetDirectory {
    async fn get_target(&self, target: &TargetRef) -> Result<Option<TargetRecord>, PortError> {
        self.record(target)
    }

    async fn clear_schedule(&self, target: &TargetRef, kind: ScheduleKind) -> Result<(), PortError> {
        let mut guard = self.targets.write().map_err(|_| poisoned("targets"))?;
        if let Some(record) = guard.get_mut(target) {
            record.clear_scheduled(kind);
        }
        Ok(())
    }
}

// ── Publisher ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishEvent {
    pub target: TargetRef,
    pub kind: ScheduleKind,
}

/// Publisher that records every call.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PublishEvent>>,
    failure: Mutex<Option<String>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.into());
        }
    }

    pub fn events(&self) -> Vec<PublishEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, target: &TargetRef, kind: ScheduleKind) -> usize {
        self.events()
            .iter()
            .filter(|e| &e.target == target && e.kind == kind)
            .count()
    }

    fn record(&self, target: &TargetRef, kind: ScheduleKind) -> Result<(), PortError> {
        if let Some(message) = self.failure.lock().map_err(|_| poisoned("publisher"))?.clone() {
            return Err(PortError::new(message));
        }
        self.events
            .lock()
            .map_err(|_| poisoned("publisher"))?
            .push(PublishEvent {
                target: target.clone(),
                kind,
            });
        Ok(())
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, target: &TargetRef) -> Result<(), PortError> {
        self.record(target, ScheduleKind::Publish)
    }

    async fn unpublish(&self, target: &TargetRef) -> Result<(), PortError> {
        self.record(target, ScheduleKind::Unpublish)
    }
}

// ── Notifiers ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct SentNotification {
    pub template: String,
    pub recipients: Vec<ActorId>,
    pub context: NotificationContext,
}

/// Notifier that records every message.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failure: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.into());
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        template: &str,
        recipients: &[ActorId],
        context: &NotificationContext,
    ) -> Result<(), PortError> {
        if let Some(message) = self.failure.lock().map_err(|_| poisoned("notifier"))?.clone() {
            return Err(PortError::new(message));
        }
        self.sent
            .lock()
            .map_err(|_| poisoned("notifier"))?
            .push(SentNotification {
                template: template.to_string(),
                recipients: recipients.to_vec(),
                context: context.clone(),
            });
        Ok(())
    }
}

/// Notifier that only writes a log line. Used when the host supplies none.
#[derive(Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(
        &self,
        template: &str,
        recipients: &[ActorId],
        context: &NotificationContext,
    ) -> Result<(), PortError> {
        tracing::info!(
            template,
            recipients = recipients.len(),
            target = %context.target,
            action = %context.action_title,
            "Workflow notification"
        );
        Ok(())
    }
}

// ── Job Queue ────────────────────────────────────────────────────────

/// Job queue backed by a vector.
#[derive(Default)]
pub struct InMemoryJobQueue {
    jobs: RwLock<Vec<ScheduledJob>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ScheduledJob> {
        self.jobs.read().map(|j| j.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: ScheduledJob) -> Result<JobId, PortError> {
        let mut guard = self.jobs.write().map_err(|_| poisoned("jobs"))?;
        guard.retain(|j| j.is_complete() || j.target != job.target || j.kind != job.kind);
        let id = job.id.clone();
        guard.push(job);
        Ok(id)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, PortError> {
        let guard = self.jobs.read().map_err(|_| poisoned("jobs"))?;
        let mut due = guard.iter().filter(|j| j.is_due(now)).cloned().collect::<Vec<_>>();
        due.sort_by(|a, b| a.run_at.cmp(&b.run_at));
        Ok(due)
    }

    async fn get(&self, id: &JobId) -> Result<Option<ScheduledJob>, PortError> {
        let guard = self.jobs.read().map_err(|_| poisoned("jobs"))?;
        Ok(guard.iter().find(|j| &j.id == id).cloned())
    }

    async fn mark_complete(&self, id: &JobId) -> Result<(), PortError> {
        let mut guard = self.jobs.write().map_err(|_| poisoned("jobs"))?;
        match guard.iter_mut().find(|j| &j.id == id) {
            Some(job) => {
                job.complete();
                Ok(())
            }
            None => Err(PortError::new(format!("job {id} not found"))),
        }
    }

    async fn pending_for(&self, target: &TargetRef) -> Result<Vec<ScheduledJob>, PortError> {
        let guard = self.jobs.read().map_err(|_| poisoned("jobs"))?;
        Ok(guard
            .iter()
            .filter(|j| &j.target == target && !j.is_complete())
            .cloned()
            .collect())
    }
}
