//! Scheduled action runner and poll loop

use super::ScheduledJob;
use crate::authorization::AuthorizationGate;
use crate::error::EngineResult;
use crate::locks::TargetLocks;
use crate::ports::{JobQueue, Publisher, ScheduleKind, TargetDirectory};
use approval_workflow_types::{JobId, TargetRef};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// What running a job did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The target was published or unpublished
    Executed,
    /// The target no longer exists
    TargetMissing,
    /// The scheduled date was already cleared
    AlreadyCleared,
    /// The job had already run
    AlreadyComplete,
    /// A newer job or a later date replaced this one
    Superseded,
    /// The publisher failed; the date stays cleared
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobRunReport {
    pub job_id: JobId,
    pub target: TargetRef,
    pub kind: ScheduleKind,
    pub outcome: JobOutcome,
}

/// Runs one-shot publish and unpublish jobs
pub struct ScheduledActionRunner {
    jobs: Arc<dyn JobQueue>,
    targets: Arc<dyn TargetDirectory>,
    publisher: Arc<dyn Publisher>,
    locks: TargetLocks,
    gate: AuthorizationGate,
}

impl ScheduledActionRunner {
    pub fn new(
        jobs: Arc<dyn JobQueue>,
        targets: Arc<dyn TargetDirectory>,
        publisher: Arc<dyn Publisher>,
        locks: TargetLocks,
        gate: AuthorizationGate,
    ) -> Self {
        Self {
            jobs,
            targets,
            publisher,
            locks,
            gate,
        }
    }

    pub async fn schedule_publish(&self, target: &TargetRef, when: DateTime<Utc>) -> EngineResult<JobId> {
        self.schedule(target, ScheduleKind::Publish, when).await
    }

    pub async fn schedule_unpublish(&self, target: &TargetRef, when: DateTime<Utc>) -> EngineResult<JobId> {
        self.schedule(target, ScheduleKind::Unpublish, when).await
    }

    async fn schedule(&self, target: &TargetRef, kind: ScheduleKind, when: DateTime<Utc>) -> EngineResult<JobId> {
        let id = self
            .jobs
            .enqueue(ScheduledJob::new(target.clone(), kind, when))
            .await?;
        tracing::info!(job_id = %id, target = %target, kind = %kind, run_at = %when, "Job scheduled");
        Ok(id)
    }

    /// Run one job. Safe to call again for the same job.
    ///
    /// Only the live job for a (target, kind) pair acts. A job that was
    /// replaced by a later `schedule_*` call, or whose date on the target
    /// moved later, does nothing.
    pub async fn run(&self, job: &ScheduledJob) -> EngineResult<JobRunReport> {
        let _lock = self.locks.lock(&job.target).await;
        let report = |outcome| JobRunReport {
            job_id: job.id.clone(),
            target: job.target.clone(),
            kind: job.kind,
            outcome,
        };

        match self.jobs.get(&job.id).await? {
            None => {
                tracing::info!(job_id = %job.id, target = %job.target, kind = %job.kind, "Job was replaced; skipping");
                return Ok(report(JobOutcome::Superseded));
            }
            Some(stored) if stored.is_complete() => {
                tracing::debug!(job_id = %job.id, "Job already complete");
                return Ok(report(JobOutcome::AlreadyComplete));
            }
            Some(_) => {}
        }

        let Some(record) = self.targets.get_target(&job.target).await? else {
            tracing::info!(job_id = %job.id, target = %job.target, "Scheduled target no longer exists");
            self.complete(job).await;
            return Ok(report(JobOutcome::TargetMissing));
        };

        let Some(scheduled) = record.scheduled_for(job.kind) else {
            tracing::info!(job_id = %job.id, target = %job.target, kind = %job.kind, "Schedule already cleared");
            self.complete(job).await;
            return Ok(report(JobOutcome::AlreadyCleared));
        };

        if scheduled > job.run_at {
            let replacement = self
                .jobs
                .enqueue(ScheduledJob::new(job.target.clone(), job.kind, scheduled))
                .await?;
            tracing::info!(
                job_id = %job.id,
                replacement = %replacement,
                target = %job.target,
                kind = %job.kind,
                run_at = %scheduled,
                "Schedule moved later; job replaced"
            );
            return Ok(report(JobOutcome::Superseded));
        }

        self.targets.clear_schedule(&job.target, job.kind).await?;
        let result = {
            let _scope = self.gate.override_for(&job.target);
            match job.kind {
                ScheduleKind::Publish => self.publisher.publish(&job.target).await,
                ScheduleKind::Unpublish => self.publisher.unpublish(&job.target).await,
            }
        };
        self.complete(job).await;

        match result {
            Ok(()) => {
                tracing::info!(
                    job_id = %job.id,
                    target = %job.target,
                    title = %job.title(&record.title),
                    "Scheduled job executed"
                );
                Ok(report(JobOutcome::Executed))
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, target = %job.target, error = %e, "Scheduled job failed");
                Ok(report(JobOutcome::Failed(e.to_string())))
            }
        }
    }

    /// Mark `job` complete. A failure leaves it pending; redelivery is a
    /// no-op because the date on the target is gone by then.
    async fn complete(&self, job: &ScheduledJob) {
        if let Err(e) = self.jobs.mark_complete(&job.id).await {
            tracing::warn!(job_id = %job.id, error = %e, "Could not mark job complete");
        }
    }

    /// Run every pending job that is due at `now`
    pub async fn run_due(&self, now: DateTime<Utc>) -> EngineResult<Vec<JobRunReport>> {
        let due = self.jobs.due(now).await?;
        let mut reports = Vec::with_capacity(due.len());
        for job in &due {
            match self.run(job).await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(job_id = %job.id, error = %e, "Job run failed"),
            }
        }
        if !reports.is_empty() {
            tracing::debug!(count = reports.len(), "Due jobs processed");
        }
        Ok(reports)
    }

    /// Run [`run_due`](Self::run_due) every `period` until the handle is stopped.
    pub fn spawn_poller(self: Arc<Self>, period: Duration) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(period_ms = period.as_millis() as u64, "Job poller started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_due(Utc::now()).await {
                            tracing::error!(error = %e, "Polling due jobs failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Job poller stopped");
        });
        PollerHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Handle to a running poller
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop the poller and wait for the loop to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Job poller task failed");
        }
    }
}
