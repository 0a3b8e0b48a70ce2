//! Scheduled publishing driven by workflow actions and the job runner.

mod common;

use approval_workflow_engine::ports::{
    InMemoryJobQueue, InMemoryTargetDirectory, JobQueue, PortError, RecordingPublisher, ScheduleKind, TargetRecord,
};
use approval_workflow_engine::scheduler::ScheduledJob;
use approval_workflow_engine::storage::InMemoryWorkflowStorage;
use approval_workflow_engine::{JobOutcome, WorkflowService};
use approval_workflow_types::*;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::*;
use std::sync::Arc;

/// start → schedule (terminal)
fn embargo_definition() -> WorkflowDefinition {
    let mut def = WorkflowDefinition::new("Embargo").with_id("embargo");
    def.add_action(WorkflowAction::step("start", "Start").initial()).unwrap();
    def.add_action(WorkflowAction::schedule_publish("schedule", "Schedule")).unwrap();
    def.add_transition(WorkflowTransition::new("go", "Go", "start", "schedule").automatic())
        .unwrap();
    def
}

#[tokio::test]
async fn schedule_action_defers_publish_until_due() {
    let h = Harness::new();
    let def_id = h.service.definitions().register(embargo_definition()).await.unwrap();
    let publish_at = Utc::now() + Duration::hours(2);
    let unpublish_at = Utc::now() + Duration::days(7);
    let page = TargetRef::page("1");
    h.targets
        .upsert(
            TargetRecord::new(page.clone(), "Launch notes")
                .with_definition(def_id.clone())
                .with_publish_on(publish_at)
                .with_unpublish_on(unpublish_at),
        )
        .unwrap();

    let outcome = h.service.start_workflow(&page, &def_id, &author()).await.unwrap();
    assert!(outcome.is_complete());
    assert!(h.publisher.events().is_empty());

    let pending = h.jobs.pending_for(&page).await.unwrap();
    assert_eq!(pending.len(), 2);

    let runner = h.service.runner();
    assert!(runner.run_due(Utc::now()).await.unwrap().is_empty());

    let reports = runner.run_due(publish_at + Duration::seconds(1)).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, ScheduleKind::Publish);
    assert_eq!(reports[0].outcome, JobOutcome::Executed);
    assert_eq!(h.publisher.count(&page, ScheduleKind::Publish), 1);

    let record = h.targets.record(&page).unwrap().unwrap();
    assert!(record.publish_on.is_none());
    assert_eq!(record.unpublish_on, Some(unpublish_at));

    let reports = runner.run_due(unpublish_at).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(h.publisher.count(&page, ScheduleKind::Unpublish), 1);
    assert!(h.jobs.pending_for(&page).await.unwrap().is_empty());
}

#[tokio::test]
async fn schedule_action_without_dates_publishes_immediately() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", embargo_definition()).await;

    h.service.start_workflow(&page, &def_id, &author()).await.unwrap();
    assert_eq!(h.publisher.count(&page, ScheduleKind::Publish), 1);
    assert!(h.jobs.all().is_empty());
}

#[tokio::test]
async fn job_for_deleted_target_is_a_no_op() {
    let h = Harness::new();
    let (page, _) = h.page_with("1", embargo_definition()).await;
    let runner = h.service.runner();
    let at = Utc::now() - Duration::minutes(1);
    let job_id = runner.schedule_publish(&page, at).await.unwrap();

    h.targets.remove(&page).unwrap();
    let job = h.jobs.get(&job_id).await.unwrap().unwrap();
    let report = runner.run(&job).await.unwrap();

    assert_eq!(report.outcome, JobOutcome::TargetMissing);
    assert!(h.publisher.events().is_empty());
    assert!(h.jobs.get(&job_id).await.unwrap().unwrap().is_complete());
}

#[tokio::test]
async fn redelivered_job_publishes_at_most_once() {
    let h = Harness::new();
    let at = Utc::now() - Duration::minutes(1);
    let page = TargetRef::document("9");
    h.targets
        .upsert(TargetRecord::new(page.clone(), "Annual report").with_publish_on(at))
        .unwrap();
    let runner = h.service.runner();
    let job_id = runner.schedule_publish(&page, at).await.unwrap();
    let job = h.jobs.get(&job_id).await.unwrap().unwrap();

    let first = runner.run(&job).await.unwrap();
    let second = runner.run(&job).await.unwrap();
    assert_eq!(first.outcome, JobOutcome::Executed);
    assert_eq!(second.outcome, JobOutcome::AlreadyComplete);
    assert_eq!(h.publisher.count(&page, ScheduleKind::Publish), 1);

    // A second job for a date that was already cleared does nothing
    let late = runner.schedule_publish(&page, at).await.unwrap();
    let late = h.jobs.get(&late).await.unwrap().unwrap();
    assert_eq!(runner.run(&late).await.unwrap().outcome, JobOutcome::AlreadyCleared);
    assert_eq!(h.publisher.count(&page, ScheduleKind::Publish), 1);
}

#[tokio::test]
async fn rescheduling_replaces_the_pending_job() {
    let h = Harness::new();
    let page = TargetRef::page("1");
    let runner = h.service.runner();
    runner.schedule_publish(&page, Utc::now() + Duration::hours(1)).await.unwrap();
    let later = Utc::now() + Duration::hours(3);
    runner.schedule_publish(&page, later).await.unwrap();

    let pending = h.jobs.pending_for(&page).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].run_at, later);
}

#[tokio::test]
async fn replaced_job_does_not_publish_early() {
    let h = Harness::new();
    let page = TargetRef::page("1");
    let soon = Utc::now() - Duration::minutes(1);
    h.targets
        .upsert(TargetRecord::new(page.clone(), "Launch").with_publish_on(soon))
        .unwrap();
    let runner = h.service.runner();
    let old_id = runner.schedule_publish(&page, soon).await.unwrap();
    let old = h.jobs.get(&old_id).await.unwrap().unwrap();

    // The embargo moves out by three days before the first job fires
    let later = Utc::now() + Duration::days(3);
    h.targets
        .upsert(TargetRecord::new(page.clone(), "Launch").with_publish_on(later))
        .unwrap();
    runner.schedule_publish(&page, later).await.unwrap();

    let report = runner.run(&old).await.unwrap();
    assert_eq!(report.outcome, JobOutcome::Superseded);
    assert!(h.publisher.events().is_empty());
    assert_eq!(h.targets.record(&page).unwrap().unwrap().publish_on, Some(later));

    let pending = h.jobs.pending_for(&page).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].run_at, later);

    assert!(runner.run_due(Utc::now()).await.unwrap().is_empty());
    let reports = runner.run_due(later).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, JobOutcome::Executed);
    assert_eq!(h.publisher.count(&page, ScheduleKind::Publish), 1);
}

/// Queue whose completion bookkeeping always fails.
struct FailingCompletionQueue {
    inner: InMemoryJobQueue,
}

#[async_trait]
impl JobQueue for FailingCompletionQueue {
    async fn enqueue(&self, job: ScheduledJob) -> Result<JobId, PortError> {
        self.inner.enqueue(job).await
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>, PortError> {
        self.inner.due(now).await
    }

    async fn get(&self, id: &JobId) -> Result<Option<ScheduledJob>, PortError> {
        self.inner.get(id).await
    }

    async fn mark_complete(&self, _id: &JobId) -> Result<(), PortError> {
        Err(PortError::new("queue store unavailable"))
    }

    async fn pending_for(&self, target: &TargetRef) -> Result<Vec<ScheduledJob>, PortError> {
        self.inner.pending_for(target).await
    }
}

#[tokio::test]
async fn completion_failure_after_publish_is_not_an_error() {
    let targets = Arc::new(InMemoryTargetDirectory::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let service = WorkflowService::builder(Arc::new(InMemoryWorkflowStorage::new()), targets.clone(), publisher.clone())
        .with_job_queue(Arc::new(FailingCompletionQueue {
            inner: InMemoryJobQueue::new(),
        }))
        .build();
    let page = TargetRef::page("1");
    let at = Utc::now() - Duration::minutes(1);
    targets
        .upsert(TargetRecord::new(page.clone(), "Launch").with_publish_on(at))
        .unwrap();
    let runner = service.runner();
    runner.schedule_publish(&page, at).await.unwrap();

    let reports = runner.run_due(Utc::now()).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, JobOutcome::Executed);
    assert_eq!(publisher.count(&page, ScheduleKind::Publish), 1);

    // The job stays pending, but its date is cleared so redelivery does nothing
    let reports = runner.run_due(Utc::now()).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, JobOutcome::AlreadyCleared);
    assert_eq!(publisher.count(&page, ScheduleKind::Publish), 1);
}

#[tokio::test]
async fn gate_blocks_direct_publish_of_workflow_content() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    let gate = h.service.gate();

    // A definition applies, so publishing outside a workflow is refused
    assert!(!gate.can_publish_target(&page, &editor()).await.unwrap());
    assert!(gate.can_edit_target(&page, &stranger()).await.unwrap());

    h.service.start_workflow(&page, &def_id, &author()).await.unwrap();
    assert!(gate.can_edit_target(&page, &author()).await.unwrap());
    assert!(!gate.can_edit_target(&page, &stranger()).await.unwrap());
    assert!(!gate.can_publish_target(&page, &author()).await.unwrap());

    {
        let _scope = gate.override_for(&page);
        assert!(gate.can_publish_target(&page, &stranger()).await.unwrap());
        assert!(gate.can_edit_target(&page, &stranger()).await.unwrap());
    }
    assert!(!gate.can_edit_target(&page, &stranger()).await.unwrap());

    // Content without any workflow publishes freely
    let loose = TargetRef::asset("logo");
    h.targets.upsert(TargetRecord::new(loose.clone(), "Logo")).unwrap();
    assert!(gate.can_publish_target(&loose, &stranger()).await.unwrap());
}
