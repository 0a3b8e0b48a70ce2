//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use approval_workflow_engine::config::EngineConfig;
use approval_workflow_engine::ports::{
    InMemoryJobQueue, InMemoryTargetDirectory, RecordingNotifier, RecordingPublisher, TargetRecord,
};
use approval_workflow_engine::storage::InMemoryWorkflowStorage;
use approval_workflow_engine::WorkflowService;
use approval_workflow_types::*;
use std::sync::Arc;

pub const REVIEWER_CAP: &str = "content.review";

pub struct Harness {
    pub service: WorkflowService,
    pub storage: Arc<InMemoryWorkflowStorage>,
    pub targets: Arc<InMemoryTargetDirectory>,
    pub publisher: Arc<RecordingPublisher>,
    pub notifier: Arc<RecordingNotifier>,
    pub jobs: Arc<InMemoryJobQueue>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let storage = Arc::new(InMemoryWorkflowStorage::new());
        let targets = Arc::new(InMemoryTargetDirectory::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let jobs = Arc::new(InMemoryJobQueue::new());
        let service = WorkflowService::builder(storage.clone(), targets.clone(), publisher.clone())
            .with_notifier(notifier.clone())
            .with_job_queue(jobs.clone())
            .with_config(config)
            .build();
        Self {
            service,
            storage,
            targets,
            publisher,
            notifier,
            jobs,
        }
    }

    /// Register `definition` and assign it to a new page.
    pub async fn page_with(&self, id: &str, definition: WorkflowDefinition) -> (TargetRef, WorkflowDefinitionId) {
        let def_id = self.service.definitions().register(definition).await.unwrap();
        let page = TargetRef::page(id);
        self.targets
            .upsert(TargetRecord::new(page.clone(), format!("Page {id}")).with_definition(def_id.clone()))
            .unwrap();
        (page, def_id)
    }

    pub async fn history(&self, target: &TargetRef) -> Vec<ActionInstance> {
        self.service
            .instances()
            .get_workflow_history_for(target, Some(0))
            .await
            .unwrap()
    }

    pub async fn active(&self, target: &TargetRef) -> WorkflowInstance {
        self.service.get_workflow_for(target).await.unwrap().unwrap()
    }
}

pub fn author() -> Actor {
    Actor::new("author")
}

pub fn editor() -> Actor {
    Actor::new("editor").with_capability(REVIEWER_CAP)
}

pub fn stranger() -> Actor {
    Actor::new("stranger")
}

pub fn admin() -> Actor {
    Actor::new("admin").with_capability(ADMINISTER_WORKFLOW)
}

/// draft → review → publish, with withdraw and reject paths.
///
/// `draft` collects a required summary; only the initiator may submit or
/// withdraw. `review` needs one approval from a reviewer and then advances
/// on its own into the terminal `publish` action.
pub fn review_definition() -> WorkflowDefinition {
    let mut def = WorkflowDefinition::new("Editorial review")
        .with_id("editorial")
        .with_button_text("Request review");
    def.add_action(
        WorkflowAction::step("draft", "Draft")
            .initial()
            .with_assignee("author")
            .with_field(FieldSpec::text("summary").required())
            .with_field(FieldSpec::boolean("urgent")),
    )
    .unwrap();
    def.add_action(
        WorkflowAction::approval("review", "Review", 1)
            .with_assignee_capability(REVIEWER_CAP)
            .with_field(FieldSpec::datetime("embargo")),
    )
    .unwrap();
    def.add_action(WorkflowAction::schedule_publish("publish", "Publish")).unwrap();
    def.add_action(WorkflowAction::cancel("withdrawn", "Withdrawn")).unwrap();

    def.add_transition(
        WorkflowTransition::new("submit", "Submit for review", "draft", "review")
            .with_guard(TransitionGuard::Initiator),
    )
    .unwrap();
    def.add_transition(
        WorkflowTransition::new("withdraw", "Withdraw", "draft", "withdrawn")
            .with_guard(TransitionGuard::Initiator),
    )
    .unwrap();
    def.add_transition(
        WorkflowTransition::new("approve", "Approve", "review", "publish")
            .with_guard(TransitionGuard::AssignedApprover)
            .automatic(),
    )
    .unwrap();
    def.add_transition(
        WorkflowTransition::new("reject", "Reject", "review", "draft")
            .with_guard(TransitionGuard::AssignedApprover),
    )
    .unwrap();
    def
}

pub fn submit() -> TransitionId {
    TransitionId::new("submit")
}

pub fn summary(text: &str) -> Submission {
    Submission::new().with_field("summary", text)
}
