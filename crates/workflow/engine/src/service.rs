//! Workflow service: wires the engine components together
//!
//! [`WorkflowService`] is the single entry point a host embeds. It owns no
//! global state; every collaborator is passed to the builder.

use crate::authorization::AuthorizationGate;
use crate::config::EngineConfig;
use crate::definition_store::DefinitionStore;
use crate::error::{EngineError, EngineResult};
use crate::instance_manager::InstanceManager;
use crate::locks::TargetLocks;
use crate::ports::{InMemoryJobQueue, JobQueue, Notifier, Publisher, TargetDirectory, TracingNotifier};
use crate::scheduler::{PollerHandle, ScheduledActionRunner};
use crate::side_effects::EntryEffects;
use crate::storage::WorkflowStorage;
use crate::template_import::TemplateImporter;
use crate::transition_engine::{TransitionEngine, TransitionOutcome};
use approval_workflow_types::{
    Actor, Submission, TargetRef, TransitionId, WorkflowAction, WorkflowDefinitionId, WorkflowInstance,
    WorkflowTransition,
};
use std::sync::Arc;

/// A definition the target may be started with
#[derive(Clone, Debug, PartialEq)]
pub struct StartOption {
    pub definition_id: WorkflowDefinitionId,
    /// Button text for starting the workflow
    pub label: String,
}

/// Everything a presentation layer needs to render a target's workflow
#[derive(Clone, Debug)]
pub struct WorkflowStatus {
    pub target: TargetRef,
    pub instance: Option<WorkflowInstance>,
    pub current_action: Option<WorkflowAction>,
    /// Transitions the actor may take right now
    pub available_transitions: Vec<WorkflowTransition>,
    pub can_edit_workflow: bool,
    /// Empty while a workflow is active
    pub start_options: Vec<StartOption>,
}

impl WorkflowStatus {
    pub fn is_active(&self) -> bool {
        self.instance.is_some()
    }
}

/// Builder for [`WorkflowService`]
pub struct WorkflowServiceBuilder {
    storage: Arc<dyn WorkflowStorage>,
    targets: Arc<dyn TargetDirectory>,
    publisher: Arc<dyn Publisher>,
    notifier: Option<Arc<dyn Notifier>>,
    jobs: Option<Arc<dyn JobQueue>>,
    config: EngineConfig,
}

impl WorkflowServiceBuilder {
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_job_queue(mut self, jobs: Arc<dyn JobQueue>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> WorkflowService {
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let jobs = self.jobs.unwrap_or_else(|| Arc::new(InMemoryJobQueue::new()));
        let locks = TargetLocks::new();

        let definitions = DefinitionStore::new(self.storage.clone(), self.targets.clone());
        let gate = AuthorizationGate::new(self.storage.clone(), definitions.clone());
        let effects = EntryEffects::new(
            self.targets.clone(),
            self.publisher.clone(),
            notifier,
            jobs.clone(),
            gate.clone(),
            self.config.engine.side_effect_timeout(),
        );
        let transitions = TransitionEngine::new(
            self.storage.clone(),
            definitions.clone(),
            locks.clone(),
            effects,
            self.config.engine.max_auto_steps,
        );
        let instances = InstanceManager::new(
            self.storage.clone(),
            definitions.clone(),
            locks.clone(),
            transitions.clone(),
        )
        .with_history_limit(self.config.engine.history_limit);
        let runner = Arc::new(ScheduledActionRunner::new(
            jobs,
            self.targets,
            self.publisher,
            locks,
            gate.clone(),
        ));
        let importer = TemplateImporter::new(self.storage);

        tracing::info!(
            max_auto_steps = self.config.engine.max_auto_steps,
            scheduler_enabled = self.config.scheduler.enabled,
            "Workflow service initialized"
        );

        WorkflowService {
            definitions,
            instances,
            transitions,
            gate,
            runner,
            importer,
            config: self.config,
        }
    }
}

/// The workflow engine facade
#[derive(Clone)]
pub struct WorkflowService {
    definitions: DefinitionStore,
    instances: InstanceManager,
    transitions: TransitionEngine,
    gate: AuthorizationGate,
    runner: Arc<ScheduledActionRunner>,
    importer: TemplateImporter,
    config: EngineConfig,
}

impl WorkflowService {
    pub fn builder(
        storage: Arc<dyn WorkflowStorage>,
        targets: Arc<dyn TargetDirectory>,
        publisher: Arc<dyn Publisher>,
    ) -> WorkflowServiceBuilder {
        WorkflowServiceBuilder {
            storage,
            targets,
            publisher,
            notifier: None,
            jobs: None,
            config: EngineConfig::default(),
        }
    }

    // ── Components ───────────────────────────────────────────────────

    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    pub fn instances(&self) -> &InstanceManager {
        &self.instances
    }

    pub fn transitions(&self) -> &TransitionEngine {
        &self.transitions
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    pub fn runner(&self) -> Arc<ScheduledActionRunner> {
        self.runner.clone()
    }

    pub fn importer(&self) -> &TemplateImporter {
        &self.importer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Request flow ─────────────────────────────────────────────────

    pub async fn start_workflow(
        &self,
        target: &TargetRef,
        definition_id: &WorkflowDefinitionId,
        actor: &Actor,
    ) -> EngineResult<TransitionOutcome> {
        self.instances.start_workflow(target, definition_id, actor).await
    }

    pub async fn get_workflow_for(&self, target: &TargetRef) -> EngineResult<Option<WorkflowInstance>> {
        self.instances.get_workflow_for(target).await
    }

    /// Apply a submission to the target's active workflow.
    ///
    /// With a transition the transition is executed; without one the
    /// current action is re-evaluated for automatic advancement.
    pub async fn update_workflow(
        &self,
        target: &TargetRef,
        actor: &Actor,
        submission: Submission,
        transition: Option<&TransitionId>,
    ) -> EngineResult<TransitionOutcome> {
        let instance = self
            .instances
            .get_workflow_for(target)
            .await?
            .ok_or_else(|| EngineError::NoActiveWorkflow(target.clone()))?;
        match transition {
            Some(id) => {
                self.transitions
                    .execute_transition(&instance, id, actor, submission)
                    .await
            }
            None => self.transitions.evaluate(&instance, actor, submission).await,
        }
    }

    /// Re-evaluate the active workflow after the host saved the target.
    ///
    /// Returns `None` when the target has no active workflow.
    pub async fn target_updated(&self, target: &TargetRef, actor: &Actor) -> EngineResult<Option<TransitionOutcome>> {
        let Some(instance) = self.instances.get_workflow_for(target).await? else {
            return Ok(None);
        };
        let outcome = self
            .transitions
            .evaluate(&instance, actor, Submission::default())
            .await?;
        Ok(Some(outcome))
    }

    /// The target's workflow state as seen by `actor`
    pub async fn status_for(&self, target: &TargetRef, actor: &Actor) -> EngineResult<WorkflowStatus> {
        let Some(instance) = self.instances.get_workflow_for(target).await? else {
            let start_options = self
                .definitions
                .get_definitions_for(target)
                .await?
                .into_iter()
                .map(|d| StartOption {
                    label: d.start_label().to_string(),
                    definition_id: d.id,
                })
                .collect();
            return Ok(WorkflowStatus {
                target: target.clone(),
                instance: None,
                current_action: None,
                available_transitions: Vec::new(),
                can_edit_workflow: false,
                start_options,
            });
        };

        let current_action = self.transitions.current_action(&instance).await?;
        let available_transitions = self.transitions.available_transitions(&instance, actor).await?;
        let can_edit_workflow = self.gate.can_edit_workflow(target, actor).await?;
        Ok(WorkflowStatus {
            target: target.clone(),
            instance: Some(instance),
            current_action: Some(current_action),
            available_transitions,
            can_edit_workflow,
            start_options: Vec::new(),
        })
    }

    /// Start the job poller if the scheduler is enabled
    pub fn spawn_poller(&self) -> Option<PollerHandle> {
        if !self.config.scheduler.enabled {
            tracing::info!("Job poller disabled");
            return None;
        }
        Some(self.runner.clone().spawn_poller(self.config.scheduler.poll_interval()))
    }
}
