//! Entry side effects of actions
//!
//! Side effects run after the transition into an action has been committed.
//! Each one is bounded by a timeout. A failure or timeout is logged and
//! reported but never undoes the transition.

use crate::authorization::AuthorizationGate;
use crate::error::SideEffectFailure;
use crate::ports::{JobQueue, NotificationContext, Notifier, PortError, Publisher, ScheduleKind, TargetDirectory};
use crate::scheduler::ScheduledJob;
use approval_workflow_types::{ActionKind, WorkflowAction, WorkflowDefinition, WorkflowInstance};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Runs the side effect attached to entering an action
#[derive(Clone)]
pub struct EntryEffects {
    targets: Arc<dyn TargetDirectory>,
    publisher: Arc<dyn Publisher>,
    notifier: Arc<dyn Notifier>,
    jobs: Arc<dyn JobQueue>,
    gate: AuthorizationGate,
    timeout: Duration,
}

impl EntryEffects {
    pub fn new(
        targets: Arc<dyn TargetDirectory>,
        publisher: Arc<dyn Publisher>,
        notifier: Arc<dyn Notifier>,
        jobs: Arc<dyn JobQueue>,
        gate: AuthorizationGate,
        timeout: Duration,
    ) -> Self {
        Self {
            targets,
            publisher,
            notifier,
            jobs,
            gate,
            timeout,
        }
    }

    /// Run the entry side effect of `action`; returns the failures, if any.
    pub async fn on_enter(
        &self,
        instance: &WorkflowInstance,
        definition: &WorkflowDefinition,
        action: &WorkflowAction,
    ) -> Vec<SideEffectFailure> {
        let result = match &action.kind {
            ActionKind::Notify { template } => {
                self.bounded(self.notify(instance, definition, action, template)).await
            }
            ActionKind::SchedulePublish => self.bounded(self.schedule(instance)).await,
            ActionKind::Publish => self.bounded(self.publish_now(instance)).await,
            ActionKind::Step | ActionKind::Approval { .. } | ActionKind::Cancel => Ok(()),
        };

        match result {
            Ok(()) => Vec::new(),
            Err(reason) => {
                let failure = SideEffectFailure {
                    instance_id: instance.id.clone(),
                    action_id: action.id.clone(),
                    reason,
                };
                tracing::warn!(
                    instance_id = %failure.instance_id,
                    action = %failure.action_id,
                    kind = action.kind.label(),
                    reason = %failure.reason,
                    "Entry side effect failed"
                );
                vec![failure]
            }
        }
    }

    async fn bounded<F>(&self, effect: F) -> Result<(), String>
    where
        F: Future<Output = Result<(), PortError>>,
    {
        match tokio::time::timeout(self.timeout, effect).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}ms", self.timeout.as_millis())),
        }
    }

    async fn notify(
        &self,
        instance: &WorkflowInstance,
        definition: &WorkflowDefinition,
        action: &WorkflowAction,
        template: &str,
    ) -> Result<(), PortError> {
        let assignees = &action.assignees;
        if assignees.actors.is_empty() && assignees.capabilities.is_empty() {
            tracing::warn!(instance_id = %instance.id, action = %action.id, template, "Notification has no recipients");
            return Err(PortError::new(format!("notification {template} has no recipients")));
        }

        let target_title = self
            .targets
            .get_target(&instance.target)
            .await?
            .map(|r| r.title)
            .unwrap_or_else(|| instance.target.to_string());
        let context = NotificationContext {
            target: instance.target.clone(),
            target_title,
            instance_id: instance.id.clone(),
            definition_title: definition.title.clone(),
            action_title: action.title.clone(),
            recipient_capabilities: assignees.capabilities.clone(),
        };
        self.notifier.send(template, &assignees.actors, &context).await?;
        tracing::info!(
            instance_id = %instance.id,
            template,
            recipients = assignees.actors.len(),
            capabilities = assignees.capabilities.len(),
            "Workflow notification sent"
        );
        Ok(())
    }

    /// Enqueue jobs for the target's embargo dates, or publish now if it
    /// has no publish date.
    async fn schedule(&self, instance: &WorkflowInstance) -> Result<(), PortError> {
        let Some(record) = self.targets.get_target(&instance.target).await? else {
            return Err(PortError::new(format!("target {} not found", instance.target)));
        };

        match record.publish_on {
            Some(at) => {
                let job = self
                    .jobs
                    .enqueue(ScheduledJob::new(record.target.clone(), ScheduleKind::Publish, at))
                    .await?;
                tracing::info!(target = %record.target, job_id = %job, run_at = %at, "Publish scheduled");
            }
            None => self.publish_now(instance).await?,
        }

        if let Some(at) = record.unpublish_on {
            let job = self
                .jobs
                .enqueue(ScheduledJob::new(record.target.clone(), ScheduleKind::Unpublish, at))
                .await?;
            tracing::info!(target = %record.target, job_id = %job, run_at = %at, "Unpublish scheduled");
        }
        Ok(())
    }

    async fn publish_now(&self, instance: &WorkflowInstance) -> Result<(), PortError> {
        let _scope = self.gate.override_for(&instance.target);
        self.publisher.publish(&instance.target).await?;
        tracing::info!(target = %instance.target, instance_id = %instance.id, "Target published by workflow");
        Ok(())
    }
}
