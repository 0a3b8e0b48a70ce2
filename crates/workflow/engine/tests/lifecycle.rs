//! Start, transition, completion and cancellation through the service.

mod common;

use approval_workflow_engine::config::EngineConfig;
use approval_workflow_engine::EngineError;
use approval_workflow_types::*;
use common::*;

// ---------------------------------------------------------------------------
// Starting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_places_instance_at_initial_action() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;

    let outcome = h.service.start_workflow(&page, &def_id, &author()).await.unwrap();
    assert_eq!(outcome.instance.current_action, ActionId::new("draft"));
    assert_eq!(outcome.instance.status, InstanceStatus::Active);
    assert_eq!(outcome.instance.initiator, ActorId::new("author"));
    assert!(!outcome.advanced());

    let history = h.history(&page).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action_id, ActionId::new("draft"));
    assert!(history[0].is_open());
}

#[tokio::test]
async fn second_start_is_rejected_while_active() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    h.service.start_workflow(&page, &def_id, &author()).await.unwrap();

    let err = h.service.start_workflow(&page, &def_id, &editor()).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyActive(t) if t == page));
    assert_eq!(h.service.instances().instances_for(&page).await.unwrap().len(), 1);
}

#[tokio::test]
async fn start_with_unassigned_definition_is_invalid() {
    let h = Harness::new();
    let (_, def_id) = h.page_with("1", review_definition()).await;
    let other = TargetRef::page("elsewhere");

    let err = h.service.start_workflow(&other, &def_id, &author()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidDefinition(_)));
    assert!(h.service.get_workflow_for(&other).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn guarded_transition_appends_one_history_record() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    let started = h.service.start_workflow(&page, &def_id, &author()).await.unwrap();

    let outcome = h
        .service
        .transitions()
        .execute_transition(&started.instance, &submit(), &author(), summary("Ready"))
        .await
        .unwrap();
    assert_eq!(outcome.instance.current_action, ActionId::new("review"));
    assert_eq!(outcome.instance.revision, started.instance.revision + 1);
    assert_eq!(outcome.transitions_taken, vec![submit()]);

    let history = h.history(&page).await;
    assert_eq!(history.len(), 2);
    let closed = &history[1];
    assert_eq!(closed.transition_taken, Some(submit()));
    assert_eq!(closed.closed_by, Some(ActorId::new("author")));
    assert_eq!(closed.data.get("summary"), Some(&serde_json::json!("Ready")));
    assert!(history[0].is_open());
}

#[tokio::test]
async fn failed_guard_is_unauthorized_and_changes_nothing() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    let started = h.service.start_workflow(&page, &def_id, &author()).await.unwrap();

    let err = h
        .service
        .transitions()
        .execute_transition(&started.instance, &submit(), &stranger(), summary("Mine now"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let current = h.active(&page).await;
    assert_eq!(current.current_action, ActionId::new("draft"));
    assert_eq!(current.revision, started.instance.revision);
    let history = h.history(&page).await;
    assert_eq!(history.len(), 1);
    assert!(history[0].data.is_empty());
}

#[tokio::test]
async fn transition_from_another_action_is_unknown() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    let started = h.service.start_workflow(&page, &def_id, &author()).await.unwrap();

    let err = h
        .service
        .transitions()
        .execute_transition(&started.instance, &TransitionId::new("approve"), &editor(), Submission::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownTransition(id) if id.as_str() == "approve"));
    assert_eq!(h.active(&page).await.revision, started.instance.revision);
}

#[tokio::test]
async fn unknown_fields_are_dropped_and_mistyped_fields_rejected() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    let started = h.service.start_workflow(&page, &def_id, &author()).await.unwrap();

    let mistyped = summary("Ready").with_field("urgent", "very");
    let err = h
        .service
        .transitions()
        .execute_transition(&started.instance, &submit(), &author(), mistyped)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidField(ref f) if f.field == "urgent"));
    assert_eq!(h.active(&page).await.current_action, ActionId::new("draft"));

    let extra = summary("Ready")
        .with_field("urgent", true)
        .with_field("owner", "someone else");
    h.service
        .transitions()
        .execute_transition(&started.instance, &submit(), &author(), extra)
        .await
        .unwrap();
    let closed = h.history(&page).await.pop().unwrap();
    assert_eq!(closed.data.len(), 2);
    assert!(!closed.data.contains_key("owner"));
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approval_completes_the_workflow_and_publishes() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    h.service.start_workflow(&page, &def_id, &author()).await.unwrap();
    h.service
        .update_workflow(&page, &author(), summary("Ready"), Some(&submit()))
        .await
        .unwrap();

    let in_review = h.active(&page).await;
    let outcome = h
        .service
        .transitions()
        .approve(&in_review, &editor(), Some("Looks good".into()))
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.instance.status, InstanceStatus::Completed);
    assert_eq!(outcome.instance.current_action, ActionId::new("publish"));
    assert!(outcome.instance.completed_at.is_some());
    assert_eq!(outcome.transitions_taken, vec![TransitionId::new("approve")]);
    assert_eq!(h.publisher.events().len(), 1);
    assert!(h.service.get_workflow_for(&page).await.unwrap().is_none());
    assert!(h.history(&page).await.iter().all(|e| !e.is_open()));

    let err = h
        .service
        .transitions()
        .execute_transition(&outcome.instance, &TransitionId::new("reject"), &editor(), Submission::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InstanceComplete(_)));
}

#[tokio::test]
async fn entering_cancel_action_cancels_the_instance() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    let started = h.service.start_workflow(&page, &def_id, &author()).await.unwrap();

    let outcome = h
        .service
        .transitions()
        .execute_transition(&started.instance, &TransitionId::new("withdraw"), &author(), Submission::new())
        .await
        .unwrap();
    assert_eq!(outcome.instance.status, InstanceStatus::Cancelled);
    assert!(h.publisher.events().is_empty());

    // The target is free for a new workflow
    h.service.start_workflow(&page, &def_id, &author()).await.unwrap();
    assert_eq!(h.service.instances().instances_for(&page).await.unwrap().len(), 2);
}

#[tokio::test]
async fn approving_outside_an_approval_action_is_rejected() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    let started = h.service.start_workflow(&page, &def_id, &author()).await.unwrap();

    let err = h
        .service
        .transitions()
        .approve(&started.instance, &editor(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAnApprovalAction(_)));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_requires_initiator_or_administrator() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    h.service.start_workflow(&page, &def_id, &author()).await.unwrap();

    let err = h
        .service
        .instances()
        .cancel_workflow(&page, &stranger(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let cancelled = h
        .service
        .instances()
        .cancel_workflow(&page, &admin(), Some("Superseded".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, InstanceStatus::Cancelled);

    let history = h.history(&page).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].comment.as_deref(), Some("Superseded"));
    assert_eq!(history[0].closed_by, Some(ActorId::new("admin")));

    let err = h
        .service
        .instances()
        .cancel_workflow(&page, &admin(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoActiveWorkflow(_)));
}

// ---------------------------------------------------------------------------
// History & status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_is_newest_first_and_limited() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;
    h.service.start_workflow(&page, &def_id, &author()).await.unwrap();
    h.service
        .update_workflow(
            &page,
            &author(),
            summary("Ready").with_comment("Please check the intro"),
            Some(&submit()),
        )
        .await
        .unwrap();
    h.service
        .update_workflow(&page, &editor(), Submission::new(), Some(&TransitionId::new("reject")))
        .await
        .unwrap();

    let all = h.history(&page).await;
    let actions: Vec<&str> = all.iter().map(|e| e.action_id.as_str()).collect();
    assert_eq!(actions, vec!["draft", "review", "draft"]);

    let latest = h
        .service
        .instances()
        .get_workflow_history_for(&page, Some(2))
        .await
        .unwrap();
    assert_eq!(latest.len(), 2);

    let comment = h
        .service
        .instances()
        .recent_comment(&page, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(comment.comment.as_deref(), Some("Please check the intro"));
    assert!(h
        .service
        .instances()
        .recent_comment(&page, Some(2))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn history_without_limit_uses_configured_default() {
    let mut config = EngineConfig::default();
    config.engine.history_limit = 2;
    let h = Harness::with_config(config);
    let (page, def_id) = h.page_with("1", review_definition()).await;
    h.service.start_workflow(&page, &def_id, &author()).await.unwrap();
    h.service
        .update_workflow(
            &page,
            &author(),
            summary("Ready").with_comment("Please check the intro"),
            Some(&submit()),
        )
        .await
        .unwrap();
    h.service
        .update_workflow(&page, &editor(), Submission::new(), Some(&TransitionId::new("reject")))
        .await
        .unwrap();

    let instances = h.service.instances();
    assert_eq!(instances.get_workflow_history_for(&page, None).await.unwrap().len(), 2);
    assert_eq!(instances.get_workflow_history_for(&page, Some(0)).await.unwrap().len(), 3);

    // The commented entry sits past the default window
    assert!(instances.recent_comment(&page, None).await.unwrap().is_none());
    assert!(instances.recent_comment(&page, Some(0)).await.unwrap().is_some());
}

#[tokio::test]
async fn status_reports_start_options_then_available_transitions() {
    let h = Harness::new();
    let (page, def_id) = h.page_with("1", review_definition()).await;

    let idle = h.service.status_for(&page, &author()).await.unwrap();
    assert!(!idle.is_active());
    assert_eq!(idle.start_options.len(), 1);
    assert_eq!(idle.start_options[0].definition_id, def_id);
    assert_eq!(idle.start_options[0].label, "Request review");

    h.service.start_workflow(&page, &def_id, &author()).await.unwrap();

    let mine = h.service.status_for(&page, &author()).await.unwrap();
    assert!(mine.is_active());
    assert!(mine.start_options.is_empty());
    assert!(mine.can_edit_workflow);
    assert_eq!(mine.current_action.unwrap().id, ActionId::new("draft"));
    let ids: Vec<&str> = mine.available_transitions.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["submit", "withdraw"]);

    let theirs = h.service.status_for(&page, &stranger()).await.unwrap();
    assert!(theirs.available_transitions.is_empty());
    assert!(!theirs.can_edit_workflow);
}

#[tokio::test]
async fn update_without_active_workflow_fails() {
    let h = Harness::new();
    let (page, _) = h.page_with("1", review_definition()).await;
    let err = h
        .service
        .update_workflow(&page, &author(), Submission::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoActiveWorkflow(_)));
    assert!(h.service.target_updated(&page, &author()).await.unwrap().is_none());
}
