//! Integration tests for the store and normalizer working together.

use chrono::{Duration, Utc};

use hive_core::{
    normalize_messages, AddOutcome, ChatMessage, HiveError, HiveStore, RawMessage, RemoteSession,
    Sender, SessionSummary, StepStatus, WorkflowStatus, AUTO_SESSION_FOLDER_NAME,
};

/// A conversation from first message through folder moves, a workflow and a
/// backend refresh.
#[test]
fn test_conversation_lifecycle() {
    let mut store = HiveStore::new();
    let now = Utc::now();

    // First message creates the session.
    let outcome = store
        .add_message(
            ChatMessage::user("Prepare the onboarding checklist for new engineers please")
                .with_agent("hr")
                .with_timestamp(now),
        )
        .unwrap();
    let session_id = outcome.session_id().to_string();
    assert_eq!(store.active_session_id(), Some(session_id.as_str()));
    assert_eq!(store.last_used_agent(), Some("hr"));

    // An immediate resend is swallowed.
    let resend = store
        .add_message(
            ChatMessage::user("Prepare the onboarding checklist for new engineers please")
                .with_timestamp(now + Duration::milliseconds(300)),
        )
        .unwrap();
    assert!(matches!(resend, AddOutcome::Duplicate { .. }));
    assert_eq!(store.messages_for(&session_id).len(), 1);

    // Move into a user folder, then delete that folder.
    let projects = store.create_folder("Projects").unwrap();
    store.move_session_to_folder(&session_id, &projects).unwrap();
    store.delete_folder(&projects).unwrap();
    let folder_id = store.session(&session_id).unwrap().folder_id.clone().unwrap();
    assert_eq!(store.folder(&folder_id).unwrap().name, AUTO_SESSION_FOLDER_NAME);

    // The remaining folder is the last one and cannot go.
    assert!(matches!(
        store.delete_folder(&folder_id),
        Err(HiveError::LastFolder(_))
    ));

    // Run a two-agent workflow.
    let wf = store
        .start_workflow(&session_id, "Onboarding", ["hr", "it"])
        .unwrap();
    store
        .update_workflow_step(&wf, 0, StepStatus::Completed, None)
        .unwrap();
    assert_eq!(
        store.active_session().unwrap().active_agent.as_deref(),
        Some("it")
    );
    let status = store
        .update_workflow_step(&wf, 1, StepStatus::Completed, None)
        .unwrap();
    assert_eq!(status, WorkflowStatus::Completed);

    // A backend refresh replaces messages with the normalized copy.
    let remote = RemoteSession {
        summary: SessionSummary::new(session_id.clone()).with_title("Onboarding checklist"),
        messages: vec![
            RawMessage::new("user", "Prepare the onboarding checklist for new engineers please")
                .with_created_at(now),
            RawMessage::new("assistant", "Here is a draft checklist")
                .with_created_at(now + Duration::seconds(2)),
            RawMessage::new("assistant", "Here is a draft checklist: laptop, accounts, buddy.")
                .with_created_at(now + Duration::seconds(3)),
        ],
    };
    store.apply_session_fetched(&remote);

    let view = store.active_session().unwrap();
    assert_eq!(view.title.as_deref(), Some("Onboarding checklist"));
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.messages[1].sender, Sender::Assistant);
    assert!(view.messages[1].text.ends_with("buddy."));
    assert_eq!(view.workflow.unwrap().status, WorkflowStatus::Completed);
}

/// Deleting sessions one by one always leaves a valid active session or none.
#[test]
fn test_activation_survives_deletes() {
    let mut store = HiveStore::new();
    for i in 0..4 {
        store.apply_session_created(&SessionSummary::new(format!("s{}", i)).with_title("x"));
    }

    while let Some(active) = store.active_session_id().map(str::to_string) {
        store.delete_session(&active).unwrap();
        if let Some(next) = store.active_session_id() {
            assert!(store.session(next).is_some());
        }
    }
    assert_eq!(store.session_count(), 0);
}

/// Normalizer properties over a noisy, streamed transcript.
#[test]
fn test_normalizer_properties() {
    let base = Utc::now();
    let mut raw = Vec::new();
    let reply = "The migration finished without errors and all services are healthy";
    for (i, cut) in [10usize, 25, 40, reply.len()].iter().enumerate() {
        raw.push(
            RawMessage::new("assistant", &reply[..*cut])
                .with_created_at(base + Duration::milliseconds(i as i64 * 100)),
        );
    }
    raw.push(RawMessage::new("user", "Did the migration finish?").with_created_at(base - Duration::seconds(1)));

    let messages = normalize_messages(&raw);
    assert!(messages.len() <= raw.len());
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[1].text, reply);
    assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}
