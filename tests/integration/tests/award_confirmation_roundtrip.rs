//! End-to-end dispatcher scenarios over the award ledger.
//!
//! Each scenario drives the same event values the Slack runtime produces,
//! so the flows here cover everything between envelope normalization and
//! reply delivery: extraction, pending confirmation, supersession, the
//! opt-out preference, and the leaderboard read path.

use std::sync::Arc;

use kudos_engine::{
    DispatchTable, EventDispatcher, AWARD_CONFIRMED_REPLY, AWARD_DISMISSED_REPLY,
    EMPTY_LEADERBOARD_REPLY, OPT_OUT_CLEARED_REPLY, OPT_OUT_RECORDED_REPLY,
};
use kudos_store::{
    InMemoryRecognitionStore, MessageBinding, RecognitionStore, SqliteRecognitionStore,
};
use kudos_types::{
    ActionId, AppMentionEvent, ConfirmationPrompt, InteractionEvent, MessageEvent, MessageRef,
    MessageSubtype, OutboundReply, RecognitionEvent,
};
use serde_json::json;
use tempfile::tempdir;

fn dispatcher(store: Arc<dyn RecognitionStore>) -> EventDispatcher {
    EventDispatcher::new(store, DispatchTable::standard())
}

fn posted(message_id: &str, text: &str) -> RecognitionEvent {
    RecognitionEvent::Message(MessageEvent::posted("T1", "C1", message_id, text))
}

fn edited(message_id: &str, new_text: &str) -> RecognitionEvent {
    RecognitionEvent::Message(MessageEvent {
        team: "T1".to_string(),
        channel: "C1".to_string(),
        thread_id: None,
        message_id: message_id.to_string(),
        text: String::new(),
        subtype: Some(MessageSubtype::MessageChanged),
        current: Some(MessageRef {
            message_id: message_id.to_string(),
            team: None,
            text: new_text.to_string(),
        }),
        previous: Some(MessageRef {
            message_id: message_id.to_string(),
            team: None,
            text: String::new(),
        }),
    })
}

fn deleted(message_id: &str) -> RecognitionEvent {
    RecognitionEvent::Message(MessageEvent {
        team: "T1".to_string(),
        channel: "C1".to_string(),
        thread_id: None,
        message_id: message_id.to_string(),
        text: String::new(),
        subtype: Some(MessageSubtype::MessageDeleted),
        current: None,
        previous: Some(MessageRef {
            message_id: message_id.to_string(),
            team: None,
            text: String::new(),
        }),
    })
}

fn leaderboard_mention() -> RecognitionEvent {
    RecognitionEvent::AppMention(AppMentionEvent {
        team: "T1".to_string(),
        channel: "C1".to_string(),
        thread_id: None,
        text: "<@UBOT> leaderboard".to_string(),
    })
}

/// The interaction a user produces by clicking one of the prompt's buttons.
fn button_click(action_id: String, value: &str) -> RecognitionEvent {
    RecognitionEvent::Interaction(InteractionEvent {
        team: "T1".to_string(),
        channel: "C1".to_string(),
        user: "U9".to_string(),
        action_id,
        value: Some(value.to_string()),
        selected_options: Vec::new(),
        response_url: Some("https://hooks.invalid/respond/1".to_string()),
    })
}

/// The interaction the stop-asking checkbox produces for `user`.
fn opt_out_toggle(user: &str, selected: bool) -> RecognitionEvent {
    let selected_options = if selected {
        vec![json!({"value": "opt-out"})]
    } else {
        Vec::new()
    };
    RecognitionEvent::Interaction(InteractionEvent {
        team: "T1".to_string(),
        channel: "C1".to_string(),
        user: user.to_string(),
        action_id: ActionId::OptOutToggle { thread_id: None }.encode(),
        value: None,
        selected_options,
        response_url: Some("https://hooks.invalid/respond/1".to_string()),
    })
}

fn expect_prompt(replies: &[OutboundReply]) -> ConfirmationPrompt {
    assert_eq!(replies.len(), 1, "expected one reply, got {replies:?}");
    let OutboundReply::Prompt(prompt) = &replies[0] else {
        panic!("expected confirmation prompt, got {replies:?}");
    };
    prompt.clone()
}

fn expect_interaction_text(replies: &[OutboundReply]) -> String {
    assert_eq!(replies.len(), 1, "expected one reply, got {replies:?}");
    let OutboundReply::Interaction { text, .. } = &replies[0] else {
        panic!("expected interaction reply, got {replies:?}");
    };
    text.clone()
}

fn expect_channel_text(replies: &[OutboundReply]) -> String {
    assert_eq!(replies.len(), 1, "expected one reply, got {replies:?}");
    let OutboundReply::Channel { text, .. } = &replies[0] else {
        panic!("expected channel reply, got {replies:?}");
    };
    text.clone()
}

/// The confirm button the rendered prompt would carry.
fn confirm_action(prompt: &ConfirmationPrompt) -> String {
    ActionId::AwardDecision {
        thread_id: prompt.thread_id.clone(),
        reaction_id: prompt.reaction().map(str::to_string),
        message_id: prompt.message_id.clone(),
        is_primary: true,
    }
    .encode()
}

fn ignore_action(prompt: &ConfirmationPrompt) -> String {
    ActionId::AwardDecision {
        thread_id: prompt.thread_id.clone(),
        reaction_id: prompt.reaction().map(str::to_string),
        message_id: prompt.message_id.clone(),
        is_primary: false,
    }
    .encode()
}

#[tokio::test]
async fn integration_recognition_flows_from_message_to_leaderboard() {
    let store = Arc::new(InMemoryRecognitionStore::new());
    let dispatcher = dispatcher(store.clone());

    let replies = dispatcher
        .dispatch(&posted("1.100", ":star: <@U2> great work"))
        .await;
    let prompt = expect_prompt(&replies);
    assert_eq!(prompt.recipient, "U2");
    assert_eq!(prompt.emojis, vec![":star:"]);

    let replies = dispatcher
        .dispatch(&button_click(confirm_action(&prompt), "1"))
        .await;
    assert_eq!(expect_interaction_text(&replies), AWARD_CONFIRMED_REPLY);

    let awards = store
        .awards_for_message(&MessageBinding::new("T1", "1.100"))
        .await
        .expect("awards");
    assert_eq!(awards.len(), 1);
    assert_eq!(awards[0].recipient, "U2");
    assert_eq!(awards[0].emoji, ":star:");

    let replies = dispatcher.dispatch(&leaderboard_mention()).await;
    assert_eq!(expect_channel_text(&replies), "1. <@U2> 1 award");
}

#[tokio::test]
async fn functional_ignore_click_discards_without_awarding() {
    let store = Arc::new(InMemoryRecognitionStore::new());
    let dispatcher = dispatcher(store.clone());

    let replies = dispatcher.dispatch(&posted("1.100", "<@U2> :tada:")).await;
    let prompt = expect_prompt(&replies);

    let replies = dispatcher
        .dispatch(&button_click(ignore_action(&prompt), "0"))
        .await;
    assert_eq!(expect_interaction_text(&replies), AWARD_DISMISSED_REPLY);

    let binding = MessageBinding::new("T1", "1.100");
    assert!(store
        .awards_for_message(&binding)
        .await
        .expect("awards")
        .is_empty());
    assert!(store
        .pending_for_message(&binding)
        .await
        .expect("pending")
        .is_empty());

    let replies = dispatcher.dispatch(&leaderboard_mention()).await;
    assert_eq!(expect_channel_text(&replies), EMPTY_LEADERBOARD_REPLY);
}

#[tokio::test]
async fn functional_edit_moves_the_candidate_to_the_new_recipient() {
    let store = Arc::new(InMemoryRecognitionStore::new());
    let dispatcher = dispatcher(store.clone());

    dispatcher.dispatch(&posted("1.100", "<@U2> :tada:")).await;
    let replies = dispatcher
        .dispatch(&edited("1.100", "meant <@U3> :tada:"))
        .await;
    let prompt = expect_prompt(&replies);
    assert_eq!(prompt.recipient, "U3");

    let pending = store
        .pending_for_message(&MessageBinding::new("T1", "1.100"))
        .await
        .expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].recipient, "U3");

    let replies = dispatcher
        .dispatch(&button_click(confirm_action(&prompt), "1"))
        .await;
    assert_eq!(expect_interaction_text(&replies), AWARD_CONFIRMED_REPLY);

    let awards = store
        .awards_for_message(&MessageBinding::new("T1", "1.100"))
        .await
        .expect("awards");
    assert_eq!(awards.len(), 1);
    assert_eq!(awards[0].recipient, "U3");
}

#[tokio::test]
async fn regression_confirm_after_delete_stays_a_noop() {
    let store = Arc::new(InMemoryRecognitionStore::new());
    let dispatcher = dispatcher(store.clone());

    let replies = dispatcher.dispatch(&posted("1.100", "<@U2> :tada:")).await;
    let prompt = expect_prompt(&replies);

    let replies = dispatcher.dispatch(&deleted("1.100")).await;
    assert!(replies.is_empty(), "delete produces no reply: {replies:?}");

    // The prompt is still on screen; clicking it must answer politely
    // without resurrecting the purged candidate.
    let replies = dispatcher
        .dispatch(&button_click(confirm_action(&prompt), "1"))
        .await;
    assert_eq!(expect_interaction_text(&replies), AWARD_CONFIRMED_REPLY);

    assert!(store
        .awards_for_message(&MessageBinding::new("T1", "1.100"))
        .await
        .expect("awards")
        .is_empty());
}

#[tokio::test]
async fn integration_opt_out_switches_to_direct_commit_and_back() {
    let store = Arc::new(InMemoryRecognitionStore::new());
    let dispatcher = dispatcher(store.clone());

    let replies = dispatcher.dispatch(&opt_out_toggle("U9", true)).await;
    assert_eq!(expect_interaction_text(&replies), OPT_OUT_RECORDED_REPLY);

    // Recognition aimed at the opted-out user commits without a prompt.
    let replies = dispatcher
        .dispatch(&posted("2.100", "<@U9> :tada: :star:"))
        .await;
    assert!(replies.is_empty(), "direct commit needs no reply: {replies:?}");
    let awards = store
        .awards_for_message(&MessageBinding::new("T1", "2.100"))
        .await
        .expect("awards");
    assert_eq!(awards.len(), 2);

    let replies = dispatcher.dispatch(&leaderboard_mention()).await;
    assert_eq!(expect_channel_text(&replies), "1. <@U9> 2 awards");

    // Clearing the checkbox restores the confirmation flow.
    let replies = dispatcher.dispatch(&opt_out_toggle("U9", false)).await;
    assert_eq!(expect_interaction_text(&replies), OPT_OUT_CLEARED_REPLY);

    let replies = dispatcher.dispatch(&posted("3.100", "<@U9> :clap:")).await;
    let prompt = expect_prompt(&replies);
    assert_eq!(prompt.recipient, "U9");
}

#[tokio::test]
async fn regression_two_distinct_mentions_never_award() {
    let store = Arc::new(InMemoryRecognitionStore::new());
    let dispatcher = dispatcher(store.clone());

    let replies = dispatcher
        .dispatch(&posted("1.100", "<@U2> <@U3> :tada:"))
        .await;
    assert!(replies.is_empty(), "ambiguous mention replies: {replies:?}");

    let binding = MessageBinding::new("T1", "1.100");
    assert!(store
        .pending_for_message(&binding)
        .await
        .expect("pending")
        .is_empty());
    assert!(store
        .awards_for_message(&binding)
        .await
        .expect("awards")
        .is_empty());
}

#[tokio::test]
async fn integration_sqlite_ledger_survives_reopen() {
    let temp = tempdir().expect("tempdir");
    let db_path = temp.path().join("kudos.db");

    {
        let store = Arc::new(SqliteRecognitionStore::new(&db_path).expect("open store"));
        let dispatcher = dispatcher(store);

        let replies = dispatcher
            .dispatch(&posted("1.100", ":star: <@U2> great work"))
            .await;
        let prompt = expect_prompt(&replies);
        let replies = dispatcher
            .dispatch(&button_click(confirm_action(&prompt), "1"))
            .await;
        assert_eq!(expect_interaction_text(&replies), AWARD_CONFIRMED_REPLY);
    }

    let reopened = Arc::new(SqliteRecognitionStore::new(&db_path).expect("reopen store"));
    let dispatcher = dispatcher(reopened.clone());

    let replies = dispatcher.dispatch(&leaderboard_mention()).await;
    assert_eq!(expect_channel_text(&replies), "1. <@U2> 1 award");

    let awards = reopened
        .awards_for_message(&MessageBinding::new("T1", "1.100"))
        .await
        .expect("awards");
    assert_eq!(awards.len(), 1);
    assert_eq!(awards[0].emoji, ":star:");
}
