//! Tests for socket runtime behavior and regressions.

use std::{path::Path, sync::Arc, time::Duration};

use httpmock::prelude::*;
use kudos_core::current_unix_timestamp;
use kudos_engine::{DispatchTable, EventDispatcher};
use kudos_store::{InMemoryRecognitionStore, MessageBinding, PendingAward, RecognitionStore};
use kudos_types::{ActionId, ConfirmationPrompt, MessageSubtype, RecognitionEvent};
use serde_json::json;
use tempfile::tempdir;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::slack_api_client::SlackApiClient;
use super::slack_block_kit::{confirmation_blocks, confirmation_fallback_text};
use super::slack_state_store::SocketStateStore;
use super::{
    normalize_socket_envelope, parse_socket_envelope, read_transport_health, unix_seconds_from_ts,
    PollCycleReport, SocketEnvelope, SocketRuntime, SocketRuntimeConfig,
};

fn test_config(
    base_url: &str,
    state_dir: &Path,
    store: Arc<InMemoryRecognitionStore>,
) -> SocketRuntimeConfig {
    SocketRuntimeConfig {
        dispatcher: Arc::new(EventDispatcher::new(store, DispatchTable::standard())),
        state_dir: state_dir.to_path_buf(),
        api_base: base_url.to_string(),
        app_token: "xapp-test".to_string(),
        bot_token: "xoxb-test".to_string(),
        bot_user_id: Some("UBOT".to_string()),
        request_timeout_ms: 3_000,
        processed_event_cap: 32,
        max_event_age_seconds: 3_600,
        reconnect_delay: Duration::from_millis(10),
        retry_max_attempts: 3,
        retry_base_delay_ms: 5,
    }
}

fn message_envelope(event_id: &str, ts: &str, text: &str) -> SocketEnvelope {
    SocketEnvelope {
        envelope_id: format!("env-{event_id}"),
        envelope_type: "events_api".to_string(),
        payload: json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": event_id,
            "event_time": current_unix_timestamp(),
            "event": {
                "type": "message",
                "user": "U1",
                "channel": "C1",
                "text": text,
                "ts": ts,
            }
        }),
    }
}

fn interaction_envelope(action_id: &str, value: &str, response_url: &str) -> SocketEnvelope {
    SocketEnvelope {
        envelope_id: format!("env-{action_id}"),
        envelope_type: "interactive".to_string(),
        payload: json!({
            "type": "block_actions",
            "team": {"id": "T1"},
            "user": {"id": "U9"},
            "channel": {"id": "C1"},
            "container": {"channel_id": "C1", "message_ts": "1.200"},
            "response_url": response_url,
            "actions": [
                {
                    "action_id": action_id,
                    "value": value,
                    "action_ts": format!("{}.100", current_unix_timestamp()),
                }
            ]
        }),
    }
}

#[test]
fn unit_parse_socket_envelope_ignores_control_frames() {
    let parsed = parse_socket_envelope(WsMessage::Ping(Vec::new().into())).expect("parse ping");
    assert!(parsed.is_none());
    let parsed = parse_socket_envelope(WsMessage::Close(None)).expect("parse close");
    assert!(parsed.is_none());

    let envelope = parse_socket_envelope(WsMessage::Text(
        json!({"envelope_id": "env1", "type": "events_api", "payload": {}})
            .to_string()
            .into(),
    ))
    .expect("parse text")
    .expect("envelope");
    assert_eq!(envelope.envelope_id, "env1");
    assert_eq!(envelope.envelope_type, "events_api");

    // hello frames have no envelope id and must still parse
    let hello = parse_socket_envelope(WsMessage::Text(
        json!({"type": "hello", "num_connections": 1}).to_string().into(),
    ))
    .expect("parse hello")
    .expect("hello envelope");
    assert!(hello.envelope_id.is_empty());
    assert_eq!(hello.envelope_type, "hello");
}

#[test]
fn unit_normalize_socket_envelope_maps_posted_message() {
    let envelope = message_envelope("Ev1", "10.1", ":star: <@U2> nice work");
    let inbound = normalize_socket_envelope(&envelope, "UBOT").expect("normalized");
    assert_eq!(inbound.key, "Ev1:C1:10.1");

    let RecognitionEvent::Message(message) = inbound.event else {
        panic!("expected message event");
    };
    assert_eq!(message.team, "T1");
    assert_eq!(message.channel, "C1");
    assert_eq!(message.message_id, "10.1");
    assert_eq!(message.text, ":star: <@U2> nice work");
    assert_eq!(message.subtype, None);
    assert_eq!(message.thread_id, None);
}

#[test]
fn unit_normalize_socket_envelope_maps_edit_bindings() {
    let envelope = SocketEnvelope {
        envelope_id: "env-edit".to_string(),
        envelope_type: "events_api".to_string(),
        payload: json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev2",
            "event_time": current_unix_timestamp(),
            "event": {
                "type": "message",
                "subtype": "message_changed",
                "channel": "C1",
                "ts": "11.0",
                "message": {
                    "user": "U1",
                    "text": "<@U2> :tada:",
                    "ts": "10.1",
                    "team": "T1",
                    "thread_ts": "9.5",
                },
                "previous_message": {
                    "user": "U1",
                    "text": "plain thanks",
                    "ts": "10.1",
                    "team": "T1",
                }
            }
        }),
    };

    let inbound = normalize_socket_envelope(&envelope, "UBOT").expect("normalized");
    let RecognitionEvent::Message(message) = inbound.event else {
        panic!("expected message event");
    };
    assert_eq!(message.subtype, Some(MessageSubtype::MessageChanged));
    assert_eq!(message.thread_id.as_deref(), Some("9.5"));
    let current = message.current.expect("current body");
    assert_eq!(current.message_id, "10.1");
    assert_eq!(current.text, "<@U2> :tada:");
    let previous = message.previous.expect("previous binding");
    assert_eq!(previous.message_id, "10.1");
    assert_eq!(previous.text, "plain thanks");
}

#[test]
fn unit_normalize_socket_envelope_maps_delete_tombstone() {
    let envelope = SocketEnvelope {
        envelope_id: "env-delete".to_string(),
        envelope_type: "events_api".to_string(),
        payload: json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev3",
            "event_time": current_unix_timestamp(),
            "event": {
                "type": "message",
                "subtype": "message_deleted",
                "channel": "C1",
                "ts": "12.0",
                "deleted_ts": "10.1",
            }
        }),
    };

    let inbound = normalize_socket_envelope(&envelope, "UBOT").expect("normalized");
    let RecognitionEvent::Message(message) = inbound.event else {
        panic!("expected message event");
    };
    assert_eq!(message.subtype, Some(MessageSubtype::MessageDeleted));
    assert!(message.current.is_none());
    let previous = message.previous.expect("tombstone binding");
    assert_eq!(previous.message_id, "10.1");
    assert_eq!(previous.team, None);
    assert!(previous.text.is_empty());
}

#[test]
fn unit_normalize_socket_envelope_skips_bot_authored_events() {
    let own_message = SocketEnvelope {
        envelope_id: "env-own".to_string(),
        envelope_type: "events_api".to_string(),
        payload: json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev4",
            "event_time": current_unix_timestamp(),
            "event": {
                "type": "message",
                "user": "UBOT",
                "channel": "C1",
                "text": ":star: <@U2>",
                "ts": "13.0",
            }
        }),
    };
    assert!(normalize_socket_envelope(&own_message, "UBOT").is_none());

    let bot_subtype = SocketEnvelope {
        envelope_id: "env-bot".to_string(),
        envelope_type: "events_api".to_string(),
        payload: json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev5",
            "event_time": current_unix_timestamp(),
            "event": {
                "type": "message",
                "subtype": "bot_message",
                "user": "U1",
                "channel": "C1",
                "text": ":star: <@U2>",
                "ts": "13.1",
            }
        }),
    };
    assert!(normalize_socket_envelope(&bot_subtype, "UBOT").is_none());

    let own_edit = SocketEnvelope {
        envelope_id: "env-own-edit".to_string(),
        envelope_type: "events_api".to_string(),
        payload: json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev6",
            "event_time": current_unix_timestamp(),
            "event": {
                "type": "message",
                "subtype": "message_changed",
                "channel": "C1",
                "ts": "13.2",
                "message": {"user": "UBOT", "text": "edited", "ts": "13.0"},
            }
        }),
    };
    assert!(normalize_socket_envelope(&own_edit, "UBOT").is_none());
}

#[test]
fn unit_normalize_socket_envelope_maps_app_mention() {
    let envelope = SocketEnvelope {
        envelope_id: "env-mention".to_string(),
        envelope_type: "events_api".to_string(),
        payload: json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev7",
            "event_time": current_unix_timestamp(),
            "event": {
                "type": "app_mention",
                "user": "U1",
                "channel": "C1",
                "text": "<@UBOT> leaderboard",
                "ts": "14.0",
                "thread_ts": "13.5",
            }
        }),
    };

    let inbound = normalize_socket_envelope(&envelope, "UBOT").expect("normalized");
    let RecognitionEvent::AppMention(mention) = inbound.event else {
        panic!("expected app mention event");
    };
    assert_eq!(mention.team, "T1");
    assert_eq!(mention.channel, "C1");
    assert_eq!(mention.thread_id.as_deref(), Some("13.5"));
    assert_eq!(mention.text, "<@UBOT> leaderboard");
}

#[test]
fn unit_unix_seconds_from_ts_handles_malformed_values() {
    assert_eq!(unix_seconds_from_ts("1700000000.000100"), 1_700_000_000);
    assert_eq!(unix_seconds_from_ts("12"), 12);
    assert_eq!(unix_seconds_from_ts("garbage"), 0);
    assert_eq!(unix_seconds_from_ts(""), 0);
    assert_eq!(unix_seconds_from_ts(".100"), 0);
}

#[test]
fn functional_confirmation_blocks_round_trip_action_ids() {
    let prompt = ConfirmationPrompt {
        team: "T1".to_string(),
        channel: "C1".to_string(),
        message_id: "10.1".to_string(),
        thread_id: Some("9.5".to_string()),
        recipient: "U2".to_string(),
        emojis: vec![":star:".to_string()],
    };

    let blocks = confirmation_blocks(&prompt);
    let elements = blocks[1]["elements"].as_array().expect("action elements");
    assert_eq!(elements.len(), 3);
    assert_eq!(elements[0]["value"], "1");
    assert_eq!(elements[1]["value"], "0");

    let confirm = ActionId::parse(elements[0]["action_id"].as_str().expect("confirm action id"))
        .expect("confirm decodes");
    assert_eq!(
        confirm,
        ActionId::AwardDecision {
            thread_id: Some("9.5".to_string()),
            reaction_id: Some(":star:".to_string()),
            message_id: "10.1".to_string(),
            is_primary: true,
        }
    );
    let ignore = ActionId::parse(elements[1]["action_id"].as_str().expect("ignore action id"))
        .expect("ignore decodes");
    assert!(matches!(
        ignore,
        ActionId::AwardDecision {
            is_primary: false,
            ..
        }
    ));
    let opt_out = ActionId::parse(elements[2]["action_id"].as_str().expect("opt-out action id"))
        .expect("opt-out decodes");
    assert_eq!(
        opt_out,
        ActionId::OptOutToggle {
            thread_id: Some("9.5".to_string()),
        }
    );

    let fallback = confirmation_fallback_text(&prompt);
    assert!(fallback.contains("<@U2>"));
    assert!(fallback.contains(":star:"));
    assert!(fallback.contains("add it as an award"));
}

#[test]
fn unit_state_store_caps_processed_keys_and_persists() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("state.json");

    let mut store = SocketStateStore::load(path.clone(), 2).expect("load");
    assert!(store.mark_processed("k1"));
    assert!(store.mark_processed("k2"));
    assert!(!store.mark_processed("k2"));
    assert!(store.mark_processed("k3"));
    assert!(!store.contains("k1"));
    assert!(store.contains("k2"));
    assert!(store.contains("k3"));
    store.save().expect("save");

    let reloaded = SocketStateStore::load(path, 2).expect("reload");
    assert!(!reloaded.contains("k1"));
    assert!(reloaded.contains("k2"));
    assert!(reloaded.contains("k3"));
}

#[test]
fn regression_state_store_rejects_unknown_schema() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("state.json");
    std::fs::write(&path, "{\"schema_version\": 99}\n").expect("seed state file");

    let error = SocketStateStore::load(path, 8).expect_err("schema mismatch");
    assert!(error
        .to_string()
        .contains("unsupported kudos state schema"));
}

#[tokio::test]
async fn integration_slack_api_client_retries_rate_limits() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .header("x-kudos-retry-attempt", "0");
        then.status(429)
            .header("retry-after", "0")
            .body("rate limit");
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .header("x-kudos-retry-attempt", "1");
        then.status(200).json_body(json!({
            "ok": true,
            "channel": "C1",
            "ts": "1.2"
        }));
    });

    let client = SlackApiClient::new(
        server.base_url(),
        "xapp-test".to_string(),
        "xoxb-test".to_string(),
        2_000,
        3,
        1,
    )
    .expect("client");

    let posted_ts = client
        .post_message("C1", "hello", None)
        .await
        .expect("post message eventually succeeds");
    assert_eq!(posted_ts, "1.2");
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
}

#[tokio::test]
async fn integration_respond_ephemeral_replaces_original_prompt() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/hook/r1")
            .body_includes("\"replace_original\":true")
            .body_includes("\"response_type\":\"ephemeral\"")
            .body_includes("\"thread_ts\":\"9.5\"");
        then.status(200).body("ok");
    });

    let client = SlackApiClient::new(
        server.base_url(),
        "xapp-test".to_string(),
        "xoxb-test".to_string(),
        2_000,
        3,
        1,
    )
    .expect("client");

    client
        .respond_ephemeral(
            &format!("{}/hook/r1", server.base_url()),
            ">Great, the award was added :tada:!",
            Some("9.5"),
        )
        .await
        .expect("respond");
    hook.assert();
}

#[tokio::test]
async fn functional_runtime_posts_prompt_for_recognition_message() {
    let server = MockServer::start();
    let prompt_post = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"C1\"")
            .body_includes("addEmoji_null_:star:_10.1_1")
            .body_includes("\"thread_ts\":\"10.1\"");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "10.2"}));
    });

    let temp = tempdir().expect("tempdir");
    let store = Arc::new(InMemoryRecognitionStore::new());
    let config = test_config(&server.base_url(), temp.path(), store.clone());
    let mut runtime = SocketRuntime::new(config).await.expect("runtime");

    let mut report = PollCycleReport::default();
    runtime
        .handle_envelope(
            message_envelope("Ev1", "10.1", ":star: <@U2> nice work"),
            &mut report,
        )
        .await
        .expect("handle envelope");

    assert_eq!(report.discovered_events, 1);
    assert_eq!(report.processed_events, 1);
    assert_eq!(report.replies_sent, 1);
    assert_eq!(report.failed_deliveries, 0);
    prompt_post.assert();

    let pending = store
        .pending_for_message(&MessageBinding::new("T1", "10.1"))
        .await
        .expect("pending rows");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].recipient, "U2");
    assert_eq!(pending[0].emoji, ":star:");

    let inbound_log =
        std::fs::read_to_string(temp.path().join("inbound-events.jsonl")).expect("inbound log");
    assert!(inbound_log.contains("\"event_key\":\"Ev1:C1:10.1\""));
    let outbound_log =
        std::fs::read_to_string(temp.path().join("outbound-events.jsonl")).expect("outbound log");
    assert!(outbound_log.contains("\"reply\":\"prompt\""));
    assert!(outbound_log.contains("\"status\":\"sent\""));
}

#[tokio::test]
async fn regression_duplicate_envelope_is_not_dispatched_twice() {
    let server = MockServer::start();
    let prompt_post = server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "10.2"}));
    });

    let temp = tempdir().expect("tempdir");
    let store = Arc::new(InMemoryRecognitionStore::new());
    let config = test_config(&server.base_url(), temp.path(), store);
    let mut runtime = SocketRuntime::new(config).await.expect("runtime");

    let mut report = PollCycleReport::default();
    runtime
        .handle_envelope(
            message_envelope("Ev1", "10.1", ":star: <@U2> nice work"),
            &mut report,
        )
        .await
        .expect("first delivery");
    runtime
        .handle_envelope(
            message_envelope("Ev1", "10.1", ":star: <@U2> nice work"),
            &mut report,
        )
        .await
        .expect("redelivery");

    assert_eq!(report.discovered_events, 2);
    assert_eq!(report.processed_events, 1);
    assert_eq!(report.skipped_duplicate_events, 1);
    assert_eq!(prompt_post.calls(), 1);
}

#[tokio::test]
async fn regression_stale_event_is_recorded_but_not_dispatched() {
    let server = MockServer::start();
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(InMemoryRecognitionStore::new());
    let config = test_config(&server.base_url(), temp.path(), store.clone());
    let mut runtime = SocketRuntime::new(config).await.expect("runtime");

    let stale = SocketEnvelope {
        envelope_id: "env-stale".to_string(),
        envelope_type: "events_api".to_string(),
        payload: json!({
            "type": "event_callback",
            "team_id": "T1",
            "event_id": "Ev9",
            "event_time": current_unix_timestamp() - 7_200,
            "event": {
                "type": "message",
                "user": "U1",
                "channel": "C1",
                "text": ":star: <@U2> nice work",
                "ts": "10.9",
            }
        }),
    };

    let mut report = PollCycleReport::default();
    runtime
        .handle_envelope(stale, &mut report)
        .await
        .expect("handle stale envelope");

    assert_eq!(report.skipped_stale_events, 1);
    assert_eq!(report.processed_events, 0);
    assert_eq!(report.replies_sent, 0);

    let state_raw =
        std::fs::read_to_string(temp.path().join("state.json")).expect("read state file");
    assert!(state_raw.contains("Ev9:C1:10.9"));
    assert!(store
        .pending_for_message(&MessageBinding::new("T1", "10.9"))
        .await
        .expect("pending rows")
        .is_empty());
}

#[tokio::test]
async fn functional_runtime_delivers_interaction_reply_via_response_url() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/hook/r1")
            .body_includes(">Great, the award was added :tada:!");
        then.status(200).body("ok");
    });

    let temp = tempdir().expect("tempdir");
    let store = Arc::new(InMemoryRecognitionStore::new());
    store
        .record_pending_awards(&[PendingAward::new("T1", "C1", "10.1", None, "U2", ":star:")])
        .await
        .expect("seed pending");
    let config = test_config(&server.base_url(), temp.path(), store.clone());
    let mut runtime = SocketRuntime::new(config).await.expect("runtime");

    let mut report = PollCycleReport::default();
    runtime
        .handle_envelope(
            interaction_envelope(
                "addEmoji_null_:star:_10.1_1",
                "1",
                &format!("{}/hook/r1", server.base_url()),
            ),
            &mut report,
        )
        .await
        .expect("handle interaction");

    assert_eq!(report.processed_events, 1);
    assert_eq!(report.replies_sent, 1);
    hook.assert();

    let awards = store
        .awards_for_message(&MessageBinding::new("T1", "10.1"))
        .await
        .expect("awards");
    assert_eq!(awards.len(), 1);
    assert_eq!(awards[0].recipient, "U2");
    assert!(store
        .pending_for_message(&MessageBinding::new("T1", "10.1"))
        .await
        .expect("pending rows")
        .is_empty());
}

#[tokio::test]
async fn functional_transport_health_snapshot_persists_cycle_counters() {
    let server = MockServer::start();
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(InMemoryRecognitionStore::new());
    let config = test_config(&server.base_url(), temp.path(), store);
    let mut runtime = SocketRuntime::new(config).await.expect("runtime");

    let report = PollCycleReport {
        discovered_events: 3,
        processed_events: 2,
        replies_sent: 1,
        skipped_duplicate_events: 1,
        skipped_stale_events: 0,
        failed_deliveries: 0,
    };
    runtime
        .persist_transport_health(&report, 42, 7)
        .expect("persist transport health");

    let state_raw =
        std::fs::read_to_string(temp.path().join("state.json")).expect("read state file");
    let state_json: serde_json::Value = serde_json::from_str(&state_raw).expect("state json");
    let health = &state_json["transport_health"];
    assert_eq!(health["cycle_duration_ms"], 42);
    assert_eq!(health["failure_streak"], 7);
    assert_eq!(health["last_cycle_discovered"], 3);
    assert_eq!(health["last_cycle_processed"], 2);
    assert_eq!(health["last_cycle_replies"], 1);
    assert_eq!(health["last_cycle_duplicates"], 1);
    assert!(
        health["updated_unix_ms"].as_u64().unwrap_or_default() > 0,
        "snapshot must carry a timestamp"
    );

    let snapshot = read_transport_health(&temp.path().join("state.json"));
    assert_eq!(snapshot.failure_streak, 7);
    assert_eq!(snapshot.last_cycle_processed, 2);
}
