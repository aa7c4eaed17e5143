//! Socket Mode loop that turns Slack envelopes into award ledger activity.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use kudos_core::{current_unix_timestamp_ms, is_stale_unix};
use kudos_engine::EventDispatcher;
use kudos_types::{
    AppMentionEvent, InteractionEvent, MessageEvent, MessageRef, MessageSubtype, OutboundReply,
    RecognitionEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::slack_helpers::truncate_for_error;

const SOCKET_STATE_SCHEMA_VERSION: u32 = 1;

mod slack_api_client;
mod slack_block_kit;
mod slack_state_store;

use slack_api_client::SlackApiClient;
use slack_block_kit::{confirmation_blocks, confirmation_fallback_text};
use slack_state_store::{JsonlEventLog, SocketStateStore};

pub(crate) use slack_state_store::read_transport_health;

#[derive(Clone)]
/// Runtime configuration for the Socket Mode transport loop.
pub struct SocketRuntimeConfig {
    pub dispatcher: Arc<EventDispatcher>,
    pub state_dir: PathBuf,
    pub api_base: String,
    pub app_token: String,
    pub bot_token: String,
    pub bot_user_id: Option<String>,
    pub request_timeout_ms: u64,
    pub processed_event_cap: usize,
    pub max_event_age_seconds: u64,
    pub reconnect_delay: Duration,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

/// Last observed transport loop vitals, persisted alongside the socket state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportHealthSnapshot {
    pub updated_unix_ms: u64,
    pub cycle_duration_ms: u64,
    pub failure_streak: usize,
    pub last_cycle_discovered: usize,
    pub last_cycle_processed: usize,
    pub last_cycle_replies: usize,
    pub last_cycle_duplicates: usize,
    pub last_cycle_stale: usize,
    pub last_cycle_failed: usize,
}

#[derive(Debug, Deserialize)]
struct SocketEnvelope {
    #[serde(default)]
    envelope_id: String,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Value,
}

/// One inbound event after normalization, with its dedup key.
#[derive(Debug, Clone)]
struct NormalizedInbound {
    key: String,
    occurred_unix: u64,
    event: RecognitionEvent,
}

#[derive(Debug, Default)]
pub(crate) struct PollCycleReport {
    pub discovered_events: usize,
    pub processed_events: usize,
    pub replies_sent: usize,
    pub skipped_duplicate_events: usize,
    pub skipped_stale_events: usize,
    pub failed_deliveries: usize,
}

/// Runs the Socket Mode transport loop until shutdown is requested.
pub async fn run_socket_runtime(config: SocketRuntimeConfig) -> Result<()> {
    let mut runtime = SocketRuntime::new(config).await?;
    runtime.run().await
}

struct SocketRuntime {
    config: SocketRuntimeConfig,
    slack_client: SlackApiClient,
    state_store: SocketStateStore,
    inbound_log: JsonlEventLog,
    outbound_log: JsonlEventLog,
    bot_user_id: String,
}

impl SocketRuntime {
    async fn new(config: SocketRuntimeConfig) -> Result<Self> {
        let state_dir = config.state_dir.clone();
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("failed to create {}", state_dir.display()))?;

        let slack_client = SlackApiClient::new(
            config.api_base.clone(),
            config.app_token.clone(),
            config.bot_token.clone(),
            config.request_timeout_ms,
            config.retry_max_attempts,
            config.retry_base_delay_ms,
        )?;

        let bot_user_id = match config.bot_user_id.clone() {
            Some(user_id) if !user_id.trim().is_empty() => user_id.trim().to_string(),
            _ => slack_client.resolve_bot_user_id().await?,
        };

        let state_store =
            SocketStateStore::load(state_dir.join("state.json"), config.processed_event_cap)?;
        let inbound_log = JsonlEventLog::open(state_dir.join("inbound-events.jsonl"))?;
        let outbound_log = JsonlEventLog::open(state_dir.join("outbound-events.jsonl"))?;

        Ok(Self {
            config,
            slack_client,
            state_store,
            inbound_log,
            outbound_log,
            bot_user_id,
        })
    }

    async fn run(&mut self) -> Result<()> {
        let mut failure_streak = self.state_store.transport_health().failure_streak;
        loop {
            let connect_started = Instant::now();
            let socket_url = match self.slack_client.open_socket_connection().await {
                Ok(url) => url,
                Err(error) => {
                    failure_streak = failure_streak.saturating_add(1);
                    self.persist_transport_health(
                        &PollCycleReport::default(),
                        connect_started.elapsed().as_millis() as u64,
                        failure_streak,
                    )?;
                    eprintln!("kudos slack failed to open socket connection: {error}");
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            println!("kudos slack shutdown requested");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                    }
                    continue;
                }
            };

            println!("kudos slack socket connected");
            let session_result = self.run_socket_session(&socket_url).await;
            if let Err(error) = session_result {
                failure_streak = failure_streak.saturating_add(1);
                self.persist_transport_health(&PollCycleReport::default(), 0, failure_streak)?;
                eprintln!("kudos slack socket session error: {error}");
            } else {
                failure_streak = 0;
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("kudos slack shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }
    }

    async fn run_socket_session(&mut self, socket_url: &str) -> Result<()> {
        let (stream, _response) = connect_async(socket_url)
            .await
            .with_context(|| "failed to connect slack socket mode websocket")?;
        let (mut sink, mut source) = stream.split();

        loop {
            let cycle_started = Instant::now();
            let mut report = PollCycleReport::default();

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    return Ok(());
                }
                maybe_message = source.next() => {
                    let Some(message_result) = maybe_message else {
                        return Ok(());
                    };
                    let message = message_result.context("failed reading slack websocket message")?;
                    if let Some(envelope) = parse_socket_envelope(message)? {
                        if envelope.envelope_type == "disconnect" {
                            // Slack rotates connections; reconnect with a fresh URL.
                            return Ok(());
                        }
                        // hello frames carry no envelope id and need no ack
                        if !envelope.envelope_id.is_empty() {
                            self.ack_envelope(&mut sink, &envelope.envelope_id).await?;
                            self.handle_envelope(envelope, &mut report).await?;
                        }
                    }
                }
            }

            let cycle_duration_ms = cycle_started.elapsed().as_millis() as u64;
            self.persist_transport_health(&report, cycle_duration_ms, 0)?;

            if report.discovered_events > 0
                || report.processed_events > 0
                || report.replies_sent > 0
                || report.skipped_duplicate_events > 0
                || report.skipped_stale_events > 0
                || report.failed_deliveries > 0
            {
                println!(
                    "kudos slack cycle: discovered={} processed={} replies={} duplicate_skips={} stale_skips={} failed={}",
                    report.discovered_events,
                    report.processed_events,
                    report.replies_sent,
                    report.skipped_duplicate_events,
                    report.skipped_stale_events,
                    report.failed_deliveries,
                );
            }
        }
    }

    fn persist_transport_health(
        &mut self,
        report: &PollCycleReport,
        cycle_duration_ms: u64,
        failure_streak: usize,
    ) -> Result<()> {
        let snapshot = TransportHealthSnapshot {
            updated_unix_ms: current_unix_timestamp_ms(),
            cycle_duration_ms,
            failure_streak,
            last_cycle_discovered: report.discovered_events,
            last_cycle_processed: report.processed_events,
            last_cycle_replies: report.replies_sent,
            last_cycle_duplicates: report.skipped_duplicate_events,
            last_cycle_stale: report.skipped_stale_events,
            last_cycle_failed: report.failed_deliveries,
        };
        self.state_store.set_transport_health(snapshot);
        self.state_store.save()
    }

    async fn ack_envelope<S>(&self, sink: &mut S, envelope_id: &str) -> Result<()>
    where
        S: futures_util::Sink<WsMessage> + Unpin,
        S::Error: std::error::Error + Send + Sync + 'static,
    {
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        sink.send(WsMessage::Text(ack.into()))
            .await
            .context("failed to send slack socket ack")
    }

    async fn handle_envelope(
        &mut self,
        envelope: SocketEnvelope,
        report: &mut PollCycleReport,
    ) -> Result<()> {
        let now_unix_ms = current_unix_timestamp_ms();
        report.discovered_events = report.discovered_events.saturating_add(1);

        let Some(inbound) = normalize_socket_envelope(&envelope, &self.bot_user_id) else {
            return Ok(());
        };

        if self.state_store.contains(&inbound.key) {
            report.skipped_duplicate_events = report.skipped_duplicate_events.saturating_add(1);
            return Ok(());
        }

        if is_stale_unix(
            inbound.occurred_unix,
            now_unix_ms / 1000,
            self.config.max_event_age_seconds,
        ) {
            if self.state_store.mark_processed(&inbound.key) {
                self.state_store.save()?;
            }
            report.skipped_stale_events = report.skipped_stale_events.saturating_add(1);
            return Ok(());
        }

        self.inbound_log.append(&json!({
            "timestamp_unix_ms": now_unix_ms,
            "event_key": inbound.key,
            "kind": inbound.event.kind(),
            "event": &inbound.event,
        }))?;

        let replies = self.config.dispatcher.dispatch(&inbound.event).await;
        for reply in &replies {
            match self.deliver_reply(reply).await {
                Ok(()) => {
                    report.replies_sent = report.replies_sent.saturating_add(1);
                    self.outbound_log.append(&json!({
                        "timestamp_unix_ms": current_unix_timestamp_ms(),
                        "event_key": inbound.key,
                        "reply": reply_kind(reply),
                        "status": "sent",
                    }))?;
                }
                Err(error) => {
                    report.failed_deliveries = report.failed_deliveries.saturating_add(1);
                    eprintln!("kudos slack reply delivery failed: {error:#}");
                    self.outbound_log.append(&json!({
                        "timestamp_unix_ms": current_unix_timestamp_ms(),
                        "event_key": inbound.key,
                        "reply": reply_kind(reply),
                        "status": "failed",
                        "error": truncate_for_error(&format!("{error:#}"), 320),
                    }))?;
                }
            }
        }

        if self.state_store.mark_processed(&inbound.key) {
            self.state_store.save()?;
        }
        report.processed_events = report.processed_events.saturating_add(1);
        Ok(())
    }

    async fn deliver_reply(&self, reply: &OutboundReply) -> Result<()> {
        match reply {
            OutboundReply::Channel {
                channel,
                thread_id,
                text,
            } => self
                .slack_client
                .post_message(channel, text, thread_id.as_deref())
                .await
                .map(|_| ()),
            OutboundReply::Prompt(prompt) => {
                // The prompt threads under the recognized message.
                let thread_ts = prompt
                    .thread_id
                    .as_deref()
                    .or(Some(prompt.message_id.as_str()));
                self.slack_client
                    .post_blocks(
                        &prompt.channel,
                        &confirmation_fallback_text(prompt),
                        confirmation_blocks(prompt),
                        thread_ts,
                    )
                    .await
                    .map(|_| ())
            }
            OutboundReply::Interaction {
                response_url,
                thread_id,
                text,
            } => {
                let url = response_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .ok_or_else(|| anyhow!("interaction reply has no response_url"))?;
                self.slack_client
                    .respond_ephemeral(url, text, thread_id.as_deref())
                    .await
            }
        }
    }
}

fn reply_kind(reply: &OutboundReply) -> &'static str {
    match reply {
        OutboundReply::Channel { .. } => "channel",
        OutboundReply::Prompt(_) => "prompt",
        OutboundReply::Interaction { .. } => "interaction",
    }
}

fn parse_socket_envelope(message: WsMessage) -> Result<Option<SocketEnvelope>> {
    match message {
        WsMessage::Text(text) => {
            let envelope = serde_json::from_str::<SocketEnvelope>(&text)
                .context("failed to parse slack socket envelope")?;
            Ok(Some(envelope))
        }
        WsMessage::Binary(bytes) => {
            let text =
                String::from_utf8(bytes.to_vec()).context("invalid utf-8 slack socket payload")?;
            let envelope = serde_json::from_str::<SocketEnvelope>(&text)
                .context("failed to parse slack socket envelope")?;
            Ok(Some(envelope))
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) => Ok(None),
        WsMessage::Close(_) => Ok(None),
        WsMessage::Frame(_) => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct EventCallbackEnvelope {
    #[serde(rename = "type")]
    callback_type: String,
    #[serde(default)]
    team_id: Option<String>,
    event_id: String,
    #[serde(default)]
    event_time: u64,
    event: EventPayload,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    message: Option<NestedMessageRef>,
    #[serde(default)]
    previous_message: Option<NestedMessageRef>,
    #[serde(default)]
    deleted_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedMessageRef {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockActionsPayload {
    #[serde(rename = "type")]
    payload_type: String,
    #[serde(default)]
    team: Option<ObjectRef>,
    #[serde(default)]
    user: Option<ObjectRef>,
    #[serde(default)]
    channel: Option<ObjectRef>,
    #[serde(default)]
    container: Option<ActionContainer>,
    #[serde(default)]
    response_url: Option<String>,
    #[serde(default)]
    actions: Vec<BlockAction>,
}

#[derive(Debug, Deserialize)]
struct ObjectRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ActionContainer {
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    message_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockAction {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    action_ts: Option<String>,
    #[serde(default)]
    selected_options: Vec<Value>,
}

/// Maps a socket envelope onto a recognition event, or `None` when the
/// payload is not one the bot acts on. Malformed payloads are treated the
/// same as unrecognized ones.
fn normalize_socket_envelope(
    envelope: &SocketEnvelope,
    bot_user_id: &str,
) -> Option<NormalizedInbound> {
    match envelope.envelope_type.as_str() {
        "events_api" => normalize_event_callback(&envelope.payload, bot_user_id),
        "interactive" => normalize_block_actions(&envelope.payload),
        _ => None,
    }
}

fn normalize_event_callback(payload: &Value, bot_user_id: &str) -> Option<NormalizedInbound> {
    let callback = serde_json::from_value::<EventCallbackEnvelope>(payload.clone()).ok()?;
    if callback.callback_type != "event_callback" {
        return None;
    }

    let event = callback.event;
    if event.subtype.as_deref() == Some("bot_message") {
        return None;
    }
    let author = event
        .user
        .as_deref()
        .or_else(|| event.message.as_ref().and_then(|body| body.user.as_deref()));
    if author == Some(bot_user_id) {
        return None;
    }

    let channel = non_empty(event.channel.as_deref())?;
    let team =
        non_empty(event.team.as_deref()).or_else(|| non_empty(callback.team_id.as_deref()))?;
    let ts = non_empty(event.ts.as_deref())?;
    let key = format!("{}:{}:{}", callback.event_id, channel, ts);
    let thread_id = non_empty(event.thread_ts.as_deref());

    let recognition = match event.event_type.as_str() {
        "app_mention" => {
            non_empty(event.user.as_deref())?;
            RecognitionEvent::AppMention(AppMentionEvent {
                team,
                channel,
                thread_id,
                text: event.text.unwrap_or_default(),
            })
        }
        "message" => match event.subtype.as_deref() {
            None => {
                non_empty(event.user.as_deref())?;
                RecognitionEvent::Message(MessageEvent {
                    team,
                    channel,
                    thread_id,
                    message_id: ts.clone(),
                    text: event.text.unwrap_or_default(),
                    subtype: None,
                    current: None,
                    previous: None,
                })
            }
            Some("message_changed") => {
                let thread_id = thread_id.or_else(|| {
                    event
                        .message
                        .as_ref()
                        .and_then(|body| non_empty(body.thread_ts.as_deref()))
                });
                RecognitionEvent::Message(MessageEvent {
                    team,
                    channel,
                    thread_id,
                    message_id: ts.clone(),
                    text: String::new(),
                    subtype: Some(MessageSubtype::MessageChanged),
                    current: event.message.as_ref().map(message_ref_from_nested),
                    previous: event.previous_message.as_ref().map(message_ref_from_nested),
                })
            }
            Some("message_deleted") => {
                let previous = event
                    .previous_message
                    .as_ref()
                    .map(message_ref_from_nested)
                    .or_else(|| {
                        // tombstone deletes only carry deleted_ts
                        non_empty(event.deleted_ts.as_deref()).map(|message_id| MessageRef {
                            message_id,
                            team: None,
                            text: String::new(),
                        })
                    });
                RecognitionEvent::Message(MessageEvent {
                    team,
                    channel,
                    thread_id,
                    message_id: ts.clone(),
                    text: String::new(),
                    subtype: Some(MessageSubtype::MessageDeleted),
                    current: None,
                    previous,
                })
            }
            Some(_) => return None,
        },
        _ => return None,
    };

    Some(NormalizedInbound {
        key,
        occurred_unix: callback.event_time,
        event: recognition,
    })
}

fn normalize_block_actions(payload: &Value) -> Option<NormalizedInbound> {
    let parsed = serde_json::from_value::<BlockActionsPayload>(payload.clone()).ok()?;
    if parsed.payload_type != "block_actions" {
        return None;
    }

    let action = parsed.actions.into_iter().next()?;
    let team = parsed.team.map(|team| team.id).filter(|id| !id.is_empty())?;
    let user = parsed.user.map(|user| user.id).filter(|id| !id.is_empty())?;
    let channel = parsed
        .channel
        .map(|channel| channel.id)
        .filter(|id| !id.is_empty())
        .or_else(|| {
            parsed
                .container
                .as_ref()
                .and_then(|container| non_empty(container.channel_id.as_deref()))
        })?;
    let message_ts = parsed
        .container
        .as_ref()
        .and_then(|container| non_empty(container.message_ts.as_deref()))
        .unwrap_or_default();
    let action_ts = action.action_ts.unwrap_or_default();

    let key = format!(
        "interaction:{channel}:{message_ts}:{}:{action_ts}",
        action.action_id
    );
    Some(NormalizedInbound {
        key,
        occurred_unix: unix_seconds_from_ts(&action_ts),
        event: RecognitionEvent::Interaction(InteractionEvent {
            team,
            channel,
            user,
            action_id: action.action_id,
            value: action.value,
            selected_options: action.selected_options,
            response_url: parsed.response_url,
        }),
    })
}

fn message_ref_from_nested(nested: &NestedMessageRef) -> MessageRef {
    MessageRef {
        message_id: nested.ts.clone().unwrap_or_default(),
        team: nested.team.clone(),
        text: nested.text.clone().unwrap_or_default(),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Seconds component of a Slack `1700000000.000100` timestamp; 0 when the
/// value cannot be parsed, which exempts the event from the staleness check.
fn unix_seconds_from_ts(ts: &str) -> u64 {
    ts.split('.')
        .next()
        .and_then(|seconds| seconds.parse::<u64>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests;
