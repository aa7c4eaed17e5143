//! Event routing and the handler failure boundary.
//!
//! The routing table is built explicitly at startup and passed to the
//! dispatcher; nothing registers itself onto shared process state. The
//! dispatcher is also the single place where handler failures become
//! user-visible apologies (interactions) or stderr lines (passive events).

use std::sync::Arc;

use kudos_store::RecognitionStore;
use kudos_types::{
    ActionId, AppMentionEvent, EventKind, InteractionEvent, MessageEvent, OutboundReply,
    RecognitionEvent,
};

use crate::command::{parse_mention_command, MentionCommand};
use crate::interaction::{apply_award_decision, apply_opt_out_toggle, OPERATION_FAILED_REPLY};
use crate::leaderboard::leaderboard_reply;
use crate::reconcile::{reconcile_message_event, ReconcileOutcome};

/// Handler families the dispatcher can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Message lifecycle reconciliation.
    Reconcile,
    /// Leaderboard command served from app mentions.
    LeaderboardCommand,
    /// Confirmation prompt callbacks.
    Interaction,
}

/// Explicit event-to-handler routing table.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    routes: Vec<(EventKind, HandlerKind)>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full production routing.
    pub fn standard() -> Self {
        Self::new()
            .route(EventKind::Message, HandlerKind::Reconcile)
            .route(EventKind::AppMention, HandlerKind::LeaderboardCommand)
            .route(EventKind::Interaction, HandlerKind::Interaction)
    }

    pub fn route(mut self, event: EventKind, handler: HandlerKind) -> Self {
        self.routes.push((event, handler));
        self
    }

    pub fn handler_for(&self, event: EventKind) -> Option<HandlerKind> {
        self.routes
            .iter()
            .find(|(kind, _)| *kind == event)
            .map(|(_, handler)| *handler)
    }
}

/// Routes normalized events into the engine and returns replies as values.
///
/// Per-event failures never escape: an interaction failure becomes the
/// ephemeral apology, a passive event failure is logged and dropped.
pub struct EventDispatcher {
    store: Arc<dyn RecognitionStore>,
    table: DispatchTable,
    leaderboard_limit: Option<i64>,
}

impl EventDispatcher {
    pub fn new(store: Arc<dyn RecognitionStore>, table: DispatchTable) -> Self {
        Self {
            store,
            table,
            leaderboard_limit: None,
        }
    }

    /// Overrides the default leaderboard length.
    pub fn with_leaderboard_limit(mut self, limit: Option<i64>) -> Self {
        self.leaderboard_limit = limit;
        self
    }

    pub async fn dispatch(&self, event: &RecognitionEvent) -> Vec<OutboundReply> {
        match (self.table.handler_for(event.kind()), event) {
            (Some(HandlerKind::Reconcile), RecognitionEvent::Message(message)) => {
                self.dispatch_message(message).await
            }
            (Some(HandlerKind::LeaderboardCommand), RecognitionEvent::AppMention(mention)) => {
                self.dispatch_mention(mention).await
            }
            (Some(HandlerKind::Interaction), RecognitionEvent::Interaction(interaction)) => {
                self.dispatch_interaction(interaction).await
            }
            _ => Vec::new(),
        }
    }

    async fn dispatch_message(&self, event: &MessageEvent) -> Vec<OutboundReply> {
        match reconcile_message_event(self.store.as_ref(), event).await {
            Ok(ReconcileOutcome::AwaitingConfirmation { prompt }) => {
                vec![OutboundReply::Prompt(prompt)]
            }
            Ok(_) => Vec::new(),
            Err(error) => {
                // No reply channel exists for passive message events.
                eprintln!("kudos message event failed: {error:#}");
                Vec::new()
            }
        }
    }

    async fn dispatch_mention(&self, event: &AppMentionEvent) -> Vec<OutboundReply> {
        let Some(MentionCommand::Leaderboard) = parse_mention_command(&event.text) else {
            return Vec::new();
        };

        match leaderboard_reply(self.store.as_ref(), &event.team, self.leaderboard_limit).await {
            Ok(text) => vec![OutboundReply::Channel {
                channel: event.channel.clone(),
                thread_id: event.thread_id.clone(),
                text,
            }],
            Err(error) => {
                eprintln!("kudos leaderboard command failed: {error:#}");
                Vec::new()
            }
        }
    }

    async fn dispatch_interaction(&self, event: &InteractionEvent) -> Vec<OutboundReply> {
        let Some(action) = ActionId::parse(&event.action_id) else {
            return Vec::new();
        };

        let (result, reply_thread) = match action {
            ActionId::AwardDecision {
                thread_id,
                reaction_id,
                message_id,
                ..
            } => {
                let confirm = event.value.as_deref() == Some("1");
                let result = apply_award_decision(
                    self.store.as_ref(),
                    &event.team,
                    &event.channel,
                    &message_id,
                    reaction_id,
                    confirm,
                )
                .await;
                (result, thread_id)
            }
            ActionId::OptOutToggle { .. } => {
                let result = apply_opt_out_toggle(
                    self.store.as_ref(),
                    &event.team,
                    &event.user,
                    event.selected_options.is_empty(),
                )
                .await;
                (result, None)
            }
        };

        let text = match result {
            Ok(text) => text,
            Err(error) => {
                eprintln!("kudos interaction failed: {error:#}");
                OPERATION_FAILED_REPLY
            }
        };

        vec![OutboundReply::Interaction {
            response_url: event.response_url.clone(),
            thread_id: reply_thread,
            text: text.to_string(),
        }]
    }
}
