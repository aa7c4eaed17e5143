use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subtype discriminator for message lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSubtype {
    MessageChanged,
    MessageDeleted,
}

/// Message body carried inside an edit or delete payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageRef {
    pub message_id: String,
    pub team: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// Normalized message lifecycle event (posted, edited, or deleted).
///
/// For a plain post the top-level `message_id`/`text` describe the message.
/// For edits `current` carries the new body and `previous` the superseded
/// binding; for deletes only `previous` is meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub team: String,
    pub channel: String,
    pub thread_id: Option<String>,
    pub message_id: String,
    #[serde(default)]
    pub text: String,
    pub subtype: Option<MessageSubtype>,
    pub current: Option<MessageRef>,
    pub previous: Option<MessageRef>,
}

impl MessageEvent {
    /// Creates a plain posted-message event.
    pub fn posted(
        team: impl Into<String>,
        channel: impl Into<String>,
        message_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            team: team.into(),
            channel: channel.into(),
            thread_id: None,
            message_id: message_id.into(),
            text: text.into(),
            subtype: None,
            current: None,
            previous: None,
        }
    }
}

/// App mention carrying a potential command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMentionEvent {
    pub team: String,
    pub channel: String,
    pub thread_id: Option<String>,
    pub text: String,
}

/// Interaction callback emitted by a confirmation prompt element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub team: String,
    pub channel: String,
    pub user: String,
    pub action_id: String,
    pub value: Option<String>,
    #[serde(default)]
    pub selected_options: Vec<Value>,
    pub response_url: Option<String>,
}

/// Inbound event routed through the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognitionEvent {
    Message(MessageEvent),
    AppMention(AppMentionEvent),
    Interaction(InteractionEvent),
}

impl RecognitionEvent {
    /// Route key used by the dispatch table.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::AppMention(_) => EventKind::AppMention,
            Self::Interaction(_) => EventKind::Interaction,
        }
    }
}

/// Route key for one family of inbound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    AppMention,
    Interaction,
}

/// Data needed to render one interactive confirmation prompt.
///
/// One prompt covers every candidate extracted from the message; the
/// `reaction` slot of its action ids names the signal only when there is
/// exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationPrompt {
    pub team: String,
    pub channel: String,
    pub message_id: String,
    pub thread_id: Option<String>,
    pub recipient: String,
    pub emojis: Vec<String>,
}

impl ConfirmationPrompt {
    /// Returns the reaction slot for this prompt's action ids.
    pub fn reaction(&self) -> Option<&str> {
        match self.emojis.as_slice() {
            [single] => Some(single.as_str()),
            _ => None,
        }
    }

    /// Returns "it" for a single candidate and "them" otherwise.
    pub fn candidate_noun(&self) -> &'static str {
        if self.emojis.len() == 1 {
            "it"
        } else {
            "them"
        }
    }
}

/// Reply routed back toward the chat platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundReply {
    /// Plain channel message, optionally threaded.
    Channel {
        channel: String,
        thread_id: Option<String>,
        text: String,
    },
    /// Interactive confirmation prompt for freshly recorded pending awards.
    Prompt(ConfirmationPrompt),
    /// Ephemeral reply that replaces the interactive prompt it answers.
    Interaction {
        response_url: Option<String>,
        thread_id: Option<String>,
        text: String,
    },
}
