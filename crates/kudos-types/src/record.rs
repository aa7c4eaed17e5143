use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confirmed recognition record attributing one signal token to one
/// recipient on one message.
///
/// Unique per `(team, message_id, recipient, emoji)`; re-recording the same
/// award is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Award {
    pub team: String,
    pub message_id: String,
    pub recipient: String,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

impl Award {
    /// Creates an award stamped with the current time.
    pub fn new(
        team: impl Into<String>,
        message_id: impl Into<String>,
        recipient: impl Into<String>,
        emoji: impl Into<String>,
    ) -> Self {
        Self {
            team: team.into(),
            message_id: message_id.into(),
            recipient: recipient.into(),
            emoji: emoji.into(),
            created_at: Utc::now(),
        }
    }
}

/// Award candidate awaiting explicit human confirmation.
///
/// Exists only between extraction and confirm/cancel; an edit or delete of
/// the source message purges it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAward {
    pub team: String,
    pub channel: String,
    pub message_id: String,
    pub thread_id: Option<String>,
    pub recipient: String,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAward {
    /// Creates a pending award stamped with the current time.
    pub fn new(
        team: impl Into<String>,
        channel: impl Into<String>,
        message_id: impl Into<String>,
        thread_id: Option<String>,
        recipient: impl Into<String>,
        emoji: impl Into<String>,
    ) -> Self {
        Self {
            team: team.into(),
            channel: channel.into(),
            message_id: message_id.into(),
            thread_id,
            recipient: recipient.into(),
            emoji: emoji.into(),
            created_at: Utc::now(),
        }
    }

    /// Promotes this candidate to a confirmed award.
    pub fn into_award(self) -> Award {
        Award {
            team: self.team,
            message_id: self.message_id,
            recipient: self.recipient,
            emoji: self.emoji,
            created_at: Utc::now(),
        }
    }
}

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub recipient: String,
    pub award_count: u64,
}

/// Identifies the message whose prior award records an event supersedes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBinding {
    pub team: String,
    pub message_id: String,
}

impl MessageBinding {
    pub fn new(team: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            message_id: message_id.into(),
        }
    }
}

/// Selects pending awards for promotion or discard.
///
/// `emoji: None` matches every pending award recorded for the message;
/// `Some` restricts the operation to that one signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSelector {
    pub team: String,
    pub channel: String,
    pub message_id: String,
    pub emoji: Option<String>,
}

/// Counts of records removed by a message purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSummary {
    pub awards_removed: u64,
    pub pending_removed: u64,
}

impl PurgeSummary {
    /// Total records removed across both stores.
    pub fn total(self) -> u64 {
        self.awards_removed.saturating_add(self.pending_removed)
    }
}
