//! Recognition store abstractions and in-memory backend.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::RwLock;

mod sqlite;

pub use kudos_types::{
    Award, LeaderboardEntry, MessageBinding, PendingAward, PendingSelector, PurgeSummary,
};
pub use sqlite::SqliteRecognitionStore;

/// Result type for recognition store operations.
pub type StoreResult<T> = Result<T, RecognitionStoreError>;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum RecognitionStoreError {
    #[error("invalid persisted value for '{field}': {value}")]
    InvalidPersistedValue { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Async store contract used by the reconciliation and interaction engines.
///
/// Award and pending-award writes are idempotent on the record's
/// `(team, message_id, recipient, emoji)` key, so redelivered events and
/// repeated callbacks are harmless.
#[async_trait]
pub trait RecognitionStore: Send + Sync {
    async fn record_awards(&self, awards: &[Award]) -> StoreResult<u64>;
    async fn record_pending_awards(&self, pending: &[PendingAward]) -> StoreResult<u64>;

    /// Deletes every award and pending award bound to the message.
    async fn purge_message(&self, binding: &MessageBinding) -> StoreResult<PurgeSummary>;
    /// Applies the purge-then-insert of one message event as a single unit;
    /// readers never observe the half-applied state.
    async fn reconcile_message(
        &self,
        purge: Option<&MessageBinding>,
        awards: &[Award],
        pending: &[PendingAward],
    ) -> StoreResult<PurgeSummary>;

    /// Promotes matching pending awards to confirmed awards and returns the
    /// number of pending records resolved; an already-resolved selector
    /// resolves zero records.
    async fn commit_pending(&self, selector: &PendingSelector) -> StoreResult<u64>;
    async fn discard_pending(&self, selector: &PendingSelector) -> StoreResult<u64>;

    async fn set_confirmation_opt_out(&self, team: &str, user: &str) -> StoreResult<()>;
    async fn clear_confirmation_opt_out(&self, team: &str, user: &str) -> StoreResult<()>;
    async fn is_confirmation_opted_out(&self, team: &str, user: &str) -> StoreResult<bool>;

    /// Ranked award counts per recipient: descending count, ties broken by
    /// ascending recipient id, capped at `limit`.
    async fn leaderboard(&self, team: &str, limit: usize) -> StoreResult<Vec<LeaderboardEntry>>;

    async fn awards_for_message(&self, binding: &MessageBinding) -> StoreResult<Vec<Award>>;
    async fn pending_for_message(&self, binding: &MessageBinding)
        -> StoreResult<Vec<PendingAward>>;

    /// Cheap reachability probe for the status endpoint.
    async fn ping(&self) -> StoreResult<()>;
}

/// In-memory implementation for tests and local experimentation.
#[derive(Debug, Default)]
pub struct InMemoryRecognitionStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    awards: Vec<Award>,
    pending: Vec<PendingAward>,
    opt_outs: HashSet<(String, String)>,
}

impl InMemoryRecognitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreInner {
    fn record_awards(&mut self, awards: &[Award]) -> u64 {
        let mut recorded = 0;
        for award in awards {
            let exists = self
                .awards
                .iter()
                .any(|existing| award_key_matches(existing, award));
            if exists {
                continue;
            }
            self.awards.push(award.clone());
            recorded += 1;
        }
        recorded
    }

    fn record_pending(&mut self, pending: &[PendingAward]) -> u64 {
        let mut recorded = 0;
        for candidate in pending {
            let exists = self
                .pending
                .iter()
                .any(|existing| pending_key_matches(existing, candidate));
            if exists {
                continue;
            }
            self.pending.push(candidate.clone());
            recorded += 1;
        }
        recorded
    }

    fn purge_message(&mut self, binding: &MessageBinding) -> PurgeSummary {
        let awards_before = self.awards.len();
        self.awards
            .retain(|award| !(award.team == binding.team && award.message_id == binding.message_id));
        let pending_before = self.pending.len();
        self.pending.retain(|pending| {
            !(pending.team == binding.team && pending.message_id == binding.message_id)
        });
        PurgeSummary {
            awards_removed: (awards_before - self.awards.len()) as u64,
            pending_removed: (pending_before - self.pending.len()) as u64,
        }
    }
}

#[async_trait]
impl RecognitionStore for InMemoryRecognitionStore {
    async fn record_awards(&self, awards: &[Award]) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        Ok(inner.record_awards(awards))
    }

    async fn record_pending_awards(&self, pending: &[PendingAward]) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        Ok(inner.record_pending(pending))
    }

    async fn purge_message(&self, binding: &MessageBinding) -> StoreResult<PurgeSummary> {
        let mut inner = self.inner.write().await;
        Ok(inner.purge_message(binding))
    }

    async fn reconcile_message(
        &self,
        purge: Option<&MessageBinding>,
        awards: &[Award],
        pending: &[PendingAward],
    ) -> StoreResult<PurgeSummary> {
        let mut inner = self.inner.write().await;
        let summary = match purge {
            Some(binding) => inner.purge_message(binding),
            None => PurgeSummary::default(),
        };
        inner.record_awards(awards);
        inner.record_pending(pending);
        Ok(summary)
    }

    async fn commit_pending(&self, selector: &PendingSelector) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let selected: Vec<PendingAward> = inner
            .pending
            .iter()
            .filter(|pending| pending_matches_selector(pending, selector))
            .cloned()
            .collect();
        if selected.is_empty() {
            return Ok(0);
        }

        inner
            .pending
            .retain(|pending| !pending_matches_selector(pending, selector));
        let resolved = selected.len() as u64;
        let promoted: Vec<Award> = selected
            .into_iter()
            .map(PendingAward::into_award)
            .collect();
        inner.record_awards(&promoted);
        Ok(resolved)
    }

    async fn discard_pending(&self, selector: &PendingSelector) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.pending.len();
        inner
            .pending
            .retain(|pending| !pending_matches_selector(pending, selector));
        Ok((before - inner.pending.len()) as u64)
    }

    async fn set_confirmation_opt_out(&self, team: &str, user: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.opt_outs.insert((team.to_string(), user.to_string()));
        Ok(())
    }

    async fn clear_confirmation_opt_out(&self, team: &str, user: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.opt_outs.remove(&(team.to_string(), user.to_string()));
        Ok(())
    }

    async fn is_confirmation_opted_out(&self, team: &str, user: &str) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .opt_outs
            .contains(&(team.to_string(), user.to_string())))
    }

    async fn leaderboard(&self, team: &str, limit: usize) -> StoreResult<Vec<LeaderboardEntry>> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for award in inner.awards.iter().filter(|award| award.team == team) {
            *counts.entry(award.recipient.as_str()).or_insert(0) += 1;
        }

        let mut entries: Vec<LeaderboardEntry> = counts
            .into_iter()
            .map(|(recipient, award_count)| LeaderboardEntry {
                recipient: recipient.to_string(),
                award_count,
            })
            .collect();
        entries.sort_by(|left, right| {
            right
                .award_count
                .cmp(&left.award_count)
                .then_with(|| left.recipient.cmp(&right.recipient))
        });
        entries.truncate(limit);
        Ok(entries)
    }

    async fn awards_for_message(&self, binding: &MessageBinding) -> StoreResult<Vec<Award>> {
        let inner = self.inner.read().await;
        Ok(inner
            .awards
            .iter()
            .filter(|award| award.team == binding.team && award.message_id == binding.message_id)
            .cloned()
            .collect())
    }

    async fn pending_for_message(
        &self,
        binding: &MessageBinding,
    ) -> StoreResult<Vec<PendingAward>> {
        let inner = self.inner.read().await;
        Ok(inner
            .pending
            .iter()
            .filter(|pending| {
                pending.team == binding.team && pending.message_id == binding.message_id
            })
            .cloned()
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

fn award_key_matches(left: &Award, right: &Award) -> bool {
    left.team == right.team
        && left.message_id == right.message_id
        && left.recipient == right.recipient
        && left.emoji == right.emoji
}

fn pending_key_matches(left: &PendingAward, right: &PendingAward) -> bool {
    left.team == right.team
        && left.message_id == right.message_id
        && left.recipient == right.recipient
        && left.emoji == right.emoji
}

fn pending_matches_selector(pending: &PendingAward, selector: &PendingSelector) -> bool {
    pending.team == selector.team
        && pending.channel == selector.channel
        && pending.message_id == selector.message_id
        && selector
            .emoji
            .as_deref()
            .map_or(true, |emoji| pending.emoji == emoji)
}
