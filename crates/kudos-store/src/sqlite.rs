//! SQLite-backed `RecognitionStore` implementation with durable persistence.

use crate::{
    Award, LeaderboardEntry, MessageBinding, PendingAward, PendingSelector, PurgeSummary,
    RecognitionStore, RecognitionStoreError, StoreResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistent SQLite store backend for the award ledger.
#[derive(Debug)]
pub struct SqliteRecognitionStore {
    db_path: PathBuf,
}

impl SqliteRecognitionStore {
    /// Creates a SQLite-backed store at `path`, creating schema if needed.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self { db_path };
        let connection = store.open_connection()?;
        store.initialize_schema(&connection)?;
        Ok(store)
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(connection)
    }

    fn initialize_schema(&self, connection: &Connection) -> StoreResult<()> {
        connection.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS awards (
                award_id INTEGER PRIMARY KEY AUTOINCREMENT,
                team_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL,
                emoji TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_awards_unique
                ON awards (team_id, message_id, recipient_id, emoji);

            CREATE INDEX IF NOT EXISTS idx_awards_team_recipient
                ON awards (team_id, recipient_id);

            CREATE TABLE IF NOT EXISTS pending_awards (
                pending_id INTEGER PRIMARY KEY AUTOINCREMENT,
                team_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                thread_id TEXT NULL,
                recipient_id TEXT NOT NULL,
                emoji TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_awards_unique
                ON pending_awards (team_id, message_id, recipient_id, emoji);

            CREATE INDEX IF NOT EXISTS idx_pending_awards_message
                ON pending_awards (team_id, message_id);

            CREATE TABLE IF NOT EXISTS confirmation_opt_outs (
                team_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (team_id, user_id)
            );
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl RecognitionStore for SqliteRecognitionStore {
    async fn record_awards(&self, awards: &[Award]) -> StoreResult<u64> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction()?;
        let inserted = insert_awards(&transaction, awards)?;
        transaction.commit()?;
        Ok(inserted)
    }

    async fn record_pending_awards(&self, pending: &[PendingAward]) -> StoreResult<u64> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction()?;
        let inserted = insert_pending(&transaction, pending)?;
        transaction.commit()?;
        Ok(inserted)
    }

    async fn purge_message(&self, binding: &MessageBinding) -> StoreResult<PurgeSummary> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let summary = purge_binding(&transaction, binding)?;
        transaction.commit()?;
        Ok(summary)
    }

    async fn reconcile_message(
        &self,
        purge: Option<&MessageBinding>,
        awards: &[Award],
        pending: &[PendingAward],
    ) -> StoreResult<PurgeSummary> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let summary = match purge {
            Some(binding) => purge_binding(&transaction, binding)?,
            None => PurgeSummary::default(),
        };
        insert_awards(&transaction, awards)?;
        insert_pending(&transaction, pending)?;
        transaction.commit()?;
        Ok(summary)
    }

    async fn commit_pending(&self, selector: &PendingSelector) -> StoreResult<u64> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let selected: Vec<(String, String)> = {
            let mut statement = transaction.prepare(
                r#"
                SELECT recipient_id, emoji
                FROM pending_awards
                WHERE team_id = ?1 AND channel_id = ?2 AND message_id = ?3
                  AND (?4 IS NULL OR emoji = ?4)
                "#,
            )?;
            let rows = statement.query_map(
                params![
                    selector.team,
                    selector.channel,
                    selector.message_id,
                    selector.emoji,
                ],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )?;
            let mut selected = Vec::new();
            for row in rows {
                selected.push(row?);
            }
            selected
        };

        if selected.is_empty() {
            transaction.commit()?;
            return Ok(0);
        }

        let promoted_at = timestamp_to_db(Utc::now());
        for (recipient, emoji) in &selected {
            transaction.execute(
                r#"
                INSERT INTO awards (team_id, message_id, recipient_id, emoji, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (team_id, message_id, recipient_id, emoji) DO NOTHING
                "#,
                params![
                    selector.team,
                    selector.message_id,
                    recipient,
                    emoji,
                    promoted_at,
                ],
            )?;
        }

        let resolved = transaction.execute(
            r#"
            DELETE FROM pending_awards
            WHERE team_id = ?1 AND channel_id = ?2 AND message_id = ?3
              AND (?4 IS NULL OR emoji = ?4)
            "#,
            params![
                selector.team,
                selector.channel,
                selector.message_id,
                selector.emoji,
            ],
        )? as u64;
        transaction.commit()?;
        Ok(resolved)
    }

    async fn discard_pending(&self, selector: &PendingSelector) -> StoreResult<u64> {
        let connection = self.open_connection()?;
        let removed = connection.execute(
            r#"
            DELETE FROM pending_awards
            WHERE team_id = ?1 AND channel_id = ?2 AND message_id = ?3
              AND (?4 IS NULL OR emoji = ?4)
            "#,
            params![
                selector.team,
                selector.channel,
                selector.message_id,
                selector.emoji,
            ],
        )? as u64;
        Ok(removed)
    }

    async fn set_confirmation_opt_out(&self, team: &str, user: &str) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            r#"
            INSERT INTO confirmation_opt_outs (team_id, user_id, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (team_id, user_id) DO NOTHING
            "#,
            params![team, user, timestamp_to_db(Utc::now())],
        )?;
        Ok(())
    }

    async fn clear_confirmation_opt_out(&self, team: &str, user: &str) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "DELETE FROM confirmation_opt_outs WHERE team_id = ?1 AND user_id = ?2",
            params![team, user],
        )?;
        Ok(())
    }

    async fn is_confirmation_opted_out(&self, team: &str, user: &str) -> StoreResult<bool> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                "SELECT 1 FROM confirmation_opt_outs WHERE team_id = ?1 AND user_id = ?2",
                params![team, user],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    async fn leaderboard(&self, team: &str, limit: usize) -> StoreResult<Vec<LeaderboardEntry>> {
        let connection = self.open_connection()?;
        let capped_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut statement = connection.prepare(
            r#"
            SELECT recipient_id, COUNT(*) AS award_count
            FROM awards
            WHERE team_id = ?1
            GROUP BY recipient_id
            ORDER BY award_count DESC, recipient_id ASC
            LIMIT ?2
            "#,
        )?;
        let rows = statement.query_map(params![team, capped_limit], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (recipient, award_count) = row?;
            entries.push(LeaderboardEntry {
                recipient,
                award_count: i64_to_u64("award_count", award_count)?,
            });
        }
        Ok(entries)
    }

    async fn awards_for_message(&self, binding: &MessageBinding) -> StoreResult<Vec<Award>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(
            r#"
            SELECT team_id, message_id, recipient_id, emoji, created_at
            FROM awards
            WHERE team_id = ?1 AND message_id = ?2
            ORDER BY award_id
            "#,
        )?;
        let rows = statement.query_map(params![binding.team, binding.message_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut awards = Vec::new();
        for row in rows {
            let (team, message_id, recipient, emoji, created_at) = row?;
            awards.push(Award {
                team,
                message_id,
                recipient,
                emoji,
                created_at: timestamp_from_db(&created_at)?,
            });
        }
        Ok(awards)
    }

    async fn pending_for_message(
        &self,
        binding: &MessageBinding,
    ) -> StoreResult<Vec<PendingAward>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(
            r#"
            SELECT team_id, channel_id, message_id, thread_id, recipient_id, emoji, created_at
            FROM pending_awards
            WHERE team_id = ?1 AND message_id = ?2
            ORDER BY pending_id
            "#,
        )?;
        let rows = statement.query_map(params![binding.team, binding.message_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut pending = Vec::new();
        for row in rows {
            let (team, channel, message_id, thread_id, recipient, emoji, created_at) = row?;
            pending.push(PendingAward {
                team,
                channel,
                message_id,
                thread_id,
                recipient,
                emoji,
                created_at: timestamp_from_db(&created_at)?,
            });
        }
        Ok(pending)
    }

    async fn ping(&self) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

fn insert_awards(connection: &Connection, awards: &[Award]) -> StoreResult<u64> {
    let mut inserted = 0;
    for award in awards {
        inserted += connection.execute(
            r#"
            INSERT INTO awards (team_id, message_id, recipient_id, emoji, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (team_id, message_id, recipient_id, emoji) DO NOTHING
            "#,
            params![
                award.team,
                award.message_id,
                award.recipient,
                award.emoji,
                timestamp_to_db(award.created_at),
            ],
        )? as u64;
    }
    Ok(inserted)
}

fn insert_pending(connection: &Connection, pending: &[PendingAward]) -> StoreResult<u64> {
    let mut inserted = 0;
    for candidate in pending {
        inserted += connection.execute(
            r#"
            INSERT INTO pending_awards (
                team_id, channel_id, message_id, thread_id, recipient_id, emoji, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (team_id, message_id, recipient_id, emoji) DO NOTHING
            "#,
            params![
                candidate.team,
                candidate.channel,
                candidate.message_id,
                candidate.thread_id,
                candidate.recipient,
                candidate.emoji,
                timestamp_to_db(candidate.created_at),
            ],
        )? as u64;
    }
    Ok(inserted)
}

fn purge_binding(connection: &Connection, binding: &MessageBinding) -> StoreResult<PurgeSummary> {
    let awards_removed = connection.execute(
        "DELETE FROM awards WHERE team_id = ?1 AND message_id = ?2",
        params![binding.team, binding.message_id],
    )? as u64;
    let pending_removed = connection.execute(
        "DELETE FROM pending_awards WHERE team_id = ?1 AND message_id = ?2",
        params![binding.team, binding.message_id],
    )? as u64;
    Ok(PurgeSummary {
        awards_removed,
        pending_removed,
    })
}

fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn timestamp_from_db(value: &str) -> StoreResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn i64_to_u64(field: &'static str, value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| RecognitionStoreError::InvalidPersistedValue {
        field,
        value: value.to_string(),
    })
}
