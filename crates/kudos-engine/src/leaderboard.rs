//! Leaderboard read path.

use anyhow::{Context, Result};
use kudos_store::RecognitionStore;
use kudos_types::LeaderboardEntry;

/// Fallback length when the requested limit is missing or non-positive.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

pub const EMPTY_LEADERBOARD_REPLY: &str =
    "No awards yet. Mention a teammate with an emoji to hand out the first one.";

/// Clamps a requested limit to a usable value.
pub fn normalize_leaderboard_limit(requested: Option<i64>) -> usize {
    match requested {
        Some(value) if value > 0 => {
            usize::try_from(value).unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        }
        _ => DEFAULT_LEADERBOARD_LIMIT,
    }
}

/// Renders ranked entries as reply text; an empty ledger gets its own line.
pub fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_LEADERBOARD_REPLY.to_string();
    }

    let mut lines = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let noun = if entry.award_count == 1 {
            "award"
        } else {
            "awards"
        };
        lines.push(format!(
            "{}. <@{}> {} {}",
            position + 1,
            entry.recipient,
            entry.award_count,
            noun
        ));
    }
    lines.join("\n")
}

/// Reads and renders the ranked leaderboard for one team.
pub async fn leaderboard_reply(
    store: &dyn RecognitionStore,
    team: &str,
    requested_limit: Option<i64>,
) -> Result<String> {
    let limit = normalize_leaderboard_limit(requested_limit);
    let entries = store
        .leaderboard(team, limit)
        .await
        .context("failed to read leaderboard")?;
    Ok(render_leaderboard(&entries))
}
