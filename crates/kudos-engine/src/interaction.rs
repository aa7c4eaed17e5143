//! Confirmation and opt-out callback handling.
//!
//! Handlers return the reply text as a value; the dispatcher owns the
//! boundary that turns a failure into the ephemeral apology.

use anyhow::{Context, Result};
use kudos_store::RecognitionStore;
use kudos_types::PendingSelector;

pub const AWARD_CONFIRMED_REPLY: &str = ">Great, the award was added :tada:!";
pub const AWARD_DISMISSED_REPLY: &str = ">Ok, not adding as award :crying_cat_face:.";
pub const OPT_OUT_RECORDED_REPLY: &str = "Ok, I will stop asking before adding awards.";
pub const OPT_OUT_CLEARED_REPLY: &str = "Ok, I will ask for confirmation again.";
pub const OPERATION_FAILED_REPLY: &str = "Oops, could not perform the operation :crying_cat_face:.";

/// Applies a confirm-or-ignore decision and returns the reply text.
///
/// A decision on an already-resolved key (purged by an edit or delete, or
/// answered twice) changes nothing and still gets its normal reply.
pub async fn apply_award_decision(
    store: &dyn RecognitionStore,
    team: &str,
    channel: &str,
    message_id: &str,
    reaction_id: Option<String>,
    confirm: bool,
) -> Result<&'static str> {
    let selector = PendingSelector {
        team: team.to_string(),
        channel: channel.to_string(),
        message_id: message_id.to_string(),
        emoji: reaction_id,
    };

    if confirm {
        store
            .commit_pending(&selector)
            .await
            .context("failed to promote pending awards")?;
        Ok(AWARD_CONFIRMED_REPLY)
    } else {
        store
            .discard_pending(&selector)
            .await
            .context("failed to discard pending awards")?;
        Ok(AWARD_DISMISSED_REPLY)
    }
}

/// Applies the stop-asking checkbox state and returns the ack text.
///
/// An empty selection re-enables confirmation prompts.
pub async fn apply_opt_out_toggle(
    store: &dyn RecognitionStore,
    team: &str,
    user: &str,
    selection_empty: bool,
) -> Result<&'static str> {
    if selection_empty {
        store
            .clear_confirmation_opt_out(team, user)
            .await
            .context("failed to clear confirmation opt-out")?;
        Ok(OPT_OUT_CLEARED_REPLY)
    } else {
        store
            .set_confirmation_opt_out(team, user)
            .await
            .context("failed to record confirmation opt-out")?;
        Ok(OPT_OUT_RECORDED_REPLY)
    }
}
