//! Message lifecycle reconciliation.
//!
//! One entry point, [`reconcile_message_event`], owns the edit/delete
//! supersession policy: purge whatever the previous message binding produced,
//! then re-run extraction on the current text and route the candidates either
//! straight to the ledger or into the pending store behind a confirmation
//! prompt.

use anyhow::{Context, Result};
use kudos_store::RecognitionStore;
use kudos_types::{
    Award, ConfirmationPrompt, MessageBinding, MessageEvent, MessageSubtype, PendingAward,
    PurgeSummary,
};

use crate::extract::extract_recognition;

/// Disposition of one message lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Nothing actionable in the event.
    Skipped { reason: SkipReason },
    /// Prior records were purged and nothing replaced them.
    Purged { summary: PurgeSummary },
    /// Awards committed directly because the recipient opted out of
    /// confirmation.
    Committed { awards: u64 },
    /// Candidates held pending confirmation; the prompt should be rendered.
    AwaitingConfirmation { prompt: ConfirmationPrompt },
}

/// Why an event produced no ledger change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No recipient/signal pair was found in the text.
    NoCandidates,
    /// More than one distinct user was mentioned.
    AmbiguousRecipients,
    /// An edit or delete arrived without a usable message binding.
    MissingBinding,
}

/// Returns true when the recipient must confirm before awards commit.
///
/// A failed preference read counts as confirmation required, so a storage
/// hiccup can never commit an award silently.
pub async fn confirmation_required(
    store: &dyn RecognitionStore,
    team: &str,
    user: &str,
) -> bool {
    match store.is_confirmation_opted_out(team, user).await {
        Ok(opted_out) => !opted_out,
        Err(error) => {
            eprintln!("kudos preference read failed for {team}/{user}; requiring confirmation: {error}");
            true
        }
    }
}

/// Applies one message lifecycle event against the stores.
pub async fn reconcile_message_event(
    store: &dyn RecognitionStore,
    event: &MessageEvent,
) -> Result<ReconcileOutcome> {
    let normalized = normalize_event(event);

    if normalized.is_delete {
        let Some(binding) = normalized.purge else {
            return Ok(ReconcileOutcome::Skipped {
                reason: SkipReason::MissingBinding,
            });
        };
        let summary = store
            .purge_message(&binding)
            .await
            .context("failed to purge records of deleted message")?;
        return Ok(ReconcileOutcome::Purged { summary });
    }

    let Some(body) = normalized.body else {
        // An edit payload without a usable current body still supersedes
        // whatever the previous binding produced.
        if let Some(binding) = normalized.purge {
            let summary = store
                .purge_message(&binding)
                .await
                .context("failed to purge records of superseded message")?;
            return Ok(ReconcileOutcome::Purged { summary });
        }
        return Ok(ReconcileOutcome::Skipped {
            reason: SkipReason::MissingBinding,
        });
    };

    let extraction = extract_recognition(&body.text);
    let Some(recipient) = extraction.recipient().filter(|_| !extraction.signals.is_empty())
    else {
        let reason = if extraction.mentions.len() > 1 {
            SkipReason::AmbiguousRecipients
        } else {
            SkipReason::NoCandidates
        };
        // Editing away all recognition content must still purge the old
        // records.
        if let Some(binding) = normalized.purge {
            let summary = store
                .reconcile_message(Some(&binding), &[], &[])
                .await
                .context("failed to purge records of edited message")?;
            return Ok(ReconcileOutcome::Purged { summary });
        }
        return Ok(ReconcileOutcome::Skipped { reason });
    };

    if !confirmation_required(store, &body.team, recipient).await {
        let awards: Vec<Award> = extraction
            .signals
            .iter()
            .map(|signal| Award::new(&body.team, &body.message_id, recipient, signal))
            .collect();
        store
            .reconcile_message(normalized.purge.as_ref(), &awards, &[])
            .await
            .context("failed to commit extracted awards")?;
        return Ok(ReconcileOutcome::Committed {
            awards: awards.len() as u64,
        });
    }

    let pending: Vec<PendingAward> = extraction
        .signals
        .iter()
        .map(|signal| {
            PendingAward::new(
                &body.team,
                &event.channel,
                &body.message_id,
                event.thread_id.clone(),
                recipient,
                signal,
            )
        })
        .collect();
    store
        .reconcile_message(normalized.purge.as_ref(), &[], &pending)
        .await
        .context("failed to record pending awards")?;

    Ok(ReconcileOutcome::AwaitingConfirmation {
        prompt: ConfirmationPrompt {
            team: body.team,
            channel: event.channel.clone(),
            message_id: body.message_id,
            thread_id: event.thread_id.clone(),
            recipient: recipient.to_string(),
            emojis: extraction.signals,
        },
    })
}

#[derive(Debug, Clone, PartialEq)]
struct NormalizedEvent {
    purge: Option<MessageBinding>,
    body: Option<CurrentBody>,
    is_delete: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct CurrentBody {
    team: String,
    message_id: String,
    text: String,
}

/// Resolves which binding an event supersedes and which text it carries now.
fn normalize_event(event: &MessageEvent) -> NormalizedEvent {
    match event.subtype {
        None => NormalizedEvent {
            purge: None,
            body: current_body(&event.team, &event.message_id, &event.text),
            is_delete: false,
        },
        Some(MessageSubtype::MessageChanged) => {
            let body = event.current.as_ref().and_then(|current| {
                let team = current.team.as_deref().unwrap_or(&event.team);
                current_body(team, &current.message_id, &current.text)
            });
            NormalizedEvent {
                purge: previous_binding(event),
                body,
                is_delete: false,
            }
        }
        Some(MessageSubtype::MessageDeleted) => NormalizedEvent {
            purge: previous_binding(event),
            body: None,
            is_delete: true,
        },
    }
}

fn current_body(team: &str, message_id: &str, text: &str) -> Option<CurrentBody> {
    if message_id.is_empty() {
        return None;
    }
    Some(CurrentBody {
        team: team.to_string(),
        message_id: message_id.to_string(),
        text: text.to_string(),
    })
}

fn previous_binding(event: &MessageEvent) -> Option<MessageBinding> {
    let previous = event.previous.as_ref()?;
    if previous.message_id.is_empty() {
        return None;
    }
    let team = previous.team.as_deref().unwrap_or(&event.team);
    Some(MessageBinding::new(team, previous.message_id.as_str()))
}
