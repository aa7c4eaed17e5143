//! Interaction action-id protocol.
//!
//! Confirmation prompts multiplex two action families over one delimited
//! string. The wire shapes are
//! `addEmoji_<threadId|null>_<reactionId|null>_<messageId>_<0|1>` for the
//! confirm/ignore buttons and `doNotAskMe_<threadId|null>` for the stop-asking
//! checkbox. Decoding happens exactly once, at the boundary, into [`ActionId`].

const SEPARATOR: char = '_';
const NULL_SLOT: &str = "null";
const AWARD_DECISION_PREFIX: &str = "addEmoji";
const OPT_OUT_PREFIX: &str = "doNotAskMe";

/// Decoded interaction action id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionId {
    /// Confirm-or-ignore decision on the pending awards of one message.
    AwardDecision {
        thread_id: Option<String>,
        reaction_id: Option<String>,
        message_id: String,
        is_primary: bool,
    },
    /// Checkbox toggling the do-not-ask confirmation preference.
    OptOutToggle { thread_id: Option<String> },
}

impl ActionId {
    /// Encodes this action id into its wire string.
    pub fn encode(&self) -> String {
        match self {
            Self::AwardDecision {
                thread_id,
                reaction_id,
                message_id,
                is_primary,
            } => {
                let thread = encode_slot(thread_id.as_deref());
                let reaction = encode_slot(reaction_id.as_deref());
                let flag = if *is_primary { "1" } else { "0" };
                format!(
                    "{AWARD_DECISION_PREFIX}{SEPARATOR}{thread}{SEPARATOR}{reaction}{SEPARATOR}{message_id}{SEPARATOR}{flag}"
                )
            }
            Self::OptOutToggle { thread_id } => {
                let thread = encode_slot(thread_id.as_deref());
                format!("{OPT_OUT_PREFIX}{SEPARATOR}{thread}")
            }
        }
    }

    /// Decodes a wire action id; anything malformed yields `None`.
    ///
    /// The reaction slot may itself contain the separator (emoji names such
    /// as `:thumbs_up:`), so the decision shape is resolved from both ends
    /// rather than by naive splitting.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(rest) = strip_family_prefix(raw, AWARD_DECISION_PREFIX) {
            let (thread_slot, rest) = rest.split_once(SEPARATOR)?;
            let (rest, flag_slot) = rest.rsplit_once(SEPARATOR)?;
            let (reaction_slot, message_id) = rest.rsplit_once(SEPARATOR)?;
            if thread_slot.is_empty() || reaction_slot.is_empty() || message_id.is_empty() {
                return None;
            }
            let is_primary = match flag_slot {
                "1" => true,
                "0" => false,
                _ => return None,
            };
            return Some(Self::AwardDecision {
                thread_id: decode_slot(thread_slot),
                reaction_id: decode_slot(reaction_slot),
                message_id: message_id.to_string(),
                is_primary,
            });
        }

        if let Some(thread_slot) = strip_family_prefix(raw, OPT_OUT_PREFIX) {
            if thread_slot.is_empty() || thread_slot.contains(SEPARATOR) {
                return None;
            }
            return Some(Self::OptOutToggle {
                thread_id: decode_slot(thread_slot),
            });
        }

        None
    }
}

fn strip_family_prefix<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
    raw.strip_prefix(prefix)?.strip_prefix(SEPARATOR)
}

fn encode_slot(value: Option<&str>) -> &str {
    value.filter(|slot| !slot.is_empty()).unwrap_or(NULL_SLOT)
}

fn decode_slot(slot: &str) -> Option<String> {
    if slot == NULL_SLOT {
        None
    } else {
        Some(slot.to_string())
    }
}
