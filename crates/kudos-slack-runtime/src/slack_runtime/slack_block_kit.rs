//! Block Kit rendering for the interactive confirmation prompt.

use kudos_types::{ActionId, ConfirmationPrompt};
use serde_json::{json, Value};

pub(super) const CONFIRM_DECISION_VALUE: &str = "1";
pub(super) const IGNORE_DECISION_VALUE: &str = "0";
pub(super) const OPT_OUT_CAPTION: &str = "Please, stop asking me.";

/// Section text above the buttons; doubles as the notification fallback.
pub(super) fn confirmation_fallback_text(prompt: &ConfirmationPrompt) -> String {
    let award_noun = if prompt.emojis.len() == 1 {
        "an award"
    } else {
        "awards"
    };
    format!(
        "I spotted {} for <@{}>. Should I add {} as {}?",
        prompt.emojis.join(" "),
        prompt.recipient,
        prompt.candidate_noun(),
        award_noun,
    )
}

/// Renders the confirmation prompt as `chat.postMessage` blocks: one section
/// with the question and one actions row with confirm/ignore buttons plus the
/// stop-asking checkbox.
pub(super) fn confirmation_blocks(prompt: &ConfirmationPrompt) -> Value {
    let noun = prompt.candidate_noun();
    let reaction_id = prompt.reaction().map(str::to_string);
    let confirm_action = ActionId::AwardDecision {
        thread_id: prompt.thread_id.clone(),
        reaction_id: reaction_id.clone(),
        message_id: prompt.message_id.clone(),
        is_primary: true,
    };
    let ignore_action = ActionId::AwardDecision {
        thread_id: prompt.thread_id.clone(),
        reaction_id,
        message_id: prompt.message_id.clone(),
        is_primary: false,
    };
    let opt_out_action = ActionId::OptOutToggle {
        thread_id: prompt.thread_id.clone(),
    };

    json!([
        {
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": confirmation_fallback_text(prompt),
            },
        },
        {
            "type": "actions",
            "elements": [
                {
                    "type": "button",
                    "style": "primary",
                    "action_id": confirm_action.encode(),
                    "value": CONFIRM_DECISION_VALUE,
                    "text": {
                        "type": "plain_text",
                        "emoji": true,
                        "text": format!("Please, add {noun}!"),
                    },
                },
                {
                    "type": "button",
                    "style": "danger",
                    "action_id": ignore_action.encode(),
                    "value": IGNORE_DECISION_VALUE,
                    "text": {
                        "type": "plain_text",
                        "emoji": true,
                        "text": format!("Ignore {noun}!"),
                    },
                },
                {
                    "type": "checkboxes",
                    "action_id": opt_out_action.encode(),
                    "options": [
                        {
                            "text": { "type": "plain_text", "text": OPT_OUT_CAPTION },
                            "value": "opt-out",
                        },
                    ],
                },
            ],
        },
    ])
}
