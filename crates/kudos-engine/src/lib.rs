//! Award reconciliation engine.
//!
//! Turns message lifecycle events into ledger mutations: extraction of
//! recognition candidates, pending-confirmation routing, edit/delete
//! supersession, interaction callbacks, and the ranked leaderboard read
//! path. Everything here is transport-free; the dispatcher returns replies
//! as values for the runtime to deliver.

pub mod command;
pub mod dispatch;
pub mod extract;
pub mod interaction;
pub mod leaderboard;
pub mod reconcile;

pub use command::{parse_mention_command, MentionCommand};
pub use dispatch::{DispatchTable, EventDispatcher, HandlerKind};
pub use extract::{extract_recognition, RecognitionExtraction};
pub use interaction::{
    apply_award_decision, apply_opt_out_toggle, AWARD_CONFIRMED_REPLY, AWARD_DISMISSED_REPLY,
    OPERATION_FAILED_REPLY, OPT_OUT_CLEARED_REPLY, OPT_OUT_RECORDED_REPLY,
};
pub use leaderboard::{
    leaderboard_reply, normalize_leaderboard_limit, render_leaderboard,
    DEFAULT_LEADERBOARD_LIMIT, EMPTY_LEADERBOARD_REPLY,
};
pub use reconcile::{
    confirmation_required, reconcile_message_event, ReconcileOutcome, SkipReason,
};
