//! Shared data types for the kudos award pipeline.
//!
//! Defines the durable award records, the normalized inbound event model
//! consumed by the reconciliation engine, and the interaction action-id
//! protocol used by confirmation prompts.

pub mod action_id;
pub mod event;
pub mod record;

pub use action_id::ActionId;
pub use event::{
    AppMentionEvent, ConfirmationPrompt, EventKind, InteractionEvent, MessageEvent, MessageRef,
    MessageSubtype, OutboundReply, RecognitionEvent,
};
pub use record::{
    Award, LeaderboardEntry, MessageBinding, PendingAward, PendingSelector, PurgeSummary,
};
