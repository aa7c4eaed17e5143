//! Foundational low-level utilities shared across kudos crates.
//!
//! Provides the atomic file-write helper used by runtime state persistence
//! and the time utilities used by event logs and staleness checks.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, is_stale_unix};
