//! Slack Socket Mode transport for the kudos award bot.
//!
//! Connects to Slack, normalizes socket envelopes into recognition events,
//! feeds them through the award dispatcher, and delivers the resulting
//! replies: channel messages, interactive confirmation prompts, and the
//! ephemeral responses that replace answered prompts. Also hosts the status
//! probe consumed by deployment health checks.

pub mod health;
mod slack_helpers;
pub mod slack_runtime;

pub use health::{run_health_server, HealthServerConfig};
pub use slack_runtime::{run_socket_runtime, SocketRuntimeConfig, TransportHealthSnapshot};
