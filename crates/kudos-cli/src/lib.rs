//! CLI argument model and startup validation for the kudos bot binary.
//!
//! Exposes the clap-backed flag set plus the checks the binary runs before
//! opening any Slack connection.

mod cli_args;
mod validation;

pub use cli_args::Cli;
pub use validation::validate_cli;
