use std::net::SocketAddr;

use anyhow::{bail, Result};

use crate::Cli;

/// Fail-fast checks run before the bot opens any connection.
///
/// Numeric ranges are already enforced by the flag value parsers; this covers
/// what clap cannot see, like blank tokens supplied through the environment.
pub fn validate_cli(cli: &Cli) -> Result<()> {
    if cli.slack_app_token.trim().is_empty() {
        bail!("--slack-app-token (or KUDOS_SLACK_APP_TOKEN) must not be empty");
    }
    if cli.slack_bot_token.trim().is_empty() {
        bail!("--slack-bot-token (or KUDOS_SLACK_BOT_TOKEN) must not be empty");
    }
    let api_base = cli.slack_api_base.trim();
    if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
        bail!(
            "--slack-api-base must be an http(s) URL, got '{}'",
            cli.slack_api_base
        );
    }
    if cli.health_bind.parse::<SocketAddr>().is_err() {
        bail!(
            "invalid --health-bind '{}': expected host:port",
            cli.health_bind
        );
    }
    Ok(())
}
