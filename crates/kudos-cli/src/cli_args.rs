use std::path::PathBuf;

use clap::Parser;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_leaderboard_limit(value: &str) -> Result<i64, String> {
    let parsed = value
        .parse::<i64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if !(1..=100).contains(&parsed) {
        return Err("value must be in range 1..=100".to_string());
    }
    Ok(parsed)
}

/// Flags accepted by the kudos bot binary.
#[derive(Debug, Parser)]
#[command(
    name = "kudos-bot",
    about = "Slack bot that turns emoji recognition into tracked awards",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "KUDOS_SLACK_APP_TOKEN",
        hide_env_values = true,
        help = "Slack app-level token used to open Socket Mode connections (xapp-...)"
    )]
    pub slack_app_token: String,

    #[arg(
        long,
        env = "KUDOS_SLACK_BOT_TOKEN",
        hide_env_values = true,
        help = "Slack bot token used for Web API calls (xoxb-...)"
    )]
    pub slack_bot_token: String,

    #[arg(
        long,
        env = "KUDOS_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Base URL for the Slack Web API"
    )]
    pub slack_api_base: String,

    #[arg(
        long,
        env = "KUDOS_BOT_USER_ID",
        help = "Bot user id used to skip self-authored events; resolved via auth.test when omitted"
    )]
    pub bot_user_id: Option<String>,

    #[arg(
        long,
        env = "KUDOS_DB_PATH",
        default_value = ".kudos/kudos.db",
        help = "SQLite database path for awards and pending confirmations"
    )]
    pub db_path: PathBuf,

    #[arg(
        long,
        env = "KUDOS_STATE_DIR",
        default_value = ".kudos/state",
        help = "Directory for transport state and event audit logs"
    )]
    pub state_dir: PathBuf,

    #[arg(
        long,
        env = "KUDOS_LEADERBOARD_LIMIT",
        value_parser = parse_leaderboard_limit,
        help = "Rows shown by the leaderboard reply, 1 to 100 (defaults to 10)"
    )]
    pub leaderboard_limit: Option<i64>,

    #[arg(
        long,
        env = "KUDOS_HEALTH_BIND",
        default_value = "127.0.0.1:8080",
        help = "host:port the HTTP health probe listens on"
    )]
    pub health_bind: String,

    #[arg(
        long,
        env = "KUDOS_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Slack Web API request timeout in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long,
        env = "KUDOS_RECONNECT_DELAY_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Delay before reopening a failed socket connection, in milliseconds"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long,
        env = "KUDOS_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable Slack Web API failures"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long,
        env = "KUDOS_RETRY_BASE_DELAY_MS",
        default_value_t = 250,
        value_parser = parse_positive_u64,
        help = "Base backoff delay between Slack Web API retries, in milliseconds"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long,
        env = "KUDOS_PROCESSED_EVENT_CAP",
        default_value_t = 512,
        value_parser = parse_positive_usize,
        help = "How many processed event keys are remembered for redelivery dedup"
    )]
    pub processed_event_cap: usize,

    #[arg(
        long,
        env = "KUDOS_MAX_EVENT_AGE_SECONDS",
        default_value_t = 3_600,
        value_parser = parse_positive_u64,
        help = "Events older than this many seconds are acknowledged but not dispatched"
    )]
    pub max_event_age_seconds: u64,
}
