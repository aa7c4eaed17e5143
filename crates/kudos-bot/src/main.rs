mod bootstrap_helpers;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use kudos_cli::{validate_cli, Cli};
use kudos_engine::{DispatchTable, EventDispatcher};
use kudos_slack_runtime::{
    run_health_server, run_socket_runtime, HealthServerConfig, SocketRuntimeConfig,
};
use kudos_store::SqliteRecognitionStore;

use crate::bootstrap_helpers::init_tracing;

fn socket_config(cli: &Cli, dispatcher: Arc<EventDispatcher>) -> SocketRuntimeConfig {
    SocketRuntimeConfig {
        dispatcher,
        state_dir: cli.state_dir.clone(),
        api_base: cli.slack_api_base.clone(),
        app_token: cli.slack_app_token.clone(),
        bot_token: cli.slack_bot_token.clone(),
        bot_user_id: cli.bot_user_id.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        processed_event_cap: cli.processed_event_cap,
        max_event_age_seconds: cli.max_event_age_seconds,
        reconnect_delay: Duration::from_millis(cli.reconnect_delay_ms),
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    }
}

async fn run_cli(cli: Cli) -> Result<()> {
    validate_cli(&cli)?;

    let store = Arc::new(SqliteRecognitionStore::new(&cli.db_path).with_context(|| {
        format!("failed to open award database at {}", cli.db_path.display())
    })?);
    let dispatcher = Arc::new(
        EventDispatcher::new(store.clone(), DispatchTable::standard())
            .with_leaderboard_limit(cli.leaderboard_limit),
    );

    let health_config = HealthServerConfig {
        bind: cli.health_bind.clone(),
        state_path: cli.state_dir.join("state.json"),
    };
    let health_store = store.clone();

    // The socket loop and the health probe run concurrently; when either
    // returns, the process exits with that result.
    tokio::select! {
        result = run_socket_runtime(socket_config(&cli, dispatcher)) => result,
        result = run_health_server(health_config, health_store) => result,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli).await
}
