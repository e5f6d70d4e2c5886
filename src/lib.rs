pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod feed;
pub mod state;
pub mod view;

use chrono::Utc;
use clock::{countdown_text, run_countdown};
use commands::console::{execute_console_command, parse_console_command, ConsoleReply};
use commands::feed::{start_feed, stop_feed};
use config::AppConfig;
use db::initialize_pool;
use db::preferences::get_balance;
use display::{run_display, DisplaySources};
use error::AppError;
use state::AppState;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs the dashboard until `quit`, Ctrl-C, or a startup failure.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let feed_args = config.feed.clone();
    let feed_config = feed_args.clone().normalize()?;

    let db_pool = initialize_pool(&config).await?;
    let balance = get_balance(&db_pool).await?.value;
    info!(db = %config.db_path().display(), "preferences loaded");
    let state = AppState::new(db_pool, feed_config.layout, balance);
    let shutdown = CancellationToken::new();

    let (countdown_tx, countdown_rx) = watch::channel(countdown_text(Utc::now()));
    let clock_handle = tokio::spawn(run_countdown(countdown_tx, shutdown.clone()));

    start_feed(&state, Some(feed_args)).await?;

    let sources = DisplaySources {
        dashboard: Arc::clone(&state.dashboard),
        countdown: countdown_rx,
        balance: state.balance.subscribe(),
    };
    let display_token = shutdown.clone();
    let render_interval_ms = feed_config.render_interval_ms;
    let display_handle = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        if let Err(error) = run_display(sources, render_interval_ms, &mut stdout, display_token).await
        {
            warn!(%error, "display loop failed");
        }
    });

    let outcome = run_console(&state).await;

    shutdown.cancel();
    stop_feed(&state).await?;
    let _ = clock_handle.await;
    let _ = display_handle.await;
    state.db_pool.close().await;
    info!("dashboard stopped");
    outcome
}

async fn run_console(state: &AppState) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupt received");
                return Ok(());
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            // stdin closed; keep serving until interrupted.
            tokio::signal::ctrl_c().await?;
            info!("interrupt received");
            return Ok(());
        };

        let command = match parse_console_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                println!("{error}");
                continue;
            }
        };

        match execute_console_command(state, command).await {
            Ok(ConsoleReply::Message(message)) => println!("{message}"),
            Ok(ConsoleReply::Quit) => return Ok(()),
            Err(error) => println!("error: {error}"),
        }
    }
}
