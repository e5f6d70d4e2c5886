use crate::error::AppError;
use crate::feed::pipeline::run_feed;
use crate::feed::types::{
    FeedConnectionState, FeedSession, FeedStatusSnapshot, FeedStopResult, StartFeedArgs,
};
use crate::state::{AppState, FeedHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Starts the feed task, replacing any running one. The dashboard keeps its
/// contents; only the layout is taken from the new configuration.
pub async fn start_feed(
    state: &AppState,
    args: Option<StartFeedArgs>,
) -> Result<FeedSession, AppError> {
    let config = args.unwrap_or_default().normalize()?;

    let existing_handle = {
        let mut feed_slot = state.feed.lock().await;
        feed_slot.take()
    };
    if let Some(handle) = existing_handle {
        handle.cancellation_token.cancel();
        let _ = handle.join_handle.await;
    }

    state.dashboard.lock().layout = config.layout;

    let cancellation_token = CancellationToken::new();
    let task_token = cancellation_token.clone();
    let status_store = Arc::clone(&state.feed_status);
    let dashboard = Arc::clone(&state.dashboard);
    let runtime_config = config.clone();

    let join_handle = tokio::spawn(async move {
        run_feed(runtime_config, dashboard, status_store, task_token).await;
    });

    {
        let mut feed_slot = state.feed.lock().await;
        *feed_slot = Some(FeedHandle {
            cancellation_token,
            join_handle,
        });
    }

    info!(url = %config.url, "feed started");
    Ok(FeedSession::from_config(&config))
}

pub async fn stop_feed(state: &AppState) -> Result<FeedStopResult, AppError> {
    let existing_handle = {
        let mut feed_slot = state.feed.lock().await;
        feed_slot.take()
    };

    let stopped = if let Some(handle) = existing_handle {
        handle.cancellation_token.cancel();
        let _ = handle.join_handle.await;
        true
    } else {
        false
    };

    {
        let mut writable = state.feed_status.write().await;
        writable.state = FeedConnectionState::Stopped;
        writable.reason = Some("feed stopped by command".to_string());
    }

    Ok(FeedStopResult { stopped })
}

pub async fn feed_status(state: &AppState) -> Result<FeedStatusSnapshot, AppError> {
    let snapshot = state.feed_status.read().await.clone();
    Ok(snapshot)
}
