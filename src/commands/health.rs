use crate::{error::AppError, feed::types::FeedStatusSnapshot, state::AppState};
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Instant;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_ms: u128,
    pub db: &'static str,
    pub feed: FeedStatusSnapshot,
    pub site_rows: usize,
    pub revision: u64,
}

impl HealthResponse {
    pub fn summary(&self) -> String {
        let feed = &self.feed;
        let mut line = format!(
            "status {} | uptime {}s | db {} | feed {} {} (attempt {}) | frames {} dropped {} applied {} | sites {} | revision {}",
            self.status,
            self.uptime_ms / 1_000,
            self.db,
            feed.state.as_str(),
            feed.url,
            feed.reconnect_attempt,
            feed.frames_received,
            feed.frames_dropped,
            feed.events_applied,
            self.site_rows,
            self.revision,
        );
        if let Some(reason) = &feed.reason {
            line.push_str(" | ");
            line.push_str(reason);
        }
        line
    }
}

pub async fn build_health_response(
    started_at: Instant,
    pool: &SqlitePool,
    feed: FeedStatusSnapshot,
    site_rows: usize,
    revision: u64,
) -> HealthResponse {
    let db_status = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
    {
        Ok(_) => "ok",
        Err(_) => "error",
    };

    HealthResponse {
        status: "ok",
        uptime_ms: started_at.elapsed().as_millis(),
        db: db_status,
        feed,
        site_rows,
        revision,
    }
}

pub async fn health(state: &AppState) -> Result<HealthResponse, AppError> {
    let feed = state.feed_status.read().await.clone();
    let (site_rows, revision) = {
        let dashboard = state.dashboard.lock();
        (dashboard.tree().rows().len(), dashboard.revision())
    };
    Ok(build_health_response(state.started_at, &state.db_pool, feed, site_rows, revision).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ViewLayout;

    #[tokio::test]
    async fn health_reports_ok_status_and_db_health() {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should initialize");
        let state = AppState::new(pool, ViewLayout::default(), String::new());

        let response = health(&state).await.expect("health should build");

        assert_eq!(response.status, "ok");
        assert_eq!(response.db, "ok");
        assert!(response.uptime_ms <= 1_000);
        assert_eq!(response.site_rows, 0);
        assert!(response.summary().contains("feed stopped"));
        assert!(response.summary().ends_with("feed idle"));
    }
}
