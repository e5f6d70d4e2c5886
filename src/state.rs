use crate::feed::types::{FeedStatusSnapshot, DEFAULT_FEED_URL};
use crate::view::{Dashboard, ViewLayout};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct FeedHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: JoinHandle<()>,
}

pub struct AppState {
    pub started_at: Instant,
    pub db_pool: SqlitePool,
    pub feed: Mutex<Option<FeedHandle>>,
    pub feed_status: Arc<RwLock<FeedStatusSnapshot>>,
    pub dashboard: Arc<parking_lot::Mutex<Dashboard>>,
    pub balance: watch::Sender<String>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, layout: ViewLayout, balance: String) -> Self {
        let feed_status =
            FeedStatusSnapshot::stopped(DEFAULT_FEED_URL.to_string(), Some("feed idle".to_string()));

        let (balance, _) = watch::channel(balance);

        Self {
            started_at: Instant::now(),
            db_pool,
            feed: Mutex::new(None),
            feed_status: Arc::new(RwLock::new(feed_status)),
            dashboard: Arc::new(parking_lot::Mutex::new(Dashboard::new(layout))),
            balance,
        }
    }
}
