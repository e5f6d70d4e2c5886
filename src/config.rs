use crate::feed::types::StartFeedArgs;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_DB_FILENAME: &str = "dashboard.db";

/// Process configuration derived from environment variables. Feed values are
/// left unvalidated here; `StartFeedArgs::normalize` owns the range checks.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feed: StartFeedArgs,
    pub data_dir: PathBuf,
    pub db_filename: String,
}

fn lookup_str(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn lookup_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup_str(lookup, name).and_then(|value| value.parse().ok())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let feed = StartFeedArgs {
            url: lookup_str(&lookup, "FEED_URL"),
            reconnect_base_ms: lookup_parsed(&lookup, "FEED_RECONNECT_BASE_MS"),
            reconnect_max_ms: lookup_parsed(&lookup, "FEED_RECONNECT_MAX_MS"),
            render_interval_ms: lookup_parsed(&lookup, "DASHBOARD_RENDER_INTERVAL_MS"),
            sensor_max_rows: lookup_parsed(&lookup, "SENSOR_MAX_ROWS"),
            sensor_columns: lookup_parsed(&lookup, "SENSOR_GRID_COLUMNS"),
            forecast_max_rows: lookup_parsed(&lookup, "FORECAST_MAX_ROWS"),
            forecast_columns: lookup_parsed(&lookup, "FORECAST_GRID_COLUMNS"),
        };

        Self {
            feed,
            data_dir: PathBuf::from(
                lookup_str(&lookup, "APP_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ),
            db_filename: lookup_str(&lookup, "APP_DB_FILENAME")
                .unwrap_or_else(|| DEFAULT_DB_FILENAME.to_string()),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_filename)
    }
}
