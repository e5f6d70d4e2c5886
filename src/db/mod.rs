pub mod preferences;

use crate::config::AppConfig;
use crate::error::AppError;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};

fn resolve_db_path(config: &AppConfig) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(&config.data_dir)?;
    Ok(config.db_path())
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn initialize_pool_from_path(path: &Path) -> Result<SqlitePool, AppError> {
    let connect_options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(connect_options).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

pub async fn initialize_pool(config: &AppConfig) -> Result<SqlitePool, AppError> {
    let db_path = resolve_db_path(config)?;
    initialize_pool_from_path(&db_path).await
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT_DB: AtomicU64 = AtomicU64::new(0);

    pub fn unique_db_path() -> PathBuf {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock should be after unix epoch")
            .as_nanos();
        let sequence = NEXT_DB.fetch_add(1, Ordering::Relaxed);

        std::env::temp_dir().join(format!("site-dashboard-{timestamp}-{sequence}.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::unique_db_path;
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db_path = unique_db_path();

        let pool = initialize_pool_from_path(&db_path)
            .await
            .expect("pool initialization should succeed");

        run_migrations(&pool)
            .await
            .expect("running migrations multiple times should succeed");

        let metadata_rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM app_metadata")
            .fetch_one(&pool)
            .await
            .expect("app_metadata table must exist and be queryable");
        assert_eq!(metadata_rows, 1);

        let preference_rows =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_preferences")
                .fetch_one(&pool)
                .await
                .expect("user_preferences table must exist and be queryable");
        assert_eq!(preference_rows, 0);

        drop(pool);
        let _ = std::fs::remove_file(db_path);
    }

    #[tokio::test]
    async fn initialize_pool_creates_data_dir() {
        let data_dir = unique_db_path().with_extension("d");
        let config = AppConfig {
            data_dir: data_dir.clone(),
            ..AppConfig::from_lookup(|_| None)
        };

        let pool = initialize_pool(&config)
            .await
            .expect("pool initialization should succeed");
        assert!(config.db_path().exists());

        drop(pool);
        let _ = std::fs::remove_dir_all(data_dir);
    }
}
