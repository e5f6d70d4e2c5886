use crate::clock::now_unix_ms;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

pub const BALANCE_PREFERENCE_KEY: &str = "portfolioBalance";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    /// Empty when the balance was never set or was cleared.
    pub value: String,
    pub updated_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBalanceArgs {
    pub value: String,
}

impl SaveBalanceArgs {
    pub fn normalize(self) -> Result<String, AppError> {
        let value = self.value.trim().to_string();
        if value.is_empty() {
            return Ok(value);
        }

        let parsed = value.parse::<f64>()?;
        if !parsed.is_finite() {
            return Err(AppError::InvalidArgument(format!(
                "balance must be a finite number, got '{value}'"
            )));
        }
        Ok(value)
    }
}

pub async fn get_balance(pool: &SqlitePool) -> Result<BalanceSnapshot, AppError> {
    let row = sqlx::query("SELECT value, updated_at_ms FROM user_preferences WHERE name = ?")
        .bind(BALANCE_PREFERENCE_KEY)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(BalanceSnapshot {
            value: row.try_get("value")?,
            updated_at_ms: Some(row.try_get("updated_at_ms")?),
        }),
        None => Ok(BalanceSnapshot {
            value: String::new(),
            updated_at_ms: None,
        }),
    }
}

pub async fn save_balance(
    pool: &SqlitePool,
    args: SaveBalanceArgs,
) -> Result<BalanceSnapshot, AppError> {
    let value = args.normalize()?;
    let updated_at_ms = now_unix_ms();

    sqlx::query(
        "INSERT INTO user_preferences (name, value, updated_at_ms) VALUES (?, ?, ?) \
         ON CONFLICT(name) DO UPDATE SET value=excluded.value, updated_at_ms=excluded.updated_at_ms",
    )
    .bind(BALANCE_PREFERENCE_KEY)
    .bind(value)
    .bind(updated_at_ms)
    .execute(pool)
    .await?;

    get_balance(pool).await
}
