use crate::db::preferences::{get_balance, save_balance, BalanceSnapshot, SaveBalanceArgs};
use crate::error::AppError;
use crate::state::AppState;

pub async fn balance_get(state: &AppState) -> Result<BalanceSnapshot, AppError> {
    get_balance(&state.db_pool).await
}

/// Persists the balance and republishes it to the display.
pub async fn balance_save(
    state: &AppState,
    args: SaveBalanceArgs,
) -> Result<BalanceSnapshot, AppError> {
    let snapshot = save_balance(&state.db_pool, args).await?;
    state.balance.send_replace(snapshot.value.clone());
    Ok(snapshot)
}
