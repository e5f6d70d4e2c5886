use crate::commands::health::health;
use crate::commands::preferences::{balance_get, balance_save};
use crate::db::preferences::SaveBalanceArgs;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    ShowBalance,
    SetBalance(String),
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleReply {
    Message(String),
    Quit,
}

/// Parses one stdin line. Blank lines yield `Ok(None)`.
pub fn parse_console_command(line: &str) -> Result<Option<ConsoleCommand>, AppError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match (verb.to_ascii_lowercase().as_str(), rest) {
        ("balance", "") => ConsoleCommand::ShowBalance,
        ("balance", value) => ConsoleCommand::SetBalance(value.to_string()),
        ("status", "") => ConsoleCommand::Status,
        ("quit" | "exit", "") => ConsoleCommand::Quit,
        _ => {
            return Err(AppError::InvalidArgument(format!(
                "unknown command '{line}' (expected: balance [value], status, quit)"
            )))
        }
    };
    Ok(Some(command))
}

pub async fn execute_console_command(
    state: &AppState,
    command: ConsoleCommand,
) -> Result<ConsoleReply, AppError> {
    let reply = match command {
        ConsoleCommand::ShowBalance => {
            let snapshot = balance_get(state).await?;
            ConsoleReply::Message(format_balance(&snapshot.value))
        }
        ConsoleCommand::SetBalance(value) => {
            let snapshot = balance_save(state, SaveBalanceArgs { value }).await?;
            ConsoleReply::Message(format!("saved; {}", format_balance(&snapshot.value)))
        }
        ConsoleCommand::Status => ConsoleReply::Message(health(state).await?.summary()),
        ConsoleCommand::Quit => ConsoleReply::Quit,
    };
    Ok(reply)
}

pub fn format_balance(value: &str) -> String {
    if value.is_empty() {
        "balance: (not set)".to_string()
    } else {
        format!("balance: {value}")
    }
}
