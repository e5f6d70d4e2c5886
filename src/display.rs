use crate::commands::console::format_balance;
use crate::error::AppError;
use crate::view::render::render_tree;
use crate::view::Dashboard;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct DisplaySources {
    pub dashboard: Arc<Mutex<Dashboard>>,
    pub countdown: watch::Receiver<String>,
    pub balance: watch::Receiver<String>,
}

impl DisplaySources {
    /// Returns a full frame when the tree or the balance changed since the
    /// last call. The countdown alone never triggers a redraw.
    fn next_frame(&mut self, last_revision: &mut Option<u64>) -> Option<String> {
        let balance_changed = self.balance.has_changed().unwrap_or(false);
        let (revision, tree_text) = {
            let dashboard = self.dashboard.lock();
            let revision = dashboard.revision();
            if *last_revision == Some(revision) && !balance_changed {
                return None;
            }
            (revision, render_tree(dashboard.tree()))
        };
        *last_revision = Some(revision);

        let balance = self.balance.borrow_and_update().clone();
        let countdown = self.countdown.borrow().clone();
        Some(compose_frame(&countdown, &balance, &tree_text))
    }
}

pub fn compose_frame(countdown: &str, balance: &str, tree_text: &str) -> String {
    let mut frame = String::new();
    frame.push_str(countdown);
    frame.push('\n');
    frame.push_str(&format_balance(balance));
    frame.push('\n');
    if tree_text.is_empty() {
        frame.push_str("(waiting for data)\n");
    } else {
        frame.push_str(tree_text);
    }
    frame.push('\n');
    frame
}

pub async fn run_display<W>(
    mut sources: DisplaySources,
    interval_ms: u64,
    writer: &mut W,
    cancel_token: CancellationToken,
) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_revision = None;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(frame) = sources.next_frame(&mut last_revision) {
                    writer.write_all(frame.as_bytes()).await?;
                    writer.flush().await?;
                }
            }
        }
    }
    Ok(())
}
