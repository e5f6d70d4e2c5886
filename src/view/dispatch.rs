use crate::error::AppError;
use crate::feed::types::FeedEvent;
use crate::view::reconcile::{
    apply_chart, apply_forecast_readings, apply_order_book, apply_sensor_readings,
    ReconcileOutcome,
};
use crate::view::Dashboard;
use tracing::{debug, warn};

/// Per-event tally. Batched events contribute one count per site entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub applied: u32,
    pub unchanged: u32,
    pub dropped: u32,
    pub skipped: u32,
    pub rejected: u32,
}

impl DispatchReport {
    pub fn changed(&self) -> bool {
        self.applied > 0
    }

    fn record(&mut self, kind: &str, result: Result<ReconcileOutcome, AppError>) {
        match result {
            Ok(ReconcileOutcome::Applied) => self.applied += 1,
            Ok(ReconcileOutcome::Unchanged) => self.unchanged += 1,
            Ok(ReconcileOutcome::Dropped) => {
                debug!(event = kind, "order book entry without strike dropped");
                self.dropped += 1;
            }
            Ok(ReconcileOutcome::Skipped) => {
                debug!(event = kind, "update for site without a row skipped");
                self.skipped += 1;
            }
            Err(error) => {
                warn!(event = kind, %error, "event update rejected");
                self.rejected += 1;
            }
        }
    }
}

/// Routes one decoded event to its reconciler path. Never fails: handler
/// errors are logged and counted, and the dashboard keeps whatever state the
/// other entries of the event produced.
pub fn dispatch(dashboard: &mut Dashboard, event: FeedEvent) -> DispatchReport {
    let mut report = DispatchReport::default();
    let layout = dashboard.layout;
    let Dashboard { store, tree, .. } = &mut *dashboard;

    match event {
        FeedEvent::OrderBook(update) => {
            report.record("orderbook", apply_order_book(store, tree, &update));
        }
        FeedEvent::SensorPoll(updates) => {
            for update in updates {
                let result =
                    update.and_then(|update| apply_sensor_readings(store, tree, &layout, update));
                report.record("SensorPoll", result);
            }
        }
        FeedEvent::ForecastPoll(update) => {
            report.record(
                "ForecastPoll",
                apply_forecast_readings(store, tree, &layout, update),
            );
        }
        FeedEvent::Graph(entries) => {
            for entry in entries {
                let result = entry.and_then(|update| apply_chart(store, tree, update));
                report.record("graph", result);
            }
        }
        FeedEvent::Unknown(kind) => {
            let error = AppError::UnknownEventType(kind.unwrap_or_else(|| "<missing>".to_string()));
            debug!(%error, "event ignored");
        }
    }

    if report.changed() {
        dashboard.mark_changed();
    }
    report
}
