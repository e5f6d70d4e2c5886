use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const SECONDS_PER_DAY: i64 = 86_400;
/// EST as a fixed offset; daylight saving is not applied.
const EST_OFFSET_SECONDS: i64 = -5 * 3_600;
const TARGET_SECONDS_OF_DAY: i64 = 3 * 3_600;
const TICK_MS: u64 = 1_000;

pub fn now_unix_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis().min(i64::MAX as u128) as i64,
        Err(_) => 0,
    }
}

/// Whole seconds until the next 03:00 EST. Exactly at 03:00 the next target
/// is a full day away.
pub fn seconds_until_target(now: DateTime<Utc>) -> i64 {
    let local_seconds = (now.timestamp() + EST_OFFSET_SECONDS).rem_euclid(SECONDS_PER_DAY);
    match (TARGET_SECONDS_OF_DAY - local_seconds).rem_euclid(SECONDS_PER_DAY) {
        0 => SECONDS_PER_DAY,
        remaining => remaining,
    }
}

pub fn countdown_text(now: DateTime<Utc>) -> String {
    let remaining = seconds_until_target(now);
    let hours = remaining / 3_600;
    let minutes = (remaining % 3_600) / 60;
    let seconds = remaining % 60;
    format!("Time to 3 AM EST: {hours}:{minutes:02}:{seconds:02}")
}

/// Publishes the countdown once per second until cancelled or until every
/// receiver is gone.
pub async fn run_countdown(sender: watch::Sender<String>, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                if sender.is_closed() {
                    break;
                }
                sender.send_replace(countdown_text(Utc::now()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 4, hour, minute, second)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn counts_down_to_three_am_est() {
        assert_eq!(countdown_text(at(7, 59, 59)), "Time to 3 AM EST: 0:00:01");
        assert_eq!(countdown_text(at(8, 0, 0)), "Time to 3 AM EST: 24:00:00");
        assert_eq!(countdown_text(at(8, 0, 1)), "Time to 3 AM EST: 23:59:59");
    }

    #[test]
    fn wraps_across_utc_midnight() {
        // 23:30 UTC is 18:30 EST; 8h30m remain.
        assert_eq!(countdown_text(at(23, 30, 0)), "Time to 3 AM EST: 8:30:00");
        assert_eq!(seconds_until_target(at(2, 0, 0)), 6 * 3_600);
    }

    #[test]
    fn unix_clock_matches_chrono() {
        let before = Utc::now().timestamp_millis();
        let now = now_unix_ms();
        let after = Utc::now().timestamp_millis();
        assert!(before <= now && now <= after);
    }

    #[tokio::test]
    async fn publishes_first_value_immediately_and_stops_on_cancel() {
        let (sender, mut receiver) = watch::channel(String::new());
        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(run_countdown(sender, cancel_token.clone()));

        receiver
            .changed()
            .await
            .expect("countdown should publish");
        assert!(receiver.borrow().starts_with("Time to 3 AM EST: "));

        cancel_token.cancel();
        task.await.expect("countdown task should finish");
    }
}
