use crate::clock::now_unix_ms;
use crate::feed::connection::{connect_feed_stream, FeedWsStream};
use crate::feed::types::{decode_frame, FeedConfig, FeedConnectionState, FeedStatusSnapshot};
use crate::view::dispatch::dispatch;
use crate::view::Dashboard;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STATUS_HEARTBEAT_MS: u64 = 1_000;
const STATUS_ERROR_THROTTLE_MS: u64 = 500;
const RECONNECT_MAX_EXPONENT: u32 = 6;
const RECONNECT_JITTER_MS: u64 = 250;

#[derive(Debug, Default)]
struct FeedTelemetry {
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    events_applied: AtomicU64,
    has_last_frame_at_ms: AtomicBool,
    last_frame_at_ms: AtomicI64,
}

impl FeedTelemetry {
    fn record_frame(&self, received_at_ms: i64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.last_frame_at_ms
            .store(received_at_ms, Ordering::Relaxed);
        self.has_last_frame_at_ms.store(true, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_applied(&self, applied: u32) {
        self.events_applied
            .fetch_add(u64::from(applied), Ordering::Relaxed);
    }

    fn fill(&self, snapshot: &mut FeedStatusSnapshot) {
        snapshot.frames_received = self.frames_received.load(Ordering::Relaxed);
        snapshot.frames_dropped = self.frames_dropped.load(Ordering::Relaxed);
        snapshot.events_applied = self.events_applied.load(Ordering::Relaxed);
        snapshot.last_frame_at_ms = if self.has_last_frame_at_ms.load(Ordering::Relaxed) {
            Some(self.last_frame_at_ms.load(Ordering::Relaxed))
        } else {
            None
        };
    }
}

#[derive(Debug, Default)]
struct StatusPublishThrottle {
    last_state: Option<FeedConnectionState>,
    last_reason: Option<String>,
    last_emit: Option<Instant>,
}

struct StreamRuntimeContext<'a> {
    config: &'a FeedConfig,
    dashboard: &'a Arc<Mutex<Dashboard>>,
    status_store: &'a Arc<RwLock<FeedStatusSnapshot>>,
    telemetry: &'a FeedTelemetry,
    status_throttle: &'a Mutex<StatusPublishThrottle>,
}

#[derive(Debug, PartialEq, Eq)]
enum StreamDirective {
    Continue,
    Reconnect(String),
}

/// Owns the connection lifecycle until `cancel_token` fires: connect, apply
/// frames one at a time, and reconnect with backoff when the link drops.
/// The dashboard is never reset, so the view survives reconnects.
pub async fn run_feed(
    config: FeedConfig,
    dashboard: Arc<Mutex<Dashboard>>,
    status_store: Arc<RwLock<FeedStatusSnapshot>>,
    cancel_token: CancellationToken,
) {
    let telemetry = FeedTelemetry::default();
    let status_throttle = Mutex::new(StatusPublishThrottle::default());
    let context = StreamRuntimeContext {
        config: &config,
        dashboard: &dashboard,
        status_store: &status_store,
        telemetry: &telemetry,
        status_throttle: &status_throttle,
    };

    let mut reconnect_attempt: u32 = 0;
    while !cancel_token.is_cancelled() {
        let (phase, reason) = if reconnect_attempt == 0 {
            (
                FeedConnectionState::Connecting,
                "opening websocket stream".to_string(),
            )
        } else {
            (
                FeedConnectionState::Reconnecting,
                format!("reconnect attempt {reconnect_attempt}"),
            )
        };
        publish_status(&context, phase, reconnect_attempt, Some(reason)).await;

        let connect_result = tokio::select! {
            _ = cancel_token.cancelled() => break,
            result = connect_feed_stream(&config.url) => result,
        };

        match connect_result {
            Ok(mut websocket_stream) => {
                reconnect_attempt = 0;
                info!(url = %config.url, "feed connected");
                publish_status(
                    &context,
                    FeedConnectionState::Live,
                    0,
                    Some("websocket connected".to_string()),
                )
                .await;

                let reason = read_frames(&mut websocket_stream, &context, &cancel_token).await;
                if cancel_token.is_cancelled() {
                    let _ = websocket_stream.close(None).await;
                    break;
                }

                info!(url = %config.url, %reason, "feed disconnected");
                publish_status_throttled(
                    &context,
                    FeedConnectionState::Reconnecting,
                    reconnect_attempt,
                    Some(reason),
                )
                .await;
            }
            Err(error) => {
                warn!(url = %config.url, %error, "feed connect failed");
                publish_status_throttled(
                    &context,
                    FeedConnectionState::Reconnecting,
                    reconnect_attempt,
                    Some(format!("websocket connect error: {error}")),
                )
                .await;
            }
        }

        reconnect_attempt = reconnect_attempt.saturating_add(1);
        let delay = reconnect_delay(
            reconnect_attempt,
            config.reconnect_base_ms,
            config.reconnect_max_ms,
        );
        debug!(
            attempt = reconnect_attempt,
            delay_ms = delay.as_millis() as u64,
            "waiting before reconnect"
        );
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!(url = %config.url, "feed stopped");
    publish_status(
        &context,
        FeedConnectionState::Stopped,
        reconnect_attempt,
        Some("feed stopped".to_string()),
    )
    .await;
}

/// Reads until the link drops or the token fires and returns the reason.
async fn read_frames(
    websocket_stream: &mut FeedWsStream,
    context: &StreamRuntimeContext<'_>,
    cancel_token: &CancellationToken,
) -> String {
    let mut heartbeat = tokio::time::interval(Duration::from_millis(STATUS_HEARTBEAT_MS));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let frame = tokio::select! {
            _ = cancel_token.cancelled() => return "feed cancelled".to_string(),
            _ = heartbeat.tick() => {
                refresh_counters(context).await;
                continue;
            }
            next_message = websocket_stream.next() => next_message,
        };

        let Some(frame_result) = frame else {
            return "websocket stream ended".to_string();
        };

        match frame_result {
            Ok(message) => match handle_message(message, context) {
                StreamDirective::Continue => {}
                StreamDirective::Reconnect(reason) => return reason,
            },
            Err(error) => return format!("websocket frame error: {error}"),
        }
    }
}

fn handle_message(message: Message, context: &StreamRuntimeContext<'_>) -> StreamDirective {
    let mut payload = match message {
        Message::Text(text_payload) => text_payload.into_bytes(),
        Message::Binary(binary_payload) => binary_payload,
        Message::Close(frame) => {
            let reason = match frame {
                Some(frame) if !frame.reason.is_empty() => {
                    format!("server closed connection: {}", frame.reason)
                }
                _ => "server closed connection".to_string(),
            };
            return StreamDirective::Reconnect(reason);
        }
        _ => return StreamDirective::Continue,
    };

    context.telemetry.record_frame(now_unix_ms());
    let event = match decode_frame(payload.as_mut_slice()) {
        Ok(event) => event,
        Err(error) => {
            context.telemetry.record_dropped();
            warn!(%error, "dropping undecodable frame");
            return StreamDirective::Continue;
        }
    };

    let report = {
        let mut dashboard = context.dashboard.lock();
        dispatch(&mut dashboard, event)
    };
    context.telemetry.record_applied(report.applied);
    debug!(
        applied = report.applied,
        unchanged = report.unchanged,
        dropped = report.dropped,
        skipped = report.skipped,
        rejected = report.rejected,
        "frame dispatched"
    );
    StreamDirective::Continue
}

async fn publish_status(
    context: &StreamRuntimeContext<'_>,
    state: FeedConnectionState,
    reconnect_attempt: u32,
    reason: Option<String>,
) {
    let mut snapshot = FeedStatusSnapshot::stopped(context.config.url.clone(), reason);
    snapshot.state = state;
    snapshot.reconnect_attempt = reconnect_attempt;
    context.telemetry.fill(&mut snapshot);

    let mut writable = context.status_store.write().await;
    *writable = snapshot;
}

async fn refresh_counters(context: &StreamRuntimeContext<'_>) {
    let mut writable = context.status_store.write().await;
    context.telemetry.fill(&mut writable);
}

fn allow_status_publish(
    throttle: &Mutex<StatusPublishThrottle>,
    state: FeedConnectionState,
    reason: &Option<String>,
) -> bool {
    let mut writable = throttle.lock();
    let now = Instant::now();
    let should_throttle = matches!(
        state,
        FeedConnectionState::Error | FeedConnectionState::Reconnecting
    );

    if should_throttle
        && writable.last_state == Some(state)
        && writable.last_reason == *reason
        && writable
            .last_emit
            .map(|instant| {
                now.duration_since(instant) < Duration::from_millis(STATUS_ERROR_THROTTLE_MS)
            })
            .unwrap_or(false)
    {
        return false;
    }

    writable.last_state = Some(state);
    writable.last_reason = reason.clone();
    writable.last_emit = Some(now);
    true
}

async fn publish_status_throttled(
    context: &StreamRuntimeContext<'_>,
    state: FeedConnectionState,
    reconnect_attempt: u32,
    reason: Option<String>,
) {
    if !allow_status_publish(context.status_throttle, state, &reason) {
        return;
    }

    publish_status(context, state, reconnect_attempt, reason).await;
}

fn reconnect_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let jitter_ms = now_unix_ms().unsigned_abs() % RECONNECT_JITTER_MS;
    reconnect_delay_with_jitter(attempt, base_ms, max_ms, jitter_ms)
}

fn reconnect_delay_with_jitter(attempt: u32, base_ms: u64, max_ms: u64, jitter_ms: u64) -> Duration {
    let exponent = attempt.min(RECONNECT_MAX_EXPONENT);
    let backoff_ms = base_ms.saturating_mul(1_u64 << exponent);
    let jitter_ms = jitter_ms.min(RECONNECT_JITTER_MS - 1);
    Duration::from_millis(backoff_ms.saturating_add(jitter_ms).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::StartFeedArgs;
    use crate::view::ViewLayout;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    struct Harness {
        config: FeedConfig,
        dashboard: Arc<Mutex<Dashboard>>,
        status_store: Arc<RwLock<FeedStatusSnapshot>>,
        telemetry: FeedTelemetry,
        status_throttle: Mutex<StatusPublishThrottle>,
    }

    impl Harness {
        fn new() -> Self {
            let config = StartFeedArgs::default()
                .normalize()
                .expect("default feed args should be valid");
            Self {
                status_store: Arc::new(RwLock::new(FeedStatusSnapshot::stopped(
                    config.url.clone(),
                    None,
                ))),
                config,
                dashboard: Arc::new(Mutex::new(Dashboard::new(ViewLayout::default()))),
                telemetry: FeedTelemetry::default(),
                status_throttle: Mutex::new(StatusPublishThrottle::default()),
            }
        }

        fn context(&self) -> StreamRuntimeContext<'_> {
            StreamRuntimeContext {
                config: &self.config,
                dashboard: &self.dashboard,
                status_store: &self.status_store,
                telemetry: &self.telemetry,
                status_throttle: &self.status_throttle,
            }
        }
    }

    #[test]
    fn reconnect_delay_grows_exponentially_and_caps() {
        assert_eq!(
            reconnect_delay_with_jitter(1, 200, 5_000, 0),
            Duration::from_millis(400)
        );
        assert_eq!(
            reconnect_delay_with_jitter(3, 200, 5_000, 10),
            Duration::from_millis(1_610)
        );
        assert_eq!(
            reconnect_delay_with_jitter(40, 200, 5_000, 249),
            Duration::from_millis(5_000)
        );
        assert_eq!(
            reconnect_delay_with_jitter(0, 50, 60_000, 9_999),
            Duration::from_millis(50 + 249)
        );
    }

    #[test]
    fn throttles_repeated_reconnecting_status() {
        let throttle = Mutex::new(StatusPublishThrottle::default());
        let reason = Some("websocket connect error: refused".to_string());

        assert!(allow_status_publish(
            &throttle,
            FeedConnectionState::Reconnecting,
            &reason
        ));
        assert!(!allow_status_publish(
            &throttle,
            FeedConnectionState::Reconnecting,
            &reason
        ));
        assert!(allow_status_publish(
            &throttle,
            FeedConnectionState::Reconnecting,
            &Some("other".to_string())
        ));
        assert!(allow_status_publish(
            &throttle,
            FeedConnectionState::Live,
            &None
        ));
        assert!(allow_status_publish(
            &throttle,
            FeedConnectionState::Live,
            &None
        ));
    }

    #[test]
    fn close_frame_requests_reconnect() {
        let harness = Harness::new();
        let directive = handle_message(Message::Close(None), &harness.context());
        assert!(matches!(directive, StreamDirective::Reconnect(_)));
    }

    #[test]
    fn undecodable_frame_is_counted_and_dropped() {
        let harness = Harness::new();
        let directive = handle_message(
            Message::Text("{not json".to_string()),
            &harness.context(),
        );

        assert_eq!(directive, StreamDirective::Continue);
        assert_eq!(harness.telemetry.frames_received.load(Ordering::Relaxed), 1);
        assert_eq!(harness.telemetry.frames_dropped.load(Ordering::Relaxed), 1);
        assert_eq!(harness.dashboard.lock().revision(), 0);
    }

    #[test]
    fn binary_frames_are_decoded_like_text() {
        let harness = Harness::new();
        let payload =
            br#"{"type":"orderbook","data":{"ticker":"NY-25JUL04-T85","yes":1,"no":2}}"#.to_vec();
        handle_message(Message::Binary(payload), &harness.context());

        assert_eq!(harness.telemetry.events_applied.load(Ordering::Relaxed), 1);
        let dashboard = harness.dashboard.lock();
        assert!(dashboard.tree().site_row("NY").is_some());
    }

    #[tokio::test]
    async fn streams_frames_from_server_into_dashboard() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("listener address");

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("client should connect");
            let mut websocket = tokio_tungstenite::accept_async(socket)
                .await
                .expect("handshake should succeed");
            for frame in [
                r#"{"type":"orderbook","data":{"ticker":"NY-25JUL04-T90","yes":40,"no":60}}"#,
                r#"{"type":"orderbook","data":{"ticker":"NY-25JUL04-B85.5","yes":10,"no":90}}"#,
                r#"{"type":"bogus"}"#,
                "definitely not json",
                r#"{"type":"SensorPoll","payload":{"NY":[["air_temp",81.5]],"LAX":[["air_temp",70]]}}"#,
            ] {
                websocket
                    .send(Message::Text(frame.to_string()))
                    .await
                    .expect("frame should send");
            }
            while let Some(Ok(_)) = websocket.next().await {}
        });

        let config = StartFeedArgs {
            url: Some(format!("ws://{address}")),
            ..StartFeedArgs::default()
        }
        .normalize()
        .expect("feed args should be valid");
        let dashboard = Arc::new(Mutex::new(Dashboard::new(config.layout)));
        let status_store = Arc::new(RwLock::new(FeedStatusSnapshot::stopped(
            config.url.clone(),
            None,
        )));
        let cancel_token = CancellationToken::new();
        let feed = tokio::spawn(run_feed(
            config,
            Arc::clone(&dashboard),
            Arc::clone(&status_store),
            cancel_token.clone(),
        ));

        let populated = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let has_sensor = dashboard
                    .lock()
                    .tree()
                    .site_row("NY")
                    .and_then(|row| row.sensor())
                    .is_some();
                if has_sensor {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(populated.is_ok(), "dashboard was not populated in time");

        cancel_token.cancel();
        feed.await.expect("feed task should finish");
        let _ = server.await;

        {
            let dashboard = dashboard.lock();
            let row = dashboard.tree().site_row("NY").expect("NY row");
            let labels: Vec<&str> = row
                .date_cell("25JUL04")
                .and_then(|cell| cell.book())
                .map(|book| book.rows().iter().map(|row| row.label.as_str()).collect())
                .unwrap_or_default();
            assert_eq!(labels, vec!["B85.5", "T90"]);
            assert!(dashboard.tree().site_row("LAX").is_none());
        }

        let status = status_store.read().await.clone();
        assert_eq!(status.state, FeedConnectionState::Stopped);
        assert_eq!(status.frames_received, 5);
        assert_eq!(status.frames_dropped, 1);
        assert_eq!(status.events_applied, 3);
    }
}
