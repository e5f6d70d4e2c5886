use crate::error::AppError;
use crate::feed::{FORECAST_POLL_EVENT, GRAPH_EVENT, ORDERBOOK_EVENT, SENSOR_POLL_EVENT};
use crate::view::store::{FieldValue, ForecastReading, SensorReading, SeriesPoint};
use crate::view::ViewLayout;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use std::collections::BTreeMap;

pub const DEFAULT_FEED_URL: &str = "ws://0.0.0.0:8000/ws";
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 200;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 5_000;
pub const DEFAULT_RENDER_INTERVAL_MS: u64 = 250;
pub const MIN_RECONNECT_BASE_MS: u64 = 50;
pub const MAX_RECONNECT_BASE_MS: u64 = 10_000;
pub const MAX_RECONNECT_MAX_MS: u64 = 300_000;
pub const MIN_RENDER_INTERVAL_MS: u64 = 16;
pub const MAX_RENDER_INTERVAL_MS: u64 = 5_000;
pub const MAX_SENSOR_ROWS: usize = 64;
pub const MAX_SENSOR_COLUMNS: usize = 8;
pub const MAX_FORECAST_ROWS: usize = 512;
pub const MAX_FORECAST_COLUMNS: usize = 16;

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const OFFSET_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedConnectionState {
    Connecting,
    Live,
    Reconnecting,
    Stopped,
    Error,
}

impl FeedConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Live => "live",
            Self::Reconnecting => "reconnecting",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatusSnapshot {
    pub state: FeedConnectionState,
    pub url: String,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub events_applied: u64,
    pub last_frame_at_ms: Option<i64>,
    pub reconnect_attempt: u32,
    pub reason: Option<String>,
}

impl FeedStatusSnapshot {
    pub fn stopped(url: String, reason: Option<String>) -> Self {
        Self {
            state: FeedConnectionState::Stopped,
            url,
            frames_received: 0,
            frames_dropped: 0,
            events_applied: 0,
            last_frame_at_ms: None,
            reconnect_attempt: 0,
            reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartFeedArgs {
    pub url: Option<String>,
    pub reconnect_base_ms: Option<u64>,
    pub reconnect_max_ms: Option<u64>,
    pub render_interval_ms: Option<u64>,
    pub sensor_max_rows: Option<usize>,
    pub sensor_columns: Option<usize>,
    pub forecast_max_rows: Option<usize>,
    pub forecast_columns: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub render_interval_ms: u64,
    pub layout: ViewLayout,
}

fn bounded_usize(name: &str, value: usize, max: usize) -> Result<usize, AppError> {
    if !(1..=max).contains(&value) {
        return Err(AppError::InvalidArgument(format!(
            "{name} must be between 1 and {max}"
        )));
    }
    Ok(value)
}

impl StartFeedArgs {
    pub fn normalize(self) -> Result<FeedConfig, AppError> {
        let url = self
            .url
            .unwrap_or_else(|| DEFAULT_FEED_URL.to_string())
            .trim()
            .to_string();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(AppError::InvalidArgument(
                "url must use the ws:// or wss:// scheme".to_string(),
            ));
        }

        let reconnect_base_ms = self.reconnect_base_ms.unwrap_or(DEFAULT_RECONNECT_BASE_MS);
        if !(MIN_RECONNECT_BASE_MS..=MAX_RECONNECT_BASE_MS).contains(&reconnect_base_ms) {
            return Err(AppError::InvalidArgument(format!(
                "reconnectBaseMs must be between {MIN_RECONNECT_BASE_MS} and {MAX_RECONNECT_BASE_MS}"
            )));
        }

        let reconnect_max_ms = self.reconnect_max_ms.unwrap_or(DEFAULT_RECONNECT_MAX_MS);
        if !(reconnect_base_ms..=MAX_RECONNECT_MAX_MS).contains(&reconnect_max_ms) {
            return Err(AppError::InvalidArgument(format!(
                "reconnectMaxMs must be between reconnectBaseMs and {MAX_RECONNECT_MAX_MS}"
            )));
        }

        let render_interval_ms = self
            .render_interval_ms
            .unwrap_or(DEFAULT_RENDER_INTERVAL_MS);
        if !(MIN_RENDER_INTERVAL_MS..=MAX_RENDER_INTERVAL_MS).contains(&render_interval_ms) {
            return Err(AppError::InvalidArgument(format!(
                "renderIntervalMs must be between {MIN_RENDER_INTERVAL_MS} and {MAX_RENDER_INTERVAL_MS}"
            )));
        }

        let defaults = ViewLayout::default();
        let layout = ViewLayout {
            sensor_max_rows: bounded_usize(
                "sensorMaxRows",
                self.sensor_max_rows.unwrap_or(defaults.sensor_max_rows),
                MAX_SENSOR_ROWS,
            )?,
            sensor_columns: bounded_usize(
                "sensorColumns",
                self.sensor_columns.unwrap_or(defaults.sensor_columns),
                MAX_SENSOR_COLUMNS,
            )?,
            forecast_max_rows: bounded_usize(
                "forecastMaxRows",
                self.forecast_max_rows.unwrap_or(defaults.forecast_max_rows),
                MAX_FORECAST_ROWS,
            )?,
            forecast_columns: bounded_usize(
                "forecastColumns",
                self.forecast_columns.unwrap_or(defaults.forecast_columns),
                MAX_FORECAST_COLUMNS,
            )?,
        };

        Ok(FeedConfig {
            url,
            reconnect_base_ms,
            reconnect_max_ms,
            render_interval_ms,
            layout,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSession {
    pub running: bool,
    pub url: String,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
}

impl FeedSession {
    pub fn from_config(config: &FeedConfig) -> Self {
        Self {
            running: true,
            url: config.url.clone(),
            reconnect_base_ms: config.reconnect_base_ms,
            reconnect_max_ms: config.reconnect_max_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStopResult {
    pub stopped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookUpdate {
    pub ticker: String,
    pub yes: FieldValue,
    pub no: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorSiteUpdate {
    pub site: String,
    pub readings: Vec<SensorReading>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSiteUpdate {
    pub site: String,
    pub readings: Vec<ForecastReading>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSiteUpdate {
    pub site: String,
    pub readings: Vec<SeriesPoint>,
    pub forecasts: Vec<SeriesPoint>,
}

/// A decoded frame. Batched payloads keep one result per site so that a
/// bad entry only costs that site's update.
#[derive(Debug)]
pub enum FeedEvent {
    OrderBook(OrderBookUpdate),
    SensorPoll(Vec<Result<SensorSiteUpdate, AppError>>),
    ForecastPoll(ForecastSiteUpdate),
    Graph(Vec<Result<ChartSiteUpdate, AppError>>),
    Unknown(Option<String>),
}

#[derive(Debug, Deserialize)]
struct OrderBookWire {
    ticker: String,
    #[serde(default)]
    yes: FieldValue,
    #[serde(default)]
    no: FieldValue,
}

#[derive(Debug, Default, Deserialize)]
struct SeriesWire {
    #[serde(default)]
    xs: Vec<FieldValue>,
    #[serde(default)]
    ys: Vec<FieldValue>,
}

#[derive(Debug, Deserialize)]
struct GraphEntryWire {
    site: String,
    #[serde(default)]
    readings: SeriesWire,
    #[serde(default)]
    forecasts: SeriesWire,
}

type PairWire = (FieldValue, FieldValue);

fn malformed(context: &str, error: impl std::fmt::Display) -> AppError {
    AppError::malformed(format!("{context}: {error}"))
}

/// Only the `type` discriminant is read up front; every other field is
/// interpreted by its event branch, so unknown events may carry anything.
pub fn decode_frame(payload: &mut [u8]) -> Result<FeedEvent, AppError> {
    let value = simd_json::to_owned_value(payload)
        .map_err(|error| AppError::Decode(error.to_string()))?;
    let Ok(mut fields) = simd_json::serde::from_owned_value::<BTreeMap<String, OwnedValue>>(value)
    else {
        return Ok(FeedEvent::Unknown(None));
    };
    let kind = fields
        .remove("type")
        .and_then(|kind| simd_json::serde::from_owned_value::<String>(kind).ok());

    match kind.as_deref() {
        Some(ORDERBOOK_EVENT) => decode_order_book(fields.remove("data")),
        Some(SENSOR_POLL_EVENT) => Ok(decode_sensor_poll(fields.remove("payload"))),
        Some(FORECAST_POLL_EVENT) => {
            decode_forecast_poll(fields.remove("site"), fields.remove("payload"))
        }
        Some(GRAPH_EVENT) => decode_graph(fields.remove("data")),
        _ => Ok(FeedEvent::Unknown(kind)),
    }
}

fn decode_order_book(data: Option<OwnedValue>) -> Result<FeedEvent, AppError> {
    let data = data.ok_or_else(|| AppError::malformed("orderbook event without data"))?;
    let wire: OrderBookWire = simd_json::serde::from_owned_value(data)
        .map_err(|error| malformed("orderbook data", error))?;
    if wire.ticker.trim().is_empty() {
        return Err(AppError::malformed("orderbook event with empty ticker"));
    }

    Ok(FeedEvent::OrderBook(OrderBookUpdate {
        ticker: wire.ticker,
        yes: wire.yes,
        no: wire.no,
    }))
}

fn decode_sensor_poll(payload: Option<OwnedValue>) -> FeedEvent {
    let Some(payload) = payload else {
        return FeedEvent::SensorPoll(Vec::new());
    };
    let sites: BTreeMap<String, OwnedValue> = match simd_json::serde::from_owned_value(payload) {
        Ok(sites) => sites,
        Err(error) => return FeedEvent::SensorPoll(vec![Err(malformed("SensorPoll payload", error))]),
    };

    let updates = sites
        .into_iter()
        .map(|(site, rows)| -> Result<SensorSiteUpdate, AppError> {
            let pairs: Vec<PairWire> = simd_json::serde::from_owned_value(rows)
                .map_err(|error| malformed(&format!("SensorPoll rows for '{site}'"), error))?;
            Ok(SensorSiteUpdate {
                readings: pairs
                    .into_iter()
                    .map(|(key, value)| SensorReading {
                        key: key.to_string(),
                        value,
                    })
                    .collect(),
                site,
            })
        })
        .collect();
    FeedEvent::SensorPoll(updates)
}

fn decode_forecast_poll(
    site: Option<OwnedValue>,
    payload: Option<OwnedValue>,
) -> Result<FeedEvent, AppError> {
    let site = site
        .and_then(|site| simd_json::serde::from_owned_value::<String>(site).ok())
        .filter(|site| !site.trim().is_empty())
        .ok_or_else(|| AppError::malformed("ForecastPoll event without site"))?;
    let pairs: Vec<PairWire> = match payload {
        Some(payload) => simd_json::serde::from_owned_value(payload)
            .map_err(|error| malformed(&format!("ForecastPoll rows for '{site}'"), error))?,
        None => Vec::new(),
    };

    Ok(FeedEvent::ForecastPoll(ForecastSiteUpdate {
        site,
        readings: pairs
            .into_iter()
            .map(|(horizon, value)| ForecastReading {
                horizon: horizon.to_string(),
                value,
            })
            .collect(),
    }))
}

fn decode_graph(data: Option<OwnedValue>) -> Result<FeedEvent, AppError> {
    let data = data.ok_or_else(|| AppError::malformed("graph event without data"))?;
    let entries: Vec<OwnedValue> = simd_json::serde::from_owned_value(data)
        .map_err(|error| malformed("graph data", error))?;

    Ok(FeedEvent::Graph(
        entries.into_iter().map(decode_graph_entry).collect(),
    ))
}

fn decode_graph_entry(entry: OwnedValue) -> Result<ChartSiteUpdate, AppError> {
    let wire: GraphEntryWire =
        simd_json::serde::from_owned_value(entry).map_err(|error| malformed("graph entry", error))?;
    if wire.site.trim().is_empty() {
        return Err(AppError::malformed("graph entry with empty site"));
    }

    Ok(ChartSiteUpdate {
        readings: series_points(&wire.site, "readings", wire.readings)?,
        forecasts: series_points(&wire.site, "forecasts", wire.forecasts)?,
        site: wire.site,
    })
}

fn series_points(site: &str, name: &str, wire: SeriesWire) -> Result<Vec<SeriesPoint>, AppError> {
    if wire.xs.len() != wire.ys.len() {
        return Err(AppError::malformed(format!(
            "{name} for '{site}' has {} timestamps but {} values",
            wire.xs.len(),
            wire.ys.len()
        )));
    }

    wire.xs
        .iter()
        .zip(wire.ys.iter())
        .map(|(x, y)| -> Result<SeriesPoint, AppError> {
            let value = match y {
                FieldValue::Null => None,
                other => Some(other.as_f64().ok_or_else(|| {
                    AppError::malformed(format!("{name} value '{other}' for '{site}' is not numeric"))
                })?),
            };
            Ok(SeriesPoint {
                timestamp_ms: parse_timestamp_ms(x)?,
                value,
            })
        })
        .collect()
}

/// Numbers are epoch milliseconds; text is an RFC 3339 or ISO-like
/// timestamp, taken as UTC when it carries no offset.
pub fn parse_timestamp_ms(value: &FieldValue) -> Result<i64, AppError> {
    match value {
        FieldValue::Number(millis) if millis.is_finite() => Ok(millis.round() as i64),
        FieldValue::Text(text) => {
            let text = text.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Ok(parsed.timestamp_millis());
            }
            if let Some(parsed) = OFFSET_TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| DateTime::parse_from_str(text, format).ok())
            {
                return Ok(parsed.timestamp_millis());
            }
            if let Some(parsed) = NAIVE_TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            {
                return Ok(parsed.and_utc().timestamp_millis());
            }
            if let Ok(millis) = text.parse::<i64>() {
                return Ok(millis);
            }
            Err(AppError::malformed(format!("unrecognised timestamp '{text}'")))
        }
        other => Err(AppError::malformed(format!("invalid timestamp '{other}'"))),
    }
}
