//! Authoritative in-memory snapshot of everything the dashboard shows.
//!
//! Every write is keyed by a composite identifier and is idempotent for
//! identical input. The reconciler is the only writer.

use crate::error::AppError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// A cell value as it arrives on the wire: a number, a string, or nothing.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    #[default]
    Null,
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
            Self::Null => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
            Self::Null => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookEntry {
    pub yes: FieldValue,
    pub no: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub key: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastReading {
    pub horizon: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub timestamp_ms: i64,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Readings,
    Forecasts,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub readings: Vec<SeriesPoint>,
    pub forecasts: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookKey {
    pub site: String,
    pub date: String,
}

#[derive(Debug, Default)]
pub struct ViewStateStore {
    books: HashMap<BookKey, HashMap<String, BookEntry>>,
    sensors: HashMap<String, Vec<SensorReading>>,
    forecasts: HashMap<String, Vec<ForecastReading>>,
    charts: HashMap<String, ChartSeries>,
}

fn require_key(name: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::malformed(format!("{name} must not be empty")));
    }
    Ok(())
}

impl ViewStateStore {
    pub fn upsert_order_book_entry(
        &mut self,
        site: &str,
        date: &str,
        ticker: &str,
        yes: FieldValue,
        no: FieldValue,
    ) -> Result<UpsertOutcome, AppError> {
        require_key("site", site)?;
        require_key("date", date)?;
        require_key("ticker", ticker)?;

        let book = self
            .books
            .entry(BookKey {
                site: site.to_string(),
                date: date.to_string(),
            })
            .or_default();
        let next = BookEntry { yes, no };

        match book.get_mut(ticker) {
            Some(current) if *current == next => Ok(UpsertOutcome::Unchanged),
            Some(current) => {
                *current = next;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                book.insert(ticker.to_string(), next);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// Replaces the site's readings wholesale, keeping at most `max_rows`.
    pub fn replace_sensor_readings(
        &mut self,
        site: &str,
        mut readings: Vec<SensorReading>,
        max_rows: usize,
    ) -> Result<&[SensorReading], AppError> {
        require_key("site", site)?;
        readings.truncate(max_rows);
        let slot = self.sensors.entry(site.to_string()).or_default();
        *slot = readings;
        Ok(slot.as_slice())
    }

    pub fn replace_forecast_readings(
        &mut self,
        site: &str,
        mut readings: Vec<ForecastReading>,
        max_rows: usize,
    ) -> Result<&[ForecastReading], AppError> {
        require_key("site", site)?;
        readings.truncate(max_rows);
        let slot = self.forecasts.entry(site.to_string()).or_default();
        *slot = readings;
        Ok(slot.as_slice())
    }

    pub fn replace_chart_series(
        &mut self,
        site: &str,
        readings: Vec<SeriesPoint>,
        forecasts: Vec<SeriesPoint>,
    ) -> Result<&ChartSeries, AppError> {
        require_key("site", site)?;
        let slot = self.charts.entry(site.to_string()).or_default();
        *slot = ChartSeries {
            readings,
            forecasts,
        };
        Ok(&*slot)
    }

    pub fn append_chart_point(
        &mut self,
        site: &str,
        kind: SeriesKind,
        point: SeriesPoint,
    ) -> Result<&ChartSeries, AppError> {
        require_key("site", site)?;
        let slot = self.charts.entry(site.to_string()).or_default();
        let series = match kind {
            SeriesKind::Readings => &mut slot.readings,
            SeriesKind::Forecasts => &mut slot.forecasts,
        };
        if !series.contains(&point) {
            series.push(point);
        }
        Ok(&*slot)
    }

    pub fn order_book_entry(&self, site: &str, date: &str, ticker: &str) -> Option<&BookEntry> {
        self.books
            .get(&BookKey {
                site: site.to_string(),
                date: date.to_string(),
            })
            .and_then(|book| book.get(ticker))
    }

    pub fn order_book_len(&self, site: &str, date: &str) -> usize {
        self.books
            .get(&BookKey {
                site: site.to_string(),
                date: date.to_string(),
            })
            .map(HashMap::len)
            .unwrap_or_default()
    }

    pub fn sensor_readings(&self, site: &str) -> Option<&[SensorReading]> {
        self.sensors.get(site).map(Vec::as_slice)
    }

    pub fn forecast_readings(&self, site: &str) -> Option<&[ForecastReading]> {
        self.forecasts.get(site).map(Vec::as_slice)
    }

    pub fn chart_series(&self, site: &str) -> Option<&ChartSeries> {
        self.charts.get(site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(key: &str, value: f64) -> SensorReading {
        SensorReading {
            key: key.to_string(),
            value: FieldValue::Number(value),
        }
    }

    #[test]
    fn upsert_reports_insert_update_and_unchanged() {
        let mut store = ViewStateStore::default();
        let first = store
            .upsert_order_book_entry("NY", "25JUL04", "NY-25JUL04-T85", 40.0.into(), 60.0.into())
            .expect("upsert should succeed");
        let repeat = store
            .upsert_order_book_entry("NY", "25JUL04", "NY-25JUL04-T85", 40.0.into(), 60.0.into())
            .expect("upsert should succeed");
        let changed = store
            .upsert_order_book_entry("NY", "25JUL04", "NY-25JUL04-T85", 41.0.into(), 59.0.into())
            .expect("upsert should succeed");

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(repeat, UpsertOutcome::Unchanged);
        assert_eq!(changed, UpsertOutcome::Updated);
        assert_eq!(store.order_book_len("NY", "25JUL04"), 1);
        assert_eq!(
            store
                .order_book_entry("NY", "25JUL04", "NY-25JUL04-T85")
                .map(|entry| entry.yes.clone()),
            Some(FieldValue::Number(41.0))
        );
    }

    #[test]
    fn upsert_rejects_missing_ticker() {
        let mut store = ViewStateStore::default();
        let result =
            store.upsert_order_book_entry("NY", "25JUL04", " ", FieldValue::Null, FieldValue::Null);
        assert!(matches!(result, Err(AppError::MalformedEvent(_))));
    }

    #[test]
    fn sensor_readings_are_replaced_and_capped() {
        let mut store = ViewStateStore::default();
        store
            .replace_sensor_readings("NY", vec![reading("a", 1.0), reading("b", 2.0)], 5)
            .expect("replace should succeed");
        let stored = store
            .replace_sensor_readings(
                "NY",
                (0..8).map(|idx| reading(&format!("k{idx}"), idx as f64)).collect(),
                5,
            )
            .expect("replace should succeed");

        assert_eq!(stored.len(), 5);
        assert!(stored.iter().all(|entry| entry.key.starts_with('k')));
    }

    #[test]
    fn appending_the_same_chart_point_twice_keeps_one() {
        let mut store = ViewStateStore::default();
        let point = SeriesPoint {
            timestamp_ms: 1,
            value: Some(10.0),
        };
        store
            .append_chart_point("NY", SeriesKind::Readings, point)
            .expect("append should succeed");
        let series = store
            .append_chart_point("NY", SeriesKind::Readings, point)
            .expect("append should succeed");

        assert_eq!(series.readings, vec![point]);
        assert!(series.forecasts.is_empty());
    }

    #[test]
    fn displays_integral_numbers_without_fraction() {
        assert_eq!(FieldValue::Number(42.0).to_string(), "42");
        assert_eq!(FieldValue::Number(0.25).to_string(), "0.25");
        assert_eq!(FieldValue::Text("n/a".to_string()).to_string(), "n/a");
        assert_eq!(FieldValue::Null.to_string(), "");
    }
}
