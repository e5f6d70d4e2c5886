use crate::view::store::{ChartSeries, SeriesPoint};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub label: &'static str,
    pub style: LineStyle,
    pub values: Vec<Option<f64>>,
}

/// Two series aligned on one shared, ascending time axis. `None` marks an
/// axis position where that series has no reading.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedChart {
    pub axis: Vec<i64>,
    pub readings: PlotSeries,
    pub forecasts: PlotSeries,
}

impl MergedChart {
    pub fn len(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axis.is_empty()
    }

    pub fn latest(series: &PlotSeries) -> Option<f64> {
        series.values.iter().rev().find_map(|value| *value)
    }
}

fn index_by_timestamp(points: &[SeriesPoint]) -> BTreeMap<i64, Option<f64>> {
    let mut indexed = BTreeMap::new();
    for point in points {
        indexed.entry(point.timestamp_ms).or_insert(point.value);
    }
    indexed
}

fn align(axis: &[i64], indexed: &BTreeMap<i64, Option<f64>>) -> Vec<Option<f64>> {
    axis.iter()
        .map(|timestamp| indexed.get(timestamp).copied().flatten())
        .collect()
}

pub fn merge_series(readings: &[SeriesPoint], forecasts: &[SeriesPoint]) -> MergedChart {
    let indexed_readings = index_by_timestamp(readings);
    let indexed_forecasts = index_by_timestamp(forecasts);

    let mut axis: Vec<i64> = indexed_readings
        .keys()
        .chain(indexed_forecasts.keys())
        .copied()
        .collect();
    axis.sort_unstable();
    axis.dedup();

    MergedChart {
        readings: PlotSeries {
            label: "Readings",
            style: LineStyle::Solid,
            values: align(&axis, &indexed_readings),
        },
        forecasts: PlotSeries {
            label: "Forecasts",
            style: LineStyle::Dashed,
            values: align(&axis, &indexed_forecasts),
        },
        axis,
    }
}

pub fn merge_chart_series(series: &ChartSeries) -> MergedChart {
    merge_series(&series.readings, &series.forecasts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(pairs: &[(i64, f64)]) -> Vec<SeriesPoint> {
        pairs
            .iter()
            .map(|(timestamp_ms, value)| SeriesPoint {
                timestamp_ms: *timestamp_ms,
                value: Some(*value),
            })
            .collect()
    }

    #[test]
    fn merges_sparse_series_on_shared_axis() {
        let merged = merge_series(
            &points(&[(1, 10.0), (3, 30.0)]),
            &points(&[(2, 20.0), (3, 31.0)]),
        );

        assert_eq!(merged.axis, vec![1, 2, 3]);
        assert_eq!(merged.readings.values, vec![Some(10.0), None, Some(30.0)]);
        assert_eq!(merged.forecasts.values, vec![None, Some(20.0), Some(31.0)]);
    }

    #[test]
    fn sorts_unordered_input_and_keeps_first_duplicate() {
        let merged = merge_series(&points(&[(5, 50.0), (2, 20.0), (5, 99.0)]), &[]);

        assert_eq!(merged.axis, vec![2, 5]);
        assert_eq!(merged.readings.values, vec![Some(20.0), Some(50.0)]);
        assert_eq!(merged.forecasts.values, vec![None, None]);
    }

    #[test]
    fn styles_forecasts_dashed_and_readings_solid() {
        let merged = merge_series(&[], &[]);

        assert!(merged.is_empty());
        assert_eq!(merged.readings.style, LineStyle::Solid);
        assert_eq!(merged.forecasts.style, LineStyle::Dashed);
    }

    #[test]
    fn latest_skips_trailing_gaps() {
        let merged = merge_series(&points(&[(1, 10.0)]), &points(&[(2, 20.0)]));

        assert_eq!(MergedChart::latest(&merged.readings), Some(10.0));
        assert_eq!(MergedChart::latest(&merged.forecasts), Some(20.0));
    }
}
