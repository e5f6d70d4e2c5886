use crate::view::chart::{MergedChart, PlotSeries};
use crate::view::tree::{CellRef, DateCell, DateContent, ForecastCell, SensorCell, SiteRow, ViewTree};
use std::fmt::Write;

const INDENT: &str = "  ";

fn latest_text(series: &PlotSeries) -> String {
    match MergedChart::latest(series) {
        Some(value) => format!("{} {value}", series.label),
        None => format!("{} -", series.label),
    }
}

fn render_date_cell(out: &mut String, cell: &DateCell) {
    let _ = writeln!(out, "{INDENT}[{}]", cell.label);
    match &cell.content {
        DateContent::Book(book) => {
            for row in book.rows() {
                let _ = writeln!(
                    out,
                    "{INDENT}{INDENT}{:<10} yes {:>6}  no {:>6}",
                    row.label,
                    row.yes.to_string(),
                    row.no.to_string()
                );
            }
        }
        DateContent::Chart(Some(chart)) => {
            let merged = &chart.merged;
            let _ = writeln!(
                out,
                "{INDENT}{INDENT}chart {} points | {} | {}",
                merged.len(),
                latest_text(&merged.readings),
                latest_text(&merged.forecasts)
            );
        }
        DateContent::Chart(None) => {
            let _ = writeln!(out, "{INDENT}{INDENT}chart pending");
        }
    }
}

fn render_sensor_cell(out: &mut String, cell: &SensorCell) {
    let _ = writeln!(out, "{INDENT}[sensors]");
    for line in cell.grid() {
        let cells: Vec<String> = line
            .iter()
            .map(|reading| format!("{} {}", reading.key, reading.value))
            .collect();
        let _ = writeln!(out, "{INDENT}{INDENT}{}", cells.join(" | "));
    }
}

fn render_forecast_cell(out: &mut String, cell: &ForecastCell) {
    let _ = writeln!(out, "{INDENT}[forecast]");
    for line in cell.grid() {
        let cells: Vec<String> = line
            .iter()
            .map(|reading| format!("{} {}", reading.horizon, reading.value))
            .collect();
        let _ = writeln!(out, "{INDENT}{INDENT}{}", cells.join(" | "));
    }
}

pub fn render_site_row(out: &mut String, row: &SiteRow) {
    let _ = writeln!(out, "{}", row.site);
    for cell in row.cells() {
        match cell {
            CellRef::Date(cell) => render_date_cell(out, cell),
            CellRef::Sensor(cell) => render_sensor_cell(out, cell),
            CellRef::Forecast(cell) => render_forecast_cell(out, cell),
        }
    }
}

/// Renders every site row in table order.
pub fn render_tree(tree: &ViewTree) -> String {
    let mut out = String::new();
    for row in tree.rows() {
        render_site_row(&mut out, row);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::decode_frame;
    use crate::view::dispatch::dispatch;
    use crate::view::{Dashboard, ViewLayout};

    fn apply(dashboard: &mut Dashboard, raw: &str) {
        let mut payload = raw.as_bytes().to_vec();
        let event = decode_frame(payload.as_mut_slice()).expect("frame should decode");
        dispatch(dashboard, event);
    }

    #[test]
    fn renders_cells_in_display_order() {
        let mut dashboard = Dashboard::new(ViewLayout {
            sensor_columns: 2,
            ..ViewLayout::default()
        });
        apply(
            &mut dashboard,
            r#"{"type":"orderbook","data":{"ticker":"NY-25JUL04-T90","yes":40,"no":60}}"#,
        );
        apply(
            &mut dashboard,
            r#"{"type":"orderbook","data":{"ticker":"NY-25JUL04-B85.5","yes":10.5,"no":"89"}}"#,
        );
        apply(
            &mut dashboard,
            r#"{"type":"ForecastPoll","site":"NY","payload":[["01:00",70]]}"#,
        );
        apply(
            &mut dashboard,
            r#"{"type":"SensorPoll","payload":{"NY":[["air_temp",81.5],["dew_point",60],["wind",4]]}}"#,
        );
        apply(
            &mut dashboard,
            r#"{"type":"graph","data":[{"site":"NY","readings":{"xs":[1,3],"ys":[10,30]},"forecasts":{"xs":[2,3],"ys":[20,31]}}]}"#,
        );

        let rendered = render_tree(dashboard.tree());
        let lines: Vec<&str> = rendered.lines().map(str::trim_end).collect();
        assert_eq!(
            lines,
            vec![
                "NY",
                "  [NY site]",
                "    chart 3 points | Readings 30 | Forecasts 31",
                "  [NY 25JUL04]",
                "    B85.5      yes   10.5  no     89",
                "    T90        yes     40  no     60",
                "  [sensors]",
                "    air_temp 81.5 | dew_point 60",
                "    wind 4",
                "  [forecast]",
                "    01:00 70",
            ]
        );
    }

    #[test]
    fn empty_tree_renders_nothing() {
        assert!(render_tree(&ViewTree::default()).is_empty());
    }
}
