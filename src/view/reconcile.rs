use crate::error::AppError;
use crate::feed::types::{ChartSiteUpdate, ForecastSiteUpdate, OrderBookUpdate, SensorSiteUpdate};
use crate::view::chart::merge_chart_series;
use crate::view::keys::{extract_strike, parse_ticker, SENTINEL_DATE};
use crate::view::store::{SeriesKind, SeriesPoint, UpsertOutcome, ViewStateStore};
use crate::view::tree::{ChartView, DateContent, RowChange, ViewTree};
use crate::view::ViewLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    Unchanged,
    /// Order-book entry without a strike segment.
    Dropped,
    /// Panel update for a site that has no row yet.
    Skipped,
}

pub fn apply_order_book(
    store: &mut ViewStateStore,
    tree: &mut ViewTree,
    update: &OrderBookUpdate,
) -> Result<ReconcileOutcome, AppError> {
    let key = parse_ticker(&update.ticker)?;
    let Some(strike_label) = key.strike else {
        return Ok(ReconcileOutcome::Dropped);
    };
    if key.date == SENTINEL_DATE {
        return Err(AppError::malformed(format!(
            "ticker '{}' uses the reserved date '{SENTINEL_DATE}'",
            update.ticker
        )));
    }
    let strike = extract_strike(&strike_label)?;

    let stored = store.upsert_order_book_entry(
        &key.site,
        &key.date,
        &update.ticker,
        update.yes.clone(),
        update.no.clone(),
    )?;

    let (ids, row) = tree.find_or_create_site_row(&key.site);
    let cell = row.find_or_create_date_cell(ids, &key.date);
    let book = cell.book_mut()?;
    let change = book.upsert_row(
        ids,
        &update.ticker,
        &strike_label,
        strike,
        update.yes.clone(),
        update.no.clone(),
    );

    match (stored, change) {
        (UpsertOutcome::Unchanged, RowChange::Unchanged) => Ok(ReconcileOutcome::Unchanged),
        _ => Ok(ReconcileOutcome::Applied),
    }
}

pub fn apply_sensor_readings(
    store: &mut ViewStateStore,
    tree: &mut ViewTree,
    layout: &ViewLayout,
    update: SensorSiteUpdate,
) -> Result<ReconcileOutcome, AppError> {
    let Some((ids, row)) = tree.site_row_mut(&update.site) else {
        return Ok(ReconcileOutcome::Skipped);
    };

    let readings = store
        .replace_sensor_readings(&update.site, update.readings, layout.sensor_max_rows)?
        .to_vec();
    row.replace_sensor(ids, readings, layout.sensor_columns);
    Ok(ReconcileOutcome::Applied)
}

pub fn apply_forecast_readings(
    store: &mut ViewStateStore,
    tree: &mut ViewTree,
    layout: &ViewLayout,
    update: ForecastSiteUpdate,
) -> Result<ReconcileOutcome, AppError> {
    let Some((ids, row)) = tree.site_row_mut(&update.site) else {
        return Ok(ReconcileOutcome::Skipped);
    };

    let readings = store
        .replace_forecast_readings(&update.site, update.readings, layout.forecast_max_rows)?
        .to_vec();
    row.replace_forecast(ids, readings, layout.forecast_columns);
    Ok(ReconcileOutcome::Applied)
}

pub fn apply_chart(
    store: &mut ViewStateStore,
    tree: &mut ViewTree,
    update: ChartSiteUpdate,
) -> Result<ReconcileOutcome, AppError> {
    store.replace_chart_series(&update.site, update.readings, update.forecasts)?;
    redraw_chart(store, tree, &update.site)
}

pub fn apply_chart_point(
    store: &mut ViewStateStore,
    tree: &mut ViewTree,
    site: &str,
    kind: SeriesKind,
    point: SeriesPoint,
) -> Result<ReconcileOutcome, AppError> {
    store.append_chart_point(site, kind, point)?;
    redraw_chart(store, tree, site)
}

fn redraw_chart(
    store: &ViewStateStore,
    tree: &mut ViewTree,
    site: &str,
) -> Result<ReconcileOutcome, AppError> {
    let series = store
        .chart_series(site)
        .ok_or_else(|| AppError::malformed(format!("no chart data stored for site '{site}'")))?;
    let merged = merge_chart_series(series);

    let (ids, row) = tree.find_or_create_site_row(site);
    let cell = row.find_or_create_date_cell(ids, SENTINEL_DATE);
    cell.content = DateContent::Chart(Some(ChartView {
        id: ids.allocate(),
        merged,
    }));
    Ok(ReconcileOutcome::Applied)
}
