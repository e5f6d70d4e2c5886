use crate::error::AppError;
use crate::view::chart::MergedChart;
use crate::view::keys::DateKey;
use crate::view::store::{FieldValue, ForecastReading, SensorReading};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeIds {
    next: u64,
}

impl NodeIds {
    pub fn allocate(&mut self) -> NodeId {
        self.next = self.next.saturating_add(1);
        NodeId(self.next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerRow {
    pub id: NodeId,
    pub ticker: String,
    /// First displayed cell; always a strike marker such as `T85`.
    pub label: String,
    pub strike: f64,
    pub yes: FieldValue,
    pub no: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBook {
    pub id: NodeId,
    rows: Vec<TickerRow>,
    positions: HashMap<String, usize>,
}

impl OrderBook {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            rows: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn rows(&self) -> &[TickerRow] {
        &self.rows
    }

    pub fn row(&self, ticker: &str) -> Option<&TickerRow> {
        self.positions.get(ticker).map(|position| &self.rows[*position])
    }

    /// Updates the row for `ticker` in place or appends a new one, then
    /// reorders every row ascending by strike.
    pub fn upsert_row(
        &mut self,
        ids: &mut NodeIds,
        ticker: &str,
        label: &str,
        strike: f64,
        yes: FieldValue,
        no: FieldValue,
    ) -> RowChange {
        let change = match self.positions.get(ticker) {
            Some(position) => {
                let row = &mut self.rows[*position];
                if row.yes == yes && row.no == no {
                    RowChange::Unchanged
                } else {
                    row.yes = yes;
                    row.no = no;
                    RowChange::Updated
                }
            }
            None => {
                self.rows.push(TickerRow {
                    id: ids.allocate(),
                    ticker: ticker.to_string(),
                    label: label.to_string(),
                    strike,
                    yes,
                    no,
                });
                RowChange::Inserted
            }
        };

        self.rows
            .sort_by(|left, right| left.strike.total_cmp(&right.strike));
        self.positions = self
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| (row.ticker.clone(), position))
            .collect();
        change
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub id: NodeId,
    pub merged: MergedChart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateContent {
    Book(OrderBook),
    Chart(Option<ChartView>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateCell {
    pub id: NodeId,
    pub date: DateKey,
    pub label: String,
    pub content: DateContent,
}

impl DateCell {
    pub fn book(&self) -> Option<&OrderBook> {
        match &self.content {
            DateContent::Book(book) => Some(book),
            DateContent::Chart(_) => None,
        }
    }

    pub fn book_mut(&mut self) -> Result<&mut OrderBook, AppError> {
        match &mut self.content {
            DateContent::Book(book) => Ok(book),
            DateContent::Chart(_) => Err(AppError::malformed(format!(
                "date cell '{}' hosts a chart, not an order book",
                self.label
            ))),
        }
    }

    pub fn chart(&self) -> Option<&ChartView> {
        match &self.content {
            DateContent::Chart(chart) => chart.as_ref(),
            DateContent::Book(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorCell {
    pub id: NodeId,
    pub readings: Vec<SensorReading>,
    pub columns: usize,
}

impl SensorCell {
    pub fn grid(&self) -> impl Iterator<Item = &[SensorReading]> {
        self.readings.chunks(self.columns.max(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastCell {
    pub id: NodeId,
    pub readings: Vec<ForecastReading>,
    pub columns: usize,
}

impl ForecastCell {
    pub fn grid(&self) -> impl Iterator<Item = &[ForecastReading]> {
        self.readings.chunks(self.columns.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellRef<'a> {
    Date(&'a DateCell),
    Sensor(&'a SensorCell),
    Forecast(&'a ForecastCell),
}

impl CellRef<'_> {
    pub fn id(&self) -> NodeId {
        match self {
            Self::Date(cell) => cell.id,
            Self::Sensor(cell) => cell.id,
            Self::Forecast(cell) => cell.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteRow {
    pub id: NodeId,
    pub site: String,
    dates: BTreeMap<DateKey, DateCell>,
    sensor: Option<SensorCell>,
    forecast: Option<ForecastCell>,
}

impl SiteRow {
    fn new(id: NodeId, site: &str) -> Self {
        Self {
            id,
            site: site.to_string(),
            dates: BTreeMap::new(),
            sensor: None,
            forecast: None,
        }
    }

    /// Cells in display order: date cells, then the sensor cell, then the
    /// forecast cell.
    pub fn cells(&self) -> Vec<CellRef<'_>> {
        self.dates
            .values()
            .map(CellRef::Date)
            .chain(self.sensor.iter().map(CellRef::Sensor))
            .chain(self.forecast.iter().map(CellRef::Forecast))
            .collect()
    }

    pub fn date_cells(&self) -> impl Iterator<Item = &DateCell> {
        self.dates.values()
    }

    pub fn date_cell(&self, date: &str) -> Option<&DateCell> {
        self.dates.get(&DateKey::parse(date))
    }

    pub fn sensor(&self) -> Option<&SensorCell> {
        self.sensor.as_ref()
    }

    pub fn forecast(&self) -> Option<&ForecastCell> {
        self.forecast.as_ref()
    }

    pub fn find_or_create_date_cell(&mut self, ids: &mut NodeIds, date: &str) -> &mut DateCell {
        let key = DateKey::parse(date);
        let site = &self.site;
        self.dates.entry(key.clone()).or_insert_with(|| {
            let content = if key.is_sentinel() {
                DateContent::Chart(None)
            } else {
                DateContent::Book(OrderBook::new(ids.allocate()))
            };
            DateCell {
                id: ids.allocate(),
                label: format!("{site} {}", key.as_str()),
                date: key,
                content,
            }
        })
    }

    pub fn replace_sensor(&mut self, ids: &mut NodeIds, readings: Vec<SensorReading>, columns: usize) {
        self.sensor = Some(SensorCell {
            id: ids.allocate(),
            readings,
            columns,
        });
    }

    pub fn replace_forecast(
        &mut self,
        ids: &mut NodeIds,
        readings: Vec<ForecastReading>,
        columns: usize,
    ) {
        self.forecast = Some(ForecastCell {
            id: ids.allocate(),
            readings,
            columns,
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewTree {
    ids: NodeIds,
    rows: Vec<SiteRow>,
    row_positions: HashMap<String, usize>,
}

impl ViewTree {
    pub fn rows(&self) -> &[SiteRow] {
        &self.rows
    }

    pub fn site_row(&self, site: &str) -> Option<&SiteRow> {
        self.row_positions
            .get(site)
            .map(|position| &self.rows[*position])
    }

    /// Splits the tree into its id allocator and the row for `site`, if any.
    pub fn site_row_mut(&mut self, site: &str) -> Option<(&mut NodeIds, &mut SiteRow)> {
        let position = *self.row_positions.get(site)?;
        Some((&mut self.ids, &mut self.rows[position]))
    }

    pub fn find_or_create_site_row(&mut self, site: &str) -> (&mut NodeIds, &mut SiteRow) {
        let position = match self.row_positions.get(site) {
            Some(position) => *position,
            None => {
                let id = self.ids.allocate();
                self.rows.push(SiteRow::new(id, site));
                let position = self.rows.len() - 1;
                self.row_positions.insert(site.to_string(), position);
                position
            }
        };
        (&mut self.ids, &mut self.rows[position])
    }
}
