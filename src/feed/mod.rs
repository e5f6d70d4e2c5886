pub mod connection;
pub mod pipeline;
pub mod types;

pub const ORDERBOOK_EVENT: &str = "orderbook";
pub const SENSOR_POLL_EVENT: &str = "SensorPoll";
pub const FORECAST_POLL_EVENT: &str = "ForecastPoll";
pub const GRAPH_EVENT: &str = "graph";
