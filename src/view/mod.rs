pub mod chart;
pub mod dispatch;
pub mod keys;
pub mod reconcile;
pub mod render;
pub mod store;
pub mod tree;

use store::ViewStateStore;
use tree::ViewTree;

pub const DEFAULT_SENSOR_MAX_ROWS: usize = 5;
pub const DEFAULT_SENSOR_COLUMNS: usize = 1;
pub const DEFAULT_FORECAST_MAX_ROWS: usize = 48;
pub const DEFAULT_FORECAST_COLUMNS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewLayout {
    pub sensor_max_rows: usize,
    pub sensor_columns: usize,
    pub forecast_max_rows: usize,
    pub forecast_columns: usize,
}

impl Default for ViewLayout {
    fn default() -> Self {
        Self {
            sensor_max_rows: DEFAULT_SENSOR_MAX_ROWS,
            sensor_columns: DEFAULT_SENSOR_COLUMNS,
            forecast_max_rows: DEFAULT_FORECAST_MAX_ROWS,
            forecast_columns: DEFAULT_FORECAST_COLUMNS,
        }
    }
}

/// State store plus rendered tree. Owned by the feed task; every frame is
/// applied to completion before the next one is read.
#[derive(Debug, Default)]
pub struct Dashboard {
    pub(crate) store: ViewStateStore,
    pub(crate) tree: ViewTree,
    pub(crate) layout: ViewLayout,
    revision: u64,
}

impl Dashboard {
    pub fn new(layout: ViewLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    pub fn store(&self) -> &ViewStateStore {
        &self.store
    }

    pub fn layout(&self) -> ViewLayout {
        self.layout
    }

    /// Bumped once per dispatched event that changed the tree.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn mark_changed(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }
}
