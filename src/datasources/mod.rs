//! Viewport Datasources
//!
//! Adapters that keep a remote table subscription in step with what a
//! virtualized grid is displaying.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ CompositeViewportDatasource  │  swaps Flat <-> Tree on grouping change
//! │  ┌────────────┐┌───────────┐ │
//! │  │   Table    ││   Tree    │ │  one active at a time
//! │  └────────────┘└───────────┘ │
//! └──────────────────────────────┘
//! ServerSideDatasource              pull-model alternative, same remote contract
//! ```
//!
//! Every datasource is single-threaded: remote and grid events are queued on
//! crossbeam channels and handled when the owner calls `pump()`.

mod base;
mod composite;
mod records;
mod server_side;
mod table;
mod tree;

use std::sync::Arc;

pub use base::ViewportCore;
pub use composite::{ActiveDatasource, CompositeViewportDatasource};
pub use records::materialize_rows;
pub use server_side::ServerSideDatasource;
pub use table::TableViewportDatasource;
pub use tree::TreeViewportDatasource;

use crate::error::Result;
use crate::grid::{FilterModel, GridApi, SortModelItem, ViewportCallbacks};
use crate::remote::AggregationSpec;

/// The row window currently requested from the remote table.
///
/// Both bounds are inclusive and `last_row >= first_row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub first_row: usize,
    pub last_row: usize,
}

impl Viewport {
    /// Create a viewport; `None` when `last_row < first_row`
    pub fn new(first_row: usize, last_row: usize) -> Option<Self> {
        (last_row >= first_row).then_some(Self {
            first_row,
            last_row,
        })
    }

    /// Number of rows in the window
    pub fn row_count(&self) -> usize {
        self.last_row - self.first_row + 1
    }

    /// Check if an absolute row index lies inside the window
    pub fn contains(&self, row: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row)
    }
}

/// Datasource lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    /// Callbacks registered
    Initialized,
    /// Callbacks registered and bound to a grid
    Listening,
    Destroyed,
}

/// Capability set shared by the push-model datasources
pub trait ViewportDatasource {
    /// Shared viewport and lifecycle bookkeeping
    fn core(&self) -> &ViewportCore;

    fn core_mut(&mut self) -> &mut ViewportCore;

    /// Register the callbacks used to push row count and row data into the
    /// grid. Valid exactly once.
    fn init(&mut self, callbacks: Arc<dyn ViewportCallbacks>) -> Result<()>;

    /// Bind to a grid's event surface, detaching from any previous grid first
    fn set_grid_api(&mut self, grid: Arc<dyn GridApi>) -> Result<()>;

    /// Record the visible window and request it from the remote table.
    ///
    /// Out-of-order or negative ranges are logged and ignored, never
    /// returned as errors.
    fn set_viewport_range(&mut self, first_row: i64, last_row: i64) {
        if let Some(viewport) = self.core_mut().record_viewport(first_row, last_row) {
            self.apply_viewport(viewport.first_row, viewport.last_row);
        }
    }

    /// Re-request the last recorded window; no-op before any window is set
    fn refresh_viewport(&mut self) {
        if let Some(viewport) = self.core().refresh_target() {
            self.apply_viewport(viewport.first_row, viewport.last_row);
        }
    }

    /// Translate and forward a grid filter model, then refresh the viewport
    fn apply_filter(&mut self, model: &FilterModel) -> Result<()>;

    /// Translate and forward a grid sort model, then refresh the viewport
    fn apply_sort(&mut self, model: &[SortModelItem]) -> Result<()>;

    /// Request a window from the remote table
    fn apply_viewport(&mut self, first_row: usize, last_row: usize);

    /// Apply value-column aggregations
    fn apply_aggregated_columns(&mut self, columns: &[AggregationSpec]) -> Result<()>;

    /// Handle every queued remote and grid event. Returns how many were
    /// handled.
    fn pump(&mut self) -> usize;

    /// Release the remote table and detach all listeners; idempotent
    fn destroy(&mut self);

    /// Current lifecycle state
    fn state(&self) -> LifecycleState {
        self.core().state()
    }

    /// Last recorded window
    fn viewport(&self) -> Option<Viewport> {
        self.core().viewport()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_rejects_inverted_ranges() {
        assert_eq!(Viewport::new(10, 5), None);
        let viewport = Viewport::new(3, 3).expect("single row");
        assert_eq!(viewport.row_count(), 1);
        assert!(viewport.contains(3));
        assert!(!viewport.contains(4));
    }
}
