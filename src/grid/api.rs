//! Host Grid Boundary
//!
//! Capabilities consumed from the host grid, passed explicitly to each
//! datasource instead of living as an ambient field.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::Sender;

use super::models::{FilterModel, SortModelItem};
use super::records::{RowRecord, RowState};
use crate::listeners::ListenerId;
use crate::remote::AggregationSpec;

/// Notifications raised by the host grid
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridEvent {
    /// The filter model changed
    FilterChanged,
    /// The sort model changed
    SortChanged,
    /// Columns were added to or removed from the grouping area
    RowGroupChanged,
    /// Value (aggregation) columns changed
    ValueChanged,
    /// The user expanded or collapsed a group row
    RowGroupOpened { row: usize, expanded: bool },
}

impl GridEvent {
    /// Kind of this event
    pub fn kind(&self) -> GridEventKind {
        match self {
            GridEvent::FilterChanged => GridEventKind::FilterChanged,
            GridEvent::SortChanged => GridEventKind::SortChanged,
            GridEvent::RowGroupChanged => GridEventKind::RowGroupChanged,
            GridEvent::ValueChanged => GridEventKind::ValueChanged,
            GridEvent::RowGroupOpened { .. } => GridEventKind::RowGroupOpened,
        }
    }
}

/// Grid event kinds a listener can register for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridEventKind {
    FilterChanged,
    SortChanged,
    RowGroupChanged,
    ValueChanged,
    RowGroupOpened,
}

/// The host grid's event surface and data-push capabilities
pub trait GridApi: Send + Sync {
    /// Register a listener for one kind of event
    fn add_event_listener(&self, kind: GridEventKind, tx: Sender<GridEvent>) -> ListenerId;

    /// Remove a listener
    fn remove_event_listener(&self, id: ListenerId);

    /// Current filter model
    fn filter_model(&self) -> FilterModel;

    /// Current sort model
    fn sort_model(&self) -> Vec<SortModelItem>;

    /// Current row-group columns, outermost first
    fn row_group_columns(&self) -> Vec<String>;

    /// Current value columns and their aggregation functions
    fn value_columns(&self) -> Vec<AggregationSpec>;

    /// Replace the data of the row node with `id`. Returns false when the
    /// grid has no node with that id.
    fn update_row_data(&self, id: &str, row: RowState) -> bool;

    /// Set the total row count
    fn set_row_count(&self, count: usize);

    /// Size every column to its content
    fn auto_size_all_columns(&self);
}

/// Callbacks registered by the grid's viewport row model
pub trait ViewportCallbacks: Send + Sync {
    /// Report the total number of rows
    fn set_row_count(&self, count: usize);

    /// Push row data keyed by absolute row index
    fn set_row_data(&self, rows: BTreeMap<usize, RowRecord>);
}

/// Completion callbacks for one pull-model page request
pub trait GetRowsCallback {
    /// Deliver the page and the total row count, if known
    fn success(&self, rows: Vec<RowState>, row_count: Option<usize>);

    /// Report that the page cannot be delivered
    fn fail(&self);
}

/// Listeners registered on a grid, removed together on `detach`.
///
/// Dropping the binding detaches it.
pub struct GridBinding {
    grid: Arc<dyn GridApi>,
    listener_ids: Vec<ListenerId>,
}

impl GridBinding {
    /// Register `tx` for each kind in `kinds`
    pub fn bind(grid: Arc<dyn GridApi>, kinds: &[GridEventKind], tx: &Sender<GridEvent>) -> Self {
        let listener_ids = kinds
            .iter()
            .map(|kind| grid.add_event_listener(*kind, tx.clone()))
            .collect();
        Self { grid, listener_ids }
    }

    /// The bound grid
    pub fn grid(&self) -> &Arc<dyn GridApi> {
        &self.grid
    }

    /// Check if listeners are still registered
    pub fn is_attached(&self) -> bool {
        !self.listener_ids.is_empty()
    }

    /// Remove every registered listener; idempotent
    pub fn detach(&mut self) {
        for id in self.listener_ids.drain(..) {
            self.grid.remove_event_listener(id);
        }
    }
}

impl Drop for GridBinding {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for GridBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridBinding")
            .field("listeners", &self.listener_ids)
            .finish()
    }
}
