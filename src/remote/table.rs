//! Remote Table Contract
//!
//! The boundary this crate consumes: a server-backed table that accepts a
//! row window subscription, filters and sorts, and pushes a full snapshot
//! of the subscribed window on every update.

use std::str::FromStr;
use std::sync::Arc;

use crossbeam_channel::Sender;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::value::{Column, Value};
use crate::error::{Error, Result};
use crate::filters::{FilterCondition, Sort};
use crate::listeners::ListenerId;

/// Remote-stable identity of a tree row.
///
/// Unlike a viewport position, this does not shift when rows above the
/// row are expanded or collapsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowIndex(pub u64);

/// Hierarchy metadata delivered with tree rows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeRowInfo {
    pub has_children: bool,
    pub is_expanded: bool,
    pub depth: usize,
    pub index: RowIndex,
}

/// One row of a viewport snapshot
#[derive(Clone, Debug, PartialEq)]
pub struct ViewportRow {
    /// Values aligned with `ViewportData::columns`
    pub values: Vec<Value>,
    /// Present for rows of tree tables
    pub tree: Option<TreeRowInfo>,
}

impl ViewportRow {
    /// Create a flat row
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, tree: None }
    }

    /// Create a tree row
    pub fn tree(values: Vec<Value>, info: TreeRowInfo) -> Self {
        Self {
            values,
            tree: Some(info),
        }
    }

    /// Value at a column position
    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }
}

/// A complete snapshot of the subscribed window.
///
/// `offset` is the absolute row index of `rows[0]`. Each snapshot supersedes
/// the previous one entirely.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewportData {
    pub offset: usize,
    pub columns: Vec<Column>,
    pub rows: Vec<ViewportRow>,
}

impl ViewportData {
    /// Absolute row indexes covered by this snapshot
    pub fn row_range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.rows.len()
    }
}

/// Events pushed by a remote table
#[derive(Clone, Debug)]
pub enum TableEvent {
    /// New snapshot of the subscribed window
    Updated(Arc<ViewportData>),
    /// Row count changed
    SizeChanged(usize),
    /// Connection to the server was lost
    Disconnect,
    /// A request to the server failed
    RequestFailed(String),
}

impl TableEvent {
    /// Kind of this event
    pub fn kind(&self) -> TableEventKind {
        match self {
            TableEvent::Updated(_) => TableEventKind::Updated,
            TableEvent::SizeChanged(_) => TableEventKind::SizeChanged,
            TableEvent::Disconnect => TableEventKind::Disconnect,
            TableEvent::RequestFailed(_) => TableEventKind::RequestFailed,
        }
    }
}

/// Event kinds a listener can register for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableEventKind {
    Updated,
    SizeChanged,
    Disconnect,
    RequestFailed,
}

impl TableEventKind {
    /// Every event kind
    pub const ALL: [TableEventKind; 4] = [
        TableEventKind::Disconnect,
        TableEventKind::RequestFailed,
        TableEventKind::Updated,
        TableEventKind::SizeChanged,
    ];
}

/// Aggregation function applied to a value column of a rollup
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggOperation {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    First,
    Last,
}

impl FromStr for AggOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sum" => Ok(AggOperation::Sum),
            "avg" => Ok(AggOperation::Avg),
            "min" => Ok(AggOperation::Min),
            "max" => Ok(AggOperation::Max),
            "count" => Ok(AggOperation::Count),
            "first" => Ok(AggOperation::First),
            "last" => Ok(AggOperation::Last),
            other => Err(Error::InvalidState {
                message: format!("unknown aggregation function '{other}'"),
            }),
        }
    }
}

/// One aggregated value column
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub column: String,
    pub operation: AggOperation,
}

impl AggregationSpec {
    /// Create a new aggregation spec
    pub fn new(column: impl Into<String>, operation: AggOperation) -> Self {
        Self {
            column: column.into(),
            operation,
        }
    }
}

/// Request to build a rollup (tree) table from a flat table
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RollupConfig {
    /// Grouping columns, outermost first
    pub group_by: Vec<String>,
    /// Aggregations computed per group
    pub aggregations: Vec<AggregationSpec>,
}

/// An active viewport subscription
pub trait ViewportSubscription: Send + Sync {
    /// Move the subscribed window without recreating the subscription
    fn set_viewport(&self, first_row: usize, last_row: usize) -> Result<()>;

    /// Release the subscription. Responses still in flight are ignored.
    fn close(&self);
}

/// A server-backed flat table
pub trait RemoteTable: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Current row count; the authoritative source for row count reporting
    fn size(&self) -> usize;

    /// Columns of the table
    fn columns(&self) -> Vec<Column>;

    /// Look up a column by name
    fn find_column(&self, name: &str) -> Result<Column> {
        self.columns()
            .into_iter()
            .find(|column| column.name == name)
            .ok_or_else(|| Error::ColumnNotFound {
                name: name.to_string(),
            })
    }

    /// Subscribe to a row window. `columns` of `None` subscribes every column.
    fn set_viewport(
        &self,
        first_row: usize,
        last_row: usize,
        columns: Option<&[Column]>,
    ) -> Result<Box<dyn ViewportSubscription>>;

    /// Replace the active filters; an empty list clears them
    fn apply_filter(&self, filters: Vec<FilterCondition>) -> Result<()>;

    /// Replace the active sorts; an empty list clears them
    fn apply_sort(&self, sorts: Vec<Sort>) -> Result<()>;

    /// Register a listener for one kind of event
    fn add_listener(&self, kind: TableEventKind, tx: Sender<TableEvent>) -> ListenerId;

    /// Remove a listener
    fn remove_listener(&self, id: ListenerId);

    /// Build a rollup of this table. This is a network round trip.
    fn rollup(&self, config: RollupConfig) -> BoxFuture<'static, Result<Arc<dyn RemoteTreeTable>>>;

    /// Release server-side resources; idempotent
    fn close(&self);
}

/// A server-backed hierarchical (tree or rollup) table
pub trait RemoteTreeTable: RemoteTable {
    /// Expand or collapse the row at a viewport position
    fn set_expanded(&self, row: usize, expanded: bool) -> Result<()>;

    /// Expand every row
    fn expand_all(&self) -> Result<()>;

    /// Collapse every row
    fn collapse_all(&self) -> Result<()>;
}

/// Register one listener per kind on a table
pub(crate) fn attach_listeners<T>(
    table: &T,
    kinds: &[TableEventKind],
    tx: &Sender<TableEvent>,
) -> Vec<ListenerId>
where
    T: RemoteTable + ?Sized,
{
    kinds
        .iter()
        .map(|kind| table.add_listener(*kind, tx.clone()))
        .collect()
}

/// Remove every listener in `ids`, leaving it empty
pub(crate) fn detach_listeners<T>(table: &T, ids: &mut Vec<ListenerId>)
where
    T: RemoteTable + ?Sized,
{
    for id in ids.drain(..) {
        table.remove_listener(id);
    }
}

/// Whether a datasource closes its table when destroyed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableOwnership {
    /// The datasource closes the table on destroy
    Owned,
    /// The caller keeps the table; destroy only detaches
    Shared,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agg_operation_parses_grid_names() {
        assert_eq!("sum".parse::<AggOperation>().ok(), Some(AggOperation::Sum));
        assert_eq!("last".parse::<AggOperation>().ok(), Some(AggOperation::Last));
        assert!("median".parse::<AggOperation>().is_err());
    }

    #[test]
    fn row_range_starts_at_offset() {
        let data = ViewportData {
            offset: 10,
            columns: Vec::new(),
            rows: vec![ViewportRow::new(Vec::new()); 3],
        };
        assert_eq!(data.row_range(), 10..13);
    }
}
