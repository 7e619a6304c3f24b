//! In-process Remote Table
//!
//! A `RemoteTable` over rows held in memory. Filters and sorts are evaluated
//! locally and every change is pushed to listeners synchronously, which makes
//! it a convenient stand-in for a server in the demo binary and in tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use crossbeam_channel::Sender;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use super::table::{
    RemoteTable, RemoteTreeTable, RollupConfig, TableEvent, TableEventKind, ViewportData,
    ViewportRow, ViewportSubscription,
};
use super::value::{Column, Value};
use crate::error::{Error, Result};
use crate::filters::{FilterCondition, Sort, SortDirection};
use crate::listeners::{ListenerId, ListenerRegistry};

/// One subscribed window
#[derive(Debug, Clone)]
struct Window {
    first_row: usize,
    last_row: usize,
    /// Column positions to deliver; all columns when `None`
    projection: Option<Vec<usize>>,
}

#[derive(Default)]
struct MemoryState {
    rows: Vec<Vec<Value>>,
    /// Positions into `rows` after filtering and sorting
    view: Vec<usize>,
    filters: Vec<FilterCondition>,
    sorts: Vec<Sort>,
    windows: AHashMap<u64, Window>,
}

/// Rows held in memory, served through the remote table contract
pub struct MemoryTable {
    name: String,
    columns: Vec<Column>,
    column_index: AHashMap<String, usize>,
    state: Mutex<MemoryState>,
    listeners: ListenerRegistry<TableEventKind, TableEvent>,
    next_subscription: AtomicU64,
    closed: AtomicBool,
    self_ref: Weak<MemoryTable>,
}

impl MemoryTable {
    /// Create a table; each row must be aligned with `columns`
    pub fn new(name: impl Into<String>, columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Arc<Self> {
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.name.clone(), i))
            .collect();
        let view = (0..rows.len()).collect();
        Arc::new_cyclic(|self_ref| Self {
            name: name.into(),
            columns,
            column_index,
            state: Mutex::new(MemoryState {
                rows,
                view,
                ..Default::default()
            }),
            listeners: ListenerRegistry::new(),
            next_subscription: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }

    /// Append rows and publish the new size and windows
    pub fn append_rows(&self, rows: Vec<Vec<Value>>) {
        {
            let mut state = self.state.lock();
            state.rows.extend(rows);
        }
        self.recompute_and_publish();
    }

    /// Replace one cell of an underlying row and republish
    pub fn set_cell(&self, row: usize, column: &str, value: Value) -> Result<()> {
        let index = self.column_position(column)?;
        {
            let mut state = self.state.lock();
            let cells = state
                .rows
                .get_mut(row)
                .ok_or_else(|| Error::invalid_state(format!("row {row} out of range")))?;
            if let Some(cell) = cells.get_mut(index) {
                *cell = value;
            }
        }
        self.recompute_and_publish();
        Ok(())
    }

    /// Check if the table has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of open viewport subscriptions
    pub fn subscription_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    fn column_position(&self, name: &str) -> Result<usize> {
        self.column_index
            .get(name)
            .copied()
            .ok_or_else(|| Error::ColumnNotFound {
                name: name.to_string(),
            })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::remote(format!("table '{}' is closed", self.name)));
        }
        Ok(())
    }

    fn cell<'a>(&self, row: &'a [Value], column: &str) -> Option<&'a Value> {
        self.column_index.get(column).and_then(|i| row.get(*i))
    }

    fn compute_view(&self, state: &MemoryState) -> Vec<usize> {
        let mut view: Vec<usize> = (0..state.rows.len())
            .filter(|&i| {
                let row = &state.rows[i];
                let lookup = |column: &str| self.cell(row, column).cloned().unwrap_or_default();
                state.filters.iter().all(|filter| filter.matches(&lookup))
            })
            .collect();

        if !state.sorts.is_empty() {
            view.sort_by(|&a, &b| {
                for sort in &state.sorts {
                    let key = |i: usize| {
                        let value = self
                            .cell(&state.rows[i], &sort.column)
                            .cloned()
                            .unwrap_or_default();
                        if sort.is_abs { value.abs() } else { value }
                    };
                    let ordering = key(a).sort_cmp(&key(b));
                    let ordering = match sort.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    };
                    if ordering.is_ne() {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }
        view
    }

    fn snapshot(&self, state: &MemoryState, window: &Window) -> ViewportData {
        let columns = match &window.projection {
            Some(positions) => positions.iter().map(|&i| self.columns[i].clone()).collect(),
            None => self.columns.clone(),
        };
        let end = (window.last_row + 1).min(state.view.len());
        let rows = state
            .view
            .get(window.first_row..end)
            .unwrap_or_default()
            .iter()
            .map(|&i| {
                let row = &state.rows[i];
                let values = match &window.projection {
                    Some(positions) => positions
                        .iter()
                        .map(|&p| row.get(p).cloned().unwrap_or_default())
                        .collect(),
                    None => row.clone(),
                };
                ViewportRow::new(values)
            })
            .collect();
        ViewportData {
            offset: window.first_row,
            columns,
            rows,
        }
    }

    /// Publish the current contents of one window
    fn publish_window(&self, id: u64) {
        let data = {
            let state = self.state.lock();
            match state.windows.get(&id) {
                Some(window) => self.snapshot(&state, window),
                None => return,
            }
        };
        self.listeners
            .emit(TableEventKind::Updated, &TableEvent::Updated(Arc::new(data)));
    }

    fn recompute_and_publish(&self) {
        if self.is_closed() {
            return;
        }
        let (size_changed, size, snapshots) = {
            let mut state = self.state.lock();
            let before = state.view.len();
            state.view = self.compute_view(&state);
            let snapshots: Vec<ViewportData> = state
                .windows
                .values()
                .map(|window| self.snapshot(&state, window))
                .collect();
            (before != state.view.len(), state.view.len(), snapshots)
        };

        if size_changed {
            self.listeners
                .emit(TableEventKind::SizeChanged, &TableEvent::SizeChanged(size));
        }
        for data in snapshots {
            self.listeners
                .emit(TableEventKind::Updated, &TableEvent::Updated(Arc::new(data)));
        }
    }

    fn resize_window(&self, id: u64, first_row: usize, last_row: usize) -> Result<()> {
        self.ensure_open()?;
        {
            let mut state = self.state.lock();
            let window = state
                .windows
                .get_mut(&id)
                .ok_or_else(|| Error::remote(format!("subscription {id} is closed")))?;
            window.first_row = first_row;
            window.last_row = last_row;
        }
        self.publish_window(id);
        Ok(())
    }

    fn close_window(&self, id: u64) {
        self.state.lock().windows.remove(&id);
    }
}

impl RemoteTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.state.lock().view.len()
    }

    fn columns(&self) -> Vec<Column> {
        self.columns.clone()
    }

    fn set_viewport(
        &self,
        first_row: usize,
        last_row: usize,
        columns: Option<&[Column]>,
    ) -> Result<Box<dyn ViewportSubscription>> {
        self.ensure_open()?;
        let projection = columns
            .map(|columns| {
                columns
                    .iter()
                    .map(|column| self.column_position(&column.name))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.state.lock().windows.insert(
            id,
            Window {
                first_row,
                last_row,
                projection,
            },
        );
        self.publish_window(id);

        Ok(Box::new(MemorySubscription {
            table: self.self_ref.clone(),
            id,
            closed: AtomicBool::new(false),
        }))
    }

    fn apply_filter(&self, filters: Vec<FilterCondition>) -> Result<()> {
        self.ensure_open()?;
        self.state.lock().filters = filters;
        self.recompute_and_publish();
        Ok(())
    }

    fn apply_sort(&self, sorts: Vec<Sort>) -> Result<()> {
        self.ensure_open()?;
        self.state.lock().sorts = sorts;
        self.recompute_and_publish();
        Ok(())
    }

    fn add_listener(&self, kind: TableEventKind, tx: Sender<TableEvent>) -> ListenerId {
        self.listeners.add(kind, tx)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn rollup(&self, config: RollupConfig) -> BoxFuture<'static, Result<Arc<dyn RemoteTreeTable>>> {
        let error = Error::remote(format!(
            "table '{}' cannot build a rollup by {:?}",
            self.name, config.group_by
        ));
        Box::pin(futures::future::ready(Err(error)))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.lock().windows.clear();
        tracing::debug!(table = %self.name, "memory table closed");
    }
}

/// Subscription handle returned by `MemoryTable::set_viewport`
struct MemorySubscription {
    table: Weak<MemoryTable>,
    id: u64,
    closed: AtomicBool,
}

impl ViewportSubscription for MemorySubscription {
    fn set_viewport(&self, first_row: usize, last_row: usize) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::remote(format!("subscription {} is closed", self.id)));
        }
        match self.table.upgrade() {
            Some(table) => table.resize_window(self.id, first_row, last_row),
            None => Err(Error::remote("table dropped")),
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(table) = self.table.upgrade() {
            table.close_window(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{ColumnFilter, FilterValue};
    use crate::remote::ColumnType;
    use crossbeam_channel::{Receiver, unbounded};

    fn table(rows: i64) -> Arc<MemoryTable> {
        MemoryTable::new(
            "numbers",
            vec![
                Column::new("N", ColumnType::Long),
                Column::new("Parity", ColumnType::String),
            ],
            (0..rows)
                .map(|n| {
                    let parity = if n % 2 == 0 { "even" } else { "odd" };
                    vec![Value::Int(n), Value::from(parity)]
                })
                .collect(),
        )
    }

    fn listen(table: &MemoryTable, kind: TableEventKind) -> Receiver<TableEvent> {
        let (tx, rx) = unbounded();
        table.add_listener(kind, tx);
        rx
    }

    fn next_update(rx: &Receiver<TableEvent>) -> Arc<ViewportData> {
        match rx.try_recv().expect("an update") {
            TableEvent::Updated(data) => data,
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn viewport_publishes_inclusive_window() {
        let table = table(20);
        let updates = listen(&table, TableEventKind::Updated);
        let subscription = table.set_viewport(5, 9, None).expect("subscribe");

        let data = next_update(&updates);
        assert_eq!(data.offset, 5);
        assert_eq!(data.rows.len(), 5);
        assert_eq!(data.rows[0].get(0), Some(&Value::Int(5)));

        subscription.set_viewport(18, 30).expect("resize");
        let data = next_update(&updates);
        assert_eq!(data.row_range(), 18..20);
    }

    #[test]
    fn filter_and_sort_are_applied_locally() {
        let table = table(10);
        let sizes = listen(&table, TableEventKind::SizeChanged);
        let updates = listen(&table, TableEventKind::Updated);
        let _subscription = table.set_viewport(0, 2, None).expect("subscribe");
        next_update(&updates);

        table
            .apply_filter(vec![
                ColumnFilter::new("Parity").eq(FilterValue::of_string("odd")),
            ])
            .expect("filter");
        assert!(matches!(sizes.try_recv(), Ok(TableEvent::SizeChanged(5))));
        assert_eq!(table.size(), 5);
        next_update(&updates);

        table.apply_sort(vec![Sort::desc("N")]).expect("sort");
        let data = next_update(&updates);
        let firsts: Vec<_> = data.rows.iter().filter_map(|row| row.get(0).cloned()).collect();
        assert_eq!(firsts, vec![Value::Int(9), Value::Int(7), Value::Int(5)]);
    }

    #[test]
    fn projected_columns_are_delivered_in_order() {
        let table = table(3);
        let updates = listen(&table, TableEventKind::Updated);
        let parity = table.find_column("Parity").expect("column");
        let _subscription = table
            .set_viewport(0, 0, Some(std::slice::from_ref(&parity)))
            .expect("subscribe");

        let data = next_update(&updates);
        assert_eq!(data.columns, vec![parity]);
        assert_eq!(data.rows[0].values, vec![Value::from("even")]);
    }

    #[test]
    fn closed_subscriptions_stop_updating() {
        let table = table(3);
        let subscription = table.set_viewport(0, 1, None).expect("subscribe");
        assert_eq!(table.subscription_count(), 1);
        subscription.close();
        subscription.close();
        assert_eq!(table.subscription_count(), 0);
        assert!(subscription.set_viewport(0, 2).is_err());
    }

    #[test]
    fn close_is_idempotent_and_rejects_new_viewports() {
        let table = table(3);
        table.close();
        table.close();
        assert!(table.is_closed());
        assert!(table.set_viewport(0, 1, None).is_err());
    }

    #[test]
    fn rollup_reports_a_remote_failure() {
        let table = table(3);
        let result = futures::executor::block_on(table.rollup(RollupConfig {
            group_by: vec!["Parity".to_string()],
            aggregations: Vec::new(),
        }));
        assert!(matches!(result, Err(Error::Remote { .. })));
    }
}
