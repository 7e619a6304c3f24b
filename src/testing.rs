//! Test doubles for the remote table and host grid boundaries

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crossbeam_channel::Sender;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::filters::{FilterCondition, Sort};
use crate::grid::{
    FilterModel, GetRowsCallback, GridApi, GridEvent, GridEventKind, RowRecord, RowState,
    SortModelItem, ViewportCallbacks,
};
use crate::listeners::{ListenerId, ListenerRegistry};
use crate::pivot::{PivotEvent, PivotSource, PivotViewport, RemotePivotTable, ValueSource};
use crate::remote::{
    AggregationSpec, Column, RemoteTable, RemoteTreeTable, RollupConfig, TableEvent,
    TableEventKind, ViewportData, ViewportSubscription,
};

/// Ordered log of calls shared across collaborators
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// A call made against a `MockTable` or one of its subscriptions
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TableCall {
    SetViewport { first_row: usize, last_row: usize },
    ResizeViewport { first_row: usize, last_row: usize },
    CloseViewport,
    ApplyFilter(Vec<FilterCondition>),
    ApplySort(Vec<Sort>),
    Rollup(RollupConfig),
    SetExpanded { row: usize, expanded: bool },
    ExpandAll,
    CollapseAll,
    Close,
}

impl TableCall {
    fn label(&self) -> &'static str {
        match self {
            TableCall::SetViewport { .. } => "set_viewport",
            TableCall::ResizeViewport { .. } => "resize_viewport",
            TableCall::CloseViewport => "close_viewport",
            TableCall::ApplyFilter(_) => "apply_filter",
            TableCall::ApplySort(_) => "apply_sort",
            TableCall::Rollup(_) => "rollup",
            TableCall::SetExpanded { .. } => "set_expanded",
            TableCall::ExpandAll => "expand_all",
            TableCall::CollapseAll => "collapse_all",
            TableCall::Close => "close",
        }
    }
}

#[derive(Clone)]
struct CallLog {
    name: String,
    calls: Arc<Mutex<Vec<TableCall>>>,
    journal: Journal,
}

impl CallLog {
    fn record(&self, call: TableCall) {
        self.journal.record(format!("{}.{}", self.name, call.label()));
        self.calls.lock().push(call);
    }
}

type RollupSender = oneshot::Sender<Result<Arc<dyn RemoteTreeTable>>>;

/// Scriptable flat and tree table. Events are only emitted when a test asks;
/// rollups stay pending until `resolve_rollup`.
pub(crate) struct MockTable {
    columns: Vec<Column>,
    size: AtomicUsize,
    log: CallLog,
    listeners: ListenerRegistry<TableEventKind, TableEvent>,
    rollups: Mutex<Vec<Option<RollupSender>>>,
    close_count: AtomicUsize,
}

impl MockTable {
    pub fn new(name: &str, columns: Vec<Column>, size: usize) -> Arc<Self> {
        Self::with_journal(name, columns, size, &Journal::new())
    }

    pub fn with_journal(name: &str, columns: Vec<Column>, size: usize, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            columns,
            size: AtomicUsize::new(size),
            log: CallLog {
                name: name.to_string(),
                calls: Arc::new(Mutex::new(Vec::new())),
                journal: journal.clone(),
            },
            listeners: ListenerRegistry::new(),
            rollups: Mutex::new(Vec::new()),
            close_count: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> Vec<TableCall> {
        self.log.calls.lock().clone()
    }

    /// Windows passed to `set_viewport`, in order
    pub fn viewport_calls(&self) -> Vec<(usize, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TableCall::SetViewport {
                    first_row,
                    last_row,
                } => Some((first_row, last_row)),
                _ => None,
            })
            .collect()
    }

    pub fn filter_calls(&self) -> Vec<Vec<FilterCondition>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TableCall::ApplyFilter(filters) => Some(filters),
                _ => None,
            })
            .collect()
    }

    pub fn sort_calls(&self) -> Vec<Vec<Sort>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TableCall::ApplySort(sorts) => Some(sorts),
                _ => None,
            })
            .collect()
    }

    pub fn rollup_requests(&self) -> Vec<RollupConfig> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TableCall::Rollup(config) => Some(config),
                _ => None,
            })
            .collect()
    }

    /// Complete the `index`-th rollup request
    pub fn resolve_rollup(&self, index: usize, result: Result<Arc<dyn RemoteTreeTable>>) {
        let sender = self
            .rollups
            .lock()
            .get_mut(index)
            .and_then(Option::take)
            .expect("pending rollup");
        // The receiver may be gone if the datasource was dropped
        let _ = sender.send(result);
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn set_size(&self, size: usize) {
        self.size.store(size, Ordering::SeqCst);
    }

    pub fn emit(&self, event: TableEvent) -> usize {
        self.listeners.emit(event.kind(), &event)
    }

    pub fn emit_update(&self, data: ViewportData) -> usize {
        self.emit(TableEvent::Updated(Arc::new(data)))
    }
}

impl RemoteTable for MockTable {
    fn name(&self) -> &str {
        &self.log.name
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    fn columns(&self) -> Vec<Column> {
        self.columns.clone()
    }

    fn set_viewport(
        &self,
        first_row: usize,
        last_row: usize,
        _columns: Option<&[Column]>,
    ) -> Result<Box<dyn ViewportSubscription>> {
        self.log.record(TableCall::SetViewport {
            first_row,
            last_row,
        });
        Ok(Box::new(MockSubscription {
            log: self.log.clone(),
        }))
    }

    fn apply_filter(&self, filters: Vec<FilterCondition>) -> Result<()> {
        self.log.record(TableCall::ApplyFilter(filters));
        Ok(())
    }

    fn apply_sort(&self, sorts: Vec<Sort>) -> Result<()> {
        self.log.record(TableCall::ApplySort(sorts));
        Ok(())
    }

    fn add_listener(&self, kind: TableEventKind, tx: Sender<TableEvent>) -> ListenerId {
        self.listeners.add(kind, tx)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn rollup(&self, config: RollupConfig) -> BoxFuture<'static, Result<Arc<dyn RemoteTreeTable>>> {
        self.log.record(TableCall::Rollup(config));
        let (tx, rx) = oneshot::channel();
        self.rollups.lock().push(Some(tx));
        async move {
            rx.await
                .unwrap_or_else(|_| Err(Error::remote("rollup abandoned")))
        }
        .boxed()
    }

    fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.log.record(TableCall::Close);
    }
}

impl RemoteTreeTable for MockTable {
    fn set_expanded(&self, row: usize, expanded: bool) -> Result<()> {
        self.log.record(TableCall::SetExpanded { row, expanded });
        Ok(())
    }

    fn expand_all(&self) -> Result<()> {
        self.log.record(TableCall::ExpandAll);
        Ok(())
    }

    fn collapse_all(&self) -> Result<()> {
        self.log.record(TableCall::CollapseAll);
        Ok(())
    }
}

struct MockSubscription {
    log: CallLog,
}

impl ViewportSubscription for MockSubscription {
    fn set_viewport(&self, first_row: usize, last_row: usize) -> Result<()> {
        self.log.record(TableCall::ResizeViewport {
            first_row,
            last_row,
        });
        Ok(())
    }

    fn close(&self) {
        self.log.record(TableCall::CloseViewport);
    }
}

/// Host grid with settable models that records what datasources push
#[derive(Default)]
pub(crate) struct MockGrid {
    journal: Journal,
    listeners: ListenerRegistry<GridEventKind, GridEvent>,
    filter_model: Mutex<FilterModel>,
    sort_model: Mutex<Vec<SortModelItem>>,
    row_group_columns: Mutex<Vec<String>>,
    value_columns: Mutex<Vec<AggregationSpec>>,
    row_updates: Mutex<Vec<(String, RowState)>>,
    row_counts: Mutex<Vec<usize>>,
    auto_size_count: AtomicUsize,
}

impl MockGrid {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_journal(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            ..Default::default()
        })
    }

    pub fn emit(&self, event: GridEvent) -> usize {
        self.listeners.emit(event.kind(), &event)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn set_filter_model(&self, model: FilterModel) {
        *self.filter_model.lock() = model;
    }

    pub fn set_sort_model(&self, model: Vec<SortModelItem>) {
        *self.sort_model.lock() = model;
    }

    pub fn set_row_group_columns(&self, columns: Vec<String>) {
        *self.row_group_columns.lock() = columns;
    }

    pub fn set_value_columns(&self, columns: Vec<AggregationSpec>) {
        *self.value_columns.lock() = columns;
    }

    pub fn row_updates(&self) -> Vec<(String, RowState)> {
        self.row_updates.lock().clone()
    }

    pub fn row_counts(&self) -> Vec<usize> {
        self.row_counts.lock().clone()
    }

    pub fn auto_size_count(&self) -> usize {
        self.auto_size_count.load(Ordering::SeqCst)
    }
}

impl GridApi for MockGrid {
    fn add_event_listener(&self, kind: GridEventKind, tx: Sender<GridEvent>) -> ListenerId {
        self.journal.record(format!("grid.add_listener {kind:?}"));
        self.listeners.add(kind, tx)
    }

    fn remove_event_listener(&self, id: ListenerId) {
        self.journal.record(format!("grid.remove_listener {id}"));
        self.listeners.remove(id);
    }

    fn filter_model(&self) -> FilterModel {
        self.filter_model.lock().clone()
    }

    fn sort_model(&self) -> Vec<SortModelItem> {
        self.sort_model.lock().clone()
    }

    fn row_group_columns(&self) -> Vec<String> {
        self.row_group_columns.lock().clone()
    }

    fn value_columns(&self) -> Vec<AggregationSpec> {
        self.value_columns.lock().clone()
    }

    fn update_row_data(&self, id: &str, row: RowState) -> bool {
        self.row_updates.lock().push((id.to_string(), row));
        true
    }

    fn set_row_count(&self, count: usize) {
        self.row_counts.lock().push(count);
    }

    fn auto_size_all_columns(&self) {
        self.auto_size_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Viewport callbacks that keep everything pushed to them
#[derive(Default)]
pub(crate) struct RecordingCallbacks {
    row_counts: Mutex<Vec<usize>>,
    row_data: Mutex<Vec<BTreeMap<usize, RowRecord>>>,
}

impl RecordingCallbacks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn row_counts(&self) -> Vec<usize> {
        self.row_counts.lock().clone()
    }

    pub fn last_row_data(&self) -> Option<BTreeMap<usize, RowRecord>> {
        self.row_data.lock().last().cloned()
    }

    pub fn row_data_count(&self) -> usize {
        self.row_data.lock().len()
    }
}

impl ViewportCallbacks for RecordingCallbacks {
    fn set_row_count(&self, count: usize) {
        self.row_counts.lock().push(count);
    }

    fn set_row_data(&self, rows: BTreeMap<usize, RowRecord>) {
        self.row_data.lock().push(rows);
    }
}

/// Page callback that remembers how it was completed
#[derive(Default)]
pub(crate) struct RecordingGetRows {
    success: Mutex<Option<(Vec<RowState>, Option<usize>)>>,
    failed: AtomicBool,
}

impl RecordingGetRows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success_result(&self) -> Option<(Vec<RowState>, Option<usize>)> {
        self.success.lock().clone()
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

impl GetRowsCallback for RecordingGetRows {
    fn success(&self, rows: Vec<RowState>, row_count: Option<usize>) {
        *self.success.lock() = Some((rows, row_count));
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }
}

/// A call made against a `MockPivotTable`
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PivotCall {
    SetViewport(PivotViewport),
    SetRowExpanded { row: usize, expanded: bool },
    SetColumnExpanded { column: usize, expanded: bool },
    Close,
}

/// Scriptable pivot table; snapshots are only delivered through `emit`
pub(crate) struct MockPivotTable {
    name: String,
    row_sources: Vec<PivotSource>,
    column_sources: Vec<PivotSource>,
    calls: Mutex<Vec<PivotCall>>,
    listeners: ListenerRegistry<(), PivotEvent>,
    close_count: AtomicUsize,
}

impl MockPivotTable {
    pub fn new(name: &str, row_sources: Vec<PivotSource>, column_sources: Vec<PivotSource>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            row_sources,
            column_sources,
            calls: Mutex::new(Vec::new()),
            listeners: ListenerRegistry::new(),
            close_count: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> Vec<PivotCall> {
        self.calls.lock().clone()
    }

    pub fn emit(&self, event: PivotEvent) -> usize {
        self.listeners.emit((), &event)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

impl RemotePivotTable for MockPivotTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn row_sources(&self) -> Vec<PivotSource> {
        self.row_sources.clone()
    }

    fn column_sources(&self) -> Vec<PivotSource> {
        self.column_sources.clone()
    }

    fn value_sources(&self) -> Vec<ValueSource> {
        Vec::new()
    }

    fn set_viewport(&self, viewport: PivotViewport) -> Result<()> {
        self.calls.lock().push(PivotCall::SetViewport(viewport));
        Ok(())
    }

    fn set_row_expanded(&self, row: usize, expanded: bool) -> Result<()> {
        self.calls.lock().push(PivotCall::SetRowExpanded { row, expanded });
        Ok(())
    }

    fn set_column_expanded(&self, column: usize, expanded: bool) -> Result<()> {
        self.calls
            .lock()
            .push(PivotCall::SetColumnExpanded { column, expanded });
        Ok(())
    }

    fn add_listener(&self, tx: Sender<PivotEvent>) -> ListenerId {
        self.listeners.add((), tx)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(PivotCall::Close);
    }
}
