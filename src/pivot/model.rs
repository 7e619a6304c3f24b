//! Pivot Model
//!
//! Binds a remote pivot table and keeps the layout and row records derived
//! from its latest snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use super::columns::{ColumnDefinition, get_pivot_result_columns};
use super::header_groups::{DisplayColumn, PivotColumnHeaderGroup, PivotLayout, build_pivot_layout};
use super::rows::extract_snapshot_rows;
use super::snapshot::{PivotSnapshot, PivotSource, ValueSource};
use crate::config::{GridConfig, PivotConfig};
use crate::error::{Error, Result};
use crate::grid::RowRecord;
use crate::listeners::ListenerId;
use crate::logging::LogContext;
use crate::remote::TableOwnership;

/// Row and column window of a pivot subscription, both inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PivotViewport {
    pub first_row: usize,
    pub last_row: usize,
    pub first_column: usize,
    pub last_column: usize,
}

impl PivotViewport {
    pub fn new(first_row: usize, last_row: usize, first_column: usize, last_column: usize) -> Self {
        Self {
            first_row,
            last_row,
            first_column,
            last_column,
        }
    }

    fn is_valid(&self) -> bool {
        self.first_row <= self.last_row && self.first_column <= self.last_column
    }
}

/// Events pushed by a remote pivot table
#[derive(Clone, Debug)]
pub enum PivotEvent {
    /// New snapshot of the subscribed window
    Updated(Arc<PivotSnapshot>),
    Disconnect,
    RequestFailed(String),
}

/// A server-backed pivot table
pub trait RemotePivotTable: Send + Sync {
    fn name(&self) -> &str;

    /// Row dimension sources, outermost first
    fn row_sources(&self) -> Vec<PivotSource>;

    /// Column dimension sources, outermost first
    fn column_sources(&self) -> Vec<PivotSource>;

    fn value_sources(&self) -> Vec<ValueSource>;

    /// Subscribe to a row and column window, replacing any previous one
    fn set_viewport(&self, viewport: PivotViewport) -> Result<()>;

    /// Expand or collapse the row entry at an absolute index
    fn set_row_expanded(&self, row: usize, expanded: bool) -> Result<()>;

    /// Expand or collapse the column entry at an absolute index
    fn set_column_expanded(&self, column: usize, expanded: bool) -> Result<()>;

    fn add_listener(&self, tx: Sender<PivotEvent>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    /// Release server-side resources; idempotent
    fn close(&self);
}

/// Materialized view over a remote pivot table.
///
/// Every `Updated` snapshot rebuilds the layout and the row records from
/// scratch; nothing is patched in place.
pub struct PivotModel {
    log: LogContext,
    config: PivotConfig,
    table: Arc<dyn RemotePivotTable>,
    ownership: TableOwnership,
    row_sources: Vec<PivotSource>,
    column_sources: Vec<PivotSource>,
    rx: Receiver<PivotEvent>,
    listener: Option<ListenerId>,
    viewport: Option<PivotViewport>,
    snapshot: Option<Arc<PivotSnapshot>>,
    layout: PivotLayout,
    rows: BTreeMap<usize, RowRecord>,
    destroyed: bool,
}

impl PivotModel {
    /// Model that owns `table` and closes it on destroy
    pub fn new(table: Arc<dyn RemotePivotTable>) -> Self {
        Self::with_parts(
            table,
            &GridConfig::default(),
            TableOwnership::Owned,
            LogContext::new("pivot"),
        )
    }

    pub fn with_parts(
        table: Arc<dyn RemotePivotTable>,
        config: &GridConfig,
        ownership: TableOwnership,
        log: LogContext,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let listener = table.add_listener(tx);
        let row_sources = table.row_sources();
        let column_sources = table.column_sources();
        tracing::debug!(
            parent: log.span(),
            table = table.name(),
            rows = row_sources.len(),
            columns = column_sources.len(),
            "binding pivot table"
        );
        Self {
            log,
            config: config.pivot.clone(),
            table,
            ownership,
            row_sources,
            column_sources,
            rx,
            listener: Some(listener),
            viewport: None,
            snapshot: None,
            layout: PivotLayout::default(),
            rows: BTreeMap::new(),
            destroyed: false,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            return Err(Error::Destroyed);
        }
        Ok(())
    }

    /// Subscribe to a new window
    pub fn set_viewport(&mut self, viewport: PivotViewport) -> Result<()> {
        self.ensure_live()?;
        if !viewport.is_valid() {
            return Err(Error::invalid_state(format!(
                "invalid pivot viewport {viewport:?}"
            )));
        }
        self.viewport = Some(viewport);
        self.send_viewport();
        Ok(())
    }

    fn send_viewport(&self) {
        let Some(viewport) = self.viewport else {
            return;
        };
        tracing::trace!(parent: self.log.span(), ?viewport, "setting pivot viewport");
        if let Err(e) = self.table.set_viewport(viewport) {
            tracing::warn!(parent: self.log.span(), error = %e, "pivot viewport request failed");
        }
    }

    /// Expand or collapse a row entry, then re-request the current window
    pub fn set_row_expanded(&mut self, row: usize, expanded: bool) -> Result<()> {
        self.ensure_live()?;
        tracing::debug!(parent: self.log.span(), row, expanded, "set row expanded");
        self.table.set_row_expanded(row, expanded)?;
        self.send_viewport();
        Ok(())
    }

    /// Expand or collapse a column entry, then re-request the current window
    pub fn set_column_expanded(&mut self, column: usize, expanded: bool) -> Result<()> {
        self.ensure_live()?;
        tracing::debug!(parent: self.log.span(), column, expanded, "set column expanded");
        self.table.set_column_expanded(column, expanded)?;
        self.send_viewport();
        Ok(())
    }

    /// Drain pending pivot events. Returns the number handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            handled += 1;
            if self.destroyed {
                continue;
            }
            match event {
                PivotEvent::Updated(snapshot) => self.apply_snapshot(snapshot),
                PivotEvent::Disconnect => {
                    tracing::info!(parent: self.log.span(), table = self.table.name(), "pivot table disconnected");
                    self.detach();
                }
                PivotEvent::RequestFailed(message) => {
                    tracing::warn!(parent: self.log.span(), %message, "pivot request failed");
                }
            }
        }
        handled
    }

    fn apply_snapshot(&mut self, snapshot: Arc<PivotSnapshot>) {
        let definitions =
            get_pivot_result_columns(&snapshot.columns, &snapshot.value_sources, &self.config);
        self.layout = build_pivot_layout(
            definitions,
            &self.row_sources,
            &snapshot.value_sources,
            self.column_sources.len().max(1),
        );
        self.rows = extract_snapshot_rows(&snapshot, &self.row_sources, &self.config);
        tracing::trace!(
            parent: self.log.span(),
            rows = self.rows.len(),
            columns = self.layout.columns.len(),
            "pivot snapshot applied"
        );
        self.snapshot = Some(snapshot);
    }

    pub fn snapshot(&self) -> Option<&Arc<PivotSnapshot>> {
        self.snapshot.as_ref()
    }

    pub fn viewport(&self) -> Option<PivotViewport> {
        self.viewport
    }

    pub fn row_sources(&self) -> &[PivotSource] {
        &self.row_sources
    }

    pub fn column_definitions(&self) -> &[ColumnDefinition] {
        &self.layout.column_definitions
    }

    /// Key columns followed by every value, totals and placeholder column
    pub fn columns(&self) -> &[DisplayColumn] {
        &self.layout.columns
    }

    pub fn header_groups(&self) -> &[PivotColumnHeaderGroup] {
        &self.layout.header_groups
    }

    pub fn layout(&self) -> &PivotLayout {
        &self.layout
    }

    /// Records of the visible rows and the totals row, by absolute index
    pub fn rows(&self) -> &BTreeMap<usize, RowRecord> {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&RowRecord> {
        self.rows.get(&index)
    }

    pub fn totals_row(&self) -> Option<&RowRecord> {
        let snapshot = self.snapshot.as_ref()?;
        self.rows.get(&snapshot.rows.total_count)
    }

    /// Row entries in the whole pivot plus the totals row
    pub fn row_count(&self) -> usize {
        self.snapshot
            .as_ref()
            .map_or(0, |snapshot| snapshot.rows.total_count + 1)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn detach(&mut self) {
        if let Some(id) = self.listener.take() {
            self.table.remove_listener(id);
        }
    }

    /// Detach from the table and close it if owned. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.detach();
        if self.ownership == TableOwnership::Owned {
            self.table.close();
        }
        tracing::debug!(parent: self.log.span(), "pivot model destroyed");
    }
}

impl Drop for PivotModel {
    fn drop(&mut self) {
        self.destroy();
    }
}
