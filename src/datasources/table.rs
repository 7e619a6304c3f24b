//! Flat Table Datasource
//!
//! Binds one flat remote table to a viewport-model grid.

use std::sync::Arc;

use super::base::{RemoteLink, ViewportCore};
use super::records::materialize_rows;
use super::ViewportDatasource;
use crate::config::GridConfig;
use crate::error::Result;
use crate::filters::{parse_filter_model, parse_sort_model};
use crate::grid::{FilterModel, GridApi, GridEvent, GridEventKind, SortModelItem, ViewportCallbacks};
use crate::logging::LogContext;
use crate::remote::{AggregationSpec, RemoteTable, TableEvent, TableOwnership};

/// Grid events a flat datasource reacts to
const GRID_EVENTS: [GridEventKind; 2] = [GridEventKind::FilterChanged, GridEventKind::SortChanged];

/// Push-model datasource over a flat remote table
pub struct TableViewportDatasource {
    core: ViewportCore,
    link: RemoteLink<dyn RemoteTable>,
    aggregations: Vec<AggregationSpec>,
}

impl TableViewportDatasource {
    /// Datasource that owns `table` and closes it on destroy
    pub fn new(table: Arc<dyn RemoteTable>) -> Self {
        Self::with_parts(
            table,
            &GridConfig::default(),
            TableOwnership::Owned,
            LogContext::new("table"),
        )
    }

    /// Datasource over a table the caller keeps ownership of
    pub fn shared(table: Arc<dyn RemoteTable>) -> Self {
        Self::with_parts(
            table,
            &GridConfig::default(),
            TableOwnership::Shared,
            LogContext::new("table"),
        )
    }

    pub fn with_parts(
        table: Arc<dyn RemoteTable>,
        config: &GridConfig,
        ownership: TableOwnership,
        log: LogContext,
    ) -> Self {
        tracing::debug!(parent: log.span(), table = table.name(), ?ownership, "binding flat table");
        Self {
            core: ViewportCore::new(config.viewport.clone(), log),
            link: RemoteLink::attach(table, ownership),
            aggregations: Vec::new(),
        }
    }

    /// The bound table
    pub fn table(&self) -> &Arc<dyn RemoteTable> {
        self.link.table()
    }

    /// Aggregations recorded by `apply_aggregated_columns`
    pub fn aggregations(&self) -> &[AggregationSpec] {
        &self.aggregations
    }

    fn handle_table_event(&mut self, event: TableEvent) {
        let log = self.core.log().span().clone();
        match event {
            TableEvent::Updated(data) => {
                let Some(callbacks) = self.core.callbacks() else {
                    tracing::debug!(parent: &log, "update before init, dropped");
                    return;
                };
                let rows = materialize_rows(&data);
                tracing::trace!(parent: &log, offset = data.offset, rows = rows.len(), "viewport updated");
                callbacks.set_row_count(self.link.table().size());
                callbacks.set_row_data(rows);
            }
            TableEvent::SizeChanged(size) => {
                if let Some(callbacks) = self.core.callbacks() {
                    callbacks.set_row_count(size);
                }
            }
            TableEvent::Disconnect => {
                tracing::info!(parent: &log, table = self.link.table().name(), "table disconnected, listeners removed");
                self.link.stop_listening();
            }
            TableEvent::RequestFailed(message) => {
                tracing::warn!(parent: &log, %message, "table request failed");
            }
        }
    }

    fn handle_grid_event(&mut self, event: GridEvent) {
        let Some(grid) = self.core.grid().cloned() else {
            return;
        };
        let result = match event {
            GridEvent::FilterChanged => self.apply_filter(&grid.filter_model()),
            GridEvent::SortChanged => self.apply_sort(&grid.sort_model()),
            _ => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(parent: self.core.log().span(), error = %e, "failed to apply grid change");
        }
    }
}

impl ViewportDatasource for TableViewportDatasource {
    fn core(&self) -> &ViewportCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewportCore {
        &mut self.core
    }

    fn init(&mut self, callbacks: Arc<dyn ViewportCallbacks>) -> Result<()> {
        self.core.init(callbacks)
    }

    fn set_grid_api(&mut self, grid: Arc<dyn GridApi>) -> Result<()> {
        self.core.bind_grid(grid, &GRID_EVENTS)
    }

    fn apply_filter(&mut self, model: &FilterModel) -> Result<()> {
        self.core.ensure_live()?;
        let filters = parse_filter_model(self.link.table().as_ref(), model)?;
        tracing::debug!(parent: self.core.log().span(), count = filters.len(), "applying filters");
        if let Err(e) = self.link.table().apply_filter(filters) {
            tracing::warn!(parent: self.core.log().span(), error = %e, "remote filter failed");
        }
        self.refresh_viewport();
        Ok(())
    }

    fn apply_sort(&mut self, model: &[SortModelItem]) -> Result<()> {
        self.core.ensure_live()?;
        let sorts = parse_sort_model(self.link.table().as_ref(), model)?;
        tracing::debug!(parent: self.core.log().span(), count = sorts.len(), "applying sorts");
        if let Err(e) = self.link.table().apply_sort(sorts) {
            tracing::warn!(parent: self.core.log().span(), error = %e, "remote sort failed");
        }
        self.refresh_viewport();
        Ok(())
    }

    fn apply_viewport(&mut self, first_row: usize, last_row: usize) {
        if self.core.is_destroyed() {
            return;
        }
        tracing::debug!(parent: self.core.log().span(), first_row, last_row, "requesting viewport");
        if let Err(e) = self.link.subscribe(first_row, last_row) {
            tracing::warn!(parent: self.core.log().span(), error = %e, "viewport request failed");
        }
    }

    fn apply_aggregated_columns(&mut self, columns: &[AggregationSpec]) -> Result<()> {
        self.core.ensure_live()?;
        // Flat tables show raw rows; the specs only matter once grouped
        tracing::debug!(parent: self.core.log().span(), count = columns.len(), "recording aggregations");
        self.aggregations = columns.to_vec();
        Ok(())
    }

    fn pump(&mut self) -> usize {
        let mut handled = 0;
        for event in self.link.drain() {
            handled += 1;
            if self.core.is_destroyed() {
                continue;
            }
            self.handle_table_event(event);
        }
        for event in self.core.take_grid_events() {
            handled += 1;
            self.handle_grid_event(event);
        }
        handled
    }

    fn destroy(&mut self) {
        if !self.core.mark_destroyed() {
            return;
        }
        self.link.release();
        tracing::debug!(parent: self.core.log().span(), "destroyed");
    }
}

impl Drop for TableViewportDatasource {
    fn drop(&mut self) {
        self.destroy();
    }
}
