//! Pull-model Datasource
//!
//! Answers numbered page requests from a grid that pulls rows instead of
//! receiving a viewport feed. One persistent viewport subscription is
//! resized as pages are requested; a filter or sort change closes it and
//! drops every cached row, since the remote row order is no longer valid.
//! Rows not delivered yet are answered as `RowState::Pending` and patched
//! in place by absolute row index once the remote pushes them.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::base::RemoteLink;
use super::records::materialize_rows;
use super::Viewport;
use crate::config::{GridConfig, ServerSideConfig};
use crate::error::Result;
use crate::filters::{
    FilterCondition, Sort, are_filters_equal, are_sorts_equal, parse_filter_model,
    parse_sort_model,
};
use crate::grid::{GetRowsCallback, GetRowsRequest, GridApi, RowRecord, RowState};
use crate::logging::LogContext;
use crate::remote::{RemoteTable, TableEvent, TableOwnership};

/// Pull-model datasource over a flat remote table
pub struct ServerSideDatasource {
    log: LogContext,
    config: ServerSideConfig,
    link: RemoteLink<dyn RemoteTable>,
    grid: Arc<dyn GridApi>,
    filters: Option<Vec<FilterCondition>>,
    sorts: Option<Vec<Sort>>,
    /// Latest delivered data by absolute row index, limited to `window`
    rows: BTreeMap<usize, RowRecord>,
    window: Option<Viewport>,
    auto_sized: bool,
    destroyed: bool,
}

impl ServerSideDatasource {
    /// Datasource that owns `table` and closes it on destroy
    pub fn new(table: Arc<dyn RemoteTable>, grid: Arc<dyn GridApi>) -> Self {
        Self::with_parts(
            table,
            grid,
            &GridConfig::default(),
            TableOwnership::Owned,
            LogContext::new("server-side"),
        )
    }

    pub fn with_parts(
        table: Arc<dyn RemoteTable>,
        grid: Arc<dyn GridApi>,
        config: &GridConfig,
        ownership: TableOwnership,
        log: LogContext,
    ) -> Self {
        tracing::debug!(parent: log.span(), table = table.name(), ?ownership, "binding pull-model table");
        Self {
            log,
            config: config.server_side.clone(),
            link: RemoteLink::attach(table, ownership),
            grid,
            filters: None,
            sorts: None,
            rows: BTreeMap::new(),
            window: None,
            auto_sized: false,
            destroyed: false,
        }
    }

    /// Window of the persistent subscription, if one is open
    pub fn window(&self) -> Option<Viewport> {
        self.window
    }

    /// Number of rows with delivered data
    pub fn cached_rows(&self) -> usize {
        self.rows.len()
    }

    /// Answer one page request.
    ///
    /// Invalid ranges and remote failures call `fail()`. Filter or sort
    /// models that cannot be translated call `fail()` and return the error.
    pub fn get_rows(&mut self, request: &GetRowsRequest, callback: &dyn GetRowsCallback) -> Result<()> {
        if self.destroyed {
            tracing::debug!(parent: self.log.span(), "page requested after destroy");
            callback.fail();
            return Ok(());
        }
        let (start_row, end_row) = match (request.start_row, request.end_row) {
            (Some(start), Some(end)) if end > start => (start, end),
            (start, end) => {
                tracing::warn!(parent: self.log.span(), ?start, ?end, "invalid page request");
                callback.fail();
                return Ok(());
            }
        };

        if let Err(e) = self.sync_query(request) {
            tracing::warn!(parent: self.log.span(), error = %e, "cannot translate page request");
            callback.fail();
            return Err(e);
        }

        let last_row = end_row - 1;
        if let Err(e) = self.link.resize(start_row, last_row) {
            tracing::warn!(parent: self.log.span(), error = %e, "viewport request failed");
            callback.fail();
            return Ok(());
        }
        self.window = Viewport::new(start_row, last_row);
        // Rows outside the subscription no longer receive updates
        if let Some(window) = self.window {
            let before = self.rows.len();
            self.rows.retain(|index, _| window.contains(*index));
            let evicted = before - self.rows.len();
            if evicted > 0 {
                tracing::trace!(parent: self.log.span(), evicted, "evicted rows outside window");
            }
        }

        // Pick up anything the remote delivered synchronously
        self.pump();

        let size = self.link.table().size();
        let rows = (start_row..end_row.min(size))
            .map(|i| {
                self.rows
                    .get(&i)
                    .cloned()
                    .map_or(RowState::Pending, RowState::Known)
            })
            .collect::<Vec<_>>();
        tracing::trace!(parent: self.log.span(), start_row, end_row, returned = rows.len(), "page answered");
        callback.success(rows, Some(size));
        Ok(())
    }

    /// Apply the request's filter and sort if they differ from the last ones.
    ///
    /// Any change closes the subscription and invalidates cached rows.
    fn sync_query(&mut self, request: &GetRowsRequest) -> Result<()> {
        let filters = parse_filter_model(self.link.table().as_ref(), &request.filter_model)?;
        let sorts = parse_sort_model(self.link.table().as_ref(), &request.sort_model)?;

        let filters_changed = !self
            .filters
            .as_ref()
            .is_some_and(|last| are_filters_equal(last, &filters));
        let sorts_changed = !self
            .sorts
            .as_ref()
            .is_some_and(|last| are_sorts_equal(last, &sorts));
        if !filters_changed && !sorts_changed {
            return Ok(());
        }

        tracing::debug!(parent: self.log.span(), filters_changed, sorts_changed, "query changed, resetting subscription");
        self.link.close_subscription();
        self.window = None;
        self.rows.clear();
        // Drop snapshots of the previous query still in the queue
        self.link.drain();

        if filters_changed {
            if let Err(e) = self.link.table().apply_filter(filters.clone()) {
                tracing::warn!(parent: self.log.span(), error = %e, "remote filter failed");
            }
            self.filters = Some(filters);
        }
        if sorts_changed {
            if let Err(e) = self.link.table().apply_sort(sorts.clone()) {
                tracing::warn!(parent: self.log.span(), error = %e, "remote sort failed");
            }
            self.sorts = Some(sorts);
        }
        Ok(())
    }

    /// Handle every queued remote event. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let events = self.link.drain();
        let handled = events.len();
        if self.destroyed {
            return handled;
        }
        for event in events {
            self.handle_table_event(event);
        }
        handled
    }

    fn handle_table_event(&mut self, event: TableEvent) {
        match event {
            TableEvent::Updated(data) => {
                let records = materialize_rows(&data);
                if records.is_empty() {
                    return;
                }
                for (index, record) in records {
                    let id = index.to_string();
                    if !self.grid.update_row_data(&id, RowState::Known(record.clone())) {
                        tracing::trace!(parent: self.log.span(), %id, "no row node yet");
                    }
                    if self.window.is_some_and(|window| window.contains(index)) {
                        self.rows.insert(index, record);
                    }
                }
                if self.config.auto_size_columns && !self.auto_sized {
                    self.auto_sized = true;
                    self.grid.auto_size_all_columns();
                }
            }
            TableEvent::SizeChanged(size) => self.grid.set_row_count(size),
            TableEvent::Disconnect => {
                tracing::info!(parent: self.log.span(), table = self.link.table().name(), "table disconnected, keeping loaded rows");
            }
            TableEvent::RequestFailed(message) => {
                tracing::warn!(parent: self.log.span(), %message, "table request failed");
            }
        }
    }

    /// Close the subscription and remove all four table listeners; idempotent
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.link.release();
        self.window = None;
        self.rows.clear();
        tracing::debug!(parent: self.log.span(), "destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Drop for ServerSideDatasource {
    fn drop(&mut self) {
        self.destroy();
    }
}
