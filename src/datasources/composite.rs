//! Composite Datasource
//!
//! Presents one stable datasource to the grid while swapping between a flat
//! and a tree child whenever the grid's grouping changes.
//!
//! ## Swap order
//!
//! ```text
//! grouping change ─▶ rollup(seq = n) ─ ─ ─ ▶ resolved
//!                                           │ seq == latest?
//!                             no ◀──────────┤
//!                      close result         │ yes
//!                                           ▼
//!                 init + bind new child, re-apply filter/sort
//!                                           ▼
//!                           destroy previous child
//!                                           ▼
//!                        reset viewport to default window
//! ```

use std::sync::Arc;

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;

use super::base::ViewportCore;
use super::table::TableViewportDatasource;
use super::tree::TreeViewportDatasource;
use super::{LifecycleState, Viewport, ViewportDatasource};
use crate::config::GridConfig;
use crate::error::Result;
use crate::grid::{FilterModel, GridApi, GridEvent, GridEventKind, SortModelItem, ViewportCallbacks};
use crate::logging::LogContext;
use crate::remote::{AggregationSpec, RemoteTable, RemoteTreeTable, RollupConfig, TableOwnership};

const GRID_EVENTS: [GridEventKind; 2] = [GridEventKind::RowGroupChanged, GridEventKind::ValueChanged];

type RollupResult = (u64, Result<Arc<dyn RemoteTreeTable>>);

/// The child currently serving the grid
pub enum ActiveDatasource {
    Flat(TableViewportDatasource),
    Tree(TreeViewportDatasource),
}

impl ActiveDatasource {
    pub fn as_datasource(&self) -> &dyn ViewportDatasource {
        match self {
            ActiveDatasource::Flat(datasource) => datasource,
            ActiveDatasource::Tree(datasource) => datasource,
        }
    }

    pub fn as_datasource_mut(&mut self) -> &mut dyn ViewportDatasource {
        match self {
            ActiveDatasource::Flat(datasource) => datasource,
            ActiveDatasource::Tree(datasource) => datasource,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, ActiveDatasource::Tree(_))
    }
}

/// Router over a flat table and the rollups built from it
pub struct CompositeViewportDatasource {
    core: ViewportCore,
    config: GridConfig,
    table: Arc<dyn RemoteTable>,
    ownership: TableOwnership,
    active: Option<ActiveDatasource>,
    /// Sequence number of the most recent grouping change
    latest_request: u64,
    pending: FuturesUnordered<BoxFuture<'static, RollupResult>>,
}

impl CompositeViewportDatasource {
    /// Router that owns `table` and closes it on destroy
    pub fn new(table: Arc<dyn RemoteTable>) -> Self {
        Self::with_parts(table, GridConfig::default(), TableOwnership::Owned)
    }

    pub fn with_parts(table: Arc<dyn RemoteTable>, config: GridConfig, ownership: TableOwnership) -> Self {
        let log = LogContext::new("composite");
        let child = TableViewportDatasource::with_parts(
            table.clone(),
            &config,
            TableOwnership::Shared,
            log.child("table"),
        );
        Self {
            core: ViewportCore::new(config.viewport.clone(), log),
            config,
            table,
            ownership,
            active: Some(ActiveDatasource::Flat(child)),
            latest_request: 0,
            pending: FuturesUnordered::new(),
        }
    }

    /// The child currently serving the grid; `None` after destroy
    pub fn active(&self) -> Option<&ActiveDatasource> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveDatasource> {
        self.active.as_mut()
    }

    /// Number of rollup requests still in flight
    pub fn pending_rollups(&self) -> usize {
        self.pending.len()
    }

    /// Await every in-flight rollup and install the latest one. Returns the
    /// number of rollups resolved.
    pub async fn settle(&mut self) -> usize {
        let mut resolved = 0;
        while let Some((request, result)) = self.pending.next().await {
            self.on_rollup(request, result);
            resolved += 1;
        }
        resolved
    }

    /// Rebuild the child for the grid's current grouping
    fn regroup(&mut self) {
        let Some(grid) = self.core.grid().cloned() else {
            return;
        };
        let group_by = grid.row_group_columns();
        let aggregations = grid.value_columns();
        self.latest_request += 1;
        let request = self.latest_request;

        if group_by.is_empty() {
            tracing::info!(parent: self.core.log().span(), request, "grouping cleared, switching to flat table");
            let mut child = TableViewportDatasource::with_parts(
                self.table.clone(),
                &self.config,
                TableOwnership::Shared,
                self.core.log().child("table"),
            );
            if let Err(e) = child.apply_aggregated_columns(&aggregations) {
                tracing::warn!(parent: self.core.log().span(), error = %e, "failed to record aggregations");
            }
            self.install(ActiveDatasource::Flat(child));
            return;
        }

        tracing::info!(parent: self.core.log().span(), request, ?group_by, "requesting rollup");
        let rollup = self.table.rollup(RollupConfig {
            group_by,
            aggregations,
        });
        self.pending
            .push(async move { (request, rollup.await) }.boxed());
    }

    fn on_rollup(&mut self, request: u64, result: Result<Arc<dyn RemoteTreeTable>>) {
        match result {
            Ok(tree) if request == self.latest_request && !self.core.is_destroyed() => {
                tracing::info!(parent: self.core.log().span(), request, table = tree.name(), "rollup ready");
                let child = TreeViewportDatasource::with_parts(
                    tree,
                    &self.config,
                    TableOwnership::Owned,
                    self.core.log().child("tree"),
                );
                self.install(ActiveDatasource::Tree(child));
            }
            Ok(tree) => {
                tracing::debug!(parent: self.core.log().span(), request, latest = self.latest_request, "closing superseded rollup");
                tree.close();
            }
            Err(e) => {
                tracing::warn!(parent: self.core.log().span(), request, error = %e, "rollup failed, keeping current view");
            }
        }
    }

    /// Make `next` the active child. The previous child is destroyed only
    /// after `next` is initialized and bound.
    fn install(&mut self, mut next: ActiveDatasource) {
        let log = self.core.log().span().clone();
        let datasource = next.as_datasource_mut();

        if let Some(callbacks) = self.core.callbacks() {
            if let Err(e) = datasource.init(callbacks.clone()) {
                tracing::warn!(parent: &log, error = %e, "failed to init new child");
            }
        }
        if let Some(grid) = self.core.grid().cloned() {
            if let Err(e) = datasource.set_grid_api(grid.clone()) {
                tracing::warn!(parent: &log, error = %e, "failed to bind new child");
            }
            let filter_model = grid.filter_model();
            if !filter_model.is_empty() {
                if let Err(e) = datasource.apply_filter(&filter_model) {
                    tracing::warn!(parent: &log, error = %e, "failed to re-apply filters");
                }
            }
            let sort_model = grid.sort_model();
            if !sort_model.is_empty() {
                if let Err(e) = datasource.apply_sort(&sort_model) {
                    tracing::warn!(parent: &log, error = %e, "failed to re-apply sorts");
                }
            }
        }

        if let Some(mut previous) = self.active.replace(next) {
            previous.as_datasource_mut().destroy();
        }

        // Row coordinates changed; start again from the default window
        let config = self.core.config();
        let (first_row, last_row) = (config.default_first_row, config.default_last_row);
        if let Some(active) = self.active.as_mut() {
            active
                .as_datasource_mut()
                .set_viewport_range(first_row as i64, last_row as i64);
        }
    }

    /// Move in-flight rollups onto a task that outlives the router and
    /// closes each tree as it resolves. Uses the current tokio runtime when
    /// there is one, otherwise a dedicated thread.
    fn hand_off_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut self.pending);
        let log = self.core.log().span().clone();
        let count = pending.len();
        let drain = async move {
            while let Some((request, result)) = pending.next().await {
                match result {
                    Ok(tree) => {
                        tracing::debug!(parent: &log, request, table = tree.name(), "closing rollup resolved after destroy");
                        tree.close();
                    }
                    Err(e) => {
                        tracing::debug!(parent: &log, request, error = %e, "rollup failed after destroy");
                    }
                }
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(drain);
            }
            Err(_) => {
                let spawned = std::thread::Builder::new()
                    .name("rollup-drain".to_string())
                    .spawn(move || futures::executor::block_on(drain));
                if let Err(e) = spawned {
                    tracing::warn!(parent: self.core.log().span(), error = %e, "cannot drain pending rollups");
                }
            }
        }
        tracing::debug!(parent: self.core.log().span(), count, "pending rollups handed off");
    }

    fn active_or_destroyed(&mut self) -> Result<&mut dyn ViewportDatasource> {
        self.core.ensure_live()?;
        self.active
            .as_mut()
            .map(ActiveDatasource::as_datasource_mut)
            .ok_or(crate::error::Error::Destroyed)
    }
}

impl ViewportDatasource for CompositeViewportDatasource {
    fn core(&self) -> &ViewportCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewportCore {
        &mut self.core
    }

    fn init(&mut self, callbacks: Arc<dyn ViewportCallbacks>) -> Result<()> {
        self.core.init(callbacks.clone())?;
        self.active_or_destroyed()?.init(callbacks)
    }

    fn set_grid_api(&mut self, grid: Arc<dyn GridApi>) -> Result<()> {
        self.core.bind_grid(grid.clone(), &GRID_EVENTS)?;
        self.active_or_destroyed()?.set_grid_api(grid)
    }

    fn set_viewport_range(&mut self, first_row: i64, last_row: i64) {
        if let Some(active) = self.active.as_mut() {
            active.as_datasource_mut().set_viewport_range(first_row, last_row);
        }
    }

    fn refresh_viewport(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.as_datasource_mut().refresh_viewport();
        }
    }

    fn apply_filter(&mut self, model: &FilterModel) -> Result<()> {
        self.active_or_destroyed()?.apply_filter(model)
    }

    fn apply_sort(&mut self, model: &[SortModelItem]) -> Result<()> {
        self.active_or_destroyed()?.apply_sort(model)
    }

    fn apply_viewport(&mut self, first_row: usize, last_row: usize) {
        if let Some(active) = self.active.as_mut() {
            active.as_datasource_mut().apply_viewport(first_row, last_row);
        }
    }

    fn apply_aggregated_columns(&mut self, columns: &[AggregationSpec]) -> Result<()> {
        self.active_or_destroyed()?.apply_aggregated_columns(columns)
    }

    fn pump(&mut self) -> usize {
        let mut handled = self
            .active
            .as_mut()
            .map_or(0, |active| active.as_datasource_mut().pump());

        for event in self.core.take_grid_events() {
            handled += 1;
            match event {
                GridEvent::RowGroupChanged | GridEvent::ValueChanged => self.regroup(),
                other => {
                    tracing::trace!(parent: self.core.log().span(), ?other, "ignoring grid event");
                }
            }
        }

        loop {
            let next = self.pending.next().now_or_never();
            match next {
                Some(Some((request, result))) => {
                    self.on_rollup(request, result);
                    handled += 1;
                }
                _ => break,
            }
        }
        handled
    }

    fn destroy(&mut self) {
        if !self.core.mark_destroyed() {
            return;
        }
        if let Some(mut active) = self.active.take() {
            active.as_datasource_mut().destroy();
        }
        if self.ownership == TableOwnership::Owned {
            self.table.close();
        }
        tracing::debug!(parent: self.core.log().span(), pending = self.pending.len(), "destroyed");
        self.hand_off_pending();
    }

    fn state(&self) -> LifecycleState {
        self.core.state()
    }

    fn viewport(&self) -> Option<Viewport> {
        self.active
            .as_ref()
            .and_then(|active| active.as_datasource().viewport())
    }
}

impl Drop for CompositeViewportDatasource {
    fn drop(&mut self) {
        self.destroy();
    }
}
