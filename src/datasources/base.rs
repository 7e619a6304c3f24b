//! Shared Datasource Plumbing
//!
//! `ViewportCore` holds what every push-model datasource tracks: lifecycle,
//! the recorded viewport, the registered callbacks and the grid binding.
//! `RemoteLink` owns one remote table's listeners and viewport subscription.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::{LifecycleState, Viewport};
use crate::config::ViewportConfig;
use crate::error::{Error, Result};
use crate::grid::{GridApi, GridBinding, GridEvent, GridEventKind, ViewportCallbacks};
use crate::listeners::ListenerId;
use crate::logging::LogContext;
use crate::remote::{
    RemoteTable, TableEvent, TableEventKind, TableOwnership, ViewportSubscription,
    attach_listeners, detach_listeners,
};

/// Lifecycle, viewport and grid bookkeeping shared by the datasources
pub struct ViewportCore {
    log: LogContext,
    config: ViewportConfig,
    state: LifecycleState,
    viewport: Option<Viewport>,
    callbacks: Option<Arc<dyn ViewportCallbacks>>,
    grid: Option<GridBinding>,
    grid_tx: Sender<GridEvent>,
    grid_rx: Receiver<GridEvent>,
}

impl ViewportCore {
    pub fn new(config: ViewportConfig, log: LogContext) -> Self {
        let (grid_tx, grid_rx) = unbounded();
        Self {
            log,
            config,
            state: LifecycleState::Uninitialized,
            viewport: None,
            callbacks: None,
            grid: None,
            grid_tx,
            grid_rx,
        }
    }

    /// Logging scope of the owning datasource
    pub fn log(&self) -> &LogContext {
        &self.log
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == LifecycleState::Destroyed
    }

    /// Fail with `Destroyed` once the datasource has been destroyed
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed);
        }
        Ok(())
    }

    /// Register the grid callbacks; valid exactly once
    pub fn init(&mut self, callbacks: Arc<dyn ViewportCallbacks>) -> Result<()> {
        self.ensure_live()?;
        if self.callbacks.is_some() {
            return Err(Error::invalid_state("init called more than once"));
        }
        self.callbacks = Some(callbacks);
        self.state = if self.grid.is_some() {
            LifecycleState::Listening
        } else {
            LifecycleState::Initialized
        };
        tracing::debug!(parent: self.log.span(), "initialized");
        Ok(())
    }

    /// Bind to a grid, dropping the previous binding (and its listeners) first
    pub fn bind_grid(&mut self, grid: Arc<dyn GridApi>, kinds: &[GridEventKind]) -> Result<()> {
        self.ensure_live()?;
        if let Some(mut previous) = self.grid.take() {
            previous.detach();
            let stale = self.grid_rx.try_iter().count();
            tracing::debug!(parent: self.log.span(), stale, "detached from previous grid");
        }
        self.grid = Some(GridBinding::bind(grid, kinds, &self.grid_tx));
        if self.callbacks.is_some() {
            self.state = LifecycleState::Listening;
        }
        Ok(())
    }

    /// The bound grid, if any
    pub fn grid(&self) -> Option<&Arc<dyn GridApi>> {
        self.grid.as_ref().map(GridBinding::grid)
    }

    /// The registered callbacks, if any
    pub fn callbacks(&self) -> Option<&Arc<dyn ViewportCallbacks>> {
        self.callbacks.as_ref()
    }

    /// Grid events queued since the last call
    pub(crate) fn take_grid_events(&self) -> Vec<GridEvent> {
        self.grid_rx.try_iter().collect()
    }

    /// Validate and record a window requested by the grid.
    ///
    /// Returns the window to request, or `None` when the range is ignored.
    pub fn record_viewport(&mut self, first_row: i64, last_row: i64) -> Option<Viewport> {
        if self.is_destroyed() {
            tracing::debug!(parent: self.log.span(), first_row, last_row, "viewport ignored after destroy");
            return None;
        }
        if last_row < first_row {
            tracing::warn!(parent: self.log.span(), first_row, last_row, "ignoring out-of-order viewport range");
            return None;
        }
        if last_row < 0 {
            tracing::warn!(parent: self.log.span(), first_row, last_row, "ignoring negative viewport range");
            return None;
        }
        if first_row < 0 {
            tracing::warn!(parent: self.log.span(), first_row, "clamping negative first row to 0");
        }

        let viewport = Viewport::new(first_row.max(0) as usize, last_row as usize)?;
        self.viewport = Some(viewport);
        Some(viewport)
    }

    /// The window to re-request on refresh, if one has been recorded
    pub fn refresh_target(&self) -> Option<Viewport> {
        if self.is_destroyed() {
            return None;
        }
        if self.viewport.is_none() {
            tracing::debug!(parent: self.log.span(), "refresh skipped, no viewport set yet");
        }
        self.viewport
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Enter `Destroyed` and detach from the grid. Returns false if the
    /// datasource was already destroyed.
    pub fn mark_destroyed(&mut self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.state = LifecycleState::Destroyed;
        if let Some(mut binding) = self.grid.take() {
            binding.detach();
        }
        true
    }
}

/// Listeners and the viewport subscription held on one remote table
pub(crate) struct RemoteLink<T: RemoteTable + ?Sized> {
    table: Arc<T>,
    ownership: TableOwnership,
    subscription: Option<Box<dyn ViewportSubscription>>,
    listener_ids: Vec<ListenerId>,
    rx: Receiver<TableEvent>,
    released: bool,
}

impl<T: RemoteTable + ?Sized> RemoteLink<T> {
    /// Start listening to every event kind of `table`
    pub fn attach(table: Arc<T>, ownership: TableOwnership) -> Self {
        let (tx, rx) = unbounded();
        let listener_ids = attach_listeners(&*table, &TableEventKind::ALL, &tx);
        Self {
            table,
            ownership,
            subscription: None,
            listener_ids,
            rx,
            released: false,
        }
    }

    pub fn table(&self) -> &Arc<T> {
        &self.table
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribe to a new window, closing the previous subscription once the
    /// new one exists
    pub fn subscribe(&mut self, first_row: usize, last_row: usize) -> Result<()> {
        let subscription = self.table.set_viewport(first_row, last_row, None)?;
        if let Some(previous) = self.subscription.replace(subscription) {
            previous.close();
        }
        Ok(())
    }

    /// Move the existing subscription, creating one if there is none
    pub fn resize(&mut self, first_row: usize, last_row: usize) -> Result<()> {
        match &self.subscription {
            Some(subscription) => subscription.set_viewport(first_row, last_row),
            None => self.subscribe(first_row, last_row),
        }
    }

    pub fn close_subscription(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
        }
    }

    /// Events queued since the last call
    pub fn drain(&self) -> Vec<TableEvent> {
        self.rx.try_iter().collect()
    }

    /// Remove the table listeners without closing anything
    pub fn stop_listening(&mut self) {
        detach_listeners(&*self.table, &mut self.listener_ids);
    }

    pub fn is_listening(&self) -> bool {
        !self.listener_ids.is_empty()
    }

    /// Close the subscription, detach listeners and close the table if it is
    /// owned. Only the first call has any effect.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.close_subscription();
        self.stop_listening();
        if self.ownership == TableOwnership::Owned {
            self.table.close();
        }
    }
}
