//! Tree Table Datasource
//!
//! Binds a hierarchical (tree or rollup) remote table to a viewport-model
//! grid. Rows carry `TreeNode` metadata and expansion is delegated to the
//! remote table.

use std::sync::Arc;

use super::base::{RemoteLink, ViewportCore};
use super::records::materialize_rows;
use super::ViewportDatasource;
use crate::config::GridConfig;
use crate::error::{Error, Result};
use crate::filters::{
    FilterCondition, Sort, are_filters_equal, are_sorts_equal, parse_filter_model,
    parse_sort_model,
};
use crate::grid::{FilterModel, GridApi, GridEvent, GridEventKind, SortModelItem, ViewportCallbacks};
use crate::logging::LogContext;
use crate::remote::{AggregationSpec, RemoteTable, RemoteTreeTable, TableEvent, TableOwnership};

const GRID_EVENTS: [GridEventKind; 3] = [
    GridEventKind::FilterChanged,
    GridEventKind::SortChanged,
    GridEventKind::RowGroupOpened,
];

/// Push-model datasource over a tree table
pub struct TreeViewportDatasource {
    core: ViewportCore,
    link: RemoteLink<dyn RemoteTreeTable>,
    last_filters: Option<Vec<FilterCondition>>,
    last_sorts: Option<Vec<Sort>>,
}

impl TreeViewportDatasource {
    /// Datasource that owns `table` and closes it on destroy
    pub fn new(table: Arc<dyn RemoteTreeTable>) -> Self {
        Self::with_parts(
            table,
            &GridConfig::default(),
            TableOwnership::Owned,
            LogContext::new("tree"),
        )
    }

    pub fn with_parts(
        table: Arc<dyn RemoteTreeTable>,
        config: &GridConfig,
        ownership: TableOwnership,
        log: LogContext,
    ) -> Self {
        tracing::debug!(parent: log.span(), table = table.name(), ?ownership, "binding tree table");
        Self {
            core: ViewportCore::new(config.viewport.clone(), log),
            link: RemoteLink::attach(table, ownership),
            last_filters: None,
            last_sorts: None,
        }
    }

    pub fn table(&self) -> &Arc<dyn RemoteTreeTable> {
        self.link.table()
    }

    /// Expand or collapse the row at a viewport position.
    ///
    /// Local state is left alone: the next snapshot carries the new row
    /// count and expansion flags.
    pub fn set_expanded(&mut self, row: usize, expanded: bool) -> Result<()> {
        self.core.ensure_live()?;
        tracing::debug!(parent: self.core.log().span(), row, expanded, "set expanded");
        self.link.table().set_expanded(row, expanded)
    }

    pub fn expand_all(&mut self) -> Result<()> {
        self.core.ensure_live()?;
        self.link.table().expand_all()
    }

    pub fn collapse_all(&mut self) -> Result<()> {
        self.core.ensure_live()?;
        self.link.table().collapse_all()
    }

    /// Row count reported to the grid; never below the configured floor so
    /// the grid keeps requesting a viewport for an empty tree
    fn reported_row_count(&self, size: usize) -> usize {
        size.max(self.core.config().tree_min_row_count)
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
                tracing::trace!(parent: &log, offset = data.offset, rows = rows.len(), "tree viewport updated");
                callbacks.set_row_count(self.reported_row_count(self.link.table().size()));
                callbacks.set_row_data(rows);
            }
            TableEvent::SizeChanged(size) => {
                if let Some(callbacks) = self.core.callbacks() {
                    callbacks.set_row_count(self.reported_row_count(size));
                }
            }
            TableEvent::Disconnect => {
                tracing::info!(parent: &log, table = self.link.table().name(), "tree table disconnected, listeners removed");
                self.link.stop_listening();
            }
            TableEvent::RequestFailed(message) => {
                tracing::warn!(parent: &log, %message, "tree table request failed");
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
            GridEvent::RowGroupOpened { row, expanded } => self.set_expanded(row, expanded),
            _ => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(parent: self.core.log().span(), error = %e, "failed to apply grid change");
        }
    }
}

impl ViewportDatasource for TreeViewportDatasource {
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
        if self
            .last_filters
            .as_ref()
            .is_some_and(|last| are_filters_equal(last, &filters))
        {
            tracing::debug!(parent: self.core.log().span(), "filters unchanged, skipping");
            return Ok(());
        }
        self.last_filters = Some(filters.clone());
        if let Err(e) = self.link.table().apply_filter(filters) {
            tracing::warn!(parent: self.core.log().span(), error = %e, "remote filter failed");
        }
        self.refresh_viewport();
        Ok(())
    }

    fn apply_sort(&mut self, model: &[SortModelItem]) -> Result<()> {
        self.core.ensure_live()?;
        let sorts = parse_sort_model(self.link.table().as_ref(), model)?;
        if self
            .last_sorts
            .as_ref()
            .is_some_and(|last| are_sorts_equal(last, &sorts))
        {
            tracing::debug!(parent: self.core.log().span(), "sorts unchanged, skipping");
            return Ok(());
        }
        self.last_sorts = Some(sorts.clone());
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
        tracing::debug!(parent: self.core.log().span(), first_row, last_row, "requesting tree viewport");
        if let Err(e) = self.link.subscribe(first_row, last_row) {
            tracing::warn!(parent: self.core.log().span(), error = %e, "viewport request failed");
        }
    }

    fn apply_aggregated_columns(&mut self, columns: &[AggregationSpec]) -> Result<()> {
        self.core.ensure_live()?;
        Err(Error::RollupOnTree {
            message: format!(
                "'{}' is already a rollup, cannot aggregate {} more column(s)",
                self.link.table().name(),
                columns.len()
            ),
        })
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

impl Drop for TreeViewportDatasource {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::ColumnFilter;
    use crate::grid::{ColumnFilterModel, SimpleFilterModel};
    use crate::remote::{Column, ColumnType, RowIndex, TreeRowInfo, Value, ViewportData, ViewportRow};
    use crate::testing::{MockGrid, MockTable, RecordingCallbacks, TableCall};

    fn setup(size: usize) -> (Arc<MockTable>, TreeViewportDatasource, Arc<RecordingCallbacks>) {
        let table = MockTable::new(
            "rollup",
            vec![
                Column::new("Sym", ColumnType::String),
                Column::new("Qty", ColumnType::Long),
                Column::new("Side", ColumnType::String),
            ],
            size,
        );
        let mut datasource = TreeViewportDatasource::new(table.clone());
        let callbacks = RecordingCallbacks::new();
        datasource.init(callbacks.clone()).expect("init");
        (table, datasource, callbacks)
    }

    fn filter_model(entries: &[(&str, SimpleFilterModel)]) -> FilterModel {
        entries
            .iter()
            .map(|(column, model)| (column.to_string(), ColumnFilterModel::from(model.clone())))
            .collect()
    }

    #[test]
    fn empty_tree_reports_one_row() {
        let (table, mut datasource, callbacks) = setup(0);
        table.emit(TableEvent::SizeChanged(0));
        table.emit_update(ViewportData {
            offset: 0,
            columns: Vec::new(),
            rows: Vec::new(),
        });
        datasource.pump();
        assert_eq!(callbacks.row_counts(), vec![1, 1]);
    }

    #[test]
    fn set_expanded_forwards_without_touching_row_count() {
        let (table, mut datasource, callbacks) = setup(10);
        datasource.set_viewport_range(0, 9);
        let row = ViewportRow::tree(
            vec![Value::from("AAPL"), Value::Int(10), Value::Null],
            TreeRowInfo {
                has_children: true,
                is_expanded: false,
                depth: 1,
                index: RowIndex(3),
            },
        );
        table.emit_update(ViewportData {
            offset: 3,
            columns: table.columns(),
            rows: vec![row],
        });
        datasource.pump();
        let counts_before = callbacks.row_counts();

        datasource.set_expanded(3, true).expect("expand");
        datasource.pump();

        assert_eq!(
            table.calls().last(),
            Some(&TableCall::SetExpanded { row: 3, expanded: true })
        );
        assert_eq!(callbacks.row_counts(), counts_before);

        table.set_size(14);
        table.emit(TableEvent::SizeChanged(14));
        datasource.pump();
        assert_eq!(callbacks.row_counts().last(), Some(&14));
    }

    #[test]
    fn row_group_opened_expands_through_the_table() {
        let (table, mut datasource, _) = setup(10);
        let grid = MockGrid::new();
        datasource.set_grid_api(grid.clone()).expect("bind");
        grid.emit(GridEvent::RowGroupOpened { row: 2, expanded: false });
        datasource.pump();
        assert_eq!(
            table.calls(),
            vec![TableCall::SetExpanded { row: 2, expanded: false }]
        );

        datasource.expand_all().expect("expand all");
        datasource.collapse_all().expect("collapse all");
        assert_eq!(
            table.calls()[1..],
            [TableCall::ExpandAll, TableCall::CollapseAll]
        );
    }

    #[test]
    fn equal_filters_in_any_order_are_sent_once() {
        let (table, mut datasource, _) = setup(10);
        datasource.set_viewport_range(0, 9);

        let sym = ("Sym", SimpleFilterModel::text("contains", "A"));
        let qty = ("Qty", SimpleFilterModel::number("greaterThan", 5.0));
        let side = ("Side", SimpleFilterModel::new("text", "blank"));
        datasource
            .apply_filter(&filter_model(&[sym.clone(), qty.clone(), side.clone()]))
            .expect("filter");
        datasource
            .apply_filter(&filter_model(&[side, qty, sym]))
            .expect("same filter");
        assert_eq!(table.filter_calls().len(), 1);

        datasource
            .apply_filter(&filter_model(&[("Sym", SimpleFilterModel::text("contains", "B"))]))
            .expect("new filter");
        assert_eq!(
            table.filter_calls().last(),
            Some(&vec![ColumnFilter::new("Sym").contains("B")])
        );
        assert_eq!(table.filter_calls().len(), 2);
    }

    #[test]
    fn repeated_sorts_are_sent_once() {
        let (table, mut datasource, _) = setup(10);
        let model = vec![SortModelItem::new("Qty", "asc"), SortModelItem::new("Sym", "desc")];
        datasource.apply_sort(&model).expect("sort");
        datasource.apply_sort(&model).expect("same sort");
        assert_eq!(table.sort_calls().len(), 1);

        let reversed: Vec<_> = model.into_iter().rev().collect();
        datasource.apply_sort(&reversed).expect("reordered sort");
        assert_eq!(table.sort_calls().len(), 2);
    }

    #[test]
    fn aggregating_a_tree_is_rejected() {
        let (_, mut datasource, _) = setup(10);
        let result = datasource.apply_aggregated_columns(&[AggregationSpec::new(
            "Qty",
            crate::remote::AggOperation::Sum,
        )]);
        assert!(matches!(result, Err(Error::RollupOnTree { .. })));
    }

    #[test]
    fn destroy_twice_closes_once() {
        let (table, mut datasource, _) = setup(10);
        datasource.destroy();
        datasource.destroy();
        assert_eq!(table.close_count(), 1);
        assert!(matches!(datasource.set_expanded(0, true), Err(Error::Destroyed)));
    }
}
