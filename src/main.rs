//! Viewport Demo - Main Entry Point
//!
//! Replays a scripted scroll, filter, sort and grouping session against an
//! in-memory table and logs what the grid receives.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use viewport_grid::config::GridConfig;
use viewport_grid::datasources::{CompositeViewportDatasource, ViewportDatasource};
use viewport_grid::grid::{
    FilterModel, GridApi, GridEvent, GridEventKind, RowRecord, RowState, SimpleFilterModel,
    SortModelItem, ViewportCallbacks,
};
use viewport_grid::listeners::{ListenerId, ListenerRegistry};
use viewport_grid::logging;
use viewport_grid::remote::{
    AggregationSpec, Column, ColumnType, MemoryTable, RemoteTable, TableOwnership, Value,
};

const SYMBOLS: [&str; 6] = ["AAPL", "MSFT", "GOOG", "AMZN", "NVDA", "TSLA"];
const ROW_COUNT: i64 = 250;

/// Grid stand-in whose models the script sets directly
#[derive(Default)]
struct DemoGrid {
    listeners: ListenerRegistry<GridEventKind, GridEvent>,
    filter_model: Mutex<FilterModel>,
    sort_model: Mutex<Vec<SortModelItem>>,
    row_groups: Mutex<Vec<String>>,
}

impl DemoGrid {
    fn fire(&self, event: GridEvent) {
        self.listeners.emit(event.kind(), &event);
    }
}

impl GridApi for DemoGrid {
    fn add_event_listener(&self, kind: GridEventKind, tx: Sender<GridEvent>) -> ListenerId {
        self.listeners.add(kind, tx)
    }

    fn remove_event_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn filter_model(&self) -> FilterModel {
        self.filter_model.lock().clone()
    }

    fn sort_model(&self) -> Vec<SortModelItem> {
        self.sort_model.lock().clone()
    }

    fn row_group_columns(&self) -> Vec<String> {
        self.row_groups.lock().clone()
    }

    fn value_columns(&self) -> Vec<AggregationSpec> {
        Vec::new()
    }

    fn update_row_data(&self, id: &str, row: RowState) -> bool {
        tracing::debug!(id, known = row.is_known(), "row node updated");
        true
    }

    fn set_row_count(&self, count: usize) {
        tracing::info!(count, "grid row count");
    }

    fn auto_size_all_columns(&self) {
        tracing::debug!("auto-sizing columns");
    }
}

/// Viewport row model stand-in that logs what it is handed
struct DemoCallbacks;

impl ViewportCallbacks for DemoCallbacks {
    fn set_row_count(&self, count: usize) {
        tracing::info!(count, "viewport row count");
    }

    fn set_row_data(&self, rows: BTreeMap<usize, RowRecord>) {
        let first = rows.iter().next();
        tracing::info!(
            rows = rows.len(),
            first_index = first.map(|(index, _)| *index),
            first_symbol = first
                .and_then(|(_, record)| record.get("Sym"))
                .map(ToString::to_string),
            "viewport rows received"
        );
    }
}

fn build_table() -> Arc<MemoryTable> {
    let columns = vec![
        Column::new("Sym", ColumnType::String),
        Column::new("Qty", ColumnType::Long),
        Column::new("Px", ColumnType::Double),
    ];
    let rows = (0..ROW_COUNT)
        .map(|i| {
            vec![
                Value::from(SYMBOLS[i as usize % SYMBOLS.len()]),
                Value::Int((i * 37) % 500),
                Value::Double(100.0 + (i % 17) as f64 * 2.5),
            ]
        })
        .collect();
    MemoryTable::new("trades", columns, rows)
}

fn drain(datasource: &mut CompositeViewportDatasource) {
    // Remote updates can queue further grid work, so loop until quiet
    while datasource.pump() > 0 {}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = GridConfig::load_default().context("failed to load config")?;
    let _guard = logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("Starting viewport demo...");

    let table = build_table();
    let grid = Arc::new(DemoGrid::default());
    let mut datasource =
        CompositeViewportDatasource::with_parts(table.clone(), config.clone(), TableOwnership::Owned);

    datasource.init(Arc::new(DemoCallbacks))?;
    datasource.set_grid_api(grid.clone())?;

    tracing::info!("scrolling");
    for first in [0_i64, 40, 120] {
        datasource.set_viewport_range(first, first + 29);
        drain(&mut datasource);
    }

    tracing::info!("filtering Qty > 250");
    grid.filter_model.lock().insert(
        "Qty".to_string(),
        SimpleFilterModel::number("greaterThan", 250.0).into(),
    );
    grid.fire(GridEvent::FilterChanged);
    drain(&mut datasource);
    tracing::info!(size = table.size(), "filtered");

    tracing::info!("sorting Px descending");
    *grid.sort_model.lock() = vec![SortModelItem::new("Px", "desc")];
    grid.fire(GridEvent::SortChanged);
    drain(&mut datasource);

    tracing::info!("grouping by Sym");
    *grid.row_groups.lock() = vec!["Sym".to_string()];
    grid.fire(GridEvent::RowGroupChanged);
    drain(&mut datasource);
    let resolved = datasource.settle().await;
    tracing::info!(resolved, grouped = datasource.active().is_some_and(|a| a.is_tree()), "grouping settled");

    datasource.destroy();
    tracing::info!(closed = table.is_closed(), "demo finished");
    Ok(())
}
