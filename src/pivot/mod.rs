//! Pivot Materialization
//!
//! Turns pivot snapshots into grid column definitions, header groups and
//! row records.
//!
//! ```text
//! RemotePivotTable ──PivotEvent::Updated──▶ PivotModel::pump()
//!                                              ├─▶ get_pivot_result_columns ─▶ build_pivot_layout
//!                                              └─▶ extract_snapshot_rows
//! ```

mod columns;
mod header_groups;
mod model;
mod rows;
mod snapshot;

pub use columns::{
    ColumnDefinition, ColumnGroupDefinition, ColumnGroupShow, LeafColumnDefinition, LeafKind,
    encode_segment, get_pivot_result_columns, make_path_name, make_placeholder_key,
    make_totals_key, make_value_key,
};
pub use header_groups::{DisplayColumn, PivotColumnHeaderGroup, PivotLayout, build_pivot_layout};
pub use model::{PivotEvent, PivotModel, PivotViewport, RemotePivotTable};
pub use rows::{extract_snapshot_row, extract_snapshot_rows, extract_totals_row, row_identity};
pub use snapshot::{DimensionData, DimensionEntry, PivotSnapshot, PivotSource, ValueSource};
