//! Pivot row extraction
//!
//! Reshapes a snapshot into one record per visible row entry, plus a
//! synthetic totals row. Nothing is aggregated here: every total is read
//! from the snapshot.

use std::collections::BTreeMap;
use std::hash::BuildHasher;

use ahash::RandomState;

use super::columns::{make_path_name, make_totals_key, make_value_key};
use super::snapshot::{PivotSnapshot, PivotSource};
use crate::config::PivotConfig;
use crate::grid::{RowRecord, TreeNode};
use crate::remote::Value;

/// Fixed seeds so a key path maps to the same identity on every snapshot
const ROW_IDENTITY_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Identity of a row entry derived from its key path, so it does not shift
/// when rows above it expand or collapse
pub fn row_identity(path: &[Option<Value>], config: &PivotConfig) -> u64 {
    let [k0, k1, k2, k3] = ROW_IDENTITY_SEEDS;
    RandomState::with_seeds(k0, k1, k2, k3).hash_one(make_path_name(path, config))
}

/// Record field for one cell of a column entry.
///
/// Expandable column entries are addressed through their totals column,
/// leaf entries through their value column.
fn column_field(snapshot: &PivotSnapshot, column: usize, value_source: usize, config: &PivotConfig) -> Option<String> {
    let entry = snapshot.columns.entry(column)?;
    let source = snapshot.value_sources.get(value_source)?;
    Some(if entry.has_children {
        make_totals_key(entry.path(), source, config)
    } else {
        make_value_key(entry.path(), source, config)
    })
}

/// Record for the row entry at absolute index `row`, or `None` if the row
/// is outside the snapshot's visible slice
pub fn extract_snapshot_row(
    snapshot: &PivotSnapshot,
    row: usize,
    row_sources: &[PivotSource],
    config: &PivotConfig,
) -> Option<RowRecord> {
    let entry = snapshot.rows.entry(row)?;
    let mut record = RowRecord::default();

    for (level, source) in row_sources.iter().enumerate() {
        let key = if level < entry.depth {
            entry.keys.get(level).cloned().flatten()
        } else {
            None
        };
        record.insert(source.name.clone(), key.unwrap_or(Value::Null));
    }

    for (column, _) in snapshot.columns.iter() {
        for value_source in 0..snapshot.value_sources.len() {
            if let Some(field) = column_field(snapshot, column, value_source, config) {
                let value = snapshot.value(row, column, value_source).cloned();
                record.insert(field, value.unwrap_or_default());
            }
        }
    }

    for (value_source, source) in snapshot.value_sources.iter().enumerate() {
        let total = snapshot.row_total(row, value_source).cloned();
        record.insert(make_totals_key(&[], source, config), total.unwrap_or_default());
    }

    record.tree = Some(TreeNode {
        has_children: entry.has_children,
        is_expanded: entry.is_expanded,
        depth: entry.depth,
        index: row_identity(entry.path(), config),
    });
    Some(record)
}

/// The synthetic grand totals row
pub fn extract_totals_row(
    snapshot: &PivotSnapshot,
    row_sources: &[PivotSource],
    config: &PivotConfig,
) -> RowRecord {
    let mut record = RowRecord::default();

    for (level, source) in row_sources.iter().enumerate() {
        let label = if level == 0 {
            Value::from(config.grand_total_label.as_str())
        } else {
            Value::Null
        };
        record.insert(source.name.clone(), label);
    }

    for (column, _) in snapshot.columns.iter() {
        for value_source in 0..snapshot.value_sources.len() {
            if let Some(field) = column_field(snapshot, column, value_source, config) {
                let total = snapshot.column_total(column, value_source).cloned();
                record.insert(field, total.unwrap_or_default());
            }
        }
    }

    for (value_source, source) in snapshot.value_sources.iter().enumerate() {
        let total = snapshot.grand_total(value_source).cloned();
        record.insert(make_totals_key(&[], source, config), total.unwrap_or_default());
    }
    record
}

/// Records for every visible row, keyed by absolute row index, with the
/// totals row appended at `rows.total_count`
pub fn extract_snapshot_rows(
    snapshot: &PivotSnapshot,
    row_sources: &[PivotSource],
    config: &PivotConfig,
) -> BTreeMap<usize, RowRecord> {
    let mut rows: BTreeMap<usize, RowRecord> = snapshot
        .rows
        .iter()
        .filter_map(|(index, _)| {
            extract_snapshot_row(snapshot, index, row_sources, config).map(|record| (index, record))
        })
        .collect();
    rows.insert(
        snapshot.rows.total_count,
        extract_totals_row(snapshot, row_sources, config),
    );
    rows
}
