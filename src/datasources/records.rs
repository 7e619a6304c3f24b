//! Viewport Row Materialization
//!
//! Turns a remote viewport snapshot into the row records pushed into the grid.

use std::collections::BTreeMap;

use crate::grid::{RowRecord, TreeNode};
use crate::remote::ViewportData;

/// Build the sparse absolute-row-index to record map for one snapshot.
///
/// Tree rows carry their hierarchy metadata; `TreeNode::index` comes from the
/// remote row identity, never from the row's position in the snapshot.
pub fn materialize_rows(data: &ViewportData) -> BTreeMap<usize, RowRecord> {
    data.rows
        .iter()
        .enumerate()
        .map(|(position, row)| {
            let values = data
                .columns
                .iter()
                .zip(row.values.iter())
                .map(|(column, value)| (column.name.clone(), value.clone()))
                .collect();
            let record = RowRecord {
                values,
                tree: row.tree.map(TreeNode::from),
            };
            (data.offset + position, record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Column, ColumnType, RowIndex, TreeRowInfo, Value, ViewportRow};

    fn tree_row(label: &str, index: u64) -> ViewportRow {
        ViewportRow::tree(
            vec![Value::from(label)],
            TreeRowInfo {
                has_children: true,
                is_expanded: false,
                depth: 2,
                index: RowIndex(index),
            },
        )
    }

    #[test]
    fn flat_rows_are_keyed_by_absolute_index() {
        let data = ViewportData {
            offset: 40,
            columns: vec![
                Column::new("A", ColumnType::Int),
                Column::new("B", ColumnType::String),
            ],
            rows: vec![
                ViewportRow::new(vec![Value::Int(1), Value::from("x")]),
                ViewportRow::new(vec![Value::Int(2), Value::from("y")]),
            ],
        };
        let rows = materialize_rows(&data);
        assert_eq!(rows.keys().copied().collect::<Vec<_>>(), vec![40, 41]);
        assert_eq!(rows[&41].get("B"), Some(&Value::from("y")));
        assert!(rows.values().all(|record| record.tree.is_none()));
    }

    #[test]
    fn tree_identity_survives_a_shifted_window() {
        let columns = vec![Column::new("Group", ColumnType::String)];
        let first = ViewportData {
            offset: 0,
            columns: columns.clone(),
            rows: vec![tree_row("a", 100), tree_row("b", 205)],
        };
        // Rows above expanded: the same logical row now sits at another
        // position in a window with another offset
        let second = ViewportData {
            offset: 7,
            columns,
            rows: vec![tree_row("x", 300), tree_row("y", 301), tree_row("b", 205)],
        };

        let before = materialize_rows(&first);
        let after = materialize_rows(&second);
        let index_of = |rows: &BTreeMap<usize, RowRecord>| {
            rows.values()
                .find(|record| record.get("Group") == Some(&Value::from("b")))
                .and_then(|record| record.tree)
                .map(|node| node.index)
        };
        assert_eq!(index_of(&before), Some(205));
        assert_eq!(index_of(&before), index_of(&after));
        assert_eq!(after[&9].tree.map(|node| node.depth), Some(2));
    }
}
