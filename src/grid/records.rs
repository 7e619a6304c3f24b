//! Row Records
//!
//! The row shape pushed into the host grid.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::remote::{TreeRowInfo, Value};

/// Synthetic hierarchy metadata attached to tree rows.
///
/// `index` is the remote-stable row identity and is what the grid keys
/// tree rows by; the viewport position is not stable for tree data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub has_children: bool,
    pub is_expanded: bool,
    pub depth: usize,
    pub index: u64,
}

impl From<TreeRowInfo> for TreeNode {
    fn from(info: TreeRowInfo) -> Self {
        Self {
            has_children: info.has_children,
            is_expanded: info.is_expanded,
            depth: info.depth,
            index: info.index.0,
        }
    }
}

/// One materialized row: column name to value, plus tree metadata for
/// hierarchical rows
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RowRecord {
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub tree: Option<TreeNode>,
}

impl RowRecord {
    /// Value of a column, if present
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Set the value of a column
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }
}

/// Load state of one row in the pull model
#[derive(Debug, Clone, PartialEq)]
pub enum RowState {
    /// Data has arrived
    Known(RowRecord),
    /// Requested but not delivered yet; rendered as a skeleton
    Pending,
}

impl RowState {
    /// Check if data has arrived
    pub fn is_known(&self) -> bool {
        matches!(self, RowState::Known(_))
    }

    /// The record, if known
    pub fn record(&self) -> Option<&RowRecord> {
        match self {
            RowState::Known(record) => Some(record),
            RowState::Pending => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_metadata_flattens_into_record() {
        let mut record = RowRecord::default();
        record.insert("Sym", Value::from("AAPL"));
        record.tree = Some(TreeNode {
            has_children: true,
            is_expanded: false,
            depth: 1,
            index: 42,
        });

        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["Sym"], "AAPL");
        assert_eq!(json["hasChildren"], true);
        assert_eq!(json["index"], 42);
    }

    #[test]
    fn flat_record_has_no_tree_fields() {
        let mut record = RowRecord::default();
        record.insert("A", Value::Int(1));
        let json = serde_json::to_value(&record).expect("serialize");
        assert!(json.get("depth").is_none());
    }
}
