//! Pivot Snapshot
//!
//! One point-in-time delivery of a pivot table's visible window: the row
//! and column dimension entries, the value cells at their intersections,
//! and the server-computed totals.

use ahash::AHashMap;
use serde::Serialize;

use crate::remote::{ColumnType, Value};

/// A grouping column of the row or column dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotSource {
    pub name: String,
    pub column_type: ColumnType,
}

impl PivotSource {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// An aggregated value column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueSource {
    pub name: String,
    pub column_type: ColumnType,
}

impl ValueSource {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// One entry of a dimension: a group or a leaf at some depth.
///
/// `keys` has one slot per dimension source. Slots `0..depth` hold the path
/// from the top level down to this entry; deeper slots are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionEntry {
    pub keys: Vec<Option<Value>>,
    /// 1 for top-level entries
    pub depth: usize,
    pub is_expanded: bool,
    pub has_children: bool,
    /// Group totals, one per value source
    pub totals: Vec<Value>,
}

impl DimensionEntry {
    pub fn new(keys: Vec<Option<Value>>, depth: usize) -> Self {
        Self {
            keys,
            depth,
            is_expanded: false,
            has_children: false,
            totals: Vec::new(),
        }
    }

    /// Mark the entry as an expandable group
    pub fn with_children(mut self, is_expanded: bool) -> Self {
        self.has_children = true;
        self.is_expanded = is_expanded;
        self
    }

    pub fn with_totals(mut self, totals: Vec<Value>) -> Self {
        self.totals = totals;
        self
    }

    /// Key path from the top level to this entry
    pub fn path(&self) -> &[Option<Value>] {
        let depth = self.depth.min(self.keys.len());
        &self.keys[..depth]
    }

    /// This entry's own key
    pub fn key(&self) -> Option<&Value> {
        self.path().last().and_then(Option::as_ref)
    }

    /// Group total for one value source
    pub fn total(&self, value_source: usize) -> Option<&Value> {
        self.totals.get(value_source)
    }
}

/// The visible slice of one dimension
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DimensionData {
    /// Absolute index of `entries[0]`
    pub offset: usize,
    /// Entries in the whole dimension, visible or not
    pub total_count: usize,
    pub entries: Vec<DimensionEntry>,
}

impl DimensionData {
    pub fn new(offset: usize, total_count: usize, entries: Vec<DimensionEntry>) -> Self {
        Self {
            offset,
            total_count,
            entries,
        }
    }

    /// Entry at an absolute index, if it is in the visible slice
    pub fn entry(&self, index: usize) -> Option<&DimensionEntry> {
        index
            .checked_sub(self.offset)
            .and_then(|position| self.entries.get(position))
    }

    /// Visible entries with their absolute indexes
    pub fn iter(&self) -> impl Iterator<Item = (usize, &DimensionEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(move |(position, entry)| (self.offset + position, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A complete pivot delivery
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PivotSnapshot {
    pub rows: DimensionData,
    pub columns: DimensionData,
    pub value_sources: Vec<ValueSource>,
    /// Cells keyed by (absolute row, absolute column, value source)
    values: AHashMap<(usize, usize, usize), Value>,
    grand_totals: Vec<Value>,
}

impl PivotSnapshot {
    pub fn new(rows: DimensionData, columns: DimensionData, value_sources: Vec<ValueSource>) -> Self {
        Self {
            rows,
            columns,
            value_sources,
            values: AHashMap::new(),
            grand_totals: Vec::new(),
        }
    }

    /// Set the cell at (row, column) for one value source
    pub fn set_value(&mut self, row: usize, column: usize, value_source: usize, value: Value) {
        self.values.insert((row, column, value_source), value);
    }

    pub fn set_grand_totals(&mut self, totals: Vec<Value>) {
        self.grand_totals = totals;
    }

    /// Cell at (row, column) for one value source
    pub fn value(&self, row: usize, column: usize, value_source: usize) -> Option<&Value> {
        self.values.get(&(row, column, value_source))
    }

    /// Total across all columns for one row entry
    pub fn row_total(&self, row: usize, value_source: usize) -> Option<&Value> {
        self.rows.entry(row).and_then(|entry| entry.total(value_source))
    }

    /// Total across all rows for one column entry
    pub fn column_total(&self, column: usize, value_source: usize) -> Option<&Value> {
        self.columns
            .entry(column)
            .and_then(|entry| entry.total(value_source))
    }

    /// Total over the whole table for one value source
    pub fn grand_total(&self, value_source: usize) -> Option<&Value> {
        self.grand_totals.get(value_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_addressed_by_absolute_index() {
        let entries = vec![
            DimensionEntry::new(vec![Some(Value::from("East")), None], 1).with_children(true),
            DimensionEntry::new(
                vec![Some(Value::from("East")), Some(Value::from("NY"))],
                2,
            ),
        ];
        let dimension = DimensionData::new(20, 40, entries);
        assert!(dimension.entry(19).is_none());
        assert_eq!(dimension.entry(21).and_then(DimensionEntry::key), Some(&Value::from("NY")));
        assert_eq!(dimension.entry(21).map(|entry| entry.path().len()), Some(2));
        assert!(dimension.entry(22).is_none());
    }

    #[test]
    fn missing_cells_and_totals_are_none() {
        let mut snapshot = PivotSnapshot::new(
            DimensionData::new(0, 1, vec![DimensionEntry::new(vec![Some(Value::from("a"))], 1)]),
            DimensionData::default(),
            vec![ValueSource::new("Qty", ColumnType::Long)],
        );
        snapshot.set_value(0, 3, 0, Value::Int(5));
        assert_eq!(snapshot.value(0, 3, 0), Some(&Value::Int(5)));
        assert_eq!(snapshot.value(0, 4, 0), None);
        assert_eq!(snapshot.row_total(0, 0), None);
        assert_eq!(snapshot.grand_total(0), None);
    }
}
