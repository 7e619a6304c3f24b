//! Pivot column header groups
//!
//! Flattens a column-definition tree into the shape a header renderer
//! consumes: a flat list of display columns, and one header group per
//! definition group, addressed by name.

use serde::Serialize;

use super::columns::{ColumnDefinition, ColumnGroupDefinition, LeafKind};
use super::snapshot::{PivotSource, ValueSource};
use crate::constants::PIVOT_KEY_COLUMN_GROUP;
use crate::remote::{Column, ColumnType};

/// A column together with the label the header shows for it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayColumn {
    #[serde(flatten)]
    pub column: Column,
    pub display_name: String,
}

impl DisplayColumn {
    pub fn new(column: Column, display_name: impl Into<String>) -> Self {
        Self {
            column,
            display_name: display_name.into(),
        }
    }

    /// Record field the column reads
    pub fn name(&self) -> &str {
        &self.column.name
    }
}

/// One node of the column header hierarchy. Built fresh for every
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotColumnHeaderGroup {
    /// Unique within one layout
    pub name: String,
    pub display_name: String,
    /// Names of child columns or child groups, in display order
    pub children: Vec<String>,
    pub depth: usize,
    pub is_expandable: bool,
    pub is_expanded: bool,
    pub is_total_group: bool,
    pub is_key_column_group: bool,
}

impl PivotColumnHeaderGroup {
    fn from_definition(group: &ColumnGroupDefinition) -> Self {
        Self {
            name: group.group_id.clone(),
            display_name: group.header_name.clone(),
            children: group.children.iter().map(|child| child.id().to_string()).collect(),
            depth: group.depth,
            is_expandable: group.is_expandable,
            is_expanded: group.open_by_default,
            is_total_group: group.is_total_group,
            is_key_column_group: false,
        }
    }

    /// Group spanning the row-key columns
    fn key_columns(row_sources: &[PivotSource], depth: usize) -> Self {
        Self {
            name: PIVOT_KEY_COLUMN_GROUP.to_string(),
            display_name: String::new(),
            children: row_sources.iter().map(|source| source.name.clone()).collect(),
            depth,
            is_expandable: false,
            is_expanded: true,
            is_total_group: false,
            is_key_column_group: true,
        }
    }
}

/// Columns and header groups derived from one snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotLayout {
    pub column_definitions: Vec<ColumnDefinition>,
    /// Row-key columns first, then every leaf definition
    pub columns: Vec<DisplayColumn>,
    /// Groups in pre-order
    pub header_groups: Vec<PivotColumnHeaderGroup>,
}

impl PivotLayout {
    /// Header group by name
    pub fn header_group(&self, name: &str) -> Option<&PivotColumnHeaderGroup> {
        self.header_groups.iter().find(|group| group.name == name)
    }

    /// Display column by record field
    pub fn column(&self, name: &str) -> Option<&DisplayColumn> {
        self.columns.iter().find(|column| column.name() == name)
    }
}

fn collect(
    definition: &ColumnDefinition,
    value_sources: &[ValueSource],
    columns: &mut Vec<DisplayColumn>,
    groups: &mut Vec<PivotColumnHeaderGroup>,
) {
    match definition {
        ColumnDefinition::Leaf(leaf) => {
            let column_type = match leaf.kind {
                LeafKind::Placeholder => ColumnType::Other,
                LeafKind::Value | LeafKind::Totals => leaf
                    .value_source
                    .and_then(|index| value_sources.get(index))
                    .map_or(ColumnType::Other, |source| source.column_type),
            };
            columns.push(DisplayColumn::new(
                Column::new(leaf.field.clone(), column_type),
                leaf.header_name.clone(),
            ));
        }
        ColumnDefinition::Group(group) => {
            groups.push(PivotColumnHeaderGroup::from_definition(group));
            for child in &group.children {
                collect(child, value_sources, columns, groups);
            }
        }
    }
}

/// Build the display columns and header groups for a definition tree.
///
/// `header_depth` is the number of header rows above the columns; the key
/// column group spans all of them.
pub fn build_pivot_layout(
    column_definitions: Vec<ColumnDefinition>,
    row_sources: &[PivotSource],
    value_sources: &[ValueSource],
    header_depth: usize,
) -> PivotLayout {
    let mut columns: Vec<DisplayColumn> = row_sources
        .iter()
        .map(|source| {
            DisplayColumn::new(
                Column::new(source.name.clone(), source.column_type),
                source.name.clone(),
            )
        })
        .collect();
    let mut header_groups = Vec::new();
    if !row_sources.is_empty() {
        header_groups.push(PivotColumnHeaderGroup::key_columns(row_sources, header_depth));
    }

    for definition in &column_definitions {
        collect(definition, value_sources, &mut columns, &mut header_groups);
    }

    PivotLayout {
        column_definitions,
        columns,
        header_groups,
    }
}
