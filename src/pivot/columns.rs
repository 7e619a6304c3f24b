//! Pivot Result Columns
//!
//! Builds the grid's column-definition tree from the column dimension of a
//! snapshot. Every expandable group is closed with a totals column, and a
//! group that was never expanded carries a single placeholder child so the
//! grid still renders an expand affordance for it.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

use super::snapshot::{DimensionData, DimensionEntry, ValueSource};
use crate::config::PivotConfig;
use crate::constants::PIVOT_PATH_SEPARATOR;
use crate::remote::Value;

/// Characters escaped inside one path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// When a column inside a group is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnGroupShow {
    /// Only while the group is expanded
    Open,
    /// Only while the group is collapsed
    Closed,
}

/// What a leaf column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LeafKind {
    /// Cell values for one column entry and value source
    Value,
    /// Totals for a group, or grand totals at the root
    Totals,
    /// Stand-in child of a group that has not been expanded
    Placeholder,
}

/// A leaf column definition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafColumnDefinition {
    /// Record field the column reads
    pub field: String,
    pub header_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_group_show: Option<ColumnGroupShow>,
    pub kind: LeafKind,
    /// Value source the column shows; `None` for placeholders
    #[serde(skip)]
    pub value_source: Option<usize>,
}

/// A column group definition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnGroupDefinition {
    pub group_id: String,
    pub header_name: String,
    pub children: Vec<ColumnDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_group_show: Option<ColumnGroupShow>,
    pub open_by_default: bool,
    /// Number of dimension levels above and including this group
    #[serde(skip)]
    pub depth: usize,
    #[serde(skip)]
    pub is_expandable: bool,
    #[serde(skip)]
    pub is_total_group: bool,
}

/// A column or a group of columns
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnDefinition {
    Leaf(LeafColumnDefinition),
    Group(ColumnGroupDefinition),
}

impl ColumnDefinition {
    /// Field of a leaf or id of a group
    pub fn id(&self) -> &str {
        match self {
            ColumnDefinition::Leaf(leaf) => &leaf.field,
            ColumnDefinition::Group(group) => &group.group_id,
        }
    }

    fn set_column_group_show(&mut self, show: Option<ColumnGroupShow>) {
        match self {
            ColumnDefinition::Leaf(leaf) => leaf.column_group_show = show,
            ColumnDefinition::Group(group) => group.column_group_show = show,
        }
    }

    /// Every leaf below this definition, in display order
    pub fn leaves(&self) -> Vec<&LeafColumnDefinition> {
        match self {
            ColumnDefinition::Leaf(leaf) => vec![leaf],
            ColumnDefinition::Group(group) => group
                .children
                .iter()
                .flat_map(ColumnDefinition::leaves)
                .collect(),
        }
    }
}

/// Segment standing in for a missing key. `~` is always escaped in real
/// keys, so no key can encode to it.
const NULL_SEGMENT: &str = "~";

/// Escape the first byte of a segment that spells a synthetic key
fn guard_synthetic(encoded: String, config: &PivotConfig) -> String {
    if encoded != config.totals_key && encoded != config.placeholder_key {
        return encoded;
    }
    match encoded.as_bytes().first() {
        // Encoded text is ASCII, so byte 1 is a char boundary
        Some(first) => format!("%{first:02X}{}", &encoded[1..]),
        None => encoded,
    }
}

/// Escape one key for use as a path segment. Missing and null keys become
/// `~`; keys spelling a synthetic key are escaped so they stay distinct.
pub fn encode_segment(key: Option<&Value>, config: &PivotConfig) -> String {
    match key.filter(|value| !value.is_null()) {
        Some(value) => guard_synthetic(
            utf8_percent_encode(&value.to_string(), SEGMENT).to_string(),
            config,
        ),
        None => NULL_SEGMENT.to_string(),
    }
}

fn encode_path<'a>(
    path: &'a [Option<Value>],
    config: &'a PivotConfig,
) -> impl Iterator<Item = String> + 'a {
    path.iter().map(move |key| encode_segment(key.as_ref(), config))
}

fn encode_name(name: &str, config: &PivotConfig) -> String {
    guard_synthetic(utf8_percent_encode(name, SEGMENT).to_string(), config)
}

/// Name of a dimension path: escaped keys joined by `/`
pub fn make_path_name(path: &[Option<Value>], config: &PivotConfig) -> String {
    join_segments(encode_path(path, config))
}

/// Field of the value column for one path and value source
pub fn make_value_key(
    path: &[Option<Value>],
    value_source: &ValueSource,
    config: &PivotConfig,
) -> String {
    join_segments(
        encode_path(path, config).chain(std::iter::once(encode_name(&value_source.name, config))),
    )
}

/// Field of the totals column for one path and value source. The empty path
/// names the grand totals.
pub fn make_totals_key(
    path: &[Option<Value>],
    value_source: &ValueSource,
    config: &PivotConfig,
) -> String {
    join_segments(encode_path(path, config).chain([
        config.totals_key.clone(),
        encode_name(&value_source.name, config),
    ]))
}

/// Field of the placeholder column of an unexpanded group
pub fn make_placeholder_key(path: &[Option<Value>], config: &PivotConfig) -> String {
    join_segments(encode_path(path, config).chain(std::iter::once(config.placeholder_key.clone())))
}

fn join_segments(segments: impl Iterator<Item = String>) -> String {
    let mut name = String::new();
    for (i, segment) in segments.enumerate() {
        if i > 0 {
            name.push(PIVOT_PATH_SEPARATOR);
        }
        name.push_str(&segment);
    }
    name
}

fn display_key(entry: &DimensionEntry) -> String {
    entry.key().map(ToString::to_string).unwrap_or_default()
}

/// A group still accepting children
struct OpenGroup {
    path: Vec<Option<Value>>,
    group: ColumnGroupDefinition,
}

/// Builds the column tree from a column dimension
struct ColumnTreeBuilder<'a> {
    value_sources: &'a [ValueSource],
    config: &'a PivotConfig,
    stack: Vec<OpenGroup>,
    root: Vec<ColumnDefinition>,
}

impl<'a> ColumnTreeBuilder<'a> {
    fn new(value_sources: &'a [ValueSource], config: &'a PivotConfig) -> Self {
        Self {
            value_sources,
            config,
            stack: Vec::new(),
            root: Vec::new(),
        }
    }

    /// Append a finished definition to the innermost open group, or the root
    fn append(&mut self, mut definition: ColumnDefinition) {
        match self.stack.last_mut() {
            Some(open) => {
                definition.set_column_group_show(Some(ColumnGroupShow::Open));
                open.group.children.push(definition);
            }
            None => self.root.push(definition),
        }
    }

    /// Whether `path` lies strictly below the innermost open group
    fn extends_top(&self, path: &[Option<Value>]) -> bool {
        self.stack
            .last()
            .is_some_and(|open| path.len() > open.path.len() && path.starts_with(&open.path))
    }

    fn add_entry(&mut self, entry: &DimensionEntry) {
        let path = entry.path().to_vec();
        while !self.stack.is_empty() && !self.extends_top(&path) {
            self.close_top();
        }

        if entry.has_children {
            let group = ColumnGroupDefinition {
                group_id: make_path_name(&path, self.config),
                header_name: display_key(entry),
                children: Vec::new(),
                column_group_show: None,
                open_by_default: entry.is_expanded,
                depth: path.len(),
                is_expandable: true,
                is_total_group: false,
            };
            self.stack.push(OpenGroup { path, group });
        } else {
            let definition = self.value_columns(&path, display_key(entry));
            self.append(definition);
        }
    }

    /// Value column(s) for a leaf entry: one column, or a group holding one
    /// column per value source
    fn value_columns(&self, path: &[Option<Value>], header: String) -> ColumnDefinition {
        let leaf = |index: usize, source: &ValueSource, header: String| {
            ColumnDefinition::Leaf(LeafColumnDefinition {
                field: make_value_key(path, source, self.config),
                header_name: header,
                column_group_show: None,
                kind: LeafKind::Value,
                value_source: Some(index),
            })
        };

        match self.value_sources {
            [source] => leaf(0, source, header),
            sources => ColumnDefinition::Group(ColumnGroupDefinition {
                group_id: make_path_name(path, self.config),
                header_name: header,
                children: sources
                    .iter()
                    .enumerate()
                    .map(|(index, source)| leaf(index, source, source.name.clone()))
                    .collect(),
                column_group_show: None,
                open_by_default: false,
                depth: path.len(),
                is_expandable: false,
                is_total_group: false,
            }),
        }
    }

    /// Totals column(s) for a closed group or, with an empty path, the root
    fn totals_columns(&self, path: &[Option<Value>], label: &str) -> Vec<ColumnDefinition> {
        let leaf = |index: usize, source: &ValueSource, header: String| {
            ColumnDefinition::Leaf(LeafColumnDefinition {
                field: make_totals_key(path, source, self.config),
                header_name: header,
                column_group_show: None,
                kind: LeafKind::Totals,
                value_source: Some(index),
            })
        };

        match self.value_sources {
            [source] => vec![leaf(0, source, label.to_string())],
            sources if path.is_empty() => sources
                .iter()
                .enumerate()
                .map(|(index, source)| leaf(index, source, format!("{label} {}", source.name)))
                .collect(),
            sources => {
                let mut totals_path = make_path_name(path, self.config);
                totals_path.push(PIVOT_PATH_SEPARATOR);
                totals_path.push_str(&self.config.totals_key);
                vec![ColumnDefinition::Group(ColumnGroupDefinition {
                    group_id: totals_path,
                    header_name: label.to_string(),
                    children: sources
                        .iter()
                        .enumerate()
                        .map(|(index, source)| leaf(index, source, source.name.clone()))
                        .collect(),
                    column_group_show: None,
                    open_by_default: false,
                    depth: path.len() + 1,
                    is_expandable: false,
                    is_total_group: true,
                })]
            }
        }
    }

    /// Close the innermost open group and append it to its parent
    fn close_top(&mut self) {
        let Some(OpenGroup { path, mut group }) = self.stack.pop() else {
            return;
        };

        if group.children.is_empty() {
            group.children.push(ColumnDefinition::Leaf(LeafColumnDefinition {
                field: make_placeholder_key(&path, self.config),
                header_name: String::new(),
                column_group_show: Some(ColumnGroupShow::Open),
                kind: LeafKind::Placeholder,
                value_source: None,
            }));
        }
        // Totals stay visible whether or not the group is expanded
        let label = format!("{} Total", group.header_name);
        group.children.extend(self.totals_columns(&path, &label));

        self.append(ColumnDefinition::Group(group));
    }

    fn finish(mut self) -> Vec<ColumnDefinition> {
        while !self.stack.is_empty() {
            self.close_top();
        }
        let grand_totals = self.totals_columns(&[], &self.config.grand_total_label);
        self.root.extend(grand_totals);
        self.root
    }
}

/// Build the column-definition tree for a column dimension.
///
/// Entries are visited in order with a stack of open groups: an entry whose
/// path does not extend the innermost open group closes it first. Closing a
/// group appends a placeholder if it has no children, then its totals.
/// Grand totals, one per value source, come last at the root.
pub fn get_pivot_result_columns(
    columns: &DimensionData,
    value_sources: &[ValueSource],
    config: &PivotConfig,
) -> Vec<ColumnDefinition> {
    let mut builder = ColumnTreeBuilder::new(value_sources, config);
    for entry in &columns.entries {
        builder.add_entry(entry);
    }
    builder.finish()
}
