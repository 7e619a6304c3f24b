//! Host Grid Filter and Sort Models
//!
//! The grid-native shapes of column filters and sort order, deserialized
//! from the grid's JSON (`filterType`, `type`, `filterTo`, `colId`, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Active column filters keyed by column id
pub type FilterModel = BTreeMap<String, ColumnFilterModel>;

/// Filter on one column: a single predicate or an AND/OR tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnFilterModel {
    Compound(CompoundFilterModel),
    Simple(SimpleFilterModel),
}

/// Several conditions on one column joined by `operator`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundFilterModel {
    pub filter_type: String,
    /// `AND` or `OR`
    pub operator: String,
    pub conditions: Vec<ColumnFilterModel>,
}

/// A single predicate on one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SimpleFilterModel {
    /// `text`, `number` or `date`
    pub filter_type: String,
    /// Operator, e.g. `equals`, `inRange`, `blank`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub filter: Option<serde_json::Value>,
    #[serde(default)]
    pub filter_to: Option<serde_json::Value>,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
}

impl SimpleFilterModel {
    /// Create a predicate with no operands
    pub fn new(filter_type: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            filter_type: filter_type.into(),
            kind: Some(kind.into()),
            ..Default::default()
        }
    }

    /// Text predicate with one operand
    pub fn text(kind: &str, filter: &str) -> Self {
        Self::new("text", kind).with_filter(filter)
    }

    /// Number predicate with one operand
    pub fn number(kind: &str, filter: f64) -> Self {
        Self::new("number", kind).with_filter(filter)
    }

    /// Date predicate with a start date
    pub fn date(kind: &str, date_from: &str) -> Self {
        let mut model = Self::new("date", kind);
        model.date_from = Some(date_from.to_string());
        model
    }

    /// Set the first operand
    pub fn with_filter(mut self, filter: impl Into<serde_json::Value>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the second operand of a range
    pub fn with_filter_to(mut self, filter_to: impl Into<serde_json::Value>) -> Self {
        self.filter_to = Some(filter_to.into());
        self
    }

    /// Set the end date of a range
    pub fn with_date_to(mut self, date_to: impl Into<String>) -> Self {
        self.date_to = Some(date_to.into());
        self
    }
}

impl From<SimpleFilterModel> for ColumnFilterModel {
    fn from(model: SimpleFilterModel) -> Self {
        ColumnFilterModel::Simple(model)
    }
}

impl From<CompoundFilterModel> for ColumnFilterModel {
    fn from(model: CompoundFilterModel) -> Self {
        ColumnFilterModel::Compound(model)
    }
}

/// One entry of the grid's sort model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortModelItem {
    pub col_id: String,
    /// `asc` or `desc`
    pub sort: String,
    /// Sort by absolute value
    #[serde(default)]
    pub is_absolute: bool,
}

impl SortModelItem {
    /// Create a sort model entry
    pub fn new(col_id: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            col_id: col_id.into(),
            sort: sort.into(),
            is_absolute: false,
        }
    }
}

/// Page request issued by a pull-model grid
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRowsRequest {
    pub start_row: Option<usize>,
    /// Exclusive end of the requested page
    pub end_row: Option<usize>,
    #[serde(default)]
    pub filter_model: FilterModel,
    #[serde(default)]
    pub sort_model: Vec<SortModelItem>,
}

impl GetRowsRequest {
    /// Request rows `[start_row, end_row)` with no filter or sort
    pub fn page(start_row: usize, end_row: usize) -> Self {
        Self {
            start_row: Some(start_row),
            end_row: Some(end_row),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_model_deserializes_simple_and_compound() {
        let model: FilterModel = serde_json::from_str(
            r#"{
                "Name": {"filterType": "text", "type": "contains", "filter": "ab"},
                "Qty": {
                    "filterType": "number",
                    "operator": "OR",
                    "conditions": [
                        {"filterType": "number", "type": "equals", "filter": 1},
                        {"filterType": "number", "type": "inRange", "filter": 5, "filterTo": 10}
                    ]
                }
            }"#,
        )
        .expect("deserialize");

        assert_eq!(
            model.get("Name"),
            Some(&ColumnFilterModel::Simple(SimpleFilterModel::text("contains", "ab")))
        );
        match model.get("Qty") {
            Some(ColumnFilterModel::Compound(compound)) => {
                assert_eq!(compound.operator, "OR");
                assert_eq!(compound.conditions.len(), 2);
            }
            other => panic!("expected compound model, got {other:?}"),
        }
    }

    #[test]
    fn sort_model_defaults_is_absolute() {
        let items: Vec<SortModelItem> =
            serde_json::from_str(r#"[{"colId": "A", "sort": "desc"}]"#).expect("deserialize");
        assert_eq!(items, vec![SortModelItem::new("A", "desc")]);
    }
}
