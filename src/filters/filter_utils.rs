//! Filter Model Translation
//!
//! Maps the host grid's filter model (text/number/date predicates and
//! AND/OR trees) onto remote filter conditions.

use chrono::{NaiveDate, NaiveDateTime};

use super::condition::{ColumnFilter, FilterCondition, FilterValue};
use crate::constants::{DATE_FORMAT, DATE_TIME_FORMAT};
use crate::error::{Error, Result};
use crate::grid::{ColumnFilterModel, CompoundFilterModel, FilterModel, SimpleFilterModel};
use crate::remote::{Column, ColumnType, RemoteTable};

type Combinator = fn(FilterCondition, FilterCondition) -> FilterCondition;

/// Translate a grid filter model into remote filter conditions, one per
/// filtered column. An empty model yields an empty list.
pub fn parse_filter_model<T>(table: &T, model: &FilterModel) -> Result<Vec<FilterCondition>>
where
    T: RemoteTable + ?Sized,
{
    model
        .iter()
        .map(|(column_id, column_model)| {
            let column = table.find_column(column_id)?;
            parse_column_filter(&column, column_model)
        })
        .collect()
}

/// Whether two condition lists are the same set of conditions, in any order
pub fn are_filters_equal(a: &[FilterCondition], b: &[FilterCondition]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<String> = a.iter().map(ToString::to_string).collect();
    let mut b: Vec<String> = b.iter().map(ToString::to_string).collect();
    a.sort();
    b.sort();
    a == b
}

fn parse_column_filter(column: &Column, model: &ColumnFilterModel) -> Result<FilterCondition> {
    match model {
        ColumnFilterModel::Compound(compound) => parse_compound_filter(column, compound),
        ColumnFilterModel::Simple(simple) => parse_simple_filter(column, simple),
    }
}

fn parse_compound_filter(column: &Column, model: &CompoundFilterModel) -> Result<FilterCondition> {
    let combine: Combinator = match model.operator.as_str() {
        "AND" => FilterCondition::and,
        "OR" => FilterCondition::or,
        other => {
            return Err(Error::UnsupportedCompoundOperator {
                operator: other.to_string(),
            });
        }
    };

    let mut conditions = model
        .conditions
        .iter()
        .map(|condition| parse_column_filter(column, condition));
    let first = conditions.next().ok_or_else(|| Error::MissingFilterField {
        operator: model.operator.clone(),
        field: "conditions".to_string(),
    })??;
    conditions.try_fold(first, |acc, next| next.map(|condition| combine(acc, condition)))
}

fn parse_simple_filter(column: &Column, model: &SimpleFilterModel) -> Result<FilterCondition> {
    let operator = model.kind.as_deref().ok_or_else(|| Error::MissingFilterField {
        operator: model.filter_type.clone(),
        field: "type".to_string(),
    })?;

    match model.filter_type.as_str() {
        "text" => parse_text_filter(column, operator, model),
        "number" => parse_number_filter(column, operator, model),
        "date" => parse_date_filter(column, operator, model),
        other => Err(Error::UnsupportedFilterType {
            filter_type: other.to_string(),
        }),
    }
}

fn parse_text_filter(
    column: &Column,
    operator: &str,
    model: &SimpleFilterModel,
) -> Result<FilterCondition> {
    let filter = ColumnFilter::new(&column.name);
    let text = || required_text(operator, "filter", model.filter.as_ref());

    match operator {
        "equals" => Ok(filter.eq(FilterValue::of_string(text()?))),
        "notEqual" => Ok(filter.not_eq(FilterValue::of_string(text()?))),
        "contains" => Ok(filter.contains(text()?)),
        "notContains" => Ok(filter.contains(text()?).not()),
        "startsWith" => Ok(filter.invoke("startsWith", vec![FilterValue::of_string(text()?)])),
        "endsWith" => Ok(filter.invoke("endsWith", vec![FilterValue::of_string(text()?)])),
        // Blank treats the empty string as blank; notBlank requires both
        // non-null and non-empty. They are intentionally not negations.
        "blank" => Ok(filter
            .is_null()
            .or(filter.eq(FilterValue::of_string("")))),
        "notBlank" => Ok(filter
            .is_null()
            .not()
            .and(filter.not_eq(FilterValue::of_string("")))),
        "true" => Ok(filter.is_true()),
        "false" => Ok(filter.is_false()),
        other => Err(unsupported_operator("text", other)),
    }
}

fn parse_number_filter(
    column: &Column,
    operator: &str,
    model: &SimpleFilterModel,
) -> Result<FilterCondition> {
    let filter = ColumnFilter::new(&column.name);
    let is_char = column.column_type == ColumnType::Char;
    let operand = |field: &str, raw: Option<&serde_json::Value>| -> Result<FilterValue> {
        let number = required_number(operator, field, raw)?;
        if is_char {
            char_code_value(field, number)
        } else {
            Ok(FilterValue::of_number(number))
        }
    };
    let first = || operand("filter", model.filter.as_ref());

    match operator {
        "blank" => Ok(filter.is_null()),
        "notBlank" => Ok(filter.is_null().not()),
        "equals" => Ok(filter.eq(first()?)),
        "notEqual" => Ok(filter.not_eq(first()?)),
        "greaterThan" => Ok(filter.greater_than(first()?)),
        "greaterThanOrEqual" => Ok(filter.greater_than_or_equal(first()?)),
        "lessThan" => Ok(filter.less_than(first()?)),
        "lessThanOrEqual" => Ok(filter.less_than_or_equal(first()?)),
        // Both bounds are exclusive
        "inRange" => {
            let from = first()?;
            let to = operand("filterTo", model.filter_to.as_ref())?;
            Ok(filter.greater_than(from).and(filter.less_than(to)))
        }
        other => Err(unsupported_operator("number", other)),
    }
}

fn parse_date_filter(
    column: &Column,
    operator: &str,
    model: &SimpleFilterModel,
) -> Result<FilterCondition> {
    let filter = ColumnFilter::new(&column.name);
    let from = || required_date(operator, "dateFrom", model.date_from.as_deref());

    match operator {
        "blank" => Ok(filter.is_null()),
        "notBlank" => Ok(filter.is_null().not()),
        "equals" => Ok(filter.eq(from()?)),
        "notEqual" => Ok(filter.not_eq(from()?)),
        "greaterThan" => Ok(filter.greater_than(from()?)),
        "greaterThanOrEqual" => Ok(filter.greater_than_or_equal(from()?)),
        "lessThan" => Ok(filter.less_than(from()?)),
        "lessThanOrEqual" => Ok(filter.less_than_or_equal(from()?)),
        "inRange" => {
            let start = from()?;
            let end = required_date(operator, "dateTo", model.date_to.as_deref())?;
            Ok(filter.greater_than(start).and(filter.less_than(end)))
        }
        other => Err(unsupported_operator("date", other)),
    }
}

fn unsupported_operator(filter_type: &str, operator: &str) -> Error {
    Error::UnsupportedFilterOperator {
        filter_type: filter_type.to_string(),
        operator: operator.to_string(),
    }
}

fn missing_field(operator: &str, field: &str) -> Error {
    Error::MissingFilterField {
        operator: operator.to_string(),
        field: field.to_string(),
    }
}

fn invalid_value(field: &str, message: impl Into<String>) -> Error {
    Error::InvalidFilterValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn required_text(operator: &str, field: &str, raw: Option<&serde_json::Value>) -> Result<String> {
    match raw {
        None | Some(serde_json::Value::Null) => Err(missing_field(operator, field)),
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(invalid_value(field, format!("expected text, got {other}"))),
    }
}

fn required_number(operator: &str, field: &str, raw: Option<&serde_json::Value>) -> Result<f64> {
    match raw {
        None | Some(serde_json::Value::Null) => Err(missing_field(operator, field)),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| invalid_value(field, format!("{n} is not representable"))),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| invalid_value(field, format!("'{s}': {e}"))),
        Some(other) => Err(invalid_value(field, format!("expected a number, got {other}"))),
    }
}

/// Character columns compare against the character with the given code
fn char_code_value(field: &str, code: f64) -> Result<FilterValue> {
    if code < 0.0 || code.fract() != 0.0 || code > f64::from(u32::MAX) {
        return Err(invalid_value(field, format!("{code} is not a character code")));
    }
    char::from_u32(code as u32)
        .map(FilterValue::Char)
        .ok_or_else(|| invalid_value(field, format!("{code} is not a character code")))
}

fn required_date(operator: &str, field: &str, raw: Option<&str>) -> Result<FilterValue> {
    let raw = raw.ok_or_else(|| missing_field(operator, field))?;
    parse_date_time(raw)
        .map(FilterValue::DateTime)
        .ok_or_else(|| invalid_value(field, format!("'{raw}' is not a date")))
}

/// Parse a wall-clock date string from the grid's date filter
fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, DATE_TIME_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::CompareOp;
    use crate::testing::MockTable;

    fn table() -> std::sync::Arc<MockTable> {
        MockTable::new(
            "trades",
            vec![
                Column::new("Sym", ColumnType::String),
                Column::new("Qty", ColumnType::Int),
                Column::new("Side", ColumnType::Char),
                Column::new("Ts", ColumnType::DateTime),
            ],
            100,
        )
    }

    fn model(column: &str, filter: impl Into<ColumnFilterModel>) -> FilterModel {
        let mut model = FilterModel::new();
        model.insert(column.to_string(), filter.into());
        model
    }

    fn parse_one(column: &str, filter: impl Into<ColumnFilterModel>) -> Result<FilterCondition> {
        let mut conditions = parse_filter_model(&*table(), &model(column, filter))?;
        assert_eq!(conditions.len(), 1);
        Ok(conditions.remove(0))
    }

    #[test]
    fn empty_model_yields_no_conditions() {
        let conditions = parse_filter_model(&*table(), &FilterModel::new()).expect("parse");
        assert!(conditions.is_empty());
    }

    #[test]
    fn text_equals_maps_to_eq() {
        let condition = parse_one("Sym", SimpleFilterModel::text("equals", "abc")).expect("parse");
        assert_eq!(
            condition,
            ColumnFilter::new("Sym").eq(FilterValue::of_string("abc"))
        );
    }

    #[test]
    fn blank_and_not_blank_are_not_negations() {
        let sym = ColumnFilter::new("Sym");
        let blank = parse_one("Sym", SimpleFilterModel::new("text", "blank")).expect("parse");
        let not_blank = parse_one("Sym", SimpleFilterModel::new("text", "notBlank")).expect("parse");

        assert_eq!(
            blank,
            sym.is_null().or(sym.eq(FilterValue::of_string("")))
        );
        assert_eq!(
            not_blank,
            sym.is_null().not().and(sym.not_eq(FilterValue::of_string("")))
        );
        assert_ne!(not_blank, blank.clone().not());
    }

    #[test]
    fn text_operators_cover_prefix_suffix_and_booleans() {
        let sym = ColumnFilter::new("Sym");
        assert_eq!(
            parse_one("Sym", SimpleFilterModel::text("notContains", "x")).expect("parse"),
            sym.contains("x").not()
        );
        assert_eq!(
            parse_one("Sym", SimpleFilterModel::text("startsWith", "A")).expect("parse"),
            sym.invoke("startsWith", vec![FilterValue::of_string("A")])
        );
        assert_eq!(
            parse_one("Sym", SimpleFilterModel::new("text", "true")).expect("parse"),
            sym.is_true()
        );
    }

    #[test]
    fn number_in_range_is_exclusive() {
        let condition = parse_one(
            "Qty",
            SimpleFilterModel::number("inRange", 5.0).with_filter_to(10.0),
        )
        .expect("parse");
        let qty = ColumnFilter::new("Qty");
        assert_eq!(
            condition,
            qty.greater_than(FilterValue::of_number(5.0))
                .and(qty.less_than(FilterValue::of_number(10.0)))
        );

        let row = |qty: i64| move |column: &str| match column {
            "Qty" => crate::remote::Value::Int(qty),
            _ => crate::remote::Value::Null,
        };
        assert!(!condition.matches(&row(5)));
        assert!(condition.matches(&row(7)));
        assert!(!condition.matches(&row(10)));
    }

    #[test]
    fn in_range_without_filter_to_names_the_field() {
        let err = parse_one("Qty", SimpleFilterModel::number("inRange", 5.0))
            .expect_err("missing filterTo");
        match err {
            Error::MissingFilterField { operator, field } => {
                assert_eq!(operator, "inRange");
                assert_eq!(field, "filterTo");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn number_blank_checks_nullity_only() {
        assert_eq!(
            parse_one("Qty", SimpleFilterModel::new("number", "notBlank")).expect("parse"),
            ColumnFilter::new("Qty").is_null().not()
        );
    }

    #[test]
    fn char_columns_compare_by_character_code() {
        let condition = parse_one("Side", SimpleFilterModel::number("equals", 66.0)).expect("parse");
        assert_eq!(
            condition,
            FilterCondition::Compare {
                column: "Side".to_string(),
                op: CompareOp::Eq,
                value: FilterValue::Char('B'),
            }
        );
    }

    #[test]
    fn date_filters_parse_wall_clock_strings() {
        let condition = parse_one(
            "Ts",
            SimpleFilterModel::date("inRange", "2024-01-01 00:00:00").with_date_to("2024-02-01"),
        )
        .expect("parse");
        let start = parse_date_time("2024-01-01 00:00:00").expect("date");
        let end = parse_date_time("2024-02-01").expect("date");
        let ts = ColumnFilter::new("Ts");
        assert_eq!(
            condition,
            ts.greater_than(FilterValue::DateTime(start))
                .and(ts.less_than(FilterValue::DateTime(end)))
        );

        let err = parse_one("Ts", SimpleFilterModel::date("equals", "yesterday"))
            .expect_err("bad date");
        assert!(matches!(err, Error::InvalidFilterValue { .. }));
    }

    #[test]
    fn compound_models_reduce_with_operator() {
        let compound = CompoundFilterModel {
            filter_type: "number".to_string(),
            operator: "OR".to_string(),
            conditions: vec![
                SimpleFilterModel::number("equals", 1.0).into(),
                SimpleFilterModel::number("equals", 2.0).into(),
                SimpleFilterModel::number("equals", 3.0).into(),
            ],
        };
        let qty = ColumnFilter::new("Qty");
        let eq = |n: f64| qty.eq(FilterValue::of_number(n));
        assert_eq!(
            parse_one("Qty", compound).expect("parse"),
            eq(1.0).or(eq(2.0)).or(eq(3.0))
        );
    }

    #[test]
    fn unknown_compound_operator_is_an_error() {
        let compound = CompoundFilterModel {
            filter_type: "text".to_string(),
            operator: "XOR".to_string(),
            conditions: vec![SimpleFilterModel::text("equals", "a").into()],
        };
        assert!(matches!(
            parse_one("Sym", compound),
            Err(Error::UnsupportedCompoundOperator { .. })
        ));
    }

    #[test]
    fn unsupported_filter_type_and_operator_are_errors() {
        assert!(matches!(
            parse_one("Sym", SimpleFilterModel::new("set", "equals")),
            Err(Error::UnsupportedFilterType { .. })
        ));
        assert!(matches!(
            parse_one("Sym", SimpleFilterModel::text("fuzzy", "a")),
            Err(Error::UnsupportedFilterOperator { .. })
        ));
        assert!(matches!(
            parse_filter_model(&*table(), &model("Missing", SimpleFilterModel::text("equals", "a"))),
            Err(Error::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn filter_equality_ignores_order() {
        let a = ColumnFilter::new("A").eq(FilterValue::of_number(1.0));
        let b = ColumnFilter::new("B").is_null();
        let c = ColumnFilter::new("C").contains("x");

        let original = vec![a.clone(), b.clone(), c.clone()];
        let permutations = [
            vec![a.clone(), c.clone(), b.clone()],
            vec![b.clone(), a.clone(), c.clone()],
            vec![b.clone(), c.clone(), a.clone()],
            vec![c.clone(), a.clone(), b.clone()],
            vec![c.clone(), b.clone(), a.clone()],
        ];
        for permutation in permutations {
            assert!(are_filters_equal(&original, &permutation));
        }
        assert!(!are_filters_equal(&original, &[a.clone(), b.clone()]));
        assert!(!are_filters_equal(&[a.clone(), a], &[b, c]));
    }
}
