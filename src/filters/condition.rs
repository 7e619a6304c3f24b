//! Remote Filter and Sort Conditions
//!
//! The query-protocol side of filter/sort translation: a condition tree
//! built with the same combinators the remote API exposes (`eq`, `isNull`,
//! `not`, `and`, `or`, ...), plus local evaluation for in-process tables.

use std::cmp::Ordering;

use chrono::NaiveDateTime;

use crate::constants::DATE_TIME_FORMAT;
use crate::remote::Value;

/// Literal operand of a filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Number(f64),
    Char(char),
    DateTime(NaiveDateTime),
    Bool(bool),
}

impl FilterValue {
    /// Wrap a string operand
    pub fn of_string(value: impl Into<String>) -> Self {
        FilterValue::String(value.into())
    }

    /// Wrap a numeric operand
    pub fn of_number(value: f64) -> Self {
        FilterValue::Number(value)
    }

    /// Order of a cell value relative to this operand; `None` when the two
    /// are not comparable (including null cells).
    fn cmp_cell(&self, cell: &Value) -> Option<Ordering> {
        match (cell, self) {
            (Value::String(a), FilterValue::String(b)) => Some(a.as_str().cmp(b.as_str())),
            (Value::Char(a), FilterValue::Char(b)) => Some(a.cmp(b)),
            (Value::Char(a), FilterValue::String(b)) => Some(a.to_string().as_str().cmp(b.as_str())),
            (Value::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), FilterValue::DateTime(b)) => Some(a.cmp(b)),
            (cell, FilterValue::Number(b)) => cell.as_f64().and_then(|a| a.partial_cmp(b)),
            _ => None,
        }
    }
}

impl std::fmt::Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterValue::String(v) => write!(f, "{v:?}"),
            FilterValue::Number(v) => write!(f, "{v}"),
            FilterValue::Char(v) => write!(f, "'{v}'"),
            FilterValue::DateTime(v) => write!(f, "'{}'", v.format(DATE_TIME_FORMAT)),
            FilterValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEqual => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEqual => "<=",
        }
    }
}

/// A filter condition in the remote query protocol
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    Compare {
        column: String,
        op: CompareOp,
        value: FilterValue,
    },
    Contains {
        column: String,
        value: String,
    },
    /// Invoke a method on the cell value, e.g. `startsWith`
    Invoke {
        column: String,
        method: String,
        args: Vec<FilterValue>,
    },
    IsNull {
        column: String,
    },
    IsTrue {
        column: String,
    },
    IsFalse {
        column: String,
    },
    Not(Box<FilterCondition>),
    And(Box<FilterCondition>, Box<FilterCondition>),
    Or(Box<FilterCondition>, Box<FilterCondition>),
}

impl FilterCondition {
    /// Negate this condition
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        FilterCondition::Not(Box::new(self))
    }

    /// Both this and `other`
    pub fn and(self, other: FilterCondition) -> Self {
        FilterCondition::And(Box::new(self), Box::new(other))
    }

    /// Either this or `other`
    pub fn or(self, other: FilterCondition) -> Self {
        FilterCondition::Or(Box::new(self), Box::new(other))
    }

    /// Evaluate against a row, looking cells up by column name
    pub fn matches<F>(&self, cell: &F) -> bool
    where
        F: Fn(&str) -> Value,
    {
        match self {
            FilterCondition::Compare { column, op, value } => {
                let ordering = value.cmp_cell(&cell(column));
                match op {
                    CompareOp::Eq => ordering == Some(Ordering::Equal),
                    CompareOp::NotEq => ordering != Some(Ordering::Equal),
                    CompareOp::GreaterThan => ordering == Some(Ordering::Greater),
                    CompareOp::GreaterThanOrEqual => {
                        matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                    }
                    CompareOp::LessThan => ordering == Some(Ordering::Less),
                    CompareOp::LessThanOrEqual => {
                        matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                    }
                }
            }
            FilterCondition::Contains { column, value } => cell(column)
                .as_str()
                .is_some_and(|s| s.contains(value.as_str())),
            FilterCondition::Invoke {
                column,
                method,
                args,
            } => {
                let cell = cell(column);
                let (Some(s), Some(FilterValue::String(arg))) = (cell.as_str(), args.first())
                else {
                    return false;
                };
                match method.as_str() {
                    "startsWith" => s.starts_with(arg.as_str()),
                    "endsWith" => s.ends_with(arg.as_str()),
                    _ => false,
                }
            }
            FilterCondition::IsNull { column } => cell(column).is_null(),
            FilterCondition::IsTrue { column } => cell(column) == Value::Bool(true),
            FilterCondition::IsFalse { column } => cell(column) == Value::Bool(false),
            FilterCondition::Not(inner) => !inner.matches(cell),
            FilterCondition::And(a, b) => a.matches(cell) && b.matches(cell),
            FilterCondition::Or(a, b) => a.matches(cell) || b.matches(cell),
        }
    }
}

impl std::fmt::Display for FilterCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterCondition::Compare { column, op, value } => {
                write!(f, "{column} {} {value}", op.symbol())
            }
            FilterCondition::Contains { column, value } => {
                write!(f, "{column}.contains({value:?})")
            }
            FilterCondition::Invoke {
                column,
                method,
                args,
            } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{column}.{method}({})", args.join(", "))
            }
            FilterCondition::IsNull { column } => write!(f, "isNull({column})"),
            FilterCondition::IsTrue { column } => write!(f, "{column} == true"),
            FilterCondition::IsFalse { column } => write!(f, "{column} == false"),
            FilterCondition::Not(inner) => write!(f, "!({inner})"),
            FilterCondition::And(a, b) => write!(f, "({a} && {b})"),
            FilterCondition::Or(a, b) => write!(f, "({a} || {b})"),
        }
    }
}

/// Entry point for building conditions on one column, mirroring the
/// remote API's `column.filter()` value.
#[derive(Debug, Clone)]
pub struct ColumnFilter {
    column: String,
}

impl ColumnFilter {
    /// Start a filter on a column
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    fn compare(&self, op: CompareOp, value: FilterValue) -> FilterCondition {
        FilterCondition::Compare {
            column: self.column.clone(),
            op,
            value,
        }
    }

    pub fn eq(&self, value: FilterValue) -> FilterCondition {
        self.compare(CompareOp::Eq, value)
    }

    pub fn not_eq(&self, value: FilterValue) -> FilterCondition {
        self.compare(CompareOp::NotEq, value)
    }

    pub fn greater_than(&self, value: FilterValue) -> FilterCondition {
        self.compare(CompareOp::GreaterThan, value)
    }

    pub fn greater_than_or_equal(&self, value: FilterValue) -> FilterCondition {
        self.compare(CompareOp::GreaterThanOrEqual, value)
    }

    pub fn less_than(&self, value: FilterValue) -> FilterCondition {
        self.compare(CompareOp::LessThan, value)
    }

    pub fn less_than_or_equal(&self, value: FilterValue) -> FilterCondition {
        self.compare(CompareOp::LessThanOrEqual, value)
    }

    pub fn contains(&self, value: impl Into<String>) -> FilterCondition {
        FilterCondition::Contains {
            column: self.column.clone(),
            value: value.into(),
        }
    }

    pub fn invoke(&self, method: &str, args: Vec<FilterValue>) -> FilterCondition {
        FilterCondition::Invoke {
            column: self.column.clone(),
            method: method.to_string(),
            args,
        }
    }

    pub fn is_null(&self) -> FilterCondition {
        FilterCondition::IsNull {
            column: self.column.clone(),
        }
    }

    pub fn is_true(&self) -> FilterCondition {
        FilterCondition::IsTrue {
            column: self.column.clone(),
        }
    }

    pub fn is_false(&self) -> FilterCondition {
        FilterCondition::IsFalse {
            column: self.column.clone(),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A sort in the remote query protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
    /// Sort by absolute value
    pub is_abs: bool,
}

impl Sort {
    /// Ascending sort on a column
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
            is_abs: false,
        }
    }

    /// Descending sort on a column
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
            is_abs: false,
        }
    }

    /// Sort by absolute value instead
    pub fn abs(mut self) -> Self {
        self.is_abs = true;
        self
    }
}

impl std::fmt::Display for Sort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        if self.is_abs {
            write!(f, "abs({}) {direction}", self.column)
        } else {
            write!(f, "{} {direction}", self.column)
        }
    }
}
