//! Sort Model Translation

use super::condition::Sort;
use crate::error::{Error, Result};
use crate::grid::SortModelItem;
use crate::remote::RemoteTable;

/// Translate the grid's sort model into remote sorts, preserving order
pub fn parse_sort_model<T>(table: &T, items: &[SortModelItem]) -> Result<Vec<Sort>>
where
    T: RemoteTable + ?Sized,
{
    items
        .iter()
        .map(|item| {
            let column = table.find_column(&item.col_id)?;
            let sort = match item.sort.as_str() {
                "asc" => Sort::asc(column.name),
                "desc" => Sort::desc(column.name),
                other => {
                    return Err(Error::UnknownSortDirection {
                        direction: other.to_string(),
                    });
                }
            };
            Ok(if item.is_absolute { sort.abs() } else { sort })
        })
        .collect()
}

/// Whether two sort lists are identical, including order and the
/// absolute-value flag
pub fn are_sorts_equal(a: &[Sort], b: &[Sort]) -> bool {
    a == b
}
