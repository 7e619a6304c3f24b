//! Filter and Sort Translation
//!
//! Pure functions from the grid's filter/sort models to remote conditions,
//! plus the equality checks used to skip redundant remote calls.

mod condition;
mod filter_utils;
mod sort_utils;

pub use condition::*;
pub use filter_utils::{are_filters_equal, parse_filter_model};
pub use sort_utils::{are_sorts_equal, parse_sort_model};
