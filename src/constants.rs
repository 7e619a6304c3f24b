//! Shared Constants
//!
//! Centralized defaults used across the datasources and pivot materialization.

/// Default viewport window installed after the row coordinate space changes
pub const DEFAULT_VIEWPORT_FIRST_ROW: usize = 0;
pub const DEFAULT_VIEWPORT_LAST_ROW: usize = 100;

/// Tree tables always report at least this many rows.
///
/// The host grid never requests a viewport from a zero-row source, so an
/// empty tree would otherwise never receive its first viewport.
pub const TREE_MIN_ROW_COUNT: usize = 1;

/// Synthetic key for totals columns in pivot output
pub const PIVOT_TOTALS_KEY: &str = "__TOTALS__";

/// Synthetic key for the placeholder child of an unexpanded pivot column group
pub const PIVOT_PLACEHOLDER_KEY: &str = "__PLACEHOLDER__";

/// Name of the header group spanning the row-key columns of a pivot
pub const PIVOT_KEY_COLUMN_GROUP: &str = "__KEYS__";

/// Label used for the grand totals row in pivot output
pub const PIVOT_GRAND_TOTAL_LABEL: &str = "Grand Total";

/// Separator between path segments in pivot column names
pub const PIVOT_PATH_SEPARATOR: char = '/';

/// Date formats accepted from host date filters
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default tracing directive when neither config nor RUST_LOG sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// File name prefix for the rolling log file
pub const LOG_FILE_PREFIX: &str = "viewport-grid.log";
