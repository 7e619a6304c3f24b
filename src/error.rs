//! Error types for viewport-grid
//!
//! Centralized error handling using snafu for ergonomic error definitions.

use snafu::Snafu;

/// Main error type for the crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Host filter model names a `filterType` we cannot translate
    #[snafu(display("Unsupported filter type: {filter_type}"))]
    UnsupportedFilterType { filter_type: String },

    /// Host filter model names an operator the filter type does not support
    #[snafu(display("Unsupported {filter_type} filter operator: {operator}"))]
    UnsupportedFilterOperator {
        filter_type: String,
        operator: String,
    },

    /// Compound filter joined with something other than AND/OR
    #[snafu(display("Unsupported compound filter operator: {operator}"))]
    UnsupportedCompoundOperator { operator: String },

    /// A filter operator is missing a field it requires
    #[snafu(display("Filter operator '{operator}' requires field '{field}'"))]
    MissingFilterField { operator: String, field: String },

    /// A filter field is present but cannot be converted
    #[snafu(display("Invalid value for filter field '{field}': {message}"))]
    InvalidFilterValue { field: String, message: String },

    /// Sort direction other than asc/desc
    #[snafu(display("Unknown sort direction: {direction}"))]
    UnknownSortDirection { direction: String },

    /// Column referenced by the host grid does not exist on the remote table
    #[snafu(display("Column not found: {name}"))]
    ColumnNotFound { name: String },

    /// Aggregations requested against a table that is already a rollup
    #[snafu(display("Cannot apply aggregations to a tree table: {message}"))]
    RollupOnTree { message: String },

    /// Operation not valid in the current lifecycle state
    #[snafu(display("Invalid state: {message}"))]
    InvalidState { message: String },

    /// Operation attempted after destroy()
    #[snafu(display("Datasource has been destroyed"))]
    Destroyed,

    /// Remote table request failed
    #[snafu(display("Remote error: {message}"))]
    Remote { message: String },

    /// IO error (file operations)
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// JSON serialization/deserialization error
    #[snafu(display("JSON error: {source}"))]
    Json { source: serde_json::Error },

    /// TOML deserialization error
    #[snafu(display("TOML parse error: {source}"))]
    TomlDe { source: toml::de::Error },
}

impl Error {
    /// Shorthand for a remote failure with a message
    pub fn remote(message: impl Into<String>) -> Self {
        Error::Remote {
            message: message.into(),
        }
    }

    /// Shorthand for an invalid state error with a message
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Error::InvalidState {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::Json { source }
    }
}

impl From<toml::de::Error> for Error {
    fn from(source: toml::de::Error) -> Self {
        Error::TomlDe { source }
    }
}

/// Result type alias for convenience
pub type Result<T, E = Error> = std::result::Result<T, E>;
