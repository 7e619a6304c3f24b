//! Host Grid Boundary
//!
//! Everything the datasources consume from, or push into, the consuming grid.

mod api;
mod models;
mod records;

pub use api::*;
pub use models::*;
pub use records::*;
