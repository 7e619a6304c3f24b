//! Remote Table Layer
//!
//! The external collaborator contract (tables, tree tables, subscriptions,
//! events) plus an in-process implementation.
//!
//! ## Event flow
//!
//! ```text
//! RemoteTable ──TableEvent──▶ crossbeam channel ──pump()──▶ datasource
//!      ▲                                                        │
//!      └────────── set_viewport / apply_filter / apply_sort ────┘
//! ```

pub mod memory;
mod table;
mod value;

pub use memory::MemoryTable;
pub use table::*;
pub use value::*;
