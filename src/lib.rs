//! Viewport Grid
//!
//! Keeps a virtualized grid's visible window synchronized with a remote,
//! streaming table server. Datasources translate the grid's filter and sort
//! models into remote conditions, hold one viewport subscription per table,
//! and push materialized rows back into the grid as updates arrive.

pub mod config;
pub mod constants;
pub mod datasources;
pub mod error;
pub mod filters;
pub mod grid;
pub mod listeners;
pub mod logging;
pub mod pivot;
pub mod remote;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
