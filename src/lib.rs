//! Hierarchical categories for a multi-tenant media catalog.
//!
//! Categories are stored flat, one row per node with a materialized path, and
//! assembled into a forest on read. Structural changes (create, rename, move,
//! delete) run in a single store transaction.

pub mod category;
pub mod cli_style;
pub mod config;
pub mod sqlite_persistence;

pub use category::{
    CategoryError, CategoryResult, CategoryService, CategoryStore, ServiceSettings,
    SqliteCategoryStore,
};
