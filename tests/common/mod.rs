//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestCatalog, TENANT_A};
//!
//! #[test]
//! fn test_create_root() {
//!     let catalog = TestCatalog::new();
//!     let fiction = catalog.service.create(TENANT_A, None, "Fiction").unwrap();
//!     assert_eq!(fiction.path, "1");
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::{assert_paths_consistent, TestCatalog};
