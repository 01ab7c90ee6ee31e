mod error;
mod models;
mod mutator;
pub mod path;
mod schema;
mod service;
mod sqlite_store;
mod store;
pub mod tree;

pub use error::{CategoryError, CategoryResult};
pub use models::*;
pub use mutator::HierarchyMutator;
pub use path::MaterializedPath;
pub use schema::CATEGORY_VERSIONED_SCHEMAS;
pub use service::{CategoryService, ServiceSettings};
pub use sqlite_store::SqliteCategoryStore;
pub use store::{CategoryStore, CategoryTransaction};
pub use tree::{build_forest, flatten, sort_categories_by_path};
