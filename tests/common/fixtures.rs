//! Temporary category databases for integration tests.

use catalog_categories::category::{
    Category, CategoryNode, CategoryService, MaterializedPath, ServiceSettings,
    SqliteCategoryStore,
};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestCatalog {
    pub service: CategoryService<SqliteCategoryStore>,
    pub db_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestCatalog {
    pub fn new() -> Self {
        Self::with_settings(ServiceSettings::default())
    }

    pub fn with_max_depth(max_depth: u32) -> Self {
        Self::with_settings(ServiceSettings {
            max_depth: Some(max_depth),
        })
    }

    pub fn with_settings(settings: ServiceSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("categories.db");
        let store = SqliteCategoryStore::new(&db_path).expect("Failed to create category store");
        TestCatalog {
            service: CategoryService::new(Arc::new(store), settings),
            db_path,
            _temp_dir: temp_dir,
        }
    }

    /// A second connection to the same database, without foreign key
    /// enforcement, for planting rows the engine itself would never write.
    pub fn raw_connection(&self) -> Connection {
        let conn = Connection::open(&self.db_path).expect("Failed to open raw connection");
        // bundled SQLite enables foreign keys by default
        conn.pragma_update(None, "foreign_keys", false)
            .expect("Failed to disable foreign keys");
        conn
    }
}

/// Checks every stored invariant of a forest: each child's path extends its
/// parent's path by exactly one segment, levels match path depth, and
/// sort_order is the last path segment.
pub fn assert_paths_consistent(forest: &[CategoryNode]) {
    let mut by_id: HashMap<_, &Category> = HashMap::new();
    let mut stack: Vec<&CategoryNode> = forest.iter().collect();
    while let Some(node) = stack.pop() {
        by_id.insert(node.category.id, &node.category);
        stack.extend(node.children.iter());
    }

    for category in by_id.values() {
        let path = MaterializedPath::parse(&category.path).unwrap();
        assert_eq!(category.level, path.level(), "level of {}", category.id);
        assert_eq!(
            category.sort_order,
            path.last_ordinal(),
            "sort_order of {}",
            category.id
        );
        match category.parent_id {
            None => assert_eq!(path.level(), 0, "root {} is nested", category.id),
            Some(parent_id) => {
                let parent = by_id[&parent_id];
                let parent_path = MaterializedPath::parse(&parent.path).unwrap();
                assert_eq!(
                    path.parent(),
                    Some(parent_path),
                    "{} is not directly under {}",
                    category.path,
                    parent.path
                );
            }
        }
    }
}
