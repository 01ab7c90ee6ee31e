//! SQLite schema of the category store.
//!
//! `categories` holds the flat hierarchy, one row per category with its
//! materialized path. `category_items` maps catalog items (books, movies,
//! shows) to the category they are filed under; an item has at most one
//! category per tenant.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const CATEGORY_FK: ForeignKey = ForeignKey {
    foreign_table: "categories",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Restrict,
};

pub const CATEGORIES_TABLE_V_0: Table = Table {
    name: "categories",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("tenant_id", &SqlType::Integer, non_null = true),
        sqlite_column!("parent_id", &SqlType::Integer, foreign_key = Some(&CATEGORY_FK)),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("path", &SqlType::Text, non_null = true), // "1.4.2"
        sqlite_column!("level", &SqlType::Integer, non_null = true),
        sqlite_column!("sort_order", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_categories_tenant", "tenant_id"),
        ("idx_categories_parent", "parent_id"),
    ],
    unique_constraints: &[&["tenant_id", "path"]],
};

pub const CATEGORY_ITEMS_TABLE_V_0: Table = Table {
    name: "category_items",
    columns: &[
        sqlite_column!("tenant_id", &SqlType::Integer, non_null = true),
        sqlite_column!("item_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "category_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&CATEGORY_FK)
        ),
        sqlite_column!(
            "assigned",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_category_items_category", "category_id")],
    unique_constraints: &[&["tenant_id", "item_id"]],
};

pub const CATEGORY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[CATEGORIES_TABLE_V_0, CATEGORY_ITEMS_TABLE_V_0],
    migration: None,
}];
