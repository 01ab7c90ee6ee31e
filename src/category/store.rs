//! Persistence interface consumed by the hierarchy engine.
//!
//! Everything the engine reads or writes goes through a
//! [`CategoryTransaction`] handed out by [`CategoryStore::read`] or
//! [`CategoryStore::write`], so multi-row changes commit or roll back as a
//! unit.

use super::error::CategoryResult;
use super::models::{Category, CategoryId, NewCategory, TenantId};
use anyhow::Result;
use std::collections::HashMap;

pub trait CategoryTransaction {
    /// All categories of a tenant, in no particular order.
    fn fetch_all(&self, tenant_id: TenantId) -> Result<Vec<Category>>;

    /// A category by id regardless of tenant.
    /// Returns Ok(None) if it does not exist.
    fn fetch(&self, id: CategoryId) -> Result<Option<Category>>;

    /// Direct children of `parent_id`, or the tenant's roots when `None`.
    fn fetch_children(
        &self,
        tenant_id: TenantId,
        parent_id: Option<CategoryId>,
    ) -> Result<Vec<Category>>;

    fn insert(&self, category: &NewCategory) -> Result<Category>;

    /// Overwrites every mutable column of the row with `category.id`.
    /// Fails if the row does not exist.
    fn update(&self, category: &Category) -> Result<()>;

    /// Fails if the row does not exist.
    fn delete(&self, id: CategoryId) -> Result<()>;

    /// Number of categories, of any tenant, whose parent is `id`.
    fn count_children(&self, id: CategoryId) -> Result<u64>;

    /// Number of items assigned directly to `id`.
    fn count_items(&self, id: CategoryId) -> Result<u64>;

    /// Per-category direct item counts of a tenant. Categories without items
    /// are absent.
    fn item_counts(&self, tenant_id: TenantId) -> Result<HashMap<CategoryId, u64>>;

    /// Places an item in a category, replacing its previous category if any.
    fn assign_item(&self, tenant_id: TenantId, item_id: &str, category_id: CategoryId)
        -> Result<()>;

    /// The category an item is filed under, if any.
    fn item_category(&self, tenant_id: TenantId, item_id: &str) -> Result<Option<CategoryId>>;

    /// Returns false if the item was not assigned to any category.
    fn unassign_item(&self, tenant_id: TenantId, item_id: &str) -> Result<bool>;

    /// Moves every item of `from` into `to`, returning how many were moved.
    fn move_items(&self, from: CategoryId, to: CategoryId) -> Result<u64>;

    /// Removes every item assignment of `id`, returning how many were removed.
    fn detach_items(&self, id: CategoryId) -> Result<u64>;
}

/// Transactional access to the flat category table.
///
/// `read` runs `f` against a consistent snapshot. `write` runs `f` in a
/// transaction that excludes other writers, committing when `f` returns Ok
/// and rolling back otherwise.
pub trait CategoryStore: Send + Sync {
    fn read<T>(
        &self,
        f: impl FnOnce(&dyn CategoryTransaction) -> CategoryResult<T>,
    ) -> CategoryResult<T>;

    fn write<T>(
        &self,
        f: impl FnOnce(&dyn CategoryTransaction) -> CategoryResult<T>,
    ) -> CategoryResult<T>;
}
