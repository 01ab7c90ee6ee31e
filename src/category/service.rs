//! Tenant-scoped entry point for callers of the category engine.

use super::error::{CategoryError, CategoryResult};
use super::models::{Category, CategoryId, CategoryNode, DeleteMode, DeleteOutcome, TenantId};
use super::mutator::{fetch_owned, HierarchyMutator};
use super::store::CategoryStore;
use super::tree::{build_forest, sort_categories_by_path};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Maximum number of levels, roots included.
    pub max_depth: Option<u32>,
}

pub struct CategoryService<S: CategoryStore> {
    store: Arc<S>,
    settings: ServiceSettings,
}

impl<S: CategoryStore> Clone for CategoryService<S> {
    fn clone(&self) -> Self {
        CategoryService {
            store: self.store.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: CategoryStore> CategoryService<S> {
    pub fn new(store: Arc<S>, settings: ServiceSettings) -> Self {
        CategoryService { store, settings }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn mutator(&self) -> HierarchyMutator<'_, S> {
        HierarchyMutator::new(&*self.store, self.settings.max_depth)
    }

    /// Logs `err` at a level matching its severity and hides whether a
    /// category of another tenant exists.
    fn surface(&self, op: &str, tenant_id: TenantId, err: CategoryError) -> CategoryError {
        match err {
            CategoryError::Forbidden(id) => {
                warn!(
                    "{}: tenant {} tried to access category {} of another tenant",
                    op, tenant_id, id
                );
                CategoryError::NotFound(id)
            }
            err if err.is_corruption() => {
                error!(
                    "{}: corrupted category hierarchy for tenant {}: {}",
                    op, tenant_id, err
                );
                err
            }
            err @ CategoryError::Store(_) => {
                error!("{}: store failure for tenant {}: {}", op, tenant_id, err);
                err
            }
            err => {
                debug!("{}: rejected for tenant {}: {}", op, tenant_id, err);
                err
            }
        }
    }

    /// The tenant's categories as a forest with per-node item counts and
    /// subtree totals.
    pub fn get_tree(&self, tenant_id: TenantId) -> CategoryResult<Vec<CategoryNode>> {
        self.store
            .read(|tx| {
                let categories = tx.fetch_all(tenant_id)?;
                let counts = tx.item_counts(tenant_id)?;
                build_forest(&categories, &counts)
            })
            .map_err(|e| self.surface("get_tree", tenant_id, e))
    }

    pub fn get_category(&self, tenant_id: TenantId, id: CategoryId) -> CategoryResult<Category> {
        self.store
            .read(|tx| fetch_owned(tx, tenant_id, id))
            .map_err(|e| self.surface("get_category", tenant_id, e))
    }

    /// Every category of the tenant in numeric path order.
    pub fn list_flat(&self, tenant_id: TenantId) -> CategoryResult<Vec<Category>> {
        self.store
            .read(|tx| sort_categories_by_path(tx.fetch_all(tenant_id)?))
            .map_err(|e| self.surface("list_flat", tenant_id, e))
    }

    /// The chain of categories from the root down to `id`, both included.
    pub fn breadcrumbs(&self, tenant_id: TenantId, id: CategoryId) -> CategoryResult<Vec<Category>> {
        self.store
            .read(|tx| {
                let mut current = fetch_owned(tx, tenant_id, id)?;
                let mut visited = HashSet::from([current.id]);
                let mut chain = Vec::new();
                while let Some(parent_id) = current.parent_id {
                    let parent = match tx.fetch(parent_id)? {
                        Some(parent) if parent.tenant_id == tenant_id => parent,
                        _ => {
                            return Err(CategoryError::DataIntegrity(format!(
                                "category {} references missing parent {}",
                                current.id, parent_id
                            )))
                        }
                    };
                    if !visited.insert(parent.id) {
                        return Err(CategoryError::DataIntegrity(format!(
                            "categories above {} form a parent cycle",
                            id
                        )));
                    }
                    chain.push(current);
                    current = parent;
                }
                chain.push(current);
                chain.reverse();
                Ok(chain)
            })
            .map_err(|e| self.surface("breadcrumbs", tenant_id, e))
    }

    pub fn create(
        &self,
        tenant_id: TenantId,
        parent_id: Option<CategoryId>,
        name: &str,
    ) -> CategoryResult<Category> {
        let created = self
            .mutator()
            .create(tenant_id, parent_id, name)
            .map_err(|e| self.surface("create", tenant_id, e))?;
        info!(
            "Tenant {} created category {} '{}' at {}",
            tenant_id, created.id, created.name, created.path
        );
        Ok(created)
    }

    pub fn rename(
        &self,
        tenant_id: TenantId,
        id: CategoryId,
        name: &str,
    ) -> CategoryResult<Category> {
        let renamed = self
            .mutator()
            .rename(tenant_id, id, name)
            .map_err(|e| self.surface("rename", tenant_id, e))?;
        info!("Tenant {} renamed category {} to '{}'", tenant_id, id, renamed.name);
        Ok(renamed)
    }

    pub fn move_category(
        &self,
        tenant_id: TenantId,
        id: CategoryId,
        new_parent_id: Option<CategoryId>,
    ) -> CategoryResult<Category> {
        let moved = self
            .mutator()
            .move_to(tenant_id, id, new_parent_id)
            .map_err(|e| self.surface("move", tenant_id, e))?;
        info!("Tenant {} moved category {} to {}", tenant_id, id, moved.path);
        Ok(moved)
    }

    pub fn delete(
        &self,
        tenant_id: TenantId,
        id: CategoryId,
        mode: DeleteMode,
    ) -> CategoryResult<DeleteOutcome> {
        let outcome = self
            .mutator()
            .delete(tenant_id, id, mode)
            .map_err(|e| self.surface("delete", tenant_id, e))?;
        info!(
            "Tenant {} deleted category {} ({}): {} categories removed, {} items detached",
            tenant_id,
            id,
            mode,
            outcome.deleted.len(),
            outcome.detached_items
        );
        Ok(outcome)
    }

    /// Files `item_id` under `category_id`, replacing its previous category.
    pub fn assign_item(
        &self,
        tenant_id: TenantId,
        item_id: &str,
        category_id: CategoryId,
    ) -> CategoryResult<()> {
        self.store
            .write(|tx| {
                fetch_owned(tx, tenant_id, category_id)?;
                tx.assign_item(tenant_id, item_id, category_id)?;
                Ok(())
            })
            .map_err(|e| self.surface("assign_item", tenant_id, e))
    }

    /// Returns false if the item was not filed under any category.
    pub fn unassign_item(&self, tenant_id: TenantId, item_id: &str) -> CategoryResult<bool> {
        self.store
            .write(|tx| Ok(tx.unassign_item(tenant_id, item_id)?))
            .map_err(|e| self.surface("unassign_item", tenant_id, e))
    }

    /// Moves every item of `from` into `to`, returning how many were moved.
    /// Emptying a category this way makes it deletable in strict mode.
    pub fn reassign_items(
        &self,
        tenant_id: TenantId,
        from: CategoryId,
        to: CategoryId,
    ) -> CategoryResult<u64> {
        let moved = self
            .store
            .write(|tx| {
                fetch_owned(tx, tenant_id, from)?;
                fetch_owned(tx, tenant_id, to)?;
                if from == to {
                    return Ok(0);
                }
                Ok(tx.move_items(from, to)?)
            })
            .map_err(|e| self.surface("reassign_items", tenant_id, e))?;
        info!(
            "Tenant {} reassigned {} items from category {} to {}",
            tenant_id, moved, from, to
        );
        Ok(moved)
    }

    /// Items filed directly under `id`.
    pub fn item_count(&self, tenant_id: TenantId, id: CategoryId) -> CategoryResult<u64> {
        self.store
            .read(|tx| {
                fetch_owned(tx, tenant_id, id)?;
                Ok(tx.count_items(id)?)
            })
            .map_err(|e| self.surface("item_count", tenant_id, e))
    }

    pub fn category_of_item(
        &self,
        tenant_id: TenantId,
        item_id: &str,
    ) -> CategoryResult<Option<Category>> {
        self.store
            .read(|tx| match tx.item_category(tenant_id, item_id)? {
                Some(id) => fetch_owned(tx, tenant_id, id).map(Some),
                None => Ok(None),
            })
            .map_err(|e| self.surface("category_of_item", tenant_id, e))
    }
}
