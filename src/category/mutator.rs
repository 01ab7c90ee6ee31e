//! Transactional structural changes to a tenant's hierarchy.
//!
//! Every operation runs inside a single [`CategoryStore::write`] so a failure
//! part way through, including a path rewrite of a large subtree, leaves the
//! stored hierarchy untouched.

use super::error::{CategoryError, CategoryResult};
use super::models::{Category, CategoryId, DeleteMode, DeleteOutcome, NewCategory, TenantId};
use super::path::{MaterializedPath, MAX_ORDINAL};
use super::store::{CategoryStore, CategoryTransaction};
use std::collections::{HashMap, HashSet, VecDeque};
use std::iter;
use tracing::debug;

pub struct HierarchyMutator<'a, S: CategoryStore> {
    store: &'a S,
    /// Maximum number of levels, roots included. `None` means unbounded.
    max_depth: Option<u32>,
}

impl<'a, S: CategoryStore> HierarchyMutator<'a, S> {
    pub fn new(store: &'a S, max_depth: Option<u32>) -> Self {
        HierarchyMutator { store, max_depth }
    }

    pub fn create(
        &self,
        tenant_id: TenantId,
        parent_id: Option<CategoryId>,
        name: &str,
    ) -> CategoryResult<Category> {
        let name = validate_name(name)?;
        self.store.write(|tx| {
            let parent_path = match parent_id {
                Some(parent_id) => {
                    let parent = fetch_parent(tx, tenant_id, parent_id)?;
                    Some(MaterializedPath::parse(&parent.path)?)
                }
                None => None,
            };

            let ordinal = next_ordinal(&tx.fetch_children(tenant_id, parent_id)?)?;
            let path = match &parent_path {
                Some(parent_path) => parent_path.child(ordinal),
                None => MaterializedPath::root(ordinal),
            };
            self.check_depth(path.level())?;

            let created = tx.insert(&NewCategory {
                tenant_id,
                parent_id,
                name,
                path: path.to_string(),
                level: path.level(),
                sort_order: ordinal,
            })?;
            debug!(
                "Created category {} '{}' at {} for tenant {}",
                created.id, created.name, created.path, tenant_id
            );
            Ok(created)
        })
    }

    pub fn rename(
        &self,
        tenant_id: TenantId,
        id: CategoryId,
        name: &str,
    ) -> CategoryResult<Category> {
        let name = validate_name(name)?;
        self.store.write(|tx| {
            let category = fetch_owned(tx, tenant_id, id)?;
            if category.name == name {
                return Ok(category);
            }
            let renamed = Category { name, ..category };
            tx.update(&renamed)?;
            debug!("Renamed category {} to '{}'", id, renamed.name);
            Ok(renamed)
        })
    }

    /// Re-parents `id` under `new_parent_id` (or makes it a root), appending
    /// it after the new siblings and rewriting the paths of its whole subtree.
    /// Moving a category under its current parent changes nothing.
    pub fn move_to(
        &self,
        tenant_id: TenantId,
        id: CategoryId,
        new_parent_id: Option<CategoryId>,
    ) -> CategoryResult<Category> {
        self.store.write(|tx| {
            let category = fetch_owned(tx, tenant_id, id)?;
            if new_parent_id == Some(id) {
                return Err(CategoryError::invalid_parent(
                    id,
                    "a category cannot be its own parent",
                ));
            }
            if category.parent_id == new_parent_id {
                return Ok(category);
            }

            let old_path = MaterializedPath::parse(&category.path)?;
            let new_parent_path = match new_parent_id {
                Some(parent_id) => {
                    let parent = fetch_parent(tx, tenant_id, parent_id)?;
                    let parent_path = MaterializedPath::parse(&parent.path)?;
                    if parent_path.is_descendant_of(&old_path) {
                        return Err(CategoryError::invalid_parent(
                            parent_id,
                            format!("it is a descendant of category {}", id),
                        ));
                    }
                    Some(parent_path)
                }
                None => None,
            };

            let descendants = collect_descendants(tx, &category, &old_path)?;

            let ordinal = next_ordinal(&tx.fetch_children(tenant_id, new_parent_id)?)?;
            let new_path = match &new_parent_path {
                Some(parent_path) => parent_path.child(ordinal),
                None => MaterializedPath::root(ordinal),
            };

            let subtree_height = descendants
                .iter()
                .map(|d| d.level.saturating_sub(category.level))
                .max()
                .unwrap_or(0);
            self.check_depth(new_path.level() + subtree_height)?;

            let moved = Category {
                parent_id: new_parent_id,
                path: new_path.to_string(),
                level: new_path.level(),
                sort_order: ordinal,
                ..category
            };
            tx.update(&moved)?;

            for descendant in &descendants {
                let path = MaterializedPath::parse(&descendant.path)?
                    .with_prefix_replaced(&old_path, &new_path)
                    .ok_or_else(|| {
                        CategoryError::DataIntegrity(format!(
                            "category {} at {} is not under {}",
                            descendant.id, descendant.path, old_path
                        ))
                    })?;
                tx.update(&Category {
                    path: path.to_string(),
                    level: path.level(),
                    ..descendant.clone()
                })?;
            }

            debug!(
                "Moved category {} from {} to {} ({} descendants rewritten)",
                id,
                old_path,
                new_path,
                descendants.len()
            );
            Ok(moved)
        })
    }

    /// Strict mode refuses to delete a category that still has items or
    /// subcategories. Cascade mode deletes the whole subtree, children before
    /// parents, and detaches the items filed under it.
    pub fn delete(
        &self,
        tenant_id: TenantId,
        id: CategoryId,
        mode: DeleteMode,
    ) -> CategoryResult<DeleteOutcome> {
        self.store.write(|tx| {
            let category = fetch_owned(tx, tenant_id, id)?;
            match mode {
                DeleteMode::Strict => {
                    let items = tx.count_items(id)?;
                    if items > 0 {
                        return Err(CategoryError::HasItems { id, count: items });
                    }
                    let children = tx.fetch_children(tenant_id, Some(id))?;
                    if !children.is_empty() {
                        return Err(CategoryError::HasChildren {
                            id,
                            count: children.len(),
                        });
                    }
                    tx.delete(id)?;
                    debug!("Deleted category {} of tenant {}", id, tenant_id);
                    Ok(DeleteOutcome {
                        deleted: vec![id],
                        detached_items: 0,
                    })
                }
                DeleteMode::Cascade => {
                    let path = MaterializedPath::parse(&category.path)?;
                    let descendants = collect_descendants(tx, &category, &path)?;

                    // Breadth-first order reversed puts every child before its parent.
                    let mut outcome = DeleteOutcome::default();
                    for doomed in descendants.iter().rev().chain(iter::once(&category)) {
                        outcome.detached_items += tx.detach_items(doomed.id)?;
                        tx.delete(doomed.id)?;
                        outcome.deleted.push(doomed.id);
                    }

                    for deleted in &outcome.deleted {
                        let children = tx.count_children(*deleted)?;
                        let items = tx.count_items(*deleted)?;
                        if children > 0 || items > 0 {
                            return Err(CategoryError::DataIntegrity(format!(
                                "deleted category {} is still referenced by {} categories and {} items",
                                deleted, children, items
                            )));
                        }
                    }

                    debug!(
                        "Cascade deleted {} categories under {} of tenant {}, detached {} items",
                        outcome.deleted.len(),
                        id,
                        tenant_id,
                        outcome.detached_items
                    );
                    Ok(outcome)
                }
            }
        })
    }

    fn check_depth(&self, level: u32) -> CategoryResult<()> {
        match self.max_depth {
            Some(limit) if level >= limit => Err(CategoryError::DepthLimitExceeded { limit }),
            _ => Ok(()),
        }
    }
}

fn validate_name(name: &str) -> CategoryResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryError::InvalidName);
    }
    Ok(name.to_string())
}

/// Loads a category that must belong to `tenant_id`.
pub(crate) fn fetch_owned(
    tx: &dyn CategoryTransaction,
    tenant_id: TenantId,
    id: CategoryId,
) -> CategoryResult<Category> {
    match tx.fetch(id)? {
        Some(category) if category.tenant_id == tenant_id => Ok(category),
        Some(_) => Err(CategoryError::Forbidden(id)),
        None => Err(CategoryError::NotFound(id)),
    }
}

/// Like [`fetch_owned`], for a category named as the target parent. Another
/// tenant's category is reported the same as a missing one.
fn fetch_parent(
    tx: &dyn CategoryTransaction,
    tenant_id: TenantId,
    parent_id: CategoryId,
) -> CategoryResult<Category> {
    match tx.fetch(parent_id)? {
        Some(parent) if parent.tenant_id == tenant_id => Ok(parent),
        _ => Err(CategoryError::invalid_parent(parent_id, "no such category")),
    }
}

/// One past the highest ordinal among `siblings`, starting at 1.
fn next_ordinal(siblings: &[Category]) -> CategoryResult<u64> {
    let mut max: u64 = 0;
    for sibling in siblings {
        let ordinal = MaterializedPath::parse(&sibling.path)?.last_ordinal();
        max = max.max(ordinal);
    }
    max.checked_add(1)
        .filter(|next| *next <= MAX_ORDINAL)
        .ok_or_else(|| {
            CategoryError::DataIntegrity(format!(
                "no ordinal left after {} among {} siblings",
                max,
                siblings.len()
            ))
        })
}

/// Every descendant of `root` in breadth-first order, following parent links.
///
/// The result is cross-checked against the materialized paths: a descendant
/// whose path is not under `root_path`, or a row whose path is under it but
/// that is not linked to it, is a data integrity error.
fn collect_descendants(
    tx: &dyn CategoryTransaction,
    root: &Category,
    root_path: &MaterializedPath,
) -> CategoryResult<Vec<Category>> {
    let all = tx.fetch_all(root.tenant_id)?;

    let mut children_of: HashMap<CategoryId, Vec<&Category>> = HashMap::new();
    for category in &all {
        if let Some(parent_id) = category.parent_id {
            children_of.entry(parent_id).or_default().push(category);
        }
    }

    let mut descendants = Vec::new();
    let mut visited = HashSet::from([root.id]);
    let mut queue = VecDeque::from([root.id]);
    while let Some(id) = queue.pop_front() {
        let Some(children) = children_of.get(&id) else {
            continue;
        };
        for child in children {
            if !visited.insert(child.id) {
                return Err(CategoryError::DataIntegrity(format!(
                    "category {} is reachable twice below {}",
                    child.id, root.id
                )));
            }
            if !MaterializedPath::parse(&child.path)?.is_descendant_of(root_path) {
                return Err(CategoryError::DataIntegrity(format!(
                    "category {} at {} is linked below {} but not under its path {}",
                    child.id, child.path, root.id, root_path
                )));
            }
            descendants.push((*child).clone());
            queue.push_back(child.id);
        }
    }

    for category in &all {
        if visited.contains(&category.id) {
            continue;
        }
        if MaterializedPath::parse(&category.path)?.is_descendant_of(root_path) {
            return Err(CategoryError::DataIntegrity(format!(
                "category {} at {} lies under {} but is not linked to it",
                category.id, category.path, root_path
            )));
        }
    }

    Ok(descendants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::sqlite_store::SqliteCategoryStore;
    use tempfile::TempDir;

    const TENANT: TenantId = TenantId(1);

    fn create_tmp_store() -> (SqliteCategoryStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteCategoryStore::new(temp_dir.path().join("categories.db")).unwrap();
        (store, temp_dir)
    }

    fn fetch(store: &SqliteCategoryStore, id: CategoryId) -> Category {
        store.read(|tx| Ok(tx.fetch(id)?)).unwrap().unwrap()
    }

    #[test]
    fn create_appends_after_siblings() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let b = mutator.create(TENANT, None, "B").unwrap();
        let a1 = mutator.create(TENANT, Some(a.id), "A1").unwrap();
        let a2 = mutator.create(TENANT, Some(a.id), "  A2  ").unwrap();

        assert_eq!((a.path.as_str(), a.level, a.sort_order), ("1", 0, 1));
        assert_eq!(b.path, "2");
        assert_eq!((a1.path.as_str(), a1.level, a1.sort_order), ("1.1", 1, 1));
        assert_eq!(a2.path, "1.2");
        assert_eq!(a2.name, "A2");
    }

    #[test]
    fn exhausted_ordinals_are_an_integrity_error() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let last = store
            .write(|tx| {
                Ok(tx.insert(&NewCategory {
                    tenant_id: TENANT,
                    parent_id: None,
                    name: "Last".to_string(),
                    path: MAX_ORDINAL.to_string(),
                    level: 0,
                    sort_order: MAX_ORDINAL,
                })?)
            })
            .unwrap();

        let err = mutator.create(TENANT, None, "Next").unwrap_err();
        assert!(err.is_corruption(), "unexpected error {:?}", err);
        let moved = mutator.move_to(TENANT, last.id, Some(a.id)).unwrap();
        assert_eq!((moved.path.as_str(), moved.sort_order), ("1.1", 1));

        let next = mutator.create(TENANT, Some(a.id), "A2").unwrap();
        assert_eq!(next.path, "1.2");
    }

    #[test]
    fn create_after_gap_uses_max_ordinal() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let b = mutator.create(TENANT, None, "B").unwrap();
        mutator.delete(TENANT, a.id, DeleteMode::Strict).unwrap();
        let c = mutator.create(TENANT, None, "C").unwrap();
        assert_eq!(b.path, "2");
        assert_eq!(c.path, "3");
    }

    #[test]
    fn create_rejects_blank_name_and_foreign_parent() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        assert!(matches!(
            mutator.create(TENANT, None, "   "),
            Err(CategoryError::InvalidName)
        ));

        let other = mutator.create(TenantId(2), None, "Other").unwrap();
        assert!(matches!(
            mutator.create(TENANT, Some(other.id), "X"),
            Err(CategoryError::InvalidParent { .. })
        ));
        assert!(matches!(
            mutator.create(TENANT, Some(CategoryId(999)), "X"),
            Err(CategoryError::InvalidParent { .. })
        ));
    }

    #[test]
    fn create_respects_max_depth() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, Some(2));

        let a = mutator.create(TENANT, None, "A").unwrap();
        let a1 = mutator.create(TENANT, Some(a.id), "A1").unwrap();
        assert!(matches!(
            mutator.create(TENANT, Some(a1.id), "A1a"),
            Err(CategoryError::DepthLimitExceeded { limit: 2 })
        ));
    }

    #[test]
    fn rename_keeps_position() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let renamed = mutator.rename(TENANT, a.id, "Fiction").unwrap();
        assert_eq!(renamed.name, "Fiction");
        assert_eq!(renamed.path, a.path);
        assert_eq!(fetch(&store, a.id).name, "Fiction");

        assert!(matches!(
            mutator.rename(TenantId(2), a.id, "Hijack"),
            Err(CategoryError::Forbidden(_))
        ));
        assert!(matches!(
            mutator.rename(TENANT, a.id, ""),
            Err(CategoryError::InvalidName)
        ));
    }

    #[test]
    fn move_rewrites_subtree() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let b = mutator.create(TENANT, None, "B").unwrap();
        mutator.create(TENANT, Some(b.id), "B1").unwrap();
        let a1 = mutator.create(TENANT, Some(a.id), "A1").unwrap();
        let a1x = mutator.create(TENANT, Some(a1.id), "A1x").unwrap();

        let moved = mutator.move_to(TENANT, a1.id, Some(b.id)).unwrap();
        assert_eq!(moved.path, "2.2");
        assert_eq!(moved.parent_id, Some(b.id));
        assert_eq!(moved.sort_order, 2);

        let grandchild = fetch(&store, a1x.id);
        assert_eq!(grandchild.path, "2.2.1");
        assert_eq!(grandchild.level, 2);
        assert_eq!(grandchild.parent_id, Some(a1.id));
    }

    #[test]
    fn move_to_root_and_same_parent() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let a1 = mutator.create(TENANT, Some(a.id), "A1").unwrap();

        let unchanged = mutator.move_to(TENANT, a1.id, Some(a.id)).unwrap();
        assert_eq!(unchanged.path, "1.1");

        let root = mutator.move_to(TENANT, a1.id, None).unwrap();
        assert_eq!(root.path, "2");
        assert_eq!(root.level, 0);
        assert_eq!(root.parent_id, None);
    }

    #[test]
    fn move_rejects_cycles() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let a1 = mutator.create(TENANT, Some(a.id), "A1").unwrap();
        let a1x = mutator.create(TENANT, Some(a1.id), "A1x").unwrap();

        assert!(matches!(
            mutator.move_to(TENANT, a.id, Some(a.id)),
            Err(CategoryError::InvalidParent { .. })
        ));
        assert!(matches!(
            mutator.move_to(TENANT, a.id, Some(a1x.id)),
            Err(CategoryError::InvalidParent { .. })
        ));
        assert_eq!(fetch(&store, a.id).path, "1");
        assert_eq!(fetch(&store, a1x.id).path, "1.1.1");
    }

    #[test]
    fn move_checks_depth_of_deepest_descendant() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, Some(3));

        let a = mutator.create(TENANT, None, "A").unwrap();
        let b = mutator.create(TENANT, None, "B").unwrap();
        let b1 = mutator.create(TENANT, Some(b.id), "B1").unwrap();
        mutator.create(TENANT, Some(b1.id), "B1a").unwrap();

        assert!(matches!(
            mutator.move_to(TENANT, b.id, Some(a.id)),
            Err(CategoryError::DepthLimitExceeded { limit: 3 })
        ));
        mutator.move_to(TENANT, b1.id, Some(a.id)).unwrap();
    }

    #[test]
    fn strict_delete_checks_items_then_children() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let a1 = mutator.create(TENANT, Some(a.id), "A1").unwrap();
        store
            .write(|tx| Ok(tx.assign_item(TENANT, "book-1", a.id)?))
            .unwrap();

        assert!(matches!(
            mutator.delete(TENANT, a.id, DeleteMode::Strict),
            Err(CategoryError::HasItems { count: 1, .. })
        ));
        store
            .write(|tx| Ok(tx.move_items(a.id, a1.id)?))
            .unwrap();
        assert!(matches!(
            mutator.delete(TENANT, a.id, DeleteMode::Strict),
            Err(CategoryError::HasChildren { count: 1, .. })
        ));
    }

    #[test]
    fn cascade_delete_removes_subtree_and_detaches_items() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let b = mutator.create(TENANT, None, "B").unwrap();
        let a1 = mutator.create(TENANT, Some(a.id), "A1").unwrap();
        let a1x = mutator.create(TENANT, Some(a1.id), "A1x").unwrap();
        store
            .write(|tx| {
                tx.assign_item(TENANT, "book-1", a1x.id)?;
                tx.assign_item(TENANT, "book-2", a.id)?;
                tx.assign_item(TENANT, "book-3", b.id)?;
                Ok(())
            })
            .unwrap();

        let outcome = mutator.delete(TENANT, a.id, DeleteMode::Cascade).unwrap();
        assert_eq!(outcome.deleted, vec![a1x.id, a1.id, a.id]);
        assert_eq!(outcome.detached_items, 2);

        let remaining = store.read(|tx| Ok(tx.fetch_all(TENANT)?)).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);
        assert_eq!(store.read(|tx| Ok(tx.count_items(b.id)?)).unwrap(), 1);
    }

    #[test]
    fn descendants_not_linked_by_parent_are_reported() {
        let (store, _dir) = create_tmp_store();
        let mutator = HierarchyMutator::new(&store, None);

        let a = mutator.create(TENANT, None, "A").unwrap();
        let b = mutator.create(TENANT, None, "B").unwrap();
        // a row whose path claims to be under A while linked under B
        store
            .write(|tx| {
                tx.insert(&NewCategory {
                    tenant_id: TENANT,
                    parent_id: Some(b.id),
                    name: "Stray".to_string(),
                    path: "1.7".to_string(),
                    level: 1,
                    sort_order: 7,
                })?;
                Ok(())
            })
            .unwrap();

        let err = mutator.move_to(TENANT, a.id, Some(b.id)).unwrap_err();
        assert!(err.is_corruption(), "unexpected error {:?}", err);
        assert_eq!(fetch(&store, a.id).path, "1");
    }
}
