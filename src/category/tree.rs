//! Builds the category forest of one tenant from its flat records.

use super::error::{CategoryError, CategoryResult};
use super::models::{Category, CategoryId, CategoryNode};
use super::path::MaterializedPath;
use std::collections::HashMap;

/// Sorts flat records by the numeric value of their paths (ties by id).
pub fn sort_categories_by_path(categories: Vec<Category>) -> CategoryResult<Vec<Category>> {
    let mut keyed = categories
        .into_iter()
        .map(|c| Ok((MaterializedPath::parse(&c.path)?, c)))
        .collect::<CategoryResult<Vec<_>>>()?;
    keyed.sort_by(|(a_path, a), (b_path, b)| a_path.cmp(b_path).then(a.id.cmp(&b.id)));
    Ok(keyed.into_iter().map(|(_, c)| c).collect())
}

/// Nests `categories` into a forest, attaching `item_counts` and computing
/// subtree totals.
///
/// Every record must belong to the same tenant, reference an existing parent
/// and carry a path consistent with that parent. Any violation means the
/// stored hierarchy is corrupted and is reported as
/// [`CategoryError::DataIntegrity`] rather than repaired.
pub fn build_forest(
    categories: &[Category],
    item_counts: &HashMap<CategoryId, u64>,
) -> CategoryResult<Vec<CategoryNode>> {
    let Some(first) = categories.first() else {
        return Ok(Vec::new());
    };

    let mut index: HashMap<CategoryId, usize> = HashMap::with_capacity(categories.len());
    let mut paths: Vec<MaterializedPath> = Vec::with_capacity(categories.len());
    for (i, category) in categories.iter().enumerate() {
        if category.tenant_id != first.tenant_id {
            return Err(CategoryError::DataIntegrity(format!(
                "category {} belongs to tenant {}, expected {}",
                category.id, category.tenant_id, first.tenant_id
            )));
        }
        if index.insert(category.id, i).is_some() {
            return Err(CategoryError::DataIntegrity(format!(
                "category {} appears more than once",
                category.id
            )));
        }
        let path = MaterializedPath::parse(&category.path)?;
        if path.level() != category.level {
            return Err(CategoryError::DataIntegrity(format!(
                "category {} has level {} but path '{}'",
                category.id, category.level, category.path
            )));
        }
        if path.last_ordinal() != category.sort_order {
            return Err(CategoryError::DataIntegrity(format!(
                "category {} has sort_order {} but path '{}'",
                category.id, category.sort_order, category.path
            )));
        }
        paths.push(path);
    }

    let mut roots: Vec<usize> = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); categories.len()];
    for (i, category) in categories.iter().enumerate() {
        match category.parent_id {
            None => {
                if paths[i].parent().is_some() {
                    return Err(CategoryError::DataIntegrity(format!(
                        "root category {} has nested path '{}'",
                        category.id, category.path
                    )));
                }
                roots.push(i);
            }
            Some(parent_id) => {
                let parent = *index.get(&parent_id).ok_or_else(|| {
                    CategoryError::DataIntegrity(format!(
                        "category {} references missing parent {}",
                        category.id, parent_id
                    ))
                })?;
                if paths[i].parent().as_ref() != Some(&paths[parent]) {
                    return Err(CategoryError::DataIntegrity(format!(
                        "category {} has path '{}' which is not under its parent's path '{}'",
                        category.id, category.path, categories[parent].path
                    )));
                }
                children[parent].push(i);
            }
        }
    }

    let sort_siblings = |siblings: &mut Vec<usize>| -> CategoryResult<()> {
        siblings.sort_by(|&a, &b| {
            paths[a]
                .cmp(&paths[b])
                .then(categories[a].id.cmp(&categories[b].id))
        });
        if let Some(pair) = siblings.windows(2).find(|w| paths[w[0]] == paths[w[1]]) {
            return Err(CategoryError::DataIntegrity(format!(
                "categories {} and {} share path '{}'",
                categories[pair[0]].id, categories[pair[1]].id, categories[pair[0]].path
            )));
        }
        Ok(())
    };
    sort_siblings(&mut roots)?;
    for siblings in children.iter_mut() {
        sort_siblings(siblings)?;
    }

    // Post-order walk from the roots.
    let mut visited = vec![false; categories.len()];
    let mut post_order: Vec<usize> = Vec::with_capacity(categories.len());
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();
    while let Some((i, expanded)) = stack.pop() {
        if expanded {
            post_order.push(i);
            continue;
        }
        if visited[i] {
            return Err(CategoryError::DataIntegrity(format!(
                "category {} is reachable twice",
                categories[i].id
            )));
        }
        visited[i] = true;
        stack.push((i, true));
        stack.extend(children[i].iter().rev().map(|&c| (c, false)));
    }

    // The path checks above already rule out parent_id cycles. Anything the
    // walk missed is still reported.
    if post_order.len() != categories.len() {
        let mut unreachable: Vec<String> = categories
            .iter()
            .zip(visited.iter())
            .filter(|(_, seen)| !**seen)
            .map(|(c, _)| c.id.to_string())
            .collect();
        unreachable.sort();
        return Err(CategoryError::DataIntegrity(format!(
            "categories [{}] are not reachable from any root",
            unreachable.join(", ")
        )));
    }

    let mut built: Vec<Option<CategoryNode>> = vec![None; categories.len()];
    for &i in &post_order {
        let mut node_children = Vec::with_capacity(children[i].len());
        for &c in &children[i] {
            let child = built[c].take().ok_or_else(|| {
                CategoryError::DataIntegrity(format!(
                    "category {} was not built before its parent",
                    categories[c].id
                ))
            })?;
            node_children.push(child);
        }
        let item_count = item_counts.get(&categories[i].id).copied().unwrap_or(0);
        let total_count = item_count + node_children.iter().map(|c| c.total_count).sum::<u64>();
        built[i] = Some(CategoryNode {
            category: categories[i].clone(),
            item_count,
            total_count,
            children: node_children,
        });
    }

    roots
        .iter()
        .map(|&r| {
            built[r].take().ok_or_else(|| {
                CategoryError::DataIntegrity(format!("root {} was not built", categories[r].id))
            })
        })
        .collect()
}

/// Depth-first display order of a forest, each node paired with its depth.
pub fn flatten(forest: &[CategoryNode]) -> Vec<(&CategoryNode, usize)> {
    let mut result = Vec::new();
    let mut stack: Vec<(&CategoryNode, usize)> = forest.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        result.push((node, depth));
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::models::TenantId;

    fn cat(id: i64, parent: Option<i64>, path: &str) -> Category {
        Category {
            id: CategoryId(id),
            tenant_id: TenantId(1),
            parent_id: parent.map(CategoryId),
            name: format!("Category {}", id),
            path: path.to_string(),
            level: (path.split('.').count() - 1) as u32,
            sort_order: path.rsplit('.').next().unwrap().parse().unwrap(),
        }
    }

    fn counts(pairs: &[(i64, u64)]) -> HashMap<CategoryId, u64> {
        pairs.iter().map(|&(id, n)| (CategoryId(id), n)).collect()
    }

    fn ids(nodes: &[CategoryNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.category.id.0).collect()
    }

    #[test]
    fn builds_nested_forest_in_numeric_order() {
        let records = vec![
            cat(5, Some(1), "1.10"),
            cat(2, None, "2"),
            cat(3, Some(1), "1.2"),
            cat(1, None, "1"),
            cat(4, Some(3), "1.2.1"),
        ];
        let forest = build_forest(&records, &HashMap::new()).unwrap();

        assert_eq!(ids(&forest), vec![1, 2]);
        assert_eq!(ids(&forest[0].children), vec![3, 5]);
        assert_eq!(ids(&forest[0].children[0].children), vec![4]);
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn every_record_appears_once_and_totals_roll_up() {
        let records = vec![
            cat(1, None, "1"),
            cat(2, Some(1), "1.1"),
            cat(3, Some(1), "1.2"),
            cat(4, Some(2), "1.1.1"),
            cat(5, Some(4), "1.1.1.1"),
            cat(6, None, "2"),
        ];
        let item_counts = counts(&[(1, 1), (2, 2), (4, 4), (5, 8), (6, 3)]);
        let forest = build_forest(&records, &item_counts).unwrap();

        let flat = flatten(&forest);
        assert_eq!(flat.len(), records.len());

        assert_eq!(forest[0].item_count, 1);
        assert_eq!(forest[0].total_count, 1 + 2 + 4 + 8);
        assert_eq!(forest[0].find(CategoryId(2)).unwrap().total_count, 2 + 4 + 8);
        assert_eq!(forest[0].find(CategoryId(3)).unwrap().total_count, 0);
        assert_eq!(forest[1].total_count, 3);
        assert_eq!(forest[0].descendant_count(), 4);
    }

    #[test]
    fn flatten_lists_depth_first() {
        let records = vec![
            cat(1, None, "1"),
            cat(2, None, "2"),
            cat(3, Some(1), "1.1"),
            cat(4, Some(1), "1.2"),
            cat(5, Some(3), "1.1.1"),
        ];
        let forest = build_forest(&records, &HashMap::new()).unwrap();
        let order: Vec<(i64, usize)> = flatten(&forest)
            .into_iter()
            .map(|(n, depth)| (n.category.id.0, depth))
            .collect();
        assert_eq!(order, vec![(1, 0), (3, 1), (5, 2), (4, 1), (2, 0)]);
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        assert!(build_forest(&[], &HashMap::new()).unwrap().is_empty());
    }

    #[test]
    fn dangling_parent_is_an_integrity_error() {
        let records = vec![cat(1, None, "1"), cat(2, Some(9), "9.1")];
        let err = build_forest(&records, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CategoryError::DataIntegrity(ref msg) if msg.contains("missing parent 9")));
    }

    #[test]
    fn parent_cycle_fails_the_path_check() {
        let records = vec![cat(1, Some(2), "1.1"), cat(2, Some(1), "1")];
        let err = build_forest(&records, &HashMap::new()).unwrap_err();
        assert!(
            matches!(err, CategoryError::DataIntegrity(ref msg) if msg.contains("not under its parent's path")),
            "unexpected error {:?}",
            err
        );
    }

    #[test]
    fn sort_order_must_match_last_segment() {
        let records = vec![
            cat(1, None, "1"),
            Category { sort_order: 5, ..cat(2, Some(1), "1.2") },
        ];
        let err = build_forest(&records, &HashMap::new()).unwrap_err();
        assert!(
            matches!(err, CategoryError::DataIntegrity(ref msg) if msg.contains("sort_order 5")),
            "unexpected error {:?}",
            err
        );
    }

    #[test]
    fn self_parent_is_reported() {
        let records = vec![cat(1, Some(1), "1.1")];
        let err = build_forest(&records, &HashMap::new()).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn malformed_path_is_reported() {
        let records = vec![cat(1, None, "1"), Category { path: "1.x".into(), ..cat(2, Some(1), "1.1") }];
        let err = build_forest(&records, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CategoryError::MalformedPath { .. }));
    }

    #[test]
    fn path_not_under_parent_is_reported() {
        let records = vec![cat(1, None, "1"), cat(2, None, "2"), cat(3, Some(1), "2.1")];
        let err = build_forest(&records, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CategoryError::DataIntegrity(_)));
    }

    #[test]
    fn duplicate_sibling_paths_are_reported() {
        let records = vec![cat(1, None, "1"), cat(2, Some(1), "1.1"), cat(3, Some(1), "1.1")];
        let err = build_forest(&records, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CategoryError::DataIntegrity(ref msg) if msg.contains("share path")));
    }

    #[test]
    fn mixed_tenants_are_reported() {
        let mut foreign = cat(2, None, "2");
        foreign.tenant_id = TenantId(7);
        let err = build_forest(&[cat(1, None, "1"), foreign], &HashMap::new()).unwrap_err();
        assert!(matches!(err, CategoryError::DataIntegrity(_)));
    }

    #[test]
    fn sort_by_path_is_numeric_and_idempotent() {
        let records = vec![
            cat(1, Some(9), "1.10.1"),
            cat(2, Some(9), "1.2.10"),
            cat(3, Some(9), "1.2.2"),
            cat(4, None, "1"),
        ];
        let sorted = sort_categories_by_path(records).unwrap();
        let paths: Vec<&str> = sorted.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["1", "1.2.2", "1.2.10", "1.10.1"]);

        let again = sort_categories_by_path(sorted.clone()).unwrap();
        assert_eq!(again, sorted);
    }
}
