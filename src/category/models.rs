//! Category records and derived tree nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Row id of a category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owning account scope. Every category belongs to exactly one tenant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted category row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub tenant_id: TenantId,
    pub parent_id: Option<CategoryId>,
    pub name: String,
    /// Materialized path, e.g. `"1.4.2"`.
    pub path: String,
    pub level: u32,
    pub sort_order: u64,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Values for a row about to be inserted, id is assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCategory {
    pub tenant_id: TenantId,
    pub parent_id: Option<CategoryId>,
    pub name: String,
    pub path: String,
    pub level: u32,
    pub sort_order: u64,
}

impl NewCategory {
    pub fn into_category(self, id: CategoryId) -> Category {
        Category {
            id,
            tenant_id: self.tenant_id,
            parent_id: self.parent_id,
            name: self.name,
            path: self.path,
            level: self.level,
            sort_order: self.sort_order,
        }
    }
}

/// How `delete` treats a category that still has children or items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Refuse to delete a category that has children or items.
    #[default]
    Strict,
    /// Delete the whole subtree and detach the items assigned to it.
    Cascade,
}

/// Error type for parsing DeleteMode from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDeleteModeError(pub String);

impl fmt::Display for ParseDeleteModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not one of: strict, cascade", self.0)
    }
}

impl std::error::Error for ParseDeleteModeError {}

impl FromStr for DeleteMode {
    type Err = ParseDeleteModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(DeleteMode::Strict),
            "cascade" => Ok(DeleteMode::Cascade),
            _ => Err(ParseDeleteModeError(s.to_string())),
        }
    }
}

impl fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteMode::Strict => write!(f, "strict"),
            DeleteMode::Cascade => write!(f, "cascade"),
        }
    }
}

/// A category placed in its tree, with rollup counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    /// Items assigned directly to this category.
    pub item_count: u64,
    /// `item_count` of this node plus every descendant.
    pub total_count: u64,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    /// Depth-first lookup within this subtree.
    pub fn find(&self, id: CategoryId) -> Option<&CategoryNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.category.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&CategoryNode> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// Summary of a cascade delete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Deleted category ids, leaves first, the requested category last.
    pub deleted: Vec<CategoryId>,
    /// Item assignments removed along with the deleted categories.
    pub detached_items: u64,
}
