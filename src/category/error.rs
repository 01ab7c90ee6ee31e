//! Error taxonomy of the category engine.

use super::models::CategoryId;
use thiserror::Error;

pub type CategoryResult<T> = Result<T, CategoryError>;

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("Category {0} not found")]
    NotFound(CategoryId),

    /// The category exists but belongs to another tenant.
    #[error("Category {0} belongs to another tenant")]
    Forbidden(CategoryId),

    #[error("Invalid parent {id}: {reason}")]
    InvalidParent { id: CategoryId, reason: String },

    #[error("Cannot delete: category {id} has {count} subcategories")]
    HasChildren { id: CategoryId, count: usize },

    #[error("Cannot delete: category {id} has {count} items")]
    HasItems { id: CategoryId, count: u64 },

    #[error("Category name must not be empty")]
    InvalidName,

    #[error("Category would exceed the maximum depth of {limit} levels")]
    DepthLimitExceeded { limit: u32 },

    #[error("Category data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("Malformed category path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("Category store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl CategoryError {
    pub(crate) fn invalid_parent(id: CategoryId, reason: impl Into<String>) -> Self {
        CategoryError::InvalidParent {
            id,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_path(path: &str, reason: impl Into<String>) -> Self {
        CategoryError::MalformedPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors that mean the persisted hierarchy is corrupted, as opposed to a
    /// bad request.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CategoryError::DataIntegrity(_) | CategoryError::MalformedPath { .. }
        )
    }

    /// Errors caused by the caller's input, safe to show to the user as-is.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CategoryError::NotFound(_)
                | CategoryError::Forbidden(_)
                | CategoryError::InvalidParent { .. }
                | CategoryError::HasChildren { .. }
                | CategoryError::HasItems { .. }
                | CategoryError::InvalidName
                | CategoryError::DepthLimitExceeded { .. }
        )
    }
}

impl From<rusqlite::Error> for CategoryError {
    fn from(e: rusqlite::Error) -> Self {
        CategoryError::Store(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_conflicts_have_explicit_messages() {
        let err = CategoryError::HasItems {
            id: CategoryId(4),
            count: 3,
        };
        assert_eq!(err.to_string(), "Cannot delete: category 4 has 3 items");

        let err = CategoryError::HasChildren {
            id: CategoryId(4),
            count: 2,
        };
        assert_eq!(err.to_string(), "Cannot delete: category 4 has 2 subcategories");
    }

    #[test]
    fn classifies_errors() {
        assert!(CategoryError::DataIntegrity("cycle".into()).is_corruption());
        assert!(CategoryError::malformed_path("1.x", "bad").is_corruption());
        assert!(!CategoryError::NotFound(CategoryId(1)).is_corruption());
        assert!(CategoryError::NotFound(CategoryId(1)).is_user_error());
        assert!(!CategoryError::Store(anyhow::anyhow!("disk")).is_user_error());
    }
}
