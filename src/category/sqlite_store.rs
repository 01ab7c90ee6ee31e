use super::error::{CategoryError, CategoryResult};
use super::models::{Category, CategoryId, NewCategory, TenantId};
use super::schema::CATEGORY_VERSIONED_SCHEMAS;
use super::store::{CategoryStore, CategoryTransaction};
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const CATEGORY_COLUMNS: &str = "id, tenant_id, parent_id, name, path, level, sort_order";

#[derive(Clone)]
pub struct SqliteCategoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCategoryStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let mut conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open category db {:?}", db_path))?;
        let version = open_versioned(&mut conn, CATEGORY_VERSIONED_SCHEMAS)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let category_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
        info!(
            "Opened category db {:?} at version {} with {} categories",
            db_path, version, category_count
        );

        Ok(SqliteCategoryStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> CategoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CategoryError::Store(anyhow!("Category db connection lock poisoned")))
    }

    fn run<T>(
        &self,
        begin: &str,
        f: impl FnOnce(&dyn CategoryTransaction) -> CategoryResult<T>,
    ) -> CategoryResult<T> {
        let conn = self.lock()?;
        conn.execute(begin, [])?;

        let result = f(&SqliteTransaction { conn: &conn });
        finish(&conn, result)
    }
}

/// Commits the open transaction if `result` is Ok, rolls it back otherwise.
/// A failed COMMIT leaves the transaction open, so it is rolled back as well.
fn finish<T>(conn: &Connection, result: CategoryResult<T>) -> CategoryResult<T> {
    match result {
        Ok(value) => match conn.execute("COMMIT", []) {
            Ok(_) => Ok(value),
            Err(e) => {
                warn!("Category transaction failed to commit: {}", e);
                let _ = conn.execute("ROLLBACK", []);
                Err(CategoryError::Store(
                    anyhow::Error::new(e).context("Failed to commit category transaction"),
                ))
            }
        },
        Err(e) => {
            debug!("Rolling back category transaction: {}", e);
            let _ = conn.execute("ROLLBACK", []);
            Err(e)
        }
    }
}

fn sql_int(value: u64, column: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| anyhow!("{} {} does not fit an INTEGER column", column, value))
}

impl CategoryStore for SqliteCategoryStore {
    fn read<T>(
        &self,
        f: impl FnOnce(&dyn CategoryTransaction) -> CategoryResult<T>,
    ) -> CategoryResult<T> {
        self.run("BEGIN DEFERRED", f)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&dyn CategoryTransaction) -> CategoryResult<T>,
    ) -> CategoryResult<T> {
        self.run("BEGIN IMMEDIATE", f)
    }
}

struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

fn parse_category_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: CategoryId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        parent_id: row.get::<_, Option<i64>>(2)?.map(CategoryId),
        name: row.get(3)?,
        path: row.get(4)?,
        level: {
            let level: i64 = row.get(5)?;
            u32::try_from(level).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(5, level))?
        },
        sort_order: {
            let sort_order: i64 = row.get(6)?;
            u64::try_from(sort_order)
                .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(6, sort_order))?
        },
    })
}

impl CategoryTransaction for SqliteTransaction<'_> {
    fn fetch_all(&self, tenant_id: TenantId) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM categories WHERE tenant_id = ?1",
            CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map(params![tenant_id.0], parse_category_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to load categories of tenant {}", tenant_id))?;
        Ok(categories)
    }

    fn fetch(&self, id: CategoryId) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                &format!("SELECT {} FROM categories WHERE id = ?1", CATEGORY_COLUMNS),
                params![id.0],
                parse_category_row,
            )
            .optional()?;
        Ok(category)
    }

    fn fetch_children(
        &self,
        tenant_id: TenantId,
        parent_id: Option<CategoryId>,
    ) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM categories WHERE tenant_id = ?1 AND parent_id IS ?2",
            CATEGORY_COLUMNS
        ))?;
        let children = stmt
            .query_map(
                params![tenant_id.0, parent_id.map(|p| p.0)],
                parse_category_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(children)
    }

    fn insert(&self, category: &NewCategory) -> Result<Category> {
        let sort_order = sql_int(category.sort_order, "sort_order")?;
        self.conn
            .execute(
                "INSERT INTO categories (tenant_id, parent_id, name, path, level, sort_order) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    category.tenant_id.0,
                    category.parent_id.map(|p| p.0),
                    &category.name,
                    &category.path,
                    category.level as i64,
                    sort_order,
                ],
            )
            .with_context(|| {
                format!(
                    "Failed to insert category '{}' at {}",
                    category.name, category.path
                )
            })?;
        let id = CategoryId(self.conn.last_insert_rowid());
        Ok(category.clone().into_category(id))
    }

    fn update(&self, category: &Category) -> Result<()> {
        let sort_order = sql_int(category.sort_order, "sort_order")?;
        let changed = self
            .conn
            .execute(
                "UPDATE categories SET parent_id = ?2, name = ?3, path = ?4, level = ?5, sort_order = ?6 \
                 WHERE id = ?1",
                params![
                    category.id.0,
                    category.parent_id.map(|p| p.0),
                    &category.name,
                    &category.path,
                    category.level as i64,
                    sort_order,
                ],
            )
            .with_context(|| format!("Failed to update category {}", category.id))?;
        if changed == 0 {
            bail!("Category {} not found", category.id);
        }
        Ok(())
    }

    fn delete(&self, id: CategoryId) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id.0])
            .with_context(|| format!("Failed to delete category {}", id))?;
        if changed == 0 {
            bail!("Category {} not found", id);
        }
        Ok(())
    }

    fn count_children(&self, id: CategoryId) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE parent_id = ?1",
            params![id.0],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_items(&self, id: CategoryId) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM category_items WHERE category_id = ?1",
            params![id.0],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    fn item_counts(&self, tenant_id: TenantId) -> Result<HashMap<CategoryId, u64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT category_id, COUNT(*) FROM category_items WHERE tenant_id = ?1 GROUP BY category_id",
        )?;
        let counts = stmt
            .query_map(params![tenant_id.0], |row| {
                Ok((CategoryId(row.get(0)?), row.get::<_, i64>(1)? as u64))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(counts)
    }

    fn assign_item(
        &self,
        tenant_id: TenantId,
        item_id: &str,
        category_id: CategoryId,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO category_items (tenant_id, item_id, category_id) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(tenant_id, item_id) DO UPDATE SET category_id = excluded.category_id",
                params![tenant_id.0, item_id, category_id.0],
            )
            .with_context(|| format!("Failed to assign item '{}' to {}", item_id, category_id))?;
        Ok(())
    }

    fn item_category(&self, tenant_id: TenantId, item_id: &str) -> Result<Option<CategoryId>> {
        let category_id = self
            .conn
            .query_row(
                "SELECT category_id FROM category_items WHERE tenant_id = ?1 AND item_id = ?2",
                params![tenant_id.0, item_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(category_id.map(CategoryId))
    }

    fn unassign_item(&self, tenant_id: TenantId, item_id: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM category_items WHERE tenant_id = ?1 AND item_id = ?2",
            params![tenant_id.0, item_id],
        )?;
        Ok(changed > 0)
    }

    fn move_items(&self, from: CategoryId, to: CategoryId) -> Result<u64> {
        let changed = self.conn.execute(
            "UPDATE category_items SET category_id = ?2 WHERE category_id = ?1",
            params![from.0, to.0],
        )?;
        Ok(changed as u64)
    }

    fn detach_items(&self, id: CategoryId) -> Result<u64> {
        let changed = self.conn.execute(
            "DELETE FROM category_items WHERE category_id = ?1",
            params![id.0],
        )?;
        Ok(changed as u64)
    }
}
