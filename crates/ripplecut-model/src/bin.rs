//! Bin entity.
//!
//! Bins form a tree rooted at the project; `insert_index` orders siblings.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_core::{EngineError, Result};
use ripplecut_store::{SqlExt, Store};

use crate::parse_uuid;

/// A folder in the project browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub id: Uuid,
    pub project_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub insert_index: i64,
}

impl Bin {
    /// Create a bin value (not yet persisted).
    pub fn new(
        project_id: Uuid,
        parent_id: Option<Uuid>,
        name: impl Into<String>,
        insert_index: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            parent_id,
            name: name.into(),
            insert_index,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, Option<String>, String, i64)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn hydrate(
        (id, project_id, parent_id, name, insert_index): (
            String,
            String,
            Option<String>,
            String,
            i64,
        ),
    ) -> Result<Self> {
        Ok(Self {
            id: parse_uuid(&id, "bin")?,
            project_id: parse_uuid(&project_id, "project")?,
            parent_id: parent_id
                .as_deref()
                .map(|p| parse_uuid(p, "bin"))
                .transpose()?,
            name,
            insert_index,
        })
    }

    const COLUMNS: &'static str = "id, project_id, parent_id, name, insert_index";

    /// Load a bin, failing when it does not exist.
    pub fn load(store: &Store, id: Uuid) -> Result<Self> {
        Self::load_optional(store, id)?
            .ok_or_else(|| EngineError::EntityNotFound(format!("bin {}", id)))
    }

    /// Load a bin if present.
    pub fn load_optional(store: &Store, id: Uuid) -> Result<Option<Self>> {
        let sql = format!("SELECT {} FROM bins WHERE id = ?1", Self::COLUMNS);
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        stmt.query_row(params![id.to_string()], Self::from_row)
            .optional()
            .map_store()?
            .map(Self::hydrate)
            .transpose()
    }

    /// Direct children of a parent bin (or the project root when None),
    /// in sibling order.
    pub fn children(store: &Store, project_id: Uuid, parent_id: Option<Uuid>) -> Result<Vec<Self>> {
        let sql = match parent_id {
            Some(_) => format!(
                "SELECT {} FROM bins WHERE project_id = ?1 AND parent_id = ?2 \
                 ORDER BY insert_index, name",
                Self::COLUMNS
            ),
            None => format!(
                "SELECT {} FROM bins WHERE project_id = ?1 AND parent_id IS NULL \
                 ORDER BY insert_index, name",
                Self::COLUMNS
            ),
        };
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        let mut out = Vec::new();
        match parent_id {
            Some(pid) => {
                let rows = stmt
                    .query_map(
                        params![project_id.to_string(), pid.to_string()],
                        Self::from_row,
                    )
                    .map_store()?;
                for row in rows {
                    out.push(Self::hydrate(row.map_store()?)?);
                }
            }
            None => {
                let rows = stmt
                    .query_map(params![project_id.to_string()], Self::from_row)
                    .map_store()?;
                for row in rows {
                    out.push(Self::hydrate(row.map_store()?)?);
                }
            }
        }
        Ok(out)
    }

    /// Insert or update the bin row.
    pub fn save(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "INSERT OR REPLACE INTO bins (id, project_id, parent_id, name, insert_index) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    self.id.to_string(),
                    self.project_id.to_string(),
                    self.parent_id.map(|p| p.to_string()),
                    self.name,
                    self.insert_index,
                ],
            )
            .map_store()?;
        Ok(())
    }

    /// Delete the bin row. Fails while child bins remain.
    pub fn delete(&self, store: &Store) -> Result<()> {
        let children: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM bins WHERE parent_id = ?1",
                params![self.id.to_string()],
                |row| row.get(0),
            )
            .map_store()?;
        if children > 0 {
            return Err(EngineError::ConstraintViolation(format!(
                "bin {} still has {} child bins",
                self.name, children
            )));
        }
        store
            .conn()
            .execute(
                "DELETE FROM bins WHERE id = ?1",
                params![self.id.to_string()],
            )
            .map_store()?;
        Ok(())
    }

    /// Snapshot for undo.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}
