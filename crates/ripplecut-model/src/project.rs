//! Project entity.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_core::{EngineError, Result};
use ripplecut_store::{SqlExt, Store};

use crate::parse_uuid;

/// A project: the root of the bin tree and the owner of every sequence,
/// clip, and media row in its database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    /// Free-form settings blob (JSON), e.g. per-project track templates.
    pub settings: Option<serde_json::Value>,
}

impl Project {
    /// Create a new project value (not yet persisted).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            settings: None,
        }
    }

    /// Load a project, failing when it does not exist.
    pub fn load(store: &Store, id: Uuid) -> Result<Self> {
        Self::load_optional(store, id)?
            .ok_or_else(|| EngineError::EntityNotFound(format!("project {}", id)))
    }

    /// Load a project if present.
    pub fn load_optional(store: &Store, id: Uuid) -> Result<Option<Self>> {
        let mut stmt = store
            .conn()
            .prepare("SELECT id, name, settings FROM projects WHERE id = ?1")
            .map_store()?;
        stmt.query_row(params![id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .optional()
        .map_store()?
        .map(|(id, name, settings)| {
            let settings = settings
                .map(|s| {
                    serde_json::from_str(&s)
                        .map_err(|e| EngineError::Serialization(e.to_string()))
                })
                .transpose()?;
            Ok(Self {
                id: parse_uuid(&id, "project")?,
                name,
                settings,
            })
        })
        .transpose()
    }

    /// Insert or update the project row.
    pub fn save(&self, store: &Store) -> Result<()> {
        let settings = self
            .settings
            .as_ref()
            .map(|s| serde_json::to_string(s))
            .transpose()
            .map_err(|e| EngineError::Serialization(e.to_string()))?;
        store
            .conn()
            .execute(
                "INSERT OR REPLACE INTO projects (id, name, settings) VALUES (?1, ?2, ?3)",
                params![self.id.to_string(), self.name, settings],
            )
            .map_store()?;
        Ok(())
    }

    /// Delete the project row. Sequences cascade through the schema.
    pub fn delete(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "DELETE FROM projects WHERE id = ?1",
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
