//! Clip property entity.
//!
//! Property values are JSON-encoded `{"value": ...}` payloads. Properties
//! are copied from a master clip to a timeline clip on insert/overwrite.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ripplecut_core::{EngineError, Result};
use ripplecut_store::{SqlExt, Store};

use crate::parse_uuid;

/// One named property of a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub clip_id: Uuid,
    pub name: String,
    /// JSON-encoded `{"value": ...}`.
    pub value: serde_json::Value,
    /// STRING, NUMBER, BOOL, ...
    pub property_type: String,
    pub default_value: Option<serde_json::Value>,
}

impl Property {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String, String, Option<String>)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn hydrate(
        (id, clip_id, name, value, property_type, default_value): (
            String,
            String,
            String,
            String,
            String,
            Option<String>,
        ),
    ) -> Result<Self> {
        let parse = |s: &str| -> Result<serde_json::Value> {
            serde_json::from_str(s).map_err(|e| EngineError::Serialization(e.to_string()))
        };
        Ok(Self {
            id: parse_uuid(&id, "property")?,
            clip_id: parse_uuid(&clip_id, "clip")?,
            name,
            value: parse(&value)?,
            property_type,
            default_value: default_value.as_deref().map(parse).transpose()?,
        })
    }

    const COLUMNS: &'static str =
        "id, clip_id, property_name, property_value, property_type, default_value";

    /// Load one property of a clip by name, if present.
    pub fn get(store: &Store, clip_id: Uuid, name: &str) -> Result<Option<Self>> {
        let sql = format!(
            "SELECT {} FROM properties WHERE clip_id = ?1 AND property_name = ?2",
            Self::COLUMNS
        );
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        stmt.query_row(params![clip_id.to_string(), name], Self::from_row)
            .optional()
            .map_store()?
            .map(Self::hydrate)
            .transpose()
    }

    /// All properties of a clip.
    pub fn load_for_clip(store: &Store, clip_id: Uuid) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT {} FROM properties WHERE clip_id = ?1 ORDER BY property_name",
            Self::COLUMNS
        );
        let mut stmt = store.conn().prepare(&sql).map_store()?;
        let rows = stmt
            .query_map(params![clip_id.to_string()], Self::from_row)
            .map_store()?;
        let mut out = Vec::new();
        for row in rows {
            out.push(Self::hydrate(row.map_store()?)?);
        }
        Ok(out)
    }

    /// Insert or update a property row. Returns the row as persisted.
    pub fn upsert(
        store: &Store,
        clip_id: Uuid,
        name: &str,
        value: &serde_json::Value,
        property_type: &str,
        default_value: Option<&serde_json::Value>,
    ) -> Result<Self> {
        let existing = Self::get(store, clip_id, name)?;
        let id = existing.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4);
        let row = Self {
            id,
            clip_id,
            name: name.into(),
            value: value.clone(),
            property_type: property_type.into(),
            default_value: default_value.cloned(),
        };
        row.save(store)?;
        Ok(row)
    }

    /// Persist this property row.
    pub fn save(&self, store: &Store) -> Result<()> {
        let encode = |v: &serde_json::Value| -> Result<String> {
            serde_json::to_string(v).map_err(|e| EngineError::Serialization(e.to_string()))
        };
        store
            .conn()
            .execute(
                "INSERT OR REPLACE INTO properties (id, clip_id, property_name, property_value, \
                 property_type, default_value) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.id.to_string(),
                    self.clip_id.to_string(),
                    self.name,
                    encode(&self.value)?,
                    self.property_type,
                    self.default_value.as_ref().map(encode).transpose()?,
                ],
            )
            .map_store()?;
        Ok(())
    }

    /// Delete this property row.
    pub fn delete(&self, store: &Store) -> Result<()> {
        store
            .conn()
            .execute(
                "DELETE FROM properties WHERE id = ?1",
                params![self.id.to_string()],
            )
            .map_store()?;
        Ok(())
    }

    /// Copy every property from one clip to another, under fresh ids.
    pub fn copy_all(store: &Store, from_clip: Uuid, to_clip: Uuid) -> Result<usize> {
        let props = Self::load_for_clip(store, from_clip)?;
        let count = props.len();
        for prop in props {
            Self::upsert(
                store,
                to_clip,
                &prop.name,
                &prop.value,
                &prop.property_type,
                prop.default_value.as_ref(),
            )?;
        }
        Ok(count)
    }

    /// Snapshot for undo.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}
