//! Database row types and their conversions to engine types.

use crate::error::Result;
use sqlx::{sqlite::SqliteRow, Row};
use tether_engine::{
    EngineMetadata, Entity, EntityPayload, QueueOperation, SyncQueueItem,
};

/// A stored entity row from the database.
#[derive(Debug)]
pub struct EntityRow {
    pub entity_kind: String,
    pub entity_id: String,
    pub owner_id: String,
    pub payload: String,
    pub version: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for EntityRow {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(EntityRow {
            entity_kind: row.try_get("entity_kind")?,
            entity_id: row.try_get("entity_id")?,
            owner_id: row.try_get("owner_id")?,
            payload: row.try_get("payload")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl EntityRow {
    /// Convert database row to an engine entity.
    pub fn to_entity(&self) -> Result<Entity> {
        let data: serde_json::Value = serde_json::from_str(&self.payload)?;
        let payload = EntityPayload::from_wire(&self.entity_kind, data)?;

        Ok(Entity {
            id: self.entity_id.clone(),
            owner_id: self.owner_id.clone(),
            payload,
            version: self.version.map(|v| v as u64),
            created_at: self.created_at as u64,
            updated_at: self.updated_at as u64,
        })
    }
}

/// A stored queue row from the database.
#[derive(Debug)]
pub struct QueueRow {
    pub queue_id: String,
    pub operation: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub payload: Option<String>,
    pub enqueued_at: i64,
    pub retry_count: i64,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for QueueRow {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(QueueRow {
            queue_id: row.try_get("queue_id")?,
            operation: row.try_get("operation")?,
            entity_kind: row.try_get("entity_kind")?,
            entity_id: row.try_get("entity_id")?,
            payload: row.try_get("payload")?,
            enqueued_at: row.try_get("enqueued_at")?,
            retry_count: row.try_get("retry_count")?,
        })
    }
}

impl QueueRow {
    /// Convert database row to an engine queue item.
    pub fn to_item(&self) -> Result<SyncQueueItem> {
        let operation: QueueOperation = self.operation.parse()?;

        let payload = match &self.payload {
            Some(text) => {
                let data: serde_json::Value = serde_json::from_str(text)?;
                Some(EntityPayload::from_wire(&self.entity_kind, data)?)
            }
            None => None,
        };

        Ok(SyncQueueItem {
            queue_id: self.queue_id.clone(),
            operation,
            entity_kind: self.entity_kind.clone(),
            entity_id: self.entity_id.clone(),
            payload,
            enqueued_at: self.enqueued_at as u64,
            retry_count: self.retry_count as u32,
        })
    }
}

/// The stored metadata singleton row.
#[derive(Debug)]
pub struct MetadataRow {
    pub device_id: String,
    pub last_sync_at: Option<i64>,
    pub is_online: bool,
    pub pending_count: i64,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for MetadataRow {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(MetadataRow {
            device_id: row.try_get("device_id")?,
            last_sync_at: row.try_get("last_sync_at")?,
            is_online: row.try_get("is_online")?,
            pending_count: row.try_get("pending_count")?,
        })
    }
}

impl MetadataRow {
    /// Convert database row to engine metadata.
    pub fn to_metadata(&self) -> EngineMetadata {
        EngineMetadata {
            device_id: self.device_id.clone(),
            last_sync_at: self.last_sync_at.map(|t| t as u64),
            is_online: self.is_online,
            pending_sync_count: self.pending_count as u64,
        }
    }
}
