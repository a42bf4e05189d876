//! Durable local store: cached entities, the pending-operation queue, and
//! engine metadata.
//!
//! Every operation is transactional per call and every storage error is
//! surfaced to the caller - a failed enqueue must not be mistaken for a
//! successful sync. The queue is the only record of un-acknowledged local
//! intent; nothing here may discard it except explicit item removal.

mod pool;
mod rows;

pub use pool::{create_memory_pool, create_pool, run_migrations, Pool};

use crate::error::Result;
use rows::{EntityRow, MetadataRow, QueueRow};
use std::path::Path;
use tether_engine::{EngineMetadata, Entity, MetadataPatch, SyncQueueItem};

/// The durable local store backing the sync engine.
#[derive(Clone)]
pub struct LocalStore {
    pool: Pool,
}

impl LocalStore {
    /// Open (or create) an on-disk store and run migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pool = pool::create_pool(path.as_ref()).await?;
        pool::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Open an in-memory store (tests and ephemeral sessions).
    pub async fn open_in_memory() -> Result<Self> {
        let pool = pool::create_memory_pool().await?;
        pool::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Insert or update an entity. `created_at` of an existing row is
    /// preserved.
    pub async fn put(&self, entity: &Entity) -> Result<()> {
        let payload = serde_json::to_string(&entity.payload.to_value())?;

        sqlx::query(
            r#"
            INSERT INTO entities (
                entity_kind, entity_id, owner_id, payload, version,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (entity_kind, entity_id) DO UPDATE SET
                owner_id = excluded.owner_id,
                payload = excluded.payload,
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entity.kind())
        .bind(&entity.id)
        .bind(&entity.owner_id)
        .bind(payload)
        .bind(entity.version.map(|v| v as i64))
        .bind(entity.created_at as i64)
        .bind(entity.updated_at as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an entity by kind and id.
    pub async fn get(&self, entity_kind: &str, entity_id: &str) -> Result<Option<Entity>> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT entity_kind, entity_id, owner_id, payload, version,
                   created_at, updated_at
            FROM entities
            WHERE entity_kind = ? AND entity_id = ?
            "#,
        )
        .bind(entity_kind)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.to_entity()).transpose()
    }

    /// Get all cached entities belonging to an owner.
    pub async fn get_all(&self, owner_id: &str) -> Result<Vec<Entity>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT entity_kind, entity_id, owner_id, payload, version,
                   created_at, updated_at
            FROM entities
            WHERE owner_id = ?
            ORDER BY entity_kind, entity_id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| r.to_entity()).collect()
    }

    /// Remove an entity from the cache.
    pub async fn delete_entity(&self, entity_kind: &str, entity_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM entities WHERE entity_kind = ? AND entity_id = ?")
            .bind(entity_kind)
            .bind(entity_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Replace a temporary client-assigned id with the server-assigned one,
    /// in the entity cache and in any still-queued items, atomically.
    pub async fn remap_entity_id(
        &self,
        entity_kind: &str,
        old_id: &str,
        entity: &Entity,
    ) -> Result<()> {
        let payload = serde_json::to_string(&entity.payload.to_value())?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM entities WHERE entity_kind = ? AND entity_id = ?")
            .bind(entity_kind)
            .bind(old_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO entities (
                entity_kind, entity_id, owner_id, payload, version,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (entity_kind, entity_id) DO UPDATE SET
                owner_id = excluded.owner_id,
                payload = excluded.payload,
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entity.kind())
        .bind(&entity.id)
        .bind(&entity.owner_id)
        .bind(payload)
        .bind(entity.version.map(|v| v as i64))
        .bind(entity.created_at as i64)
        .bind(entity.updated_at as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE sync_queue SET entity_id = ? WHERE entity_kind = ? AND entity_id = ?",
        )
        .bind(&entity.id)
        .bind(entity_kind)
        .bind(old_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Drop every cached entity. The queue and metadata are untouched.
    pub async fn clear_cache_preserving_queue(&self) -> Result<()> {
        sqlx::query("DELETE FROM entities")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    /// Append an item to the pending-operation queue. The metadata pending
    /// count is updated in the same transaction.
    pub async fn enqueue(&self, item: &SyncQueueItem) -> Result<()> {
        let payload = item
            .payload
            .as_ref()
            .map(|p| serde_json::to_string(&p.to_value()))
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sync_queue (
                queue_id, operation, entity_kind, entity_id, payload,
                enqueued_at, retry_count
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.queue_id)
        .bind(item.operation.as_str())
        .bind(&item.entity_kind)
        .bind(&item.entity_id)
        .bind(payload)
        .bind(item.enqueued_at as i64)
        .bind(item.retry_count as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE engine_metadata SET pending_count = (SELECT COUNT(*) FROM sync_queue) WHERE id = 1",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Snapshot of the queue in insertion order.
    pub async fn queue_snapshot(&self) -> Result<Vec<SyncQueueItem>> {
        let rows = sqlx::query_as::<_, QueueRow>(
            r#"
            SELECT queue_id, operation, entity_kind, entity_id, payload,
                   enqueued_at, retry_count
            FROM sync_queue
            ORDER BY enqueued_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| r.to_item()).collect()
    }

    /// Number of items waiting in the queue.
    pub async fn queue_len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    /// Remove an acknowledged (or dropped) queue item.
    pub async fn remove_queue_item(&self, queue_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sync_queue WHERE queue_id = ?")
            .bind(queue_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE engine_metadata SET pending_count = (SELECT COUNT(*) FROM sync_queue) WHERE id = 1",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Record a remote failure for a queue item; returns the new count.
    pub async fn increment_retry(&self, queue_id: &str) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "UPDATE sync_queue SET retry_count = retry_count + 1 WHERE queue_id = ? RETURNING retry_count",
        )
        .bind(queue_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u32)
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Read the metadata singleton, if it has been created.
    pub async fn metadata(&self) -> Result<Option<EngineMetadata>> {
        let row = sqlx::query_as::<_, MetadataRow>(
            "SELECT device_id, last_sync_at, is_online, pending_count FROM engine_metadata WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.to_metadata()))
    }

    /// Read the metadata singleton, creating it on first launch with the
    /// supplied device id. An existing row keeps its device id.
    pub async fn ensure_metadata(&self, device_id: &str) -> Result<EngineMetadata> {
        sqlx::query(
            "INSERT OR IGNORE INTO engine_metadata (id, device_id, is_online, pending_count) VALUES (1, ?, 0, 0)",
        )
        .bind(device_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, MetadataRow>(
            "SELECT device_id, last_sync_at, is_online, pending_count FROM engine_metadata WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.to_metadata())
    }

    /// Apply a partial metadata update.
    pub async fn update_metadata(&self, patch: MetadataPatch) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MetadataRow>(
            "SELECT device_id, last_sync_at, is_online, pending_count FROM engine_metadata WHERE id = 1",
        )
        .fetch_one(&mut *tx)
        .await?;

        let mut metadata = row.to_metadata();
        metadata.apply(patch);

        sqlx::query(
            "UPDATE engine_metadata SET last_sync_at = ?, is_online = ?, pending_count = ? WHERE id = 1",
        )
        .bind(metadata.last_sync_at.map(|t| t as i64))
        .bind(metadata.is_online)
        .bind(metadata.pending_sync_count as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_engine::{
        ActivityFields, EntityPayload, QueueOperation, SyncQueueItem,
    };

    fn activity(title: &str) -> EntityPayload {
        EntityPayload::Activity(ActivityFields {
            title: title.into(),
            description: None,
            category: "learning".into(),
            tags: vec![],
            impact_level: None,
            date: "2024-03-01".into(),
            duration_minutes: None,
        })
    }

    fn entity(id: &str, owner: &str, title: &str, timestamp: u64) -> Entity {
        Entity::new(id, owner, activity(title), timestamp)
    }

    fn queue_item(queue_id: &str, op: QueueOperation, id: &str, at: u64) -> SyncQueueItem {
        let payload = match op {
            QueueOperation::Delete => None,
            _ => Some(activity("queued")),
        };
        SyncQueueItem::new(queue_id, op, "activity", id, payload, at)
    }

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = LocalStore::open_in_memory().await.unwrap();

        let mut original = entity("act-1", "user-1", "First", 1000);
        original.version = Some(3);
        store.put(&original).await.unwrap();

        let loaded = store.get("activity", "act-1").await.unwrap().unwrap();
        assert_eq!(loaded, original);

        assert!(store.get("activity", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_preserves_created_at() {
        let store = LocalStore::open_in_memory().await.unwrap();

        store.put(&entity("act-1", "user-1", "v1", 1000)).await.unwrap();

        let mut updated = entity("act-1", "user-1", "v2", 5000);
        updated.created_at = 5000;
        store.put(&updated).await.unwrap();

        let loaded = store.get("activity", "act-1").await.unwrap().unwrap();
        assert_eq!(loaded.created_at, 1000);
        assert_eq!(loaded.updated_at, 5000);
        assert_eq!(loaded.payload, activity("v2"));
    }

    #[tokio::test]
    async fn get_all_filters_by_owner() {
        let store = LocalStore::open_in_memory().await.unwrap();

        store.put(&entity("act-1", "user-1", "Mine", 1000)).await.unwrap();
        store.put(&entity("act-2", "user-2", "Theirs", 1000)).await.unwrap();

        let mine = store.get_all("user-1").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "act-1");
    }

    #[tokio::test]
    async fn queue_preserves_insertion_order() {
        let store = LocalStore::open_in_memory().await.unwrap();
        store.ensure_metadata("device-1").await.unwrap();

        // Same enqueued_at: rowid breaks the tie.
        store
            .enqueue(&queue_item("q-1", QueueOperation::Create, "act-1", 1000))
            .await
            .unwrap();
        store
            .enqueue(&queue_item("q-2", QueueOperation::Update, "act-1", 1000))
            .await
            .unwrap();
        store
            .enqueue(&queue_item("q-3", QueueOperation::Delete, "act-2", 2000))
            .await
            .unwrap();

        let snapshot = store.queue_snapshot().await.unwrap();
        let ids: Vec<_> = snapshot.iter().map(|i| i.queue_id.as_str()).collect();
        assert_eq!(ids, vec!["q-1", "q-2", "q-3"]);
    }

    #[tokio::test]
    async fn queue_mutations_track_pending_count() {
        let store = LocalStore::open_in_memory().await.unwrap();
        store.ensure_metadata("device-1").await.unwrap();

        store
            .enqueue(&queue_item("q-1", QueueOperation::Create, "act-1", 1000))
            .await
            .unwrap();
        store
            .enqueue(&queue_item("q-2", QueueOperation::Update, "act-1", 2000))
            .await
            .unwrap();

        let metadata = store.metadata().await.unwrap().unwrap();
        assert_eq!(metadata.pending_sync_count, 2);

        store.remove_queue_item("q-1").await.unwrap();
        let metadata = store.metadata().await.unwrap().unwrap();
        assert_eq!(metadata.pending_sync_count, 1);
    }

    #[tokio::test]
    async fn increment_retry_returns_new_count() {
        let store = LocalStore::open_in_memory().await.unwrap();
        store.ensure_metadata("device-1").await.unwrap();

        store
            .enqueue(&queue_item("q-1", QueueOperation::Create, "act-1", 1000))
            .await
            .unwrap();

        assert_eq!(store.increment_retry("q-1").await.unwrap(), 1);
        assert_eq!(store.increment_retry("q-1").await.unwrap(), 2);
        assert_eq!(store.increment_retry("q-1").await.unwrap(), 3);

        // Unknown items are a storage error, never silently ignored.
        assert!(store.increment_retry("q-404").await.is_err());
    }

    #[tokio::test]
    async fn clear_cache_preserves_queue() {
        let store = LocalStore::open_in_memory().await.unwrap();
        store.ensure_metadata("device-1").await.unwrap();

        store.put(&entity("act-1", "user-1", "Cached", 1000)).await.unwrap();
        store
            .enqueue(&queue_item("q-1", QueueOperation::Update, "act-1", 1000))
            .await
            .unwrap();

        store.clear_cache_preserving_queue().await.unwrap();

        assert!(store.get("activity", "act-1").await.unwrap().is_none());
        assert_eq!(store.queue_len().await.unwrap(), 1);
        let metadata = store.metadata().await.unwrap().unwrap();
        assert_eq!(metadata.pending_sync_count, 1);
    }

    #[tokio::test]
    async fn remap_entity_id_rewrites_cache_and_queue() {
        let store = LocalStore::open_in_memory().await.unwrap();
        store.ensure_metadata("device-1").await.unwrap();

        store.put(&entity("tmp-1", "user-1", "Offline", 1000)).await.unwrap();
        store
            .enqueue(&queue_item("q-1", QueueOperation::Update, "tmp-1", 2000))
            .await
            .unwrap();

        let server_entity = entity("srv-9", "user-1", "Offline", 1000);
        store
            .remap_entity_id("activity", "tmp-1", &server_entity)
            .await
            .unwrap();

        assert!(store.get("activity", "tmp-1").await.unwrap().is_none());
        assert!(store.get("activity", "srv-9").await.unwrap().is_some());

        let snapshot = store.queue_snapshot().await.unwrap();
        assert_eq!(snapshot[0].entity_id, "srv-9");
    }

    #[tokio::test]
    async fn metadata_lifecycle() {
        let store = LocalStore::open_in_memory().await.unwrap();

        assert!(store.metadata().await.unwrap().is_none());

        let metadata = store.ensure_metadata("device-1").await.unwrap();
        assert_eq!(metadata.device_id, "device-1");
        assert!(!metadata.is_online);

        // A second ensure keeps the first device id.
        let metadata = store.ensure_metadata("device-other").await.unwrap();
        assert_eq!(metadata.device_id, "device-1");

        store
            .update_metadata(MetadataPatch {
                last_sync_at: Some(9000),
                is_online: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        let metadata = store.metadata().await.unwrap().unwrap();
        assert_eq!(metadata.last_sync_at, Some(9000));
        assert!(metadata.is_online);
    }

    #[tokio::test]
    async fn opaque_payload_roundtrip() {
        let store = LocalStore::open_in_memory().await.unwrap();

        let payload = EntityPayload::from_wire(
            "note",
            serde_json::json!({"text": "remember", "pinned": true}),
        )
        .unwrap();
        let original = Entity::new("n-1", "user-1", payload, 1000);

        store.put(&original).await.unwrap();
        let loaded = store.get("note", "n-1").await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }
}
