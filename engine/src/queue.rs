//! Pending-operation queue and engine metadata types.
//!
//! Every local mutation is recorded as a queue item until the remote entity
//! API acknowledges it. The queue is the only record of un-acknowledged
//! local intent; it must survive restarts and cache clears.

use crate::{entity::EntityPayload, DeviceId, EntityId, EntityKind, Error, Timestamp};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The remote CRUD operation a queue item maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOperation {
    Create,
    Update,
    Delete,
}

impl QueueOperation {
    /// Stable string form, used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueOperation::Create => "create",
            QueueOperation::Update => "update",
            QueueOperation::Delete => "delete",
        }
    }
}

impl FromStr for QueueOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(QueueOperation::Create),
            "update" => Ok(QueueOperation::Update),
            "delete" => Ok(QueueOperation::Delete),
            other => Err(Error::UnknownOperation(other.to_string())),
        }
    }
}

/// A local mutation waiting for remote acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    /// Unique identifier of this queue entry
    pub queue_id: String,
    /// The remote operation to perform
    pub operation: QueueOperation,
    /// Target entity kind
    pub entity_kind: EntityKind,
    /// Target entity id (possibly a temporary client-assigned one)
    pub entity_id: EntityId,
    /// Payload for create/update; absent for deletes
    pub payload: Option<EntityPayload>,
    /// When the mutation was made locally (milliseconds since epoch)
    pub enqueued_at: Timestamp,
    /// Recorded remote failures; the item is dropped at the ceiling
    pub retry_count: u32,
}

impl SyncQueueItem {
    /// Create a fresh queue item with zero recorded failures.
    pub fn new(
        queue_id: impl Into<String>,
        operation: QueueOperation,
        entity_kind: impl Into<EntityKind>,
        entity_id: impl Into<EntityId>,
        payload: Option<EntityPayload>,
        enqueued_at: Timestamp,
    ) -> Self {
        Self {
            queue_id: queue_id.into(),
            operation,
            entity_kind: entity_kind.into(),
            entity_id: entity_id.into(),
            payload,
            enqueued_at,
            retry_count: 0,
        }
    }
}

/// Process-wide engine state, persisted so it survives restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMetadata {
    /// Stable per-installation device identifier, minted at first launch
    pub device_id: DeviceId,
    /// When the last full sync completed
    pub last_sync_at: Option<Timestamp>,
    /// Current reachability as last reported by the connectivity monitor
    pub is_online: bool,
    /// Number of queue items awaiting acknowledgement
    pub pending_sync_count: u64,
}

impl EngineMetadata {
    /// Metadata for a first launch: offline, empty queue, never synced.
    pub fn first_launch(device_id: impl Into<DeviceId>) -> Self {
        Self {
            device_id: device_id.into(),
            last_sync_at: None,
            is_online: false,
            pending_sync_count: 0,
        }
    }

    /// Apply a partial update, leaving unset fields untouched.
    pub fn apply(&mut self, patch: MetadataPatch) {
        if let Some(last_sync_at) = patch.last_sync_at {
            self.last_sync_at = Some(last_sync_at);
        }
        if let Some(is_online) = patch.is_online {
            self.is_online = is_online;
        }
        if let Some(pending) = patch.pending_sync_count {
            self.pending_sync_count = pending;
        }
    }
}

/// Partial update for [`EngineMetadata`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub last_sync_at: Option<Timestamp>,
    pub is_online: Option<bool>,
    pub pending_sync_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_string_roundtrip() {
        for op in [
            QueueOperation::Create,
            QueueOperation::Update,
            QueueOperation::Delete,
        ] {
            assert_eq!(op.as_str().parse::<QueueOperation>().unwrap(), op);
        }

        assert!(matches!(
            "upsert".parse::<QueueOperation>(),
            Err(Error::UnknownOperation(_))
        ));
    }

    #[test]
    fn new_item_starts_with_zero_retries() {
        let item = SyncQueueItem::new(
            "q-1",
            QueueOperation::Delete,
            "activity",
            "act-1",
            None,
            1000,
        );

        assert_eq!(item.retry_count, 0);
        assert_eq!(item.operation, QueueOperation::Delete);
        assert!(item.payload.is_none());
    }

    #[test]
    fn metadata_first_launch() {
        let metadata = EngineMetadata::first_launch("device-1");

        assert_eq!(metadata.device_id, "device-1");
        assert_eq!(metadata.last_sync_at, None);
        assert!(!metadata.is_online);
        assert_eq!(metadata.pending_sync_count, 0);
    }

    #[test]
    fn metadata_patch_leaves_unset_fields() {
        let mut metadata = EngineMetadata::first_launch("device-1");
        metadata.apply(MetadataPatch {
            is_online: Some(true),
            ..Default::default()
        });

        assert!(metadata.is_online);
        assert_eq!(metadata.last_sync_at, None);
        assert_eq!(metadata.pending_sync_count, 0);

        metadata.apply(MetadataPatch {
            last_sync_at: Some(9000),
            pending_sync_count: Some(3),
            ..Default::default()
        });

        assert!(metadata.is_online);
        assert_eq!(metadata.last_sync_at, Some(9000));
        assert_eq!(metadata.pending_sync_count, 3);
    }

    #[test]
    fn queue_item_serialization() {
        let item = SyncQueueItem::new(
            "q-1",
            QueueOperation::Create,
            "activity",
            "tmp-1",
            None,
            1000,
        );

        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"operation\":\"create\""));
        assert!(json.contains("\"queueId\":\"q-1\""));

        let parsed: SyncQueueItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, parsed);
    }
}
