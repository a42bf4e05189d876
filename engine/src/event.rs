//! Wire events exchanged between devices.
//!
//! One JSON object per message. Events are immutable once constructed:
//! produced on every local mutation (outbound) and consumed on every
//! inbound message.

use crate::{
    entity::EntityPayload, error::Result, DeviceId, Entity, EntityId, EntityKind, Error, OwnerId,
    Timestamp,
};
use serde::{Deserialize, Serialize};

/// The type of a sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An entity was created
    Created,
    /// An entity was updated
    Updated,
    /// An entity was deleted
    Deleted,
    /// A device asks the relay for a full snapshot of the account
    SyncRequest,
    /// The snapshot answering a sync request
    SyncResponse,
}

impl EventType {
    /// Whether this event mutates a single entity.
    pub fn is_change(&self) -> bool {
        matches!(self, EventType::Created | EventType::Updated | EventType::Deleted)
    }
}

/// A single message on the sync wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub entity_kind: EntityKind,
    #[serde(default)]
    pub entity_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Milliseconds since epoch
    pub timestamp: Timestamp,
    #[serde(rename = "userId")]
    pub owner_id: OwnerId,
    pub device_id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

/// The body of a `sync_response` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub entities: Vec<Entity>,
}

impl SyncEvent {
    /// Build a `created` event announcing a new entity.
    pub fn created(entity: &Entity, device_id: impl Into<DeviceId>) -> Self {
        Self::change(EventType::Created, entity, device_id)
    }

    /// Build an `updated` event carrying the entity's current state.
    pub fn updated(entity: &Entity, device_id: impl Into<DeviceId>) -> Self {
        Self::change(EventType::Updated, entity, device_id)
    }

    fn change(event_type: EventType, entity: &Entity, device_id: impl Into<DeviceId>) -> Self {
        Self {
            event_type,
            entity_kind: entity.kind().to_string(),
            entity_id: entity.id.clone(),
            data: Some(entity.payload.to_value()),
            timestamp: entity.updated_at,
            owner_id: entity.owner_id.clone(),
            device_id: device_id.into(),
            version: entity.version,
        }
    }

    /// Build a `deleted` event for an entity that no longer exists locally.
    pub fn deleted(
        entity_kind: impl Into<EntityKind>,
        entity_id: impl Into<EntityId>,
        owner_id: impl Into<OwnerId>,
        device_id: impl Into<DeviceId>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            event_type: EventType::Deleted,
            entity_kind: entity_kind.into(),
            entity_id: entity_id.into(),
            data: None,
            timestamp,
            owner_id: owner_id.into(),
            device_id: device_id.into(),
            version: None,
        }
    }

    /// Build a `sync_request` event asking for a full account snapshot.
    pub fn sync_request(
        owner_id: impl Into<OwnerId>,
        device_id: impl Into<DeviceId>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            event_type: EventType::SyncRequest,
            entity_kind: EntityKind::new(),
            entity_id: EntityId::new(),
            data: None,
            timestamp,
            owner_id: owner_id.into(),
            device_id: device_id.into(),
            version: None,
        }
    }

    /// Build a `sync_response` event carrying a full account snapshot.
    pub fn sync_response(
        entities: Vec<Entity>,
        owner_id: impl Into<OwnerId>,
        device_id: impl Into<DeviceId>,
        timestamp: Timestamp,
    ) -> Self {
        let snapshot = SyncSnapshot { entities };
        Self {
            event_type: EventType::SyncResponse,
            entity_kind: EntityKind::new(),
            entity_id: EntityId::new(),
            data: serde_json::to_value(&snapshot).ok(),
            timestamp,
            owner_id: owner_id.into(),
            device_id: device_id.into(),
            version: None,
        }
    }

    /// Decode this event's `data` by its entity kind.
    ///
    /// Returns `None` when the event carries no payload (deletes).
    pub fn payload(&self) -> Result<Option<EntityPayload>> {
        match &self.data {
            Some(data) => EntityPayload::from_wire(&self.entity_kind, data.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Decode this event's `data`, erroring when a change event omits it.
    pub fn require_payload(&self) -> Result<EntityPayload> {
        self.payload()?
            .ok_or_else(|| Error::MissingPayload(self.entity_id.clone()))
    }

    /// Decode the snapshot of a `sync_response` event.
    pub fn snapshot(&self) -> Result<SyncSnapshot> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| Error::MalformedSnapshot("missing body".into()))?;
        serde_json::from_value(data).map_err(|e| Error::MalformedSnapshot(e.to_string()))
    }
}
