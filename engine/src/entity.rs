//! Entity types synchronized by the engine.

use crate::{error::Result, EntityId, Error, OwnerId, Timestamp};
use serde::{Deserialize, Serialize};

/// Kind tag for activity entities.
pub const ACTIVITY_KIND: &str = "activity";
/// Kind tag for story entities.
pub const STORY_KIND: &str = "story";

/// Domain fields of an activity entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFields {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_level: Option<u8>,
    /// ISO date of the activity; the engine never interprets it.
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

/// Domain fields of a story entity (STAR format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryFields {
    pub title: String,
    pub situation: String,
    pub task: String,
    pub action: String,
    pub result: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: String,
}

/// The payload of an entity, keyed by its kind.
///
/// Known kinds carry strongly-typed fields; anything else rides along as an
/// opaque JSON value the engine replicates without interpreting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PayloadWire", into = "PayloadWire")]
pub enum EntityPayload {
    Activity(ActivityFields),
    Story(StoryFields),
    Opaque {
        kind: String,
        data: serde_json::Value,
    },
}

impl EntityPayload {
    /// The entity kind this payload belongs to.
    pub fn kind(&self) -> &str {
        match self {
            EntityPayload::Activity(_) => ACTIVITY_KIND,
            EntityPayload::Story(_) => STORY_KIND,
            EntityPayload::Opaque { kind, .. } => kind,
        }
    }

    /// Decode a payload from its wire form `(entityKind, data)`.
    ///
    /// A malformed body for a *known* kind is a protocol error; unknown
    /// kinds fall back to [`EntityPayload::Opaque`].
    pub fn from_wire(kind: &str, data: serde_json::Value) -> Result<Self> {
        match kind {
            ACTIVITY_KIND => serde_json::from_value(data)
                .map(EntityPayload::Activity)
                .map_err(|e| Error::MalformedPayload {
                    kind: kind.to_string(),
                    reason: e.to_string(),
                }),
            STORY_KIND => serde_json::from_value(data)
                .map(EntityPayload::Story)
                .map_err(|e| Error::MalformedPayload {
                    kind: kind.to_string(),
                    reason: e.to_string(),
                }),
            other => Ok(EntityPayload::Opaque {
                kind: other.to_string(),
                data,
            }),
        }
    }

    /// The wire form of this payload's domain fields.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            EntityPayload::Activity(fields) => {
                serde_json::to_value(fields).unwrap_or(serde_json::Value::Null)
            }
            EntityPayload::Story(fields) => {
                serde_json::to_value(fields).unwrap_or(serde_json::Value::Null)
            }
            EntityPayload::Opaque { data, .. } => data.clone(),
        }
    }
}

/// Serde proxy: payloads serialize as `{entityKind, data}`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayloadWire {
    entity_kind: String,
    data: serde_json::Value,
}

impl TryFrom<PayloadWire> for EntityPayload {
    type Error = Error;

    fn try_from(wire: PayloadWire) -> Result<Self> {
        EntityPayload::from_wire(&wire.entity_kind, wire.data)
    }
}

impl From<EntityPayload> for PayloadWire {
    fn from(payload: EntityPayload) -> Self {
        PayloadWire {
            entity_kind: payload.kind().to_string(),
            data: payload.to_value(),
        }
    }
}

/// A record synchronized by the engine, identified by `(kind, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EntityWire", into = "EntityWire")]
pub struct Entity {
    /// Opaque stable identifier, server- or client-assigned
    pub id: EntityId,
    /// Owning account
    pub owner_id: OwnerId,
    /// Typed domain payload
    pub payload: EntityPayload,
    /// Server revision, when the server has assigned one
    pub version: Option<u64>,
    /// Creation time (milliseconds since epoch)
    pub created_at: Timestamp,
    /// Last update time; non-decreasing across one device's writes
    pub updated_at: Timestamp,
}

impl Entity {
    /// Create a new entity with `created_at == updated_at`.
    pub fn new(
        id: impl Into<EntityId>,
        owner_id: impl Into<OwnerId>,
        payload: EntityPayload,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            payload,
            version: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// The entity kind, taken from the payload.
    pub fn kind(&self) -> &str {
        self.payload.kind()
    }

    /// Replace the payload, keeping `updated_at` non-decreasing.
    pub fn apply_update(&mut self, payload: EntityPayload, timestamp: Timestamp) {
        self.payload = payload;
        self.updated_at = self.updated_at.max(timestamp);
    }
}

/// Serde proxy: entities serialize as
/// `{id, ownerId, entityKind, data, version?, createdAt, updatedAt}`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityWire {
    id: String,
    owner_id: String,
    entity_kind: String,
    data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u64>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<EntityWire> for Entity {
    type Error = Error;

    fn try_from(wire: EntityWire) -> Result<Self> {
        Ok(Entity {
            id: wire.id,
            owner_id: wire.owner_id,
            payload: EntityPayload::from_wire(&wire.entity_kind, wire.data)?,
            version: wire.version,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

impl From<Entity> for EntityWire {
    fn from(entity: Entity) -> Self {
        EntityWire {
            entity_kind: entity.kind().to_string(),
            data: entity.payload.to_value(),
            id: entity.id,
            owner_id: entity.owner_id,
            version: entity.version,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity() -> EntityPayload {
        EntityPayload::Activity(ActivityFields {
            title: "Customer workshop".into(),
            description: Some("Half-day onboarding session".into()),
            category: "customer_engagement".into(),
            tags: vec!["onboarding".into()],
            impact_level: Some(4),
            date: "2024-02-01".into(),
            duration_minutes: Some(240),
        })
    }

    #[test]
    fn create_entity() {
        let entity = Entity::new("act-1", "user-1", activity(), 1000);

        assert_eq!(entity.id, "act-1");
        assert_eq!(entity.owner_id, "user-1");
        assert_eq!(entity.kind(), ACTIVITY_KIND);
        assert_eq!(entity.created_at, 1000);
        assert_eq!(entity.updated_at, 1000);
        assert_eq!(entity.version, None);
    }

    #[test]
    fn apply_update_keeps_updated_at_monotonic() {
        let mut entity = Entity::new("act-1", "user-1", activity(), 2000);

        // A stale clock must not move updated_at backwards.
        entity.apply_update(activity(), 1500);
        assert_eq!(entity.updated_at, 2000);

        entity.apply_update(activity(), 3000);
        assert_eq!(entity.updated_at, 3000);
    }

    #[test]
    fn payload_from_wire_known_kind() {
        let data = json!({
            "title": "Demo",
            "category": "speaking",
            "date": "2024-01-15"
        });

        let payload = EntityPayload::from_wire(ACTIVITY_KIND, data).unwrap();
        match payload {
            EntityPayload::Activity(fields) => {
                assert_eq!(fields.title, "Demo");
                assert!(fields.tags.is_empty());
                assert_eq!(fields.duration_minutes, None);
            }
            other => panic!("expected activity, got {:?}", other),
        }
    }

    #[test]
    fn payload_from_wire_malformed_known_kind() {
        // Known kind with a missing required field is a protocol error,
        // not a silent opaque fallback.
        let result = EntityPayload::from_wire(ACTIVITY_KIND, json!({"category": "learning"}));
        assert!(matches!(result, Err(Error::MalformedPayload { .. })));
    }

    #[test]
    fn payload_from_wire_unknown_kind_is_opaque() {
        let data = json!({"anything": [1, 2, 3]});
        let payload = EntityPayload::from_wire("bookmark", data.clone()).unwrap();

        assert_eq!(payload.kind(), "bookmark");
        assert_eq!(payload.to_value(), data);
    }

    #[test]
    fn story_wire_roundtrip() {
        let payload = EntityPayload::Story(StoryFields {
            title: "Latency regression".into(),
            situation: "Checkout p99 doubled".into(),
            task: "Find the regression".into(),
            action: "Bisected the release".into(),
            result: "Rolled back, p99 restored".into(),
            tags: vec!["incident".into()],
            status: "complete".into(),
        });

        let value = payload.to_value();
        let parsed = EntityPayload::from_wire(STORY_KIND, value).unwrap();
        assert_eq!(payload, parsed);
    }

    #[test]
    fn entity_serialization_format() {
        let entity = Entity::new("act-1", "user-1", activity(), 1000);
        let json = serde_json::to_string(&entity).unwrap();

        assert!(json.contains("\"entityKind\":\"activity\""));
        assert!(json.contains("\"ownerId\":\"user-1\""));
        assert!(json.contains("\"createdAt\":1000"));
        assert!(!json.contains("\"version\""));
    }

    #[test]
    fn entity_serialization_roundtrip() {
        let mut entity = Entity::new("act-1", "user-1", activity(), 1000);
        entity.version = Some(7);

        let json = serde_json::to_string(&entity).unwrap();
        let parsed: Entity = serde_json::from_str(&json).unwrap();

        assert_eq!(entity, parsed);
    }
}
