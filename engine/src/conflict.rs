//! Conflict detection between a local entity and an incoming event.
//!
//! Detection is a pure classification: given the local copy of an entity
//! (if any) and an incoming change event for the same `(kind, id)`, decide
//! whether applying the event would silently discard local work.
//!
//! # Rules
//!
//! 1. No local copy: never a conflict (first sync, fresh create).
//! 2. Event timestamp equals the local `updated_at`: an echo of the same
//!    write, never a conflict.
//! 3. Incoming delete while the local copy was edited *after* the delete
//!    was issued: `DeleteEdit` (deleting would destroy newer local work).
//! 4. Incoming change based on an older server revision than the local
//!    copy holds: `VersionMismatch`.
//! 5. Incoming create/update whose timestamp diverges from the local
//!    `updated_at` by more than the tolerance window: `ConcurrentEdit`.
//!    The window absorbs clock skew and propagation jitter so that
//!    near-simultaneous edits are not all flagged.
//! 6. Anything else applies directly; a genuinely later remote write is
//!    the common case.

use crate::{
    entity::EntityPayload, error::Result, Entity, EntityId, EntityKind, EventType, OwnerId,
    SyncEvent, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Default divergence tolerance, in milliseconds.
pub const DEFAULT_TOLERANCE_MS: u64 = 1_000;

/// How a local entity and an incoming event diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    /// Both sides edited the entity while apart
    ConcurrentEdit,
    /// The remote side deleted an entity the local side has since edited
    DeleteEdit,
    /// The incoming event was produced against a stale server revision
    VersionMismatch,
}

/// A detected divergence awaiting a resolution decision.
///
/// Lives in the orchestrator's pending set from detection until resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub entity_id: EntityId,
    pub entity_kind: EntityKind,
    pub owner_id: OwnerId,
    /// Local side of the divergence
    pub local_payload: EntityPayload,
    /// Remote side; absent when the remote operation was a delete
    pub remote_payload: Option<EntityPayload>,
    /// Local `updated_at`
    pub local_timestamp: Timestamp,
    /// Incoming event timestamp
    pub remote_timestamp: Timestamp,
    pub local_version: Option<u64>,
    pub remote_version: Option<u64>,
    pub kind: ConflictKind,
}

impl SyncConflict {
    /// The pending-set key for this conflict.
    pub fn key(&self) -> (EntityKind, EntityId) {
        (self.entity_kind.clone(), self.entity_id.clone())
    }
}

/// Pure conflict classifier with a configurable tolerance window.
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector {
    tolerance_ms: u64,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_MS)
    }
}

impl ConflictDetector {
    /// Create a detector with the given tolerance window in milliseconds.
    pub fn new(tolerance_ms: u64) -> Self {
        Self { tolerance_ms }
    }

    /// Classify an incoming event against the local copy of its entity.
    ///
    /// Returns `Ok(None)` when the event can be applied directly. Errors
    /// only on undecodable payloads (a protocol failure the caller drops
    /// and logs).
    pub fn detect(&self, local: Option<&Entity>, incoming: &SyncEvent) -> Result<Option<SyncConflict>> {
        let local = match local {
            Some(local) => local,
            None => return Ok(None),
        };

        if !incoming.event_type.is_change() {
            return Ok(None);
        }

        // Exact-equal timestamps are an echo of the write we already hold.
        if incoming.timestamp == local.updated_at {
            return Ok(None);
        }

        match incoming.event_type {
            EventType::Deleted => {
                if local.updated_at > incoming.timestamp {
                    Ok(Some(self.conflict(local, incoming, None, ConflictKind::DeleteEdit)))
                } else {
                    Ok(None)
                }
            }
            EventType::Created | EventType::Updated => {
                let remote_payload = incoming.require_payload()?;

                if let (Some(local_version), Some(remote_version)) =
                    (local.version, incoming.version)
                {
                    if remote_version < local_version {
                        return Ok(Some(self.conflict(
                            local,
                            incoming,
                            Some(remote_payload),
                            ConflictKind::VersionMismatch,
                        )));
                    }
                }

                if local.updated_at.abs_diff(incoming.timestamp) > self.tolerance_ms {
                    Ok(Some(self.conflict(
                        local,
                        incoming,
                        Some(remote_payload),
                        ConflictKind::ConcurrentEdit,
                    )))
                } else {
                    Ok(None)
                }
            }
            EventType::SyncRequest | EventType::SyncResponse => Ok(None),
        }
    }

    fn conflict(
        &self,
        local: &Entity,
        incoming: &SyncEvent,
        remote_payload: Option<EntityPayload>,
        kind: ConflictKind,
    ) -> SyncConflict {
        SyncConflict {
            entity_id: local.id.clone(),
            entity_kind: local.kind().to_string(),
            owner_id: local.owner_id.clone(),
            local_payload: local.payload.clone(),
            remote_payload,
            local_timestamp: local.updated_at,
            remote_timestamp: incoming.timestamp,
            local_version: local.version,
            remote_version: incoming.version,
            kind,
        }
    }
}
