//! Conflict resolution.
//!
//! Resolution is a pure function of the conflict and the decision: the same
//! inputs always produce the same outcome, which is what makes re-resolving
//! an already-resolved conflict harmless.

use crate::{
    conflict::SyncConflict, entity::EntityPayload, Entity, EntityId, EntityKind, Timestamp,
};
use serde::{Deserialize, Serialize};

/// The caller's decision for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Keep the local side verbatim
    KeepLocal,
    /// Keep the remote side verbatim
    KeepRemote,
    /// Persist a caller-supplied merged payload; without one, fall back to
    /// last-write-wins on the greater timestamp
    Merge,
}

/// The entity state a resolution produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Persist and rebroadcast this entity state
    Put(Entity),
    /// The remote delete won; remove the entity
    Delete {
        entity_kind: EntityKind,
        entity_id: EntityId,
    },
}

/// Apply a resolution decision to a conflict.
///
/// `merged` is only consulted for [`Resolution::Merge`]; when absent, the
/// side with the greater timestamp wins (ties keep the local side). Merged
/// payloads are stamped with the greater of the two timestamps so repeated
/// resolution yields a bit-identical entity.
pub fn resolve(
    conflict: &SyncConflict,
    resolution: Resolution,
    merged: Option<EntityPayload>,
) -> Resolved {
    match resolution {
        Resolution::KeepLocal => Resolved::Put(side(
            conflict,
            conflict.local_payload.clone(),
            conflict.local_version,
            conflict.local_timestamp,
        )),
        Resolution::KeepRemote => match &conflict.remote_payload {
            Some(payload) => Resolved::Put(side(
                conflict,
                payload.clone(),
                conflict.remote_version,
                conflict.remote_timestamp,
            )),
            // The remote side of a DeleteEdit conflict is the delete itself.
            None => Resolved::Delete {
                entity_kind: conflict.entity_kind.clone(),
                entity_id: conflict.entity_id.clone(),
            },
        },
        Resolution::Merge => match merged {
            Some(payload) => Resolved::Put(side(
                conflict,
                payload,
                conflict.local_version.max(conflict.remote_version),
                conflict.local_timestamp.max(conflict.remote_timestamp),
            )),
            None => {
                if conflict.remote_timestamp > conflict.local_timestamp {
                    resolve(conflict, Resolution::KeepRemote, None)
                } else {
                    resolve(conflict, Resolution::KeepLocal, None)
                }
            }
        },
    }
}

fn side(
    conflict: &SyncConflict,
    payload: EntityPayload,
    version: Option<u64>,
    timestamp: Timestamp,
) -> Entity {
    Entity {
        id: conflict.entity_id.clone(),
        owner_id: conflict.owner_id.clone(),
        payload,
        version,
        created_at: timestamp,
        updated_at: timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictKind;
    use crate::entity::{ActivityFields, EntityPayload};

    fn activity(title: &str) -> EntityPayload {
        EntityPayload::Activity(ActivityFields {
            title: title.into(),
            description: None,
            category: "mentoring".into(),
            tags: vec![],
            impact_level: None,
            date: "2024-02-14".into(),
            duration_minutes: None,
        })
    }

    fn concurrent_edit(local_ts: u64, remote_ts: u64) -> SyncConflict {
        SyncConflict {
            entity_id: "act-1".into(),
            entity_kind: "activity".into(),
            owner_id: "user-1".into(),
            local_payload: activity("local"),
            remote_payload: Some(activity("remote")),
            local_timestamp: local_ts,
            remote_timestamp: remote_ts,
            local_version: Some(2),
            remote_version: Some(4),
            kind: ConflictKind::ConcurrentEdit,
        }
    }

    fn delete_edit(local_ts: u64, remote_ts: u64) -> SyncConflict {
        SyncConflict {
            entity_id: "act-1".into(),
            entity_kind: "activity".into(),
            owner_id: "user-1".into(),
            local_payload: activity("local"),
            remote_payload: None,
            local_timestamp: local_ts,
            remote_timestamp: remote_ts,
            local_version: None,
            remote_version: None,
            kind: ConflictKind::DeleteEdit,
        }
    }

    #[test]
    fn keep_local_selects_local_side_verbatim() {
        let conflict = concurrent_edit(140_000, 100_000);

        match resolve(&conflict, Resolution::KeepLocal, None) {
            Resolved::Put(entity) => {
                assert_eq!(entity.payload, activity("local"));
                assert_eq!(entity.updated_at, 140_000);
                assert_eq!(entity.version, Some(2));
            }
            other => panic!("expected put, got {:?}", other),
        }
    }

    #[test]
    fn keep_remote_selects_remote_side_verbatim() {
        let conflict = concurrent_edit(140_000, 100_000);

        match resolve(&conflict, Resolution::KeepRemote, None) {
            Resolved::Put(entity) => {
                assert_eq!(entity.payload, activity("remote"));
                assert_eq!(entity.updated_at, 100_000);
                assert_eq!(entity.version, Some(4));
            }
            other => panic!("expected put, got {:?}", other),
        }
    }

    #[test]
    fn keep_remote_on_delete_edit_deletes() {
        let conflict = delete_edit(250_000, 200_000);

        match resolve(&conflict, Resolution::KeepRemote, None) {
            Resolved::Delete {
                entity_kind,
                entity_id,
            } => {
                assert_eq!(entity_kind, "activity");
                assert_eq!(entity_id, "act-1");
            }
            other => panic!("expected delete, got {:?}", other),
        }
    }

    #[test]
    fn merge_with_payload_stamps_greater_timestamp() {
        let conflict = concurrent_edit(140_000, 100_000);
        let merged = activity("merged");

        match resolve(&conflict, Resolution::Merge, Some(merged.clone())) {
            Resolved::Put(entity) => {
                assert_eq!(entity.payload, merged);
                assert_eq!(entity.updated_at, 140_000);
                assert_eq!(entity.version, Some(4));
            }
            other => panic!("expected put, got {:?}", other),
        }
    }

    #[test]
    fn merge_without_payload_is_last_write_wins() {
        // Scenario: D1 wrote title "A" at t=100s, D2 wrote "B" at t=140s;
        // the later write wins.
        let conflict = concurrent_edit(140_000, 100_000);

        match resolve(&conflict, Resolution::Merge, None) {
            Resolved::Put(entity) => {
                assert_eq!(entity.payload, activity("local"));
                assert_eq!(entity.updated_at, 140_000);
            }
            other => panic!("expected put, got {:?}", other),
        }

        let conflict = concurrent_edit(100_000, 140_000);
        match resolve(&conflict, Resolution::Merge, None) {
            Resolved::Put(entity) => {
                assert_eq!(entity.payload, activity("remote"));
                assert_eq!(entity.updated_at, 140_000);
            }
            other => panic!("expected put, got {:?}", other),
        }
    }

    #[test]
    fn merge_fallback_on_delete_edit_honors_later_delete() {
        // Local edit is newer: keep it.
        let conflict = delete_edit(250_000, 200_000);
        assert!(matches!(
            resolve(&conflict, Resolution::Merge, None),
            Resolved::Put(_)
        ));

        // Remote delete is newer: apply it.
        let conflict = delete_edit(200_000, 250_000);
        assert!(matches!(
            resolve(&conflict, Resolution::Merge, None),
            Resolved::Delete { .. }
        ));
    }

    #[test]
    fn ties_keep_the_local_side() {
        let conflict = concurrent_edit(100_000, 100_000);

        match resolve(&conflict, Resolution::Merge, None) {
            Resolved::Put(entity) => assert_eq!(entity.payload, activity("local")),
            other => panic!("expected put, got {:?}", other),
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let conflict = concurrent_edit(140_000, 100_000);

        for decision in [Resolution::KeepLocal, Resolution::KeepRemote, Resolution::Merge] {
            let first = resolve(&conflict, decision, None);
            let second = resolve(&conflict, decision, None);
            assert_eq!(first, second);
        }
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_resolution_deterministic(
                local_ts in 1_000u64..10_000_000,
                remote_ts in 1_000u64..10_000_000,
            ) {
                let conflict = concurrent_edit(local_ts, remote_ts);

                for decision in [
                    Resolution::KeepLocal,
                    Resolution::KeepRemote,
                    Resolution::Merge,
                ] {
                    let first = resolve(&conflict, decision, None);
                    let second = resolve(&conflict, decision, None);
                    prop_assert_eq!(first, second);
                }
            }

            #[test]
            fn prop_merge_fallback_picks_greater_timestamp(
                local_ts in 1_000u64..10_000_000,
                remote_ts in 1_000u64..10_000_000,
            ) {
                let conflict = concurrent_edit(local_ts, remote_ts);

                match resolve(&conflict, Resolution::Merge, None) {
                    Resolved::Put(entity) => {
                        prop_assert_eq!(entity.updated_at, local_ts.max(remote_ts));
                        let expected = if remote_ts > local_ts {
                            activity("remote")
                        } else {
                            activity("local")
                        };
                        prop_assert_eq!(entity.payload, expected);
                    }
                    other => prop_assert!(false, "expected put, got {:?}", other),
                }
            }
        }
    }
}
