//! # Tether Engine
//!
//! Deterministic core of the Tether offline-first sync client.
//!
//! This crate holds the pure logic of the synchronization protocol: the
//! entity model, the wire events exchanged between devices, the pending
//! operation queue types, and conflict detection/resolution. Everything
//! here is deterministic - the same inputs always produce the same outputs.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of files, network, or clocks
//! - **Deterministic**: same inputs always produce same outputs
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Entities
//!
//! Synchronized data is modeled as entities identified by `(kind, id)`:
//! - Opaque stable ID (server- or client-assigned)
//! - Owning account
//! - Typed payload keyed by entity kind ([`EntityPayload`])
//! - Wall-clock timestamps in milliseconds (`updated_at` is non-decreasing
//!   across a single device's writes to the same id)
//!
//! ### Events
//!
//! Devices exchange [`SyncEvent`]s over a relay: `created`, `updated`,
//! `deleted` change events plus the `sync_request`/`sync_response` pair used
//! for full resyncs. Every event carries the originating `device_id` so a
//! device can discard echoes of its own writes.
//!
//! ### Conflicts
//!
//! The [`ConflictDetector`] classifies an incoming event against the local
//! copy of the same entity. Divergence beyond a configurable tolerance
//! window becomes a [`SyncConflict`], resolved by [`resolve`] with a
//! [`Resolution`] decision (keep local, keep remote, or merge with a
//! last-write-wins fallback).
//!
//! ## Quick Start
//!
//! ```rust
//! use tether_engine::{
//!     ActivityFields, ConflictDetector, Entity, EntityPayload, SyncEvent,
//! };
//!
//! let payload = EntityPayload::Activity(ActivityFields {
//!     title: "Quarterly review".into(),
//!     description: None,
//!     category: "customer_engagement".into(),
//!     tags: vec![],
//!     impact_level: Some(3),
//!     date: "2024-03-01".into(),
//!     duration_minutes: Some(60),
//! });
//! let local = Entity::new("act-1", "user-1", payload, 1_706_745_600_000);
//!
//! // An event stamped with the entity's own timestamp is an echo of the
//! // same write and never classifies as a conflict.
//! let remote = SyncEvent::updated(&local, "device-2");
//! let detector = ConflictDetector::default();
//! assert!(detector.detect(Some(&local), &remote).unwrap().is_none());
//! ```

pub mod conflict;
pub mod entity;
pub mod error;
pub mod event;
pub mod queue;
pub mod resolve;

// Re-export main types at crate root
pub use conflict::{ConflictDetector, ConflictKind, SyncConflict, DEFAULT_TOLERANCE_MS};
pub use entity::{ActivityFields, Entity, EntityPayload, StoryFields, ACTIVITY_KIND, STORY_KIND};
pub use error::Error;
pub use event::{EventType, SyncEvent, SyncSnapshot};
pub use queue::{EngineMetadata, MetadataPatch, QueueOperation, SyncQueueItem};
pub use resolve::{resolve, Resolution, Resolved};

/// Type aliases for clarity
pub type EntityId = String;
pub type EntityKind = String;
pub type OwnerId = String;
pub type DeviceId = String;
pub type Timestamp = u64;
