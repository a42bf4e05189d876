//! # Tether Client
//!
//! Offline-first, multi-device sync client for Tether.
//!
//! The client keeps a durable local cache of the account's entities, queues
//! every local mutation until the remote entity API acknowledges it, and
//! exchanges change events with the account's other devices over a
//! reconnecting WebSocket relay. Concurrent edits made while devices were
//! apart are detected by the deterministic core in `tether-engine` and
//! surfaced as conflicts for the caller to resolve.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tether_client::{
//!     ConnectivityMonitor, HttpEntityApi, LocalStore, SyncConfig, SyncOrchestrator,
//! };
//! use tether_engine::QueueOperation;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::new("wss://relay.example.com/sync", "https://api.example.com");
//!     let store = LocalStore::open("tether.db").await?;
//!     let api = Arc::new(HttpEntityApi::new("https://api.example.com", "token"));
//!     let connectivity = ConnectivityMonitor::new();
//!
//!     let engine = SyncOrchestrator::new(config, store, api, &connectivity).await?;
//!     engine.initialize("user-1", "token").await?;
//!
//!     // Mutations are written locally first and synced when possible.
//!     engine
//!         .add_to_queue(
//!             QueueOperation::Create,
//!             "activity",
//!             "tmp-1",
//!             Some(serde_json::json!({
//!                 "title": "Architecture review",
//!                 "category": "technical_consultation",
//!                 "date": "2024-03-07"
//!             })),
//!         )
//!         .await?;
//!
//!     // The host reports reachability; a reachable edge triggers a queue
//!     // drain and a full resync.
//!     connectivity.handle().set_online(true);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod orchestrator;
pub mod store;
pub mod subscribers;
pub mod transport;

pub use api::{EntityApi, HttpEntityApi};
pub use config::{ConfigError, SyncConfig};
pub use connectivity::{ConnectivityHandle, ConnectivityMonitor};
pub use error::{Result, SyncError};
pub use orchestrator::{SyncOrchestrator, SyncPhase, SyncStatus};
pub use store::LocalStore;
pub use subscribers::{OperationFailure, SubscriptionId};
pub use transport::{SyncTransport, TransportStatus};
