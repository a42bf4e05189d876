//! Sync orchestrator - the engine's top-level coordinator.
//!
//! Owns the durable store, the transport, and the conflict pipeline. Local
//! mutations are written optimistically and queued; the queue drains
//! against the remote entity API whenever connectivity allows. Inbound
//! events are classified by the conflict detector and either applied
//! directly or parked for resolution - conflicts never block the sync loop.
//!
//! The orchestrator is an explicitly owned context object: all lifecycle
//! ([`SyncOrchestrator::initialize`], [`SyncOrchestrator::disconnect`]) is
//! explicit and there is no global state.

use crate::api::EntityApi;
use crate::clock;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Result, SyncError};
use crate::store::LocalStore;
use crate::subscribers::{OperationFailure, Subscribers, SubscriptionId};
use crate::transport::{SyncTransport, TransportStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tether_engine::{
    resolve, ConflictDetector, Entity, EntityPayload, EventType, MetadataPatch, QueueOperation,
    Resolution, Resolved, SyncConflict, SyncEvent, SyncQueueItem,
};
use tokio::sync::{mpsc, watch, Mutex};

/// Phase of the orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Connecting,
    /// A full sync is being requested or merged
    Syncing,
    DrainingQueue,
    /// The transport exhausted its reconnect attempts; draining resumes on
    /// the next reachable connectivity edge
    Degraded,
}

/// Caller-visible engine status.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// Whether the transport currently holds a relay connection
    pub connected: bool,
    /// Reachability as last reported by the connectivity monitor
    pub is_online: bool,
    /// Queue items awaiting acknowledgement
    pub pending_operations: u64,
    /// Conflicts parked for resolution; never blocks the sync loop
    pub has_pending_conflicts: bool,
}

#[derive(Clone)]
struct Session {
    owner_id: String,
    credential: String,
}

/// Result of pushing one queue item to the remote API.
enum PushOutcome {
    /// Acknowledged; the entity now lives under this id
    Acked { entity_id: String },
    /// Delete acknowledged
    AckedDelete,
    /// Failed and dropped at the retry ceiling
    Dropped,
    /// Failed; will retry on the next drain
    Retrying,
}

/// Top-level coordinator of the sync engine.
pub struct SyncOrchestrator {
    config: SyncConfig,
    store: LocalStore,
    api: Arc<dyn EntityApi>,
    transport: SyncTransport,
    detector: ConflictDetector,
    device_id: String,
    session: StdMutex<Option<Session>>,
    inbound_rx: StdMutex<Option<mpsc::UnboundedReceiver<SyncEvent>>>,
    connectivity_rx: watch::Receiver<bool>,
    conflicts: StdMutex<HashMap<(String, String), SyncConflict>>,
    subscribers: Subscribers,
    status_tx: watch::Sender<SyncStatus>,
    status_rx: watch::Receiver<SyncStatus>,
    drain_lock: Mutex<()>,
    started: AtomicBool,
}

impl SyncOrchestrator {
    /// Build an orchestrator over an opened store.
    ///
    /// Mints the stable device id on first launch and persists it in the
    /// store's metadata singleton.
    pub async fn new(
        config: SyncConfig,
        store: LocalStore,
        api: Arc<dyn EntityApi>,
        connectivity: &ConnectivityMonitor,
    ) -> Result<Arc<Self>> {
        let metadata = store
            .ensure_metadata(&uuid::Uuid::new_v4().to_string())
            .await?;
        let device_id = metadata.device_id.clone();

        let (transport, inbound_rx) = SyncTransport::new(
            config.relay_url.clone(),
            device_id.clone(),
            config.reconnect_base_delay,
            config.max_reconnect_attempts,
        );

        let (status_tx, status_rx) = watch::channel(SyncStatus {
            phase: SyncPhase::Idle,
            connected: false,
            is_online: connectivity.is_online(),
            pending_operations: metadata.pending_sync_count,
            has_pending_conflicts: false,
        });

        let detector = ConflictDetector::new(config.tolerance_ms);

        Ok(Arc::new(Self {
            config,
            store,
            api,
            transport,
            detector,
            device_id,
            session: StdMutex::new(None),
            inbound_rx: StdMutex::new(Some(inbound_rx)),
            connectivity_rx: connectivity.subscribe(),
            conflicts: StdMutex::new(HashMap::new()),
            subscribers: Subscribers::new(),
            status_tx,
            status_rx,
            drain_lock: Mutex::new(()),
            started: AtomicBool::new(false),
        }))
    }

    /// Start syncing for an account.
    ///
    /// Connects the transport with the given bearer credential and starts
    /// the engine's background loops. Calling again after a disconnect
    /// reconnects with the new credential.
    pub async fn initialize(self: &Arc<Self>, user_id: &str, credential: &str) -> Result<()> {
        *self.session.lock().unwrap() = Some(Session {
            owner_id: user_id.to_string(),
            credential: credential.to_string(),
        });

        self.set_phase(SyncPhase::Connecting);
        self.transport.connect(credential)?;

        if !self.started.swap(true, Ordering::SeqCst) {
            let weak = Arc::downgrade(self);
            if let Some(rx) = self.inbound_rx.lock().unwrap().take() {
                tokio::spawn(inbound_loop(weak.clone(), rx));
            }
            tokio::spawn(transport_watcher(weak.clone(), self.transport.status()));
            tokio::spawn(connectivity_watcher(weak, self.connectivity_rx.clone()));
        }

        Ok(())
    }

    /// The stable per-installation device identifier.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The durable local store (read access for hosts).
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Watch the engine status.
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to applied remote change events.
    pub fn subscribe_events(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<SyncEvent>) {
        self.subscribers.subscribe_events()
    }

    /// Subscribe to detected conflicts.
    pub fn subscribe_conflicts(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<SyncConflict>) {
        self.subscribers.subscribe_conflicts()
    }

    /// Subscribe to terminal operation failures.
    pub fn subscribe_failures(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<OperationFailure>) {
        self.subscribers.subscribe_failures()
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: &str) {
        self.subscribers.unsubscribe(id)
    }

    /// Snapshot of the conflicts currently awaiting resolution.
    pub fn pending_conflicts(&self) -> Vec<SyncConflict> {
        self.conflicts.lock().unwrap().values().cloned().collect()
    }

    /// Record a local mutation: optimistic store write plus a queue entry.
    ///
    /// The queue drains immediately when the transport is connected;
    /// otherwise the entry waits for the next reachable edge.
    pub async fn add_to_queue(
        &self,
        operation: QueueOperation,
        entity_kind: &str,
        entity_id: &str,
        data: Option<serde_json::Value>,
    ) -> Result<()> {
        let owner = self.owner()?;
        let now = clock::now_ms();

        let payload = match operation {
            QueueOperation::Delete => None,
            QueueOperation::Create | QueueOperation::Update => {
                let data = data.ok_or_else(|| {
                    SyncError::Engine(tether_engine::Error::MissingPayload(entity_id.to_string()))
                })?;
                Some(EntityPayload::from_wire(entity_kind, data)?)
            }
        };

        // Optimistic local write; the queue entry is what guarantees the
        // remote eventually matches.
        match &payload {
            Some(payload) => {
                let entity = match self.store.get(entity_kind, entity_id).await? {
                    Some(mut existing) => {
                        existing.apply_update(payload.clone(), now);
                        existing
                    }
                    None => Entity::new(entity_id, owner, payload.clone(), now),
                };
                self.store.put(&entity).await?;
            }
            None => {
                self.store.delete_entity(entity_kind, entity_id).await?;
            }
        }

        let item = SyncQueueItem::new(
            uuid::Uuid::new_v4().to_string(),
            operation,
            entity_kind,
            entity_id,
            payload,
            now,
        );
        self.store.enqueue(&item).await?;
        self.refresh_pending_count().await?;

        tracing::debug!(
            entity_kind,
            entity_id,
            operation = operation.as_str(),
            "queued local mutation"
        );

        if self.is_connected() {
            if let Err(e) = self.drain_queue().await {
                tracing::warn!("queue drain after mutation failed: {}", e);
            }
        }

        Ok(())
    }

    /// Drain the pending-operation queue against the remote API.
    ///
    /// Items targeting the same entity are pushed strictly in enqueue
    /// order; distinct entities drain concurrently.
    pub async fn drain_queue(&self) -> Result<()> {
        let _guard = self.drain_lock.lock().await;

        let snapshot = self.store.queue_snapshot().await?;
        if snapshot.is_empty() {
            return Ok(());
        }

        self.set_phase(SyncPhase::DrainingQueue);
        tracing::info!(items = snapshot.len(), "draining pending operations");

        let mut groups: Vec<Vec<SyncQueueItem>> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        for item in snapshot {
            let key = (item.entity_kind.clone(), item.entity_id.clone());
            match index.get(&key) {
                Some(&position) => groups[position].push(item),
                None => {
                    index.insert(key, groups.len());
                    groups.push(vec![item]);
                }
            }
        }

        let results = futures::future::join_all(
            groups
                .into_iter()
                .map(|group| self.drain_entity_group(group)),
        )
        .await;

        self.set_phase(SyncPhase::Idle);
        self.refresh_pending_count().await?;

        for result in results {
            result?;
        }
        Ok(())
    }

    async fn drain_entity_group(&self, items: Vec<SyncQueueItem>) -> Result<()> {
        // The server may hand out a permanent id partway through the
        // group; later items must follow it.
        let mut current_id: Option<String> = None;

        for mut item in items {
            if let Some(id) = &current_id {
                item.entity_id = id.clone();
            }

            match self.push_item(&item).await? {
                PushOutcome::Acked { entity_id } => current_id = Some(entity_id),
                PushOutcome::AckedDelete | PushOutcome::Dropped => {}
                // Ordering within an entity must hold: stop this entity's
                // drain until the next trigger.
                PushOutcome::Retrying => return Ok(()),
            }
        }

        Ok(())
    }

    async fn push_item(&self, item: &SyncQueueItem) -> Result<PushOutcome> {
        let owner = self.owner()?;

        let remote_result: Result<Option<Entity>> = match item.operation {
            QueueOperation::Create | QueueOperation::Update => {
                let payload = item.payload.clone().ok_or_else(|| {
                    SyncError::Engine(tether_engine::Error::MissingPayload(item.entity_id.clone()))
                })?;

                let mut entity =
                    Entity::new(item.entity_id.clone(), owner.clone(), payload, item.enqueued_at);
                if let Some(existing) = self.store.get(&item.entity_kind, &item.entity_id).await? {
                    entity.version = existing.version;
                    entity.created_at = existing.created_at;
                }

                match item.operation {
                    QueueOperation::Create => self.api.create(&entity).await.map(Some),
                    _ => self.api.update(&entity).await.map(Some),
                }
            }
            QueueOperation::Delete => self
                .api
                .delete(&item.entity_kind, &item.entity_id)
                .await
                .map(|_| None),
        };

        match remote_result {
            Ok(server_entity) => {
                self.store.remove_queue_item(&item.queue_id).await?;

                match server_entity {
                    Some(entity) => {
                        // Only server-assigned fields land in the cache; a
                        // newer local edit (still queued behind this item)
                        // must not be clobbered by the acked state.
                        let mut stored = match self
                            .store
                            .get(&item.entity_kind, &item.entity_id)
                            .await?
                        {
                            Some(local) => local,
                            None => entity.clone(),
                        };
                        stored.id = entity.id.clone();
                        stored.version = entity.version;

                        if entity.id != item.entity_id {
                            tracing::debug!(
                                temp_id = %item.entity_id,
                                assigned_id = %entity.id,
                                "server assigned permanent id"
                            );
                            self.store
                                .remap_entity_id(&item.entity_kind, &item.entity_id, &stored)
                                .await?;
                        } else {
                            self.store.put(&stored).await?;
                        }

                        let event = match item.operation {
                            QueueOperation::Create => {
                                SyncEvent::created(&entity, self.device_id.clone())
                            }
                            _ => SyncEvent::updated(&entity, self.device_id.clone()),
                        };
                        self.broadcast(event);

                        Ok(PushOutcome::Acked {
                            entity_id: entity.id,
                        })
                    }
                    None => {
                        self.broadcast(SyncEvent::deleted(
                            item.entity_kind.clone(),
                            item.entity_id.clone(),
                            owner,
                            self.device_id.clone(),
                            item.enqueued_at,
                        ));
                        Ok(PushOutcome::AckedDelete)
                    }
                }
            }
            Err(e) => {
                let retries = self.store.increment_retry(&item.queue_id).await?;
                tracing::warn!(
                    queue_id = %item.queue_id,
                    retries,
                    "remote call failed: {}",
                    e
                );

                if retries >= self.config.retry_ceiling {
                    self.store.remove_queue_item(&item.queue_id).await?;
                    tracing::error!(
                        queue_id = %item.queue_id,
                        "dropping operation after {} failures",
                        retries
                    );
                    self.subscribers.notify_failure(&OperationFailure {
                        queue_id: item.queue_id.clone(),
                        operation: item.operation,
                        entity_kind: item.entity_kind.clone(),
                        entity_id: item.entity_id.clone(),
                        reason: e.to_string(),
                    });
                    Ok(PushOutcome::Dropped)
                } else {
                    Ok(PushOutcome::Retrying)
                }
            }
        }
    }

    /// Ask the relay for a full snapshot of the account.
    pub async fn request_full_sync(&self) -> Result<()> {
        let owner = self.owner()?;

        self.set_phase(SyncPhase::Syncing);
        let event = SyncEvent::sync_request(owner, self.device_id.clone(), clock::now_ms());

        match self.transport.send(&event) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.set_phase(SyncPhase::Idle);
                Err(e)
            }
        }
    }

    /// Feed one non-self-originated event into the engine.
    ///
    /// The transport's receive loop calls this for every inbound message;
    /// it is public so hosts with out-of-band delivery (push notifications)
    /// can inject events directly.
    pub async fn handle_remote_event(&self, event: SyncEvent) -> Result<()> {
        match event.event_type {
            EventType::SyncRequest => self.serve_full_sync(&event).await,
            EventType::SyncResponse => self.merge_snapshot(&event).await,
            _ => self.handle_change(event, true).await,
        }
    }

    async fn handle_change(&self, event: SyncEvent, notify: bool) -> Result<()> {
        let local = self.store.get(&event.entity_kind, &event.entity_id).await?;

        match self.detector.detect(local.as_ref(), &event)? {
            None => {
                self.apply_event(local, &event).await?;
                if notify {
                    self.subscribers.notify_event(&event);
                }
            }
            Some(conflict) => {
                if let Some(default) = self.config.default_resolution {
                    tracing::debug!(
                        entity_id = %conflict.entity_id,
                        "auto-resolving conflict with default policy"
                    );
                    self.apply_resolution(&conflict, default, None).await?;
                } else {
                    tracing::info!(
                        entity_id = %conflict.entity_id,
                        kind = ?conflict.kind,
                        "conflict parked for resolution"
                    );
                    self.conflicts
                        .lock()
                        .unwrap()
                        .insert(conflict.key(), conflict.clone());
                    self.status_tx
                        .send_modify(|s| s.has_pending_conflicts = true);
                    self.subscribers.notify_conflict(&conflict);
                }
            }
        }

        Ok(())
    }

    async fn apply_event(&self, local: Option<Entity>, event: &SyncEvent) -> Result<()> {
        match event.event_type {
            EventType::Created | EventType::Updated => {
                let payload = event.require_payload()?;
                let entity = match local {
                    Some(mut entity) => {
                        entity.apply_update(payload, event.timestamp);
                        if event.version.is_some() {
                            entity.version = event.version;
                        }
                        entity
                    }
                    None => {
                        let mut entity = Entity::new(
                            event.entity_id.clone(),
                            event.owner_id.clone(),
                            payload,
                            event.timestamp,
                        );
                        entity.version = event.version;
                        entity
                    }
                };
                self.store.put(&entity).await
            }
            EventType::Deleted => {
                self.store
                    .delete_entity(&event.entity_kind, &event.entity_id)
                    .await
            }
            EventType::SyncRequest | EventType::SyncResponse => Ok(()),
        }
    }

    /// Answer another device's sync request with our snapshot.
    async fn serve_full_sync(&self, request: &SyncEvent) -> Result<()> {
        let owner = self.owner()?;
        if request.owner_id != owner {
            tracing::warn!("ignoring sync request for another account");
            return Ok(());
        }

        let entities = self.store.get_all(&owner).await?;
        tracing::debug!(count = entities.len(), "serving full sync snapshot");

        let response =
            SyncEvent::sync_response(entities, owner, self.device_id.clone(), clock::now_ms());
        self.transport.send(&response)
    }

    /// Merge a full-sync snapshot, entity by entity through the detector.
    async fn merge_snapshot(&self, response: &SyncEvent) -> Result<()> {
        let snapshot = response.snapshot()?;

        self.set_phase(SyncPhase::Syncing);
        tracing::info!(count = snapshot.entities.len(), "merging full sync snapshot");

        for entity in snapshot.entities {
            let synthetic = SyncEvent::updated(&entity, response.device_id.clone());
            match self.handle_change(synthetic, false).await {
                Ok(()) => {}
                // A malformed entity is skipped; storage failures abort.
                Err(SyncError::Engine(e)) => {
                    tracing::warn!(entity_id = %entity.id, "skipping snapshot entity: {}", e);
                }
                Err(e) => {
                    self.set_phase(SyncPhase::Idle);
                    return Err(e);
                }
            }
        }

        self.store
            .update_metadata(MetadataPatch {
                last_sync_at: Some(clock::now_ms()),
                ..Default::default()
            })
            .await?;
        self.set_phase(SyncPhase::Idle);

        Ok(())
    }

    /// Resolve a parked conflict.
    ///
    /// Returns `Ok(None)` when no conflict is pending for the entity -
    /// resolving twice is an idempotent no-op and nothing is re-broadcast.
    pub async fn resolve_conflict(
        &self,
        entity_kind: &str,
        entity_id: &str,
        resolution: Resolution,
        merged: Option<EntityPayload>,
    ) -> Result<Option<Resolved>> {
        let key = (entity_kind.to_string(), entity_id.to_string());
        let conflict = match self.conflicts.lock().unwrap().remove(&key) {
            Some(conflict) => conflict,
            None => return Ok(None),
        };

        match self.apply_resolution(&conflict, resolution, merged).await {
            Ok(outcome) => {
                let none_left = self.conflicts.lock().unwrap().is_empty();
                if none_left {
                    self.status_tx
                        .send_modify(|s| s.has_pending_conflicts = false);
                }
                Ok(Some(outcome))
            }
            Err(e) => {
                // The store rejected the write; the conflict stays pending.
                self.conflicts.lock().unwrap().insert(key, conflict);
                Err(e)
            }
        }
    }

    async fn apply_resolution(
        &self,
        conflict: &SyncConflict,
        resolution: Resolution,
        merged: Option<EntityPayload>,
    ) -> Result<Resolved> {
        let outcome = resolve(conflict, resolution, merged);

        match &outcome {
            Resolved::Put(entity) => {
                self.store.put(entity).await?;
                self.broadcast(SyncEvent::updated(entity, self.device_id.clone()));
            }
            Resolved::Delete {
                entity_kind,
                entity_id,
            } => {
                self.store.delete_entity(entity_kind, entity_id).await?;
                // Stamped now so peers with older edits apply it cleanly.
                self.broadcast(SyncEvent::deleted(
                    entity_kind.clone(),
                    entity_id.clone(),
                    conflict.owner_id.clone(),
                    self.device_id.clone(),
                    clock::now_ms(),
                ));
            }
        }

        Ok(outcome)
    }

    /// Disconnect from the relay.
    ///
    /// The queue is retained; draining resumes on the next initialize or
    /// reachable connectivity edge.
    pub fn disconnect(&self) {
        self.transport.disconnect();
        self.status_tx.send_modify(|s| {
            s.connected = false;
            s.phase = SyncPhase::Idle;
        });
    }

    fn owner(&self) -> Result<String> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.owner_id.clone())
            .ok_or(SyncError::NotInitialized)
    }

    fn credential(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.credential.clone())
    }

    fn is_connected(&self) -> bool {
        *self.transport.status().borrow() == TransportStatus::Connected
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.status_tx.send_modify(|s| s.phase = phase);
    }

    fn broadcast(&self, event: SyncEvent) {
        if let Err(e) = self.transport.send(&event) {
            // Peers converge on the next full sync.
            tracing::warn!("failed to broadcast event: {}", e);
        }
    }

    async fn refresh_pending_count(&self) -> Result<()> {
        let pending = self.store.queue_len().await?;
        self.status_tx
            .send_modify(|s| s.pending_operations = pending);
        Ok(())
    }
}

/// Pump inbound transport events into the engine.
async fn inbound_loop(
    this: Weak<SyncOrchestrator>,
    mut inbound: mpsc::UnboundedReceiver<SyncEvent>,
) {
    while let Some(event) = inbound.recv().await {
        let Some(orchestrator) = this.upgrade() else {
            return;
        };
        if let Err(e) = orchestrator.handle_remote_event(event).await {
            // One bad message must not kill the receive loop.
            tracing::warn!("failed to handle inbound event: {}", e);
        }
    }
}

/// React to transport status transitions.
async fn transport_watcher(
    this: Weak<SyncOrchestrator>,
    mut status: watch::Receiver<TransportStatus>,
) {
    loop {
        if status.changed().await.is_err() {
            return;
        }
        let current = *status.borrow();
        let Some(orchestrator) = this.upgrade() else {
            return;
        };

        match current {
            TransportStatus::Connected => {
                orchestrator.status_tx.send_modify(|s| {
                    s.connected = true;
                    if s.phase == SyncPhase::Connecting || s.phase == SyncPhase::Degraded {
                        s.phase = SyncPhase::Idle;
                    }
                });

                // Connection (re)established: reconcile everything.
                if let Err(e) = orchestrator.request_full_sync().await {
                    tracing::warn!("full sync request failed: {}", e);
                }
                if let Err(e) = orchestrator.drain_queue().await {
                    tracing::warn!("queue drain failed: {}", e);
                }
            }
            TransportStatus::Exhausted => {
                tracing::warn!("transport exhausted reconnect attempts; engine degraded");
                orchestrator.status_tx.send_modify(|s| {
                    s.connected = false;
                    s.phase = SyncPhase::Degraded;
                });
            }
            _ => {
                orchestrator.status_tx.send_modify(|s| s.connected = false);
            }
        }
    }
}

/// React to reachability edges - the engine's only scheduling trigger
/// beyond explicit caller requests.
async fn connectivity_watcher(this: Weak<SyncOrchestrator>, mut connectivity: watch::Receiver<bool>) {
    loop {
        if connectivity.changed().await.is_err() {
            return;
        }
        let online = *connectivity.borrow();
        let Some(orchestrator) = this.upgrade() else {
            return;
        };

        orchestrator.status_tx.send_modify(|s| s.is_online = online);
        if let Err(e) = orchestrator
            .store
            .update_metadata(MetadataPatch {
                is_online: Some(online),
                ..Default::default()
            })
            .await
        {
            tracing::warn!("failed to persist connectivity state: {}", e);
        }

        if !online {
            continue;
        }
        tracing::info!("connectivity restored; resuming sync");

        if orchestrator.is_connected() {
            // The relay connection survived the outage: reconcile now.
            if let Err(e) = orchestrator.request_full_sync().await {
                tracing::warn!("full sync request failed: {}", e);
            }
            if let Err(e) = orchestrator.drain_queue().await {
                tracing::warn!("queue drain failed: {}", e);
            }
        } else {
            // Reconnect; full sync and drain follow once connected.
            match orchestrator.credential() {
                Some(credential) => {
                    orchestrator.set_phase(SyncPhase::Connecting);
                    if let Err(e) = orchestrator.transport.connect(&credential) {
                        tracing::warn!("reconnect failed: {}", e);
                    }
                }
                None => {
                    tracing::debug!("connectivity restored before initialization");
                }
            }
        }
    }
}
