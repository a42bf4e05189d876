//! Subscription registry for engine listeners.
//!
//! Callers subscribe to change events, detected conflicts, and terminal
//! operation failures over unbounded channels with explicit unsubscribe.
//! Delivery is at-least-once; receivers that have been dropped are pruned
//! on the next notification.

use dashmap::DashMap;
use tether_engine::{QueueOperation, SyncConflict, SyncEvent};
use tokio::sync::mpsc;

/// Identifier returned by a subscribe call, used to unsubscribe.
pub type SubscriptionId = String;

/// A queued operation dropped after exhausting its retries.
///
/// Reported exactly once per dropped item; the failure is terminal and the
/// operation will not be retried again.
#[derive(Debug, Clone)]
pub struct OperationFailure {
    pub queue_id: String,
    pub operation: QueueOperation,
    pub entity_kind: String,
    pub entity_id: String,
    pub reason: String,
}

/// Registry of engine listeners.
#[derive(Debug, Default)]
pub struct Subscribers {
    events: DashMap<SubscriptionId, mpsc::UnboundedSender<SyncEvent>>,
    conflicts: DashMap<SubscriptionId, mpsc::UnboundedSender<SyncConflict>>,
    failures: DashMap<SubscriptionId, mpsc::UnboundedSender<OperationFailure>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to applied remote change events.
    pub fn subscribe_events(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = uuid::Uuid::new_v4().to_string();
        self.events.insert(id.clone(), tx);
        (id, rx)
    }

    /// Subscribe to detected conflicts awaiting resolution.
    pub fn subscribe_conflicts(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<SyncConflict>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = uuid::Uuid::new_v4().to_string();
        self.conflicts.insert(id.clone(), tx);
        (id, rx)
    }

    /// Subscribe to terminal operation failures.
    pub fn subscribe_failures(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<OperationFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = uuid::Uuid::new_v4().to_string();
        self.failures.insert(id.clone(), tx);
        (id, rx)
    }

    /// Remove a subscription of any kind.
    pub fn unsubscribe(&self, id: &str) {
        self.events.remove(id);
        self.conflicts.remove(id);
        self.failures.remove(id);
    }

    /// Deliver an event to all live event subscribers.
    ///
    /// Returns the number of subscribers that received it.
    pub fn notify_event(&self, event: &SyncEvent) -> usize {
        let mut sent = 0;
        self.events.retain(|_, tx| {
            let ok = tx.send(event.clone()).is_ok();
            if ok {
                sent += 1;
            }
            ok
        });
        sent
    }

    /// Deliver a conflict to all live conflict subscribers.
    pub fn notify_conflict(&self, conflict: &SyncConflict) -> usize {
        let mut sent = 0;
        self.conflicts.retain(|_, tx| {
            let ok = tx.send(conflict.clone()).is_ok();
            if ok {
                sent += 1;
            }
            ok
        });
        sent
    }

    /// Deliver a terminal failure to all live failure subscribers.
    pub fn notify_failure(&self, failure: &OperationFailure) -> usize {
        let mut sent = 0;
        self.failures.retain(|_, tx| {
            let ok = tx.send(failure.clone()).is_ok();
            if ok {
                sent += 1;
            }
            ok
        });
        sent
    }
}
