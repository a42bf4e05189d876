//! Connectivity monitor.
//!
//! Reachability is reported by the host platform through a
//! [`ConnectivityHandle`]; the monitor deduplicates repeated reports so
//! subscribers observe exactly one notification per edge. The
//! unreachable-to-reachable edge is the engine's only scheduling trigger
//! besides explicit caller requests - there is no polling loop.

use tokio::sync::watch;

/// Observes reachability transitions.
pub struct ConnectivityMonitor {
    sender: watch::Sender<bool>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    /// Create a monitor that starts unreachable.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Handle through which the host reports reachability.
    pub fn handle(&self) -> ConnectivityHandle {
        ConnectivityHandle {
            sender: self.sender.clone(),
        }
    }

    /// Subscribe to reachability transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Current reachability.
    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Host-facing handle for reporting reachability.
#[derive(Clone)]
pub struct ConnectivityHandle {
    sender: watch::Sender<bool>,
}

impl ConnectivityHandle {
    /// Report the current reachability.
    ///
    /// Repeated reports of the same state are absorbed; subscribers see one
    /// notification per edge.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|state| {
            if *state == online {
                false
            } else {
                *state = online;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unreachable() {
        let monitor = ConnectivityMonitor::new();
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn one_notification_per_edge() {
        let monitor = ConnectivityMonitor::new();
        let handle = monitor.handle();
        let mut rx = monitor.subscribe();

        // Repeating the current state produces no notification.
        handle.set_online(false);
        assert!(!rx.has_changed().unwrap());

        handle.set_online(true);
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert!(*rx.borrow());

        // Repeating the new state produces no further notification.
        handle.set_online(true);
        assert!(!rx.has_changed().unwrap());

        handle.set_online(false);
        assert!(rx.has_changed().unwrap());
    }
}
