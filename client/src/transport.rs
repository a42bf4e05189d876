//! Reconnecting WebSocket transport to the sync relay.
//!
//! One connection per transport. On unexpected closure the connection task
//! retries with exponential backoff up to a configured attempt cap; past
//! the cap it parks as [`TransportStatus::Exhausted`] until the caller (or
//! the next reachable connectivity edge) calls [`SyncTransport::connect`]
//! again.
//!
//! Self-filtering is enforced here: inbound events stamped with the local
//! device id are echoes of this device's own writes and are discarded
//! before anything downstream can classify them as conflicts.

use crate::error::{Result, SyncError};
use futures::{SinkExt, StreamExt};
use std::sync::Mutex;
use std::time::Duration;
use tether_engine::{DeviceId, SyncEvent};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Connection status of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// Never connected, or cleanly disconnected by the caller
    Disconnected,
    /// First connection attempt in progress
    Connecting,
    /// Connected to the relay
    Connected,
    /// Unexpected closure; retrying with backoff
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted; waiting for an explicit connect
    Exhausted,
}

/// How a connected session ended.
enum SessionEnd {
    /// The connection dropped; the run loop should reconnect
    Lost,
    /// Shutdown was requested; the run loop should exit
    Shutdown,
}

struct ConnState {
    outbound: Option<mpsc::UnboundedSender<SyncEvent>>,
    shutdown: Option<watch::Sender<bool>>,
}

/// A reconnecting WebSocket connection to the sync relay.
pub struct SyncTransport {
    url: String,
    device_id: DeviceId,
    base_delay: Duration,
    max_attempts: u32,
    status_tx: watch::Sender<TransportStatus>,
    status_rx: watch::Receiver<TransportStatus>,
    inbound_tx: mpsc::UnboundedSender<SyncEvent>,
    conn: Mutex<ConnState>,
}

impl SyncTransport {
    /// Create a transport and the inbound event stream it feeds.
    pub fn new(
        url: impl Into<String>,
        device_id: impl Into<DeviceId>,
        base_delay: Duration,
        max_attempts: u32,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (status_tx, status_rx) = watch::channel(TransportStatus::Disconnected);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let transport = Self {
            url: url.into(),
            device_id: device_id.into(),
            base_delay,
            max_attempts,
            status_tx,
            status_rx,
            inbound_tx,
            conn: Mutex::new(ConnState {
                outbound: None,
                shutdown: None,
            }),
        };

        (transport, inbound_rx)
    }

    /// Connect to the relay with the given bearer credential.
    ///
    /// An existing connection task is shut down first, so repeated calls
    /// (e.g. on a reachable connectivity edge after exhaustion) always
    /// leave exactly one connection.
    pub fn connect(&self, credential: &str) -> Result<()> {
        let auth = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|e| SyncError::InvalidCredential(e.to_string()))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        {
            let mut conn = self.conn.lock().unwrap();
            if let Some(previous) = conn.shutdown.take() {
                let _ = previous.send(true);
            }
            conn.outbound = Some(outbound_tx);
            conn.shutdown = Some(shutdown_tx);
        }

        let _ = self.status_tx.send(TransportStatus::Connecting);

        tokio::spawn(run_loop(
            self.url.clone(),
            auth,
            self.device_id.clone(),
            self.base_delay,
            self.max_attempts,
            outbound_rx,
            self.inbound_tx.clone(),
            self.status_tx.clone(),
            shutdown_rx,
        ));

        Ok(())
    }

    /// Send an event to the relay.
    ///
    /// While the transport is reconnecting, events are queued and flushed
    /// once the connection is back. After a clean disconnect or exhaustion
    /// this fails with [`SyncError::NotConnected`].
    pub fn send(&self, event: &SyncEvent) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        match &conn.outbound {
            Some(outbound) => outbound
                .send(event.clone())
                .map_err(|_| SyncError::NotConnected),
            None => Err(SyncError::NotConnected),
        }
    }

    /// Watch the transport status.
    pub fn status(&self) -> watch::Receiver<TransportStatus> {
        self.status_rx.clone()
    }

    /// The stable device identifier stamped on every outbound event.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Disconnect from the relay.
    ///
    /// Cancels only the transport's in-flight read; anything else the
    /// engine has in flight is allowed to complete.
    pub fn disconnect(&self) {
        let mut conn = self.conn.lock().unwrap();
        if let Some(shutdown) = conn.shutdown.take() {
            let _ = shutdown.send(true);
        }
        conn.outbound = None;
        let _ = self.status_tx.send(TransportStatus::Disconnected);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    url: String,
    auth: HeaderValue,
    device_id: DeviceId,
    base_delay: Duration,
    max_attempts: u32,
    mut outbound: mpsc::UnboundedReceiver<SyncEvent>,
    inbound: mpsc::UnboundedSender<SyncEvent>,
    status: watch::Sender<TransportStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        let mut request = match url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("invalid relay URL {}: {}", url, e);
                let _ = status.send(TransportStatus::Disconnected);
                return;
            }
        };
        request.headers_mut().insert(AUTHORIZATION, auth.clone());

        let connected = tokio::select! {
            _ = shutdown.changed() => {
                let _ = status.send(TransportStatus::Disconnected);
                return;
            }
            result = connect_async(request) => result,
        };

        match connected {
            Ok((stream, _response)) => {
                attempt = 0;
                let _ = status.send(TransportStatus::Connected);
                tracing::info!(url = %url, "connected to sync relay");

                match session(stream, &mut outbound, &inbound, &device_id, &mut shutdown).await {
                    SessionEnd::Shutdown => {
                        let _ = status.send(TransportStatus::Disconnected);
                        tracing::info!("disconnected from sync relay");
                        return;
                    }
                    SessionEnd::Lost => {
                        tracing::warn!("connection to sync relay lost");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(attempt, "failed to connect to sync relay: {}", e);
            }
        }

        if attempt >= max_attempts {
            tracing::warn!(
                max_attempts,
                "reconnect attempts exhausted; waiting for explicit reconnect"
            );
            let _ = status.send(TransportStatus::Exhausted);
            return;
        }

        // base delay doubled per attempt, exponent clamped against overflow
        let delay = base_delay * (1u32 << attempt.min(16));
        attempt += 1;
        let _ = status.send(TransportStatus::Reconnecting { attempt });
        tracing::debug!(attempt, ?delay, "backing off before reconnect");

        tokio::select! {
            _ = shutdown.changed() => {
                let _ = status.send(TransportStatus::Disconnected);
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Pump one connected session until it drops or shutdown is requested.
async fn session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound: &mut mpsc::UnboundedReceiver<SyncEvent>,
    inbound: &mpsc::UnboundedSender<SyncEvent>,
    device_id: &str,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            _ = shutdown.changed() => return SessionEnd::Shutdown,

            maybe = outbound.recv() => match maybe {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::warn!("failed to send event: {}", e);
                            return SessionEnd::Lost;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize outbound event: {}", e);
                    }
                },
                // Transport dropped; nothing left to send.
                None => return SessionEnd::Shutdown,
            },

            maybe = source.next() => match maybe {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<SyncEvent>(text.as_str()) {
                        Ok(event) => {
                            if event.device_id == device_id {
                                tracing::trace!(
                                    entity_id = %event.entity_id,
                                    "discarding echo of own event"
                                );
                            } else if inbound.send(event).is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Err(e) => {
                            // One malformed message must not kill the loop.
                            tracing::warn!("dropping malformed message: {}", e);
                        }
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::warn!("binary messages not supported");
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    tracing::info!("close frame received");
                    return SessionEnd::Lost;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::warn!("websocket error: {}", e);
                    return SessionEnd::Lost;
                }
                None => return SessionEnd::Lost,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_transport() -> (SyncTransport, mpsc::UnboundedReceiver<SyncEvent>) {
        SyncTransport::new(
            "ws://127.0.0.1:1/sync",
            "device-1",
            Duration::from_millis(10),
            2,
        )
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let (transport, _inbound) = test_transport();
        assert_eq!(*transport.status().borrow(), TransportStatus::Disconnected);
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let (transport, _inbound) = test_transport();
        let event = SyncEvent::sync_request("user-1", "device-1", 1000);

        assert!(matches!(
            transport.send(&event),
            Err(SyncError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn rejects_unprintable_credential() {
        let (transport, _inbound) = test_transport();

        assert!(matches!(
            transport.connect("tok\nen"),
            Err(SyncError::InvalidCredential(_))
        ));
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        // Nothing listens on port 1; every attempt fails fast.
        let (transport, _inbound) = test_transport();
        transport.connect("token").unwrap();

        let mut status = transport.status();
        let exhausted = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if *status.borrow() == TransportStatus::Exhausted {
                    return true;
                }
                if status.changed().await.is_err() {
                    return false;
                }
            }
        })
        .await;

        assert!(matches!(exhausted, Ok(true)));
    }
}
