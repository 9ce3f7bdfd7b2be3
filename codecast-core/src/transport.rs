//! Live chunk transport with reconnect scheduling
//!
//! One duplex WebSocket to a chunk collector. Each outgoing message is one
//! raw encoded chunk, sent in production order; there is no framing and no
//! handshake beyond the connection open. Delivery is at-most-once and
//! best-effort: chunks produced while the socket is not open are dropped,
//! never buffered or retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::error::TransportError;

/// Connection state of a chunk transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// Dial in progress; chunks sent now are dropped
    Connecting,
    /// Socket established; chunks are forwarded
    Open,
    /// Socket gone, either deliberately or after a drop
    Closed,
}

/// Transport tuning knobs.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Delay between an unexpected close and the single scheduled redial
    pub reconnect_delay: Duration,
    /// How long a dial may take before it is treated as failed
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Notifications emitted as the transport changes state.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The socket to the collector is established
    Opened {
        /// Collector endpoint
        endpoint: String,
    },
    /// The socket closed, deliberately or not
    Closed {
        /// Collector endpoint
        endpoint: String,
    },
    /// An unexpected close while live scheduled a redial
    ReconnectScheduled {
        /// Collector endpoint
        endpoint: String,
        /// Delay before the redial runs
        delay: Duration,
    },
    /// A dial or send failure; never fatal to the recording
    Error {
        /// Failure description
        reason: String,
    },
}

impl TransportEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            TransportEvent::Opened { .. } => "opened",
            TransportEvent::Closed { .. } => "closed",
            TransportEvent::ReconnectScheduled { .. } => "reconnect_scheduled",
            TransportEvent::Error { .. } => "error",
        }
    }
}

/// Destination for recorded chunks.
///
/// `send` must never block the caller: the recorder forwards every chunk on
/// the cadence tick and buffering always happens before forwarding.
pub trait ChunkSink: Send + Sync {
    /// Forward one chunk, fire-and-forget. Dropped unless the sink is open.
    fn send(&self, chunk: Bytes);

    /// Current connection state.
    fn state(&self) -> TransportState;
}

struct TransportInner {
    state: TransportState,
    /// Handle into the io task's outgoing queue; present only while open
    outgoing: Option<mpsc::UnboundedSender<Bytes>>,
    io_task: Option<JoinHandle<()>>,
    /// Pending redial timer; at most one exists at a time
    reconnect: Option<JoinHandle<()>>,
    /// Incremented on every dial so stale io tasks can detect supersession
    generation: u64,
}

/// WebSocket chunk transport to a collector endpoint.
///
/// While the owning session is live, an unexpected close schedules exactly
/// one redial after [`TransportConfig::reconnect_delay`]; the pending timer
/// handle is stored so [`ChunkTransport::close`] can cancel it
/// deterministically. Redials are spaced by the delay, never tighter.
pub struct ChunkTransport {
    endpoint: String,
    config: TransportConfig,
    /// True while the owning recording is in progress; gates reconnects
    live: AtomicBool,
    /// Set once `close` is called; no event or redial fires afterwards
    user_closed: AtomicBool,
    inner: Mutex<TransportInner>,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
}

impl ChunkTransport {
    /// Open a transport to `endpoint` and start dialing in the background.
    ///
    /// Returns immediately in the `Connecting` state; a dial failure is
    /// treated like an unexpected close (logged, surfaced as an event, and
    /// redialed while live) rather than an error from this constructor.
    /// Only an endpoint that is not a WebSocket URL fails here.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        endpoint: impl Into<String>,
        config: TransportConfig,
        events: Option<mpsc::UnboundedSender<TransportEvent>>,
    ) -> Result<Arc<Self>, TransportError> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with("ws://") && !endpoint.starts_with("wss://") {
            return Err(TransportError::InvalidEndpoint {
                url: endpoint,
                reason: "expected a ws:// or wss:// URL".to_string(),
            });
        }

        let transport = Arc::new(Self {
            endpoint,
            config,
            live: AtomicBool::new(true),
            user_closed: AtomicBool::new(false),
            inner: Mutex::new(TransportInner {
                state: TransportState::Connecting,
                outgoing: None,
                io_task: None,
                reconnect: None,
                generation: 0,
            }),
            events,
        });

        transport.spawn_dial();
        Ok(transport)
    }

    /// Collector endpoint this transport dials.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current connection state.
    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    /// Mark whether the owning recording is still in progress.
    ///
    /// A close event that arrives while not live schedules no redial.
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    /// Forward one chunk, fire-and-forget.
    ///
    /// Transmits only while the socket is open; otherwise the chunk is
    /// dropped without buffering or retry.
    pub fn send(&self, chunk: Bytes) {
        let inner = self.inner.lock();
        match (inner.state, &inner.outgoing) {
            (TransportState::Open, Some(outgoing)) => {
                if outgoing.send(chunk).is_err() {
                    trace!(endpoint = %self.endpoint, "chunk dropped: io task gone");
                }
            }
            (state, _) => {
                trace!(endpoint = %self.endpoint, ?state, "chunk dropped: transport not open");
            }
        }
    }

    /// Close the transport and cancel any pending redial. Idempotent.
    pub fn close(&self) {
        if self.user_closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let previous = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            inner.state = TransportState::Closed;
            inner.outgoing = None;
            if let Some(reconnect) = inner.reconnect.take() {
                reconnect.abort();
            }
            if let Some(io_task) = inner.io_task.take() {
                io_task.abort();
            }
            previous
        };

        if previous != TransportState::Closed {
            self.emit(TransportEvent::Closed {
                endpoint: self.endpoint.clone(),
            });
        }
        debug!(endpoint = %self.endpoint, "chunk transport closed");
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn spawn_dial(self: &Arc<Self>) {
        let generation = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state = TransportState::Connecting;
            inner.generation
        };

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            this.run_connection(generation).await;
        });
        self.inner.lock().io_task = Some(task);
    }

    async fn run_connection(self: Arc<Self>, generation: u64) {
        let dial = tokio::time::timeout(
            self.config.connect_timeout,
            connect_async(self.endpoint.as_str()),
        );

        let ws = match dial.await {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                warn!(endpoint = %self.endpoint, error = %e, "chunk transport dial failed");
                self.emit(TransportEvent::Error {
                    reason: format!("dial failed: {e}"),
                });
                self.on_connection_closed(generation);
                return;
            }
            Err(_) => {
                warn!(endpoint = %self.endpoint, "chunk transport dial timed out");
                self.emit(TransportEvent::Error {
                    reason: "dial timed out".to_string(),
                });
                self.on_connection_closed(generation);
                return;
            }
        };

        let (mut sink, mut stream) = ws.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Bytes>();

        {
            let mut inner = self.inner.lock();
            if self.user_closed.load(Ordering::SeqCst) || inner.generation != generation {
                return;
            }
            inner.state = TransportState::Open;
            inner.outgoing = Some(outgoing_tx);
        }
        info!(endpoint = %self.endpoint, "chunk transport open");
        self.emit(TransportEvent::Opened {
            endpoint: self.endpoint.clone(),
        });

        loop {
            tokio::select! {
                chunk = outgoing_rx.recv() => match chunk {
                    Some(chunk) => {
                        if let Err(e) = sink.send(Message::Binary(chunk.to_vec())).await {
                            warn!(endpoint = %self.endpoint, error = %e, "chunk send failed");
                            self.emit(TransportEvent::Error {
                                reason: format!("send failed: {e}"),
                            });
                            break;
                        }
                    }
                    // Queue handle dropped by close(); finish up.
                    None => break,
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(endpoint = %self.endpoint, "collector closed the connection");
                        break;
                    }
                    // The collector is not expected to talk back; ignore it if it does.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(endpoint = %self.endpoint, error = %e, "chunk transport socket error");
                        self.emit(TransportEvent::Error {
                            reason: e.to_string(),
                        });
                        break;
                    }
                },
            }
        }

        let _ = sink.close().await;
        self.on_connection_closed(generation);
    }

    fn on_connection_closed(self: &Arc<Self>, generation: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            inner.outgoing = None;
            if inner.state == TransportState::Closed {
                return;
            }
            inner.state = TransportState::Closed;
        }

        self.emit(TransportEvent::Closed {
            endpoint: self.endpoint.clone(),
        });
        self.maybe_schedule_reconnect();
    }

    /// Schedule the single redial that follows an unexpected close.
    ///
    /// No-op unless the session is live, and never while another redial is
    /// already pending, so attempts cannot stack or spin faster than the
    /// configured delay.
    fn maybe_schedule_reconnect(self: &Arc<Self>) {
        if self.user_closed.load(Ordering::SeqCst) || !self.live.load(Ordering::SeqCst) {
            return;
        }

        let delay = self.config.reconnect_delay;
        {
            let mut inner = self.inner.lock();
            if inner.reconnect.is_some() {
                return;
            }

            let this = Arc::clone(self);
            inner.reconnect = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                this.inner.lock().reconnect = None;
                if this.user_closed.load(Ordering::SeqCst) || !this.live.load(Ordering::SeqCst) {
                    return;
                }
                debug!(endpoint = %this.endpoint, "redialing chunk collector");
                this.spawn_dial();
            }));
        }

        debug!(endpoint = %self.endpoint, ?delay, "reconnect scheduled");
        self.emit(TransportEvent::ReconnectScheduled {
            endpoint: self.endpoint.clone(),
            delay,
        });
    }
}

impl ChunkSink for ChunkTransport {
    fn send(&self, chunk: Bytes) {
        ChunkTransport::send(self, chunk)
    }

    fn state(&self) -> TransportState {
        ChunkTransport::state(self)
    }
}

impl std::fmt::Debug for ChunkTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkTransport")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("live", &self.live.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_websocket_endpoints() {
        let err = match ChunkTransport::open("http://127.0.0.1:9000", TransportConfig::default(), None)
        {
            Err(e) => e,
            Ok(_) => panic!("expected InvalidEndpoint"),
        };
        match err {
            TransportError::InvalidEndpoint { url, .. } => {
                assert_eq!(url, "http://127.0.0.1:9000");
            }
            other => panic!("expected InvalidEndpoint, got {other:?}"),
        }
    }

    #[test]
    fn default_config_matches_reconnect_policy() {
        let config = TransportConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }
}
