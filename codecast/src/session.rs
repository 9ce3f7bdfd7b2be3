//! Recording session orchestration
//!
//! A [`RecordingSession`] wires the three moving parts together: the
//! capture manager that owns the acquired stream, the chunked recorder
//! that drives the cadence, and the optional chunk transport that streams
//! each chunk to a collector. All teardown funnels through here so a
//! session can be dropped in any state without leaking tracks, timers, or
//! connections.

use std::sync::Arc;

use codecast_core::{
    ChunkSink, ChunkTransport, TransportConfig, TransportError, TransportEvent, TransportState,
};
use codecast_media::{
    Artifact, CaptureBackend, CaptureConstraints, CaptureError, CaptureManager, ChunkedRecorder,
    PreviewSink, RecorderError, RecorderEvent, RecorderStatus, SourceKind, SyntheticBackend,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::config::GlobalConfig;
use crate::event::{EventStream, SessionEvent};
use crate::Codecast;

/// Errors surfaced by a recording session.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The builder is missing a required field
    #[error("Missing required configuration: {field}")]
    MissingConfiguration {
        /// Missing configuration field
        field: String,
    },

    /// Capture acquisition failed; the session stays idle
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Recording could not start
    #[error(transparent)]
    Recorder(#[from] RecorderError),

    /// Chunk transport configuration error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `end` was called on a session that never recorded
    #[error("No recording in progress")]
    NotRecording,
}

/// Fluent builder for a recording session.
pub struct SessionBuilder {
    config: GlobalConfig,
    source: Option<SourceKind>,
    constraints: Option<CaptureConstraints>,
    collector: Option<String>,
    backend: Option<Arc<dyn CaptureBackend>>,
    preview: Option<Box<dyn PreviewSink>>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("source", &self.source)
            .field("collector", &self.collector)
            .finish()
    }
}

impl SessionBuilder {
    pub(crate) fn new(codecast: &Codecast) -> Self {
        Self {
            config: codecast.config().clone(),
            source: None,
            constraints: None,
            collector: codecast.config().default_collector_url.clone(),
            backend: None,
            preview: None,
        }
    }

    /// Capture the webcam with microphone audio.
    pub fn camera(mut self) -> Self {
        self.source = Some(SourceKind::Camera);
        self
    }

    /// Capture the screen.
    pub fn display(mut self) -> Self {
        self.source = Some(SourceKind::Display);
        self
    }

    /// Capture the given source kind.
    pub fn source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }

    /// Override the default audio/video constraints for the source.
    pub fn constraints(mut self, constraints: CaptureConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Stream each recorded chunk to this collector while recording.
    pub fn stream_to(mut self, url: &str) -> Self {
        self.collector = Some(url.to_string());
        self
    }

    /// Use a specific capture backend instead of the default synthetic one.
    pub fn backend(mut self, backend: Arc<dyn CaptureBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach a preview surface, wired on every capture start.
    pub fn preview(mut self, sink: Box<dyn PreviewSink>) -> Self {
        self.preview = Some(sink);
        self
    }

    /// Build the session and start recording.
    pub async fn begin(self) -> Result<RecordingSession, SessionError> {
        let source = self
            .source
            .ok_or_else(|| SessionError::MissingConfiguration {
                field: "source".to_string(),
            })?;
        let constraints = self
            .constraints
            .unwrap_or_else(|| CaptureConstraints::for_source(source));
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(SyntheticBackend::default()));

        let mut manager = CaptureManager::new(backend);
        if let Some(preview) = self.preview {
            manager.set_preview(preview);
        }

        let recorder = ChunkedRecorder::new(
            self.config.chunk_cadence,
            self.config.profile_preference.clone(),
        );

        let mut session = RecordingSession::new(
            self.config,
            source,
            constraints,
            self.collector,
            manager,
            recorder,
        );
        session.begin().await?;
        Ok(session)
    }
}

/// One recording session: capture, cadence, optional live streaming.
pub struct RecordingSession {
    id: Uuid,
    config: GlobalConfig,
    source: SourceKind,
    constraints: CaptureConstraints,
    collector: Option<String>,
    manager: CaptureManager,
    recorder: ChunkedRecorder,
    transport: Option<Arc<ChunkTransport>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    relay_tasks: Vec<JoinHandle<()>>,
}

impl RecordingSession {
    fn new(
        config: GlobalConfig,
        source: SourceKind,
        constraints: CaptureConstraints,
        collector: Option<String>,
        manager: CaptureManager,
        recorder: ChunkedRecorder,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Relay recorder events for the session's lifetime; transports get
        // their own relay per connection.
        let mut recorder_rx = recorder.subscribe_events();
        let relay_tx = events_tx.clone();
        let relay = tokio::spawn(async move {
            loop {
                match recorder_rx.recv().await {
                    Ok(event) => {
                        let mapped = match event {
                            RecorderEvent::Started { profile } => {
                                SessionEvent::RecordingStarted { profile }
                            }
                            RecorderEvent::ChunkRecorded { sequence, size } => {
                                SessionEvent::ChunkRecorded { sequence, size }
                            }
                            RecorderEvent::Stopped {
                                chunk_count,
                                elapsed_seconds,
                            } => SessionEvent::RecordingStopped {
                                chunk_count,
                                elapsed_seconds,
                            },
                            RecorderEvent::Reset => SessionEvent::SessionReset,
                        };
                        let _ = relay_tx.send(mapped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            id: Uuid::new_v4(),
            config,
            source,
            constraints,
            collector,
            manager,
            recorder,
            transport: None,
            events_tx,
            events_rx: Some(events_rx),
            relay_tasks: vec![relay],
        }
    }

    /// Acquire the capture stream and start recording.
    ///
    /// Usable again after `end` or `reset`; the previous artifact is
    /// superseded. Capture denial and negotiation failure leave the
    /// session idle with nothing held. A collector that cannot be reached
    /// is logged and surfaced as an event, never a recording failure.
    pub async fn begin(&mut self) -> Result<(), SessionError> {
        if self.recorder.status() == RecorderStatus::Recording {
            return Err(RecorderError::AlreadyRecording.into());
        }

        self.manager.start(self.source, &self.constraints).await?;
        self.emit(SessionEvent::CaptureStarted {
            source: self.source,
        });

        if let Some(url) = self.collector.clone() {
            self.open_transport(&url);
        }

        let sink = self
            .transport
            .clone()
            .map(|transport| transport as Arc<dyn ChunkSink>);
        if let Err(e) = self.recorder.begin(&mut self.manager, sink) {
            // Roll back so the failed start leaves nothing behind.
            self.manager.stop();
            self.close_transport();
            return Err(e.into());
        }
        Ok(())
    }

    fn open_transport(&mut self, url: &str) {
        let (transport_tx, mut transport_rx) = mpsc::unbounded_channel();
        let transport_config = TransportConfig {
            reconnect_delay: self.config.reconnect_delay,
            connect_timeout: self.config.connect_timeout,
        };

        match ChunkTransport::open(url, transport_config, Some(transport_tx)) {
            Ok(transport) => {
                let relay_tx = self.events_tx.clone();
                self.relay_tasks.push(tokio::spawn(async move {
                    while let Some(event) = transport_rx.recv().await {
                        let mapped = match event {
                            TransportEvent::Opened { endpoint } => {
                                SessionEvent::TransportOpened { endpoint }
                            }
                            TransportEvent::Closed { endpoint } => {
                                SessionEvent::TransportClosed { endpoint }
                            }
                            TransportEvent::ReconnectScheduled { endpoint, delay } => {
                                SessionEvent::TransportReconnecting { endpoint, delay }
                            }
                            TransportEvent::Error { reason } => {
                                SessionEvent::TransportFailed { reason }
                            }
                        };
                        let _ = relay_tx.send(mapped);
                    }
                }));
                self.transport = Some(transport);
            }
            Err(e) => {
                warn!(error = %e, "chunk transport unavailable, recording locally only");
                self.emit(SessionEvent::TransportFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn close_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.set_live(false);
            transport.close();
        }
    }

    /// Stop recording, release the capture stream, close the transport,
    /// and return the artifact.
    ///
    /// The second consecutive call returns the same artifact without
    /// touching anything. Stopping before the first cadence tick yields an
    /// empty artifact, not an error.
    pub fn end(&mut self) -> Result<Artifact, SessionError> {
        let was_recording = self.recorder.status() == RecorderStatus::Recording;
        let artifact = self
            .recorder
            .end(&mut self.manager)
            .ok_or(SessionError::NotRecording)?;

        if was_recording {
            self.close_transport();
            self.emit(SessionEvent::ArtifactReady {
                size: artifact.len(),
                media_type: artifact.media_type().to_string(),
            });
        }
        Ok(artifact)
    }

    /// Discard the artifact and buffers and return to a fresh idle state.
    pub fn reset(&mut self) {
        self.recorder.reset();
        self.manager.stop();
        self.close_transport();
    }

    /// Flip whether audio tracks are enabled; returns the new muted state.
    pub fn toggle_mute(&mut self) -> bool {
        if !self.manager.is_active() {
            return self.manager.is_muted();
        }
        let muted = self.manager.toggle_mute();
        self.emit(SessionEvent::MuteChanged { muted });
        muted
    }

    /// Take the session's event stream. Available once.
    pub fn events(&mut self) -> Option<EventStream> {
        self.events_rx.take().map(EventStream::new)
    }

    /// Unique session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Source this session captures from.
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Current recorder status.
    pub fn status(&self) -> RecorderStatus {
        self.recorder.status()
    }

    /// Whole seconds elapsed in the current or finished recording.
    pub fn elapsed_seconds(&self) -> u64 {
        self.recorder.elapsed_seconds()
    }

    /// Number of chunks buffered so far.
    pub fn chunk_count(&self) -> usize {
        self.recorder.chunk_count()
    }

    /// Whether audio is muted.
    pub fn is_muted(&self) -> bool {
        self.manager.is_muted()
    }

    /// The artifact from the last finished recording, if any.
    pub fn artifact(&self) -> Option<&Artifact> {
        self.recorder.artifact()
    }

    /// State of the chunk transport, if one is attached.
    pub fn transport_state(&self) -> Option<TransportState> {
        self.transport.as_ref().map(|transport| transport.state())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        // Same cancellation order as a normal stop, regardless of state:
        // cadence first, then the stream, then the transport.
        self.recorder.reset();
        self.manager.stop();
        self.close_transport();
        for task in self.relay_tasks.drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("status", &self.recorder.status())
            .field("collector", &self.collector)
            .finish()
    }
}
