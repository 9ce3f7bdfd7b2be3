//! Chunked recorder
//!
//! Drives the active capture session's encoder on a fixed cadence,
//! buffering one chunk per tick and forwarding it to an attached chunk
//! sink. On `end` the ordered buffer is assembled into a single
//! [`Artifact`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use codecast_core::ChunkSink;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::artifact::Artifact;
use crate::capture::CaptureManager;
use crate::error::RecorderError;
use crate::profile::{self, EncodingProfile};

/// Recorder state machine.
///
/// `begin` moves Idle (or Stopped, superseding the prior artifact) to
/// Recording; `end` moves Recording to Stopped once the artifact is ready;
/// `reset` returns any state to a fresh Idle. There is no paused state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderStatus {
    /// Nothing buffered, ready for `begin`
    #[default]
    Idle,
    /// Chunks being produced on the cadence
    Recording,
    /// Recording finished, artifact available
    Stopped,
}

/// Events emitted as the recorder runs.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// Recording started under the negotiated profile
    Started {
        /// Profile chosen by negotiation
        profile: EncodingProfile,
    },
    /// One cadence tick produced a chunk
    ChunkRecorded {
        /// Zero-based chunk sequence number
        sequence: u64,
        /// Chunk size in bytes
        size: usize,
    },
    /// Recording finished and the artifact is ready
    Stopped {
        /// Number of chunks in the artifact
        chunk_count: usize,
        /// Seconds the recording ran
        elapsed_seconds: u64,
    },
    /// Recorder returned to a fresh idle state
    Reset,
}

#[derive(Debug, Default)]
struct RecorderShared {
    status: RecorderStatus,
    elapsed_seconds: u64,
    chunks: Vec<Bytes>,
}

/// Cadence-driven chunk recorder over one capture session.
pub struct ChunkedRecorder {
    cadence: Duration,
    preference: Vec<EncodingProfile>,
    shared: Arc<Mutex<RecorderShared>>,
    active_profile: Option<EncodingProfile>,
    artifact: Option<Artifact>,
    ticker: Option<JoinHandle<()>>,
    clock: Option<JoinHandle<()>>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl ChunkedRecorder {
    /// Create a recorder emitting a chunk every `cadence`, negotiating
    /// from `preference`.
    pub fn new(cadence: Duration, preference: Vec<EncodingProfile>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            cadence,
            preference,
            shared: Arc::new(Mutex::new(RecorderShared::default())),
            active_profile: None,
            artifact: None,
            ticker: None,
            clock: None,
            event_tx,
        }
    }

    /// Start recording the manager's active session.
    ///
    /// Fails when no session is active, when a recording is already in
    /// progress, or when profile negotiation comes up empty. On failure
    /// the recorder stays in its previous state with no timers running.
    pub fn begin(
        &mut self,
        manager: &mut CaptureManager,
        sink: Option<Arc<dyn ChunkSink>>,
    ) -> Result<(), RecorderError> {
        if self.shared.lock().status == RecorderStatus::Recording {
            return Err(RecorderError::AlreadyRecording);
        }
        if !manager.is_active() {
            return Err(RecorderError::NoActiveSession);
        }

        let chosen = profile::negotiate(manager.backend().as_ref(), &self.preference)?;
        let mut encoder = manager
            .take_encoder()
            .ok_or(RecorderError::NoActiveSession)?;

        // A new recording supersedes the previous artifact.
        self.artifact = None;
        self.active_profile = Some(chosen.clone());
        {
            let mut shared = self.shared.lock();
            shared.chunks.clear();
            shared.elapsed_seconds = 0;
            shared.status = RecorderStatus::Recording;
        }

        let shared = Arc::clone(&self.shared);
        let event_tx = self.event_tx.clone();
        let cadence = self.cadence;
        self.ticker = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let mut interval = tokio::time::interval_at(start + cadence, cadence);
            let mut sequence: u64 = 0;
            loop {
                interval.tick().await;
                let chunk = encoder.next_chunk();
                let size = chunk.len();
                {
                    let mut shared = shared.lock();
                    if shared.status != RecorderStatus::Recording {
                        break;
                    }
                    shared.chunks.push(chunk.clone());
                }
                let _ = event_tx.send(RecorderEvent::ChunkRecorded { sequence, size });
                // Buffering above happens before the forward attempt for
                // the same chunk; the sink drops anything it cannot take.
                if let Some(sink) = &sink {
                    sink.send(chunk);
                }
                sequence += 1;
            }
        }));

        let shared = Arc::clone(&self.shared);
        self.clock = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            let second = Duration::from_secs(1);
            let mut interval = tokio::time::interval_at(start + second, second);
            loop {
                interval.tick().await;
                let mut shared = shared.lock();
                if shared.status != RecorderStatus::Recording {
                    break;
                }
                shared.elapsed_seconds += 1;
            }
        }));

        info!(media_type = %chosen.media_type, "recording started");
        let _ = self.event_tx.send(RecorderEvent::Started { profile: chosen });
        Ok(())
    }

    /// Stop recording and assemble the artifact from the ordered buffer.
    ///
    /// The cadence is cancelled before the stream is released so no tick
    /// fires against a torn-down session. Zero buffered chunks yield an
    /// empty artifact, never an error. A second consecutive call is a
    /// no-op returning the existing artifact.
    pub fn end(&mut self, manager: &mut CaptureManager) -> Option<Artifact> {
        if self.shared.lock().status != RecorderStatus::Recording {
            debug!("end called while not recording");
            return self.artifact.clone();
        }

        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
        manager.stop();

        let (chunks, elapsed_seconds) = {
            let shared = self.shared.lock();
            (shared.chunks.clone(), shared.elapsed_seconds)
        };
        let profile = self
            .active_profile
            .clone()
            .unwrap_or_else(|| EncodingProfile::new("application/octet-stream", "bin"));
        let artifact = Artifact::from_chunks(&chunks, &profile);

        // The status flips only once the artifact reference exists.
        self.shared.lock().status = RecorderStatus::Stopped;
        info!(
            chunks = chunks.len(),
            bytes = artifact.len(),
            elapsed_seconds,
            "recording stopped"
        );
        let _ = self.event_tx.send(RecorderEvent::Stopped {
            chunk_count: chunks.len(),
            elapsed_seconds,
        });

        self.artifact = Some(artifact.clone());
        Some(artifact)
    }

    /// Discard the artifact and chunk buffer and return to a fresh Idle.
    ///
    /// Safe in any state; also used as the teardown path on drop.
    pub fn reset(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
        self.artifact = None;
        self.active_profile = None;
        {
            let mut shared = self.shared.lock();
            shared.chunks.clear();
            shared.elapsed_seconds = 0;
            shared.status = RecorderStatus::Idle;
        }
        let _ = self.event_tx.send(RecorderEvent::Reset);
    }

    /// Current recorder status.
    pub fn status(&self) -> RecorderStatus {
        self.shared.lock().status
    }

    /// Whole seconds elapsed in the current or finished recording.
    pub fn elapsed_seconds(&self) -> u64 {
        self.shared.lock().elapsed_seconds
    }

    /// Number of chunks buffered so far.
    pub fn chunk_count(&self) -> usize {
        self.shared.lock().chunks.len()
    }

    /// The artifact from the last finished recording, if any.
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Profile negotiated for the current or finished recording.
    pub fn active_profile(&self) -> Option<&EncodingProfile> {
        self.active_profile.as_ref()
    }

    /// Subscribe to recorder events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }
}

impl Default for ChunkedRecorder {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), profile::default_preference())
    }
}

impl Drop for ChunkedRecorder {
    fn drop(&mut self) {
        // Teardown runs the same cancellation regardless of state.
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
    }
}

impl std::fmt::Debug for ChunkedRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("ChunkedRecorder")
            .field("status", &shared.status)
            .field("chunks", &shared.chunks.len())
            .field("elapsed_seconds", &shared.elapsed_seconds)
            .field("cadence", &self.cadence)
            .finish()
    }
}
