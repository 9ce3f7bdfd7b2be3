//! Session event stream

use std::time::Duration;

use codecast_media::{EncodingProfile, SourceKind};
use tokio::sync::mpsc;

/// Events a recording session emits while it runs.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A capture stream was acquired
    CaptureStarted {
        /// Source the stream was acquired from
        source: SourceKind,
    },
    /// Recording started under the negotiated profile
    RecordingStarted {
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
    /// Recording finished
    RecordingStopped {
        /// Number of chunks recorded
        chunk_count: usize,
        /// Seconds the recording ran
        elapsed_seconds: u64,
    },
    /// The artifact for the finished recording is ready
    ArtifactReady {
        /// Artifact size in bytes
        size: usize,
        /// Artifact media type
        media_type: String,
    },
    /// Audio mute was toggled
    MuteChanged {
        /// New muted state
        muted: bool,
    },
    /// The session returned to a fresh idle state
    SessionReset,
    /// The chunk transport reached the collector
    TransportOpened {
        /// Collector endpoint
        endpoint: String,
    },
    /// The chunk transport closed
    TransportClosed {
        /// Collector endpoint
        endpoint: String,
    },
    /// An unexpected transport close scheduled a redial
    TransportReconnecting {
        /// Collector endpoint
        endpoint: String,
        /// Delay before the redial
        delay: Duration,
    },
    /// A transport failure; the recording continues locally
    TransportFailed {
        /// Failure description
        reason: String,
    },
}

impl SessionEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::CaptureStarted { .. } => "capture_started",
            SessionEvent::RecordingStarted { .. } => "recording_started",
            SessionEvent::ChunkRecorded { .. } => "chunk_recorded",
            SessionEvent::RecordingStopped { .. } => "recording_stopped",
            SessionEvent::ArtifactReady { .. } => "artifact_ready",
            SessionEvent::MuteChanged { .. } => "mute_changed",
            SessionEvent::SessionReset => "session_reset",
            SessionEvent::TransportOpened { .. } => "transport_opened",
            SessionEvent::TransportClosed { .. } => "transport_closed",
            SessionEvent::TransportReconnecting { .. } => "transport_reconnecting",
            SessionEvent::TransportFailed { .. } => "transport_failed",
        }
    }

    /// Whether this event concerns the chunk transport.
    pub fn is_transport_event(&self) -> bool {
        matches!(
            self,
            SessionEvent::TransportOpened { .. }
                | SessionEvent::TransportClosed { .. }
                | SessionEvent::TransportReconnecting { .. }
                | SessionEvent::TransportFailed { .. }
        )
    }
}

/// Stream of session events.
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event; `None` once the session is gone.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_stream_basic() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = EventStream::new(rx);

        tx.send(SessionEvent::ChunkRecorded {
            sequence: 0,
            size: 512,
        })
        .unwrap();

        let event = stream.next().await.unwrap();
        assert_eq!(event.event_type(), "chunk_recorded");
        assert!(!event.is_transport_event());
        assert!(stream.try_next().is_none());
    }
}
