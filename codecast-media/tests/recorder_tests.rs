//! Integration tests for the capture manager and chunked recorder
//!
//! Timing-sensitive tests run on a paused tokio clock, so cadence counts
//! are exact rather than tolerance-based.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use codecast_core::{ChunkSink, TransportState};
use codecast_media::{
    default_preference, CaptureBackend, CaptureConstraints, CaptureError, CaptureManager,
    ChunkedRecorder, EncodingProfile, MediaStream, RecorderError, RecorderStatus, SourceKind,
    SyntheticBackend,
};
use parking_lot::Mutex;

const CHUNK_LEN: usize = 8;

fn manager() -> CaptureManager {
    CaptureManager::new(Arc::new(SyntheticBackend::new(CHUNK_LEN)))
}

fn recorder() -> ChunkedRecorder {
    ChunkedRecorder::new(Duration::from_secs(1), default_preference())
}

async fn start_camera(manager: &mut CaptureManager) {
    manager
        .start(
            SourceKind::Camera,
            &CaptureConstraints::for_source(SourceKind::Camera),
        )
        .await
        .unwrap();
}

/// Backend standing in for a platform that refuses the permission prompt.
struct DeniedBackend;

#[async_trait]
impl CaptureBackend for DeniedBackend {
    async fn acquire(
        &self,
        _source: SourceKind,
        _constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError> {
        Err(CaptureError::PermissionDenied {
            message: "Permission denied by user agent".to_string(),
        })
    }

    fn supports_profile(&self, _profile: &EncodingProfile) -> bool {
        true
    }

    fn fallback_profile(&self) -> Option<EncodingProfile> {
        None
    }
}

/// Chunk sink that records everything sent to it.
struct RecordingSink {
    sent: Mutex<Vec<Bytes>>,
}

impl ChunkSink for RecordingSink {
    fn send(&self, chunk: Bytes) {
        self.sent.lock().push(chunk);
    }

    fn state(&self) -> TransportState {
        TransportState::Open
    }
}

#[tokio::test(start_paused = true)]
async fn three_ticks_produce_three_ordered_chunks() {
    let mut manager = manager();
    let mut recorder = recorder();
    start_camera(&mut manager).await;
    recorder.begin(&mut manager, None).unwrap();
    assert_eq!(recorder.status(), RecorderStatus::Recording);

    tokio::time::sleep(Duration::from_millis(3_050)).await;
    let artifact = recorder.end(&mut manager).unwrap();

    assert_eq!(recorder.status(), RecorderStatus::Stopped);
    assert_eq!(recorder.chunk_count(), 3);
    assert_eq!(recorder.elapsed_seconds(), 3);
    assert!(!manager.is_active());

    // Chunk n is CHUNK_LEN copies of byte n, so the concatenation proves
    // production order.
    assert_eq!(artifact.len(), 3 * CHUNK_LEN);
    let mut expected = Vec::new();
    for n in 0u8..3 {
        expected.extend(std::iter::repeat(n).take(CHUNK_LEN));
    }
    assert_eq!(artifact.data().as_ref(), expected.as_slice());
}

#[tokio::test(start_paused = true)]
async fn end_before_first_tick_yields_empty_artifact() {
    let mut manager = manager();
    let mut recorder = recorder();
    start_camera(&mut manager).await;
    recorder.begin(&mut manager, None).unwrap();

    let artifact = recorder.end(&mut manager).unwrap();
    assert!(artifact.is_empty());
    assert_eq!(recorder.status(), RecorderStatus::Stopped);
    assert_eq!(recorder.chunk_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_end_is_a_noop() {
    let mut manager = manager();
    let mut recorder = recorder();
    start_camera(&mut manager).await;
    recorder.begin(&mut manager, None).unwrap();

    tokio::time::sleep(Duration::from_millis(1_050)).await;
    let first = recorder.end(&mut manager).unwrap();
    let second = recorder.end(&mut manager).unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(recorder.status(), RecorderStatus::Stopped);
    assert_eq!(recorder.chunk_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_returns_to_a_fresh_idle() {
    let mut manager = manager();
    let mut recorder = recorder();
    start_camera(&mut manager).await;
    recorder.begin(&mut manager, None).unwrap();
    tokio::time::sleep(Duration::from_millis(2_050)).await;
    recorder.end(&mut manager);

    recorder.reset();
    assert_eq!(recorder.status(), RecorderStatus::Idle);
    assert_eq!(recorder.chunk_count(), 0);
    assert_eq!(recorder.elapsed_seconds(), 0);
    assert!(recorder.artifact().is_none());

    // Ready for a new recording.
    start_camera(&mut manager).await;
    recorder.begin(&mut manager, None).unwrap();
    assert_eq!(recorder.status(), RecorderStatus::Recording);
    recorder.end(&mut manager);
}

#[tokio::test(start_paused = true)]
async fn reset_directly_after_zero_chunk_end() {
    let mut manager = manager();
    let mut recorder = recorder();
    start_camera(&mut manager).await;
    recorder.begin(&mut manager, None).unwrap();
    recorder.end(&mut manager);

    recorder.reset();
    assert_eq!(recorder.status(), RecorderStatus::Idle);
    assert_eq!(recorder.chunk_count(), 0);
}

#[tokio::test]
async fn begin_without_active_session_fails() {
    let mut manager = manager();
    let mut recorder = recorder();
    let err = recorder.begin(&mut manager, None).unwrap_err();
    assert!(matches!(err, RecorderError::NoActiveSession));
    assert_eq!(recorder.status(), RecorderStatus::Idle);
}

#[tokio::test]
async fn begin_while_recording_fails() {
    let mut manager = manager();
    let mut recorder = recorder();
    start_camera(&mut manager).await;
    recorder.begin(&mut manager, None).unwrap();

    let err = recorder.begin(&mut manager, None).unwrap_err();
    assert!(matches!(err, RecorderError::AlreadyRecording));
    recorder.end(&mut manager);
}

#[tokio::test]
async fn denied_permission_leaves_everything_idle() {
    let mut manager = CaptureManager::new(Arc::new(DeniedBackend));
    let mut recorder = recorder();

    let err = manager
        .start(
            SourceKind::Camera,
            &CaptureConstraints::for_source(SourceKind::Camera),
        )
        .await
        .unwrap_err();
    match err {
        CaptureError::PermissionDenied { message } => {
            assert!(message.contains("Permission denied"));
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }

    assert!(!manager.is_active());
    let err = recorder.begin(&mut manager, None).unwrap_err();
    assert!(matches!(err, RecorderError::NoActiveSession));
    assert_eq!(recorder.status(), RecorderStatus::Idle);
    assert_eq!(recorder.chunk_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn chunks_are_forwarded_to_the_sink_in_order() {
    let mut manager = manager();
    let mut recorder = recorder();
    start_camera(&mut manager).await;

    let sink = Arc::new(RecordingSink {
        sent: Mutex::new(Vec::new()),
    });
    recorder
        .begin(&mut manager, Some(Arc::clone(&sink) as Arc<dyn ChunkSink>))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3_050)).await;
    recorder.end(&mut manager);

    let sent = sink.sent.lock();
    assert_eq!(sent.len(), 3);
    for (n, chunk) in sent.iter().enumerate() {
        assert_eq!(chunk.as_ref(), vec![n as u8; CHUNK_LEN].as_slice());
    }
}

#[tokio::test(start_paused = true)]
async fn new_begin_supersedes_the_previous_artifact() {
    let mut manager = manager();
    let mut recorder = recorder();
    start_camera(&mut manager).await;
    recorder.begin(&mut manager, None).unwrap();
    tokio::time::sleep(Duration::from_millis(2_050)).await;
    let first = recorder.end(&mut manager).unwrap();
    assert_eq!(first.len(), 2 * CHUNK_LEN);

    // Restarting from Stopped discards the old artifact and buffer.
    start_camera(&mut manager).await;
    recorder.begin(&mut manager, None).unwrap();
    assert_eq!(recorder.chunk_count(), 0);
    assert!(recorder.artifact().is_none());

    tokio::time::sleep(Duration::from_millis(1_050)).await;
    let second = recorder.end(&mut manager).unwrap();
    assert_eq!(second.len(), CHUNK_LEN);
}
