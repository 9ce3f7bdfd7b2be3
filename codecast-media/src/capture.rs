//! Capture session management
//!
//! Acquisition of a live camera or display stream, preview wiring, mute
//! control, and teardown. Platform acquisition sits behind the
//! [`CaptureBackend`] trait; the crate ships a deterministic
//! [`SyntheticBackend`] for tests, demos, and platforms without a native
//! backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CaptureError;
use crate::profile::EncodingProfile;

/// Kind of media source to acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Webcam plus microphone
    Camera,
    /// Screen contents, optionally with audio
    Display,
}

/// Audio/video constraints passed to acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Request an audio track
    pub audio: bool,
    /// Request a video track
    pub video: bool,
}

impl CaptureConstraints {
    /// Default constraints for a source: camera wants audio and video,
    /// display capture wants video only.
    pub fn for_source(source: SourceKind) -> Self {
        match source {
            SourceKind::Camera => Self {
                audio: true,
                video: true,
            },
            SourceKind::Display => Self {
                audio: false,
                video: true,
            },
        }
    }
}

/// Kind of an acquired track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

/// Handle to one acquired track.
///
/// The enabled flag is shared: flipping it through [`CaptureManager::toggle_mute`]
/// is immediately visible on every clone of the handle.
#[derive(Debug, Clone)]
pub struct TrackHandle {
    kind: TrackKind,
    label: String,
    enabled: Arc<AtomicBool>,
}

impl TrackHandle {
    /// Create an enabled track handle.
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Track kind.
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Human-readable device label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the track currently produces data.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

/// Source of encoded media bytes, drained once per cadence tick.
///
/// Implementations accumulate whatever the encoder produced since the
/// previous call and hand it over as one chunk.
pub trait EncodedSource: Send {
    /// Bytes encoded since the previous call. May be empty.
    fn next_chunk(&mut self) -> Bytes;
}

/// A live stream produced by a capture backend.
pub struct MediaStream {
    id: Uuid,
    source: SourceKind,
    tracks: Vec<TrackHandle>,
    encoder: Option<Box<dyn EncodedSource>>,
}

impl MediaStream {
    /// Assemble a stream from its tracks and encoder.
    pub fn new(
        source: SourceKind,
        tracks: Vec<TrackHandle>,
        encoder: Box<dyn EncodedSource>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            tracks,
            encoder: Some(encoder),
        }
    }

    /// Unique stream id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Source kind this stream was acquired from.
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// All acquired tracks.
    pub fn tracks(&self) -> &[TrackHandle] {
        &self.tracks
    }

    /// Audio tracks only.
    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks
            .iter()
            .filter(|track| track.kind() == TrackKind::Audio)
    }

    pub(crate) fn take_encoder(&mut self) -> Option<Box<dyn EncodedSource>> {
        self.encoder.take()
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("tracks", &self.tracks)
            .field("encoder_taken", &self.encoder.is_none())
            .finish()
    }
}

/// Platform-specific media acquisition.
///
/// Acquisition is an explicit awaitable operation: the permission prompt
/// and device setup complete inside `acquire`, which returns either a live
/// stream or the platform's diagnostic wrapped in a [`CaptureError`].
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Request a live stream for `source` under `constraints`.
    async fn acquire(
        &self,
        source: SourceKind,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError>;

    /// Whether this backend can encode the given profile.
    fn supports_profile(&self, profile: &EncodingProfile) -> bool;

    /// Generic profile used when nothing on the preference list is
    /// supported. `None` means recording cannot start at all.
    fn fallback_profile(&self) -> Option<EncodingProfile>;
}

/// Receives the live stream for local preview while a session is active.
pub trait PreviewSink: Send {
    /// Wire the stream to the preview surface.
    fn attach(&mut self, stream: &MediaStream);

    /// Tear the preview surface down.
    fn detach(&mut self);
}

/// Deterministic capture backend producing a synthetic test-pattern stream.
///
/// Chunk `n` is `chunk_len` copies of the byte `n`, so ordering and
/// concatenation are checkable from artifact contents alone.
pub struct SyntheticBackend {
    supported: Vec<String>,
    chunk_len: usize,
}

impl SyntheticBackend {
    /// Backend encoding WebM profiles with `chunk_len`-byte chunks.
    pub fn new(chunk_len: usize) -> Self {
        Self {
            supported: vec![
                "video/webm;codecs=vp9,opus".to_string(),
                "video/webm".to_string(),
            ],
            chunk_len,
        }
    }

    /// Restrict the set of media types this backend claims to encode.
    pub fn with_supported(mut self, media_types: Vec<String>) -> Self {
        self.supported = media_types;
        self
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn acquire(
        &self,
        source: SourceKind,
        constraints: &CaptureConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if !constraints.audio && !constraints.video {
            return Err(CaptureError::Backend {
                reason: "constraints request neither audio nor video".to_string(),
            });
        }

        let mut tracks = Vec::new();
        if constraints.video {
            tracks.push(TrackHandle::new(TrackKind::Video, "synthetic-video"));
        }
        if constraints.audio {
            tracks.push(TrackHandle::new(TrackKind::Audio, "synthetic-audio"));
        }

        let encoder = Box::new(SyntheticEncoder {
            sequence: 0,
            chunk_len: self.chunk_len,
        });
        Ok(MediaStream::new(source, tracks, encoder))
    }

    fn supports_profile(&self, profile: &EncodingProfile) -> bool {
        self.supported.iter().any(|m| m == &profile.media_type)
    }

    fn fallback_profile(&self) -> Option<EncodingProfile> {
        Some(EncodingProfile::new("application/octet-stream", "bin"))
    }
}

struct SyntheticEncoder {
    sequence: u64,
    chunk_len: usize,
}

impl EncodedSource for SyntheticEncoder {
    fn next_chunk(&mut self) -> Bytes {
        let chunk = Bytes::from(vec![self.sequence as u8; self.chunk_len]);
        self.sequence += 1;
        chunk
    }
}

/// Owner of the single active capture session.
///
/// All track and preview mutation goes through this controller; no other
/// component touches track enabled-state except via [`CaptureManager::toggle_mute`].
pub struct CaptureManager {
    backend: Arc<dyn CaptureBackend>,
    preview: Option<Box<dyn PreviewSink>>,
    active: Option<MediaStream>,
    muted: bool,
}

impl CaptureManager {
    /// Create a manager over the given backend.
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            preview: None,
            active: None,
            muted: false,
        }
    }

    /// Attach a preview surface; wired on every subsequent `start`.
    pub fn set_preview(&mut self, sink: Box<dyn PreviewSink>) {
        self.preview = Some(sink);
    }

    /// Acquire a stream for `source`, tearing down any existing session
    /// first.
    ///
    /// On denial or device absence the error carries the backend's
    /// diagnostic and the manager stays idle with nothing held.
    pub async fn start(
        &mut self,
        source: SourceKind,
        constraints: &CaptureConstraints,
    ) -> Result<(), CaptureError> {
        if self.active.is_some() {
            debug!("tearing down previous capture session before restart");
            self.stop();
        }

        let stream = self.backend.acquire(source, constraints).await?;
        info!(stream = %stream.id(), ?source, "capture session started");

        if let Some(preview) = &mut self.preview {
            preview.attach(&stream);
        }
        self.active = Some(stream);
        self.muted = false;
        Ok(())
    }

    /// Release every acquired track and detach the preview surface.
    ///
    /// Safe to call when no session is active.
    pub fn stop(&mut self) {
        let Some(stream) = self.active.take() else {
            return;
        };

        for track in stream.tracks() {
            track.set_enabled(false);
        }
        if let Some(preview) = &mut self.preview {
            preview.detach();
        }
        self.muted = false;
        info!(stream = %stream.id(), "capture session stopped");
    }

    /// Flip whether audio tracks are enabled, without destroying the
    /// session. Returns the new muted state; a no-op when idle.
    pub fn toggle_mute(&mut self) -> bool {
        let Some(stream) = &self.active else {
            return self.muted;
        };

        self.muted = !self.muted;
        for track in stream.audio_tracks() {
            track.set_enabled(!self.muted);
        }
        debug!(muted = self.muted, "audio mute toggled");
        self.muted
    }

    /// Whether a session is currently active.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether audio tracks are muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// The active stream, if any.
    pub fn stream(&self) -> Option<&MediaStream> {
        self.active.as_ref()
    }

    /// Backend this manager acquires from, for profile negotiation.
    pub fn backend(&self) -> &Arc<dyn CaptureBackend> {
        &self.backend
    }

    pub(crate) fn take_encoder(&mut self) -> Option<Box<dyn EncodedSource>> {
        self.active.as_mut().and_then(|stream| stream.take_encoder())
    }
}

impl std::fmt::Debug for CaptureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureManager")
            .field("active", &self.active)
            .field("muted", &self.muted)
            .field("has_preview", &self.preview.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn camera_acquisition_yields_audio_and_video() {
        let mut manager = CaptureManager::new(Arc::new(SyntheticBackend::new(8)));
        manager
            .start(
                SourceKind::Camera,
                &CaptureConstraints::for_source(SourceKind::Camera),
            )
            .await
            .unwrap();

        let stream = manager.stream().unwrap();
        assert_eq!(stream.source(), SourceKind::Camera);
        assert_eq!(stream.tracks().len(), 2);
        assert_eq!(stream.audio_tracks().count(), 1);
    }

    #[tokio::test]
    async fn toggle_mute_flips_audio_tracks_only() {
        let mut manager = CaptureManager::new(Arc::new(SyntheticBackend::new(8)));
        manager
            .start(
                SourceKind::Camera,
                &CaptureConstraints::for_source(SourceKind::Camera),
            )
            .await
            .unwrap();

        assert!(manager.toggle_mute());
        let stream = manager.stream().unwrap();
        for track in stream.tracks() {
            match track.kind() {
                TrackKind::Audio => assert!(!track.is_enabled()),
                TrackKind::Video => assert!(track.is_enabled()),
            }
        }

        assert!(!manager.toggle_mute());
        let stream = manager.stream().unwrap();
        assert!(stream.audio_tracks().all(|t| t.is_enabled()));
    }

    #[tokio::test]
    async fn restart_replaces_the_active_session() {
        let mut manager = CaptureManager::new(Arc::new(SyntheticBackend::new(8)));
        manager
            .start(
                SourceKind::Camera,
                &CaptureConstraints::for_source(SourceKind::Camera),
            )
            .await
            .unwrap();
        let first_tracks: Vec<_> = manager.stream().unwrap().tracks().to_vec();

        manager
            .start(
                SourceKind::Display,
                &CaptureConstraints::for_source(SourceKind::Display),
            )
            .await
            .unwrap();

        // Old tracks were released, new session is display-only video.
        assert!(first_tracks.iter().all(|t| !t.is_enabled()));
        let stream = manager.stream().unwrap();
        assert_eq!(stream.source(), SourceKind::Display);
        assert_eq!(stream.audio_tracks().count(), 0);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut manager = CaptureManager::new(Arc::new(SyntheticBackend::new(8)));
        manager.stop();

        manager
            .start(
                SourceKind::Camera,
                &CaptureConstraints::for_source(SourceKind::Camera),
            )
            .await
            .unwrap();
        manager.stop();
        assert!(!manager.is_active());
        manager.stop();
        assert!(!manager.is_active());
    }
}
