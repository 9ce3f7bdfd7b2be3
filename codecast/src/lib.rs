//! # Codecast - Recording Sessions for Live Coding Tools
//!
//! Codecast is the recording-session engine behind a browser-based
//! coding-session tool: it acquires a camera or display stream, records it
//! in timed encoded chunks, optionally streams each chunk to a collector
//! over a live socket as it is produced, and reassembles the chunks into a
//! single downloadable artifact.
//!
//! ## Key Properties
//!
//! - **One owner per resource**: the capture stream, cadence timers, and
//!   socket are fields of one session object; every mutation goes through
//!   its methods and teardown is safe in any state.
//! - **Best-effort streaming**: chunk forwarding never blocks recording;
//!   a dropped collector connection is redialed once per fixed delay while
//!   the recording lives, and lost chunks are never retried.
//! - **Recoverable failures**: capture denial, failed profile negotiation,
//!   and transport errors all leave the engine idle and restartable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codecast::Codecast;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let codecast = Codecast::init();
//!
//!     // Record the camera, streaming chunks to a local collector.
//!     let mut session = codecast
//!         .session()
//!         .camera()
//!         .stream_to("ws://127.0.0.1:9000/ingest")
//!         .begin()
//!         .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(3)).await;
//!
//!     let artifact = session.end()?;
//!     println!(
//!         "{} bytes of {} -> {}",
//!         artifact.len(),
//!         artifact.media_type(),
//!         artifact.suggested_filename()
//!     );
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use codecast_core::{
    ChunkSink, ChunkTransport, TransportConfig, TransportError, TransportEvent, TransportState,
};
pub use codecast_media::{
    default_preference, Artifact, CaptureBackend, CaptureConstraints, CaptureError, CaptureManager,
    ChunkedRecorder, EncodedSource, EncodingProfile, MediaStream, PreviewSink, RecorderError,
    RecorderStatus, SourceKind, SyntheticBackend, TrackHandle, TrackKind,
};

// Public API modules
pub mod config;
pub mod event;
pub mod exec;
pub mod session;

// Re-export main API types
pub use config::GlobalConfig;
pub use event::{EventStream, SessionEvent};
pub use exec::{CodeExecutor, ExecError, ExecOutcome, ExecRequest, HttpCodeExecutor};
pub use session::{RecordingSession, SessionBuilder, SessionError};

/// Main entry point for Codecast.
#[derive(Debug, Clone, Default)]
pub struct Codecast {
    config: GlobalConfig,
}

impl Codecast {
    /// Initialize Codecast with default settings.
    ///
    /// # Example
    /// ```rust
    /// use codecast::Codecast;
    ///
    /// let codecast = Codecast::init();
    /// ```
    pub fn init() -> Self {
        Self::init_with(GlobalConfig::default())
    }

    /// Initialize with custom global configuration.
    pub fn init_with(config: GlobalConfig) -> Self {
        Self { config }
    }

    /// Engine-wide configuration.
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Create a session builder.
    ///
    /// # Example
    /// ```rust,no_run
    /// use codecast::Codecast;
    ///
    /// # async fn example() -> Result<(), codecast::SessionError> {
    /// let codecast = Codecast::init();
    /// let session = codecast.session().display().begin().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn session(&self) -> SessionBuilder {
        SessionBuilder::new(self)
    }
}
