//! # Codecast Media
//!
//! Media layer of the Codecast recording engine: capture session
//! management, the chunked recorder, encoding-profile negotiation, and
//! artifact assembly.

#![warn(clippy::all)]

pub mod artifact;
pub mod capture;
pub mod error;
pub mod profile;
pub mod recorder;

// Re-export main types
pub use artifact::Artifact;
pub use capture::{
    CaptureBackend, CaptureConstraints, CaptureManager, EncodedSource, MediaStream, PreviewSink,
    SourceKind, SyntheticBackend, TrackHandle, TrackKind,
};
pub use error::{CaptureError, RecorderError};
pub use profile::{default_preference, negotiate, EncodingProfile};
pub use recorder::{ChunkedRecorder, RecorderEvent, RecorderStatus};
