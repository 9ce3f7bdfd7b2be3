//! Capture and recorder error types
//!
//! Every failure here is recoverable: it is surfaced to the caller and
//! leaves the system idle with no tracks, timers, or connections held.

use thiserror::Error;

/// Errors raised while acquiring or tearing down a capture session.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The platform refused access to the requested device
    #[error("Capture permission denied: {message}")]
    PermissionDenied {
        /// Diagnostic message from the platform
        message: String,
    },

    /// No device of the requested kind is available
    #[error("Capture device not found: {message}")]
    DeviceNotFound {
        /// Diagnostic message from the platform
        message: String,
    },

    /// The capture backend failed for another reason
    #[error("Capture backend failure: {reason}")]
    Backend {
        /// Failure reason
        reason: String,
    },
}

/// Errors raised when starting a recording.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// `begin` was called with no active capture session
    #[error("Recorder started without an active capture session")]
    NoActiveSession,

    /// `begin` was called while a recording is already in progress
    #[error("A recording is already in progress")]
    AlreadyRecording,

    /// Profile negotiation found nothing the backend can encode
    #[error("No supported encoding profile after probing {attempted} candidates")]
    NoSupportedProfile {
        /// Number of profiles probed before giving up
        attempted: usize,
    },
}
