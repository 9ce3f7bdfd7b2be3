//! Error types for the chunk transport

use thiserror::Error;

/// Errors raised by the live chunk transport.
///
/// Transport failures are never fatal to an in-progress recording: the
/// recorder keeps buffering locally and the transport retries per its
/// reconnect policy. These errors surface in logs and transport events.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The collector endpoint is not a usable WebSocket URL
    #[error("Invalid collector endpoint {url}: {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Dialing the collector failed
    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectFailed {
        /// Collector endpoint
        endpoint: String,
        /// Reason for the dial failure
        reason: String,
    },

    /// The socket rejected an outgoing chunk
    #[error("Chunk send failed: {reason}")]
    SendFailed {
        /// Reason for the send failure
        reason: String,
    },
}
