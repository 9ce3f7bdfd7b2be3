//! # Codecast Core
//!
//! Live chunk transport for the Codecast recording engine. This crate
//! provides the duplex channel that forwards recorded chunks to a remote
//! collector as they are produced, together with its connection state
//! machine and reconnect scheduling.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod transport;

// Re-export main types
pub use error::TransportError;
pub use transport::{ChunkSink, ChunkTransport, TransportConfig, TransportEvent, TransportState};
