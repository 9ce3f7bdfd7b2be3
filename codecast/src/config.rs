//! Configuration types and defaults

use std::time::Duration;

use codecast_media::{profile, EncodingProfile};

/// Engine-wide configuration shared by every session.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Interval between emitted chunks
    pub chunk_cadence: Duration,
    /// Delay before the single redial after an unexpected transport close
    pub reconnect_delay: Duration,
    /// How long a collector dial may take before it counts as failed
    pub connect_timeout: Duration,
    /// Encoding profiles probed in order at recording start
    pub profile_preference: Vec<EncodingProfile>,
    /// Collector URL used when a session enables streaming without one
    pub default_collector_url: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            chunk_cadence: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
            profile_preference: profile::default_preference(),
            default_collector_url: None,
        }
    }
}
