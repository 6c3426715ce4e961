//! Runtime configuration for a [`crate::session::Session`].
//!
//! Nothing here is hard-wired into the engine: the bootstrap URL, retry/backoff
//! constants, and the bandwidth-throttle table all come from a `SessionConfig`
//! so tests can shrink timeouts instead of waiting on real ones.

use std::collections::HashMap;
use std::time::Duration;

/// Per-method-category advisory throttle set by `set_bandwidth_throttle`.
#[derive(Debug, Clone, Copy)]
pub struct BandwidthThrottle {
    pub max_bytes: usize,
    pub bytes_per_sec: usize,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HTTPS endpoint the `Bootstrap` collaborator resolves to a websocket address.
    pub bootstrap_url: String,
    /// Protocol version advertised in the `X-Protocol-Version` handshake header.
    pub protocol_version: String,
    /// Maximum number of handshake connect retries before `initialize` fails.
    pub max_init_retries: u32,
    /// Base interval for the connect-retry backoff (tripled each attempt, capped).
    pub init_retry_interval: Duration,
    /// Ceiling for the connect-retry backoff.
    pub init_retry_interval_cap: Duration,
    /// How many items the pipeline drains per phase per tick.
    pub chunk_size: usize,
    /// How long a non-discard message waits for a reply before being retried.
    pub reply_timeout: Duration,
    /// How many times a message is retried before being dropped.
    pub max_message_retries: u32,
    /// Sleep applied by the pipeline worker when all three queues are empty.
    pub idle_backoff: Duration,
    /// Advisory per-method-category bandwidth caps set via `set_bandwidth_throttle`.
    pub bandwidth_throttles: HashMap<String, BandwidthThrottle>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            bootstrap_url: protocol::BOOTSTRAP_URL.to_string(),
            protocol_version: protocol::PROTOCOL_VERSION.to_string(),
            max_init_retries: 7,
            init_retry_interval: Duration::from_millis(100),
            init_retry_interval_cap: Duration::from_secs(60),
            chunk_size: 10,
            reply_timeout: Duration::from_secs(10),
            max_message_retries: 10,
            idle_backoff: Duration::from_millis(15),
            bandwidth_throttles: HashMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn set_bandwidth_throttle(&mut self, kind: impl Into<String>, max_bytes: usize, bytes_per_sec: usize) {
        self.bandwidth_throttles.insert(
            kind.into(),
            BandwidthThrottle { max_bytes, bytes_per_sec },
        );
    }
}
