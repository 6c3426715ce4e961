//! The message envelope used by the pipeline's three queues.
//!
//! A [`Message`] is richer than a wire [`protocol::Frame`]: it additionally
//! tracks retry bookkeeping (`timestamp`, `retries`) that never goes over the
//! wire. `discard` messages never enter the awaiting-reply set.

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Message {
    pub id: u32,
    pub method: String,
    pub params: Value,
    pub discard: bool,
    /// Millisecond timestamp of last (re)send; compared against the reply
    /// timeout during the retry phase.
    pub timestamp_ms: i64,
    pub retries: u32,
}

impl Message {
    pub fn new(id: u32, method: impl Into<String>, params: Value, discard: bool, now_ms: i64) -> Self {
        Message {
            id,
            method: method.into(),
            params,
            discard,
            timestamp_ms: now_ms,
            retries: 0,
        }
    }

    pub fn to_frame(&self) -> protocol::Frame {
        protocol::Frame::Method {
            id: self.id,
            method: self.method.clone(),
            params: self.params.clone(),
            discard: self.discard,
        }
    }
}

/// Session-local monotonic id counter: not a process-wide static, so
/// independent sessions never share an id space.
#[derive(Debug, Default)]
pub struct IdCounter(std::sync::atomic::AtomicU32);

impl IdCounter {
    pub fn new() -> Self {
        IdCounter(std::sync::atomic::AtomicU32::new(1))
    }

    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}
