//! Error taxonomy for the session engine.
//!
//! Every fallible path in this crate ends up here rather than panicking. The
//! four kinds mirror the ones called out for the message pipeline and the
//! mutator API: configuration mistakes the host made, transport hiccups the
//! pipeline retries on its own, malformed/unexpected protocol traffic that
//! gets logged and dropped, and fatal conditions that force the session back
//! to `not_initialized`.

use thiserror::Error;

/// The stable error codes surfaced to the host through [`crate::event::Event::Error`].
///
/// A handful of these (`BufferSize`, `PropertyNotFound`) exist only for wire
/// and historical-API fidelity; the owned-snapshot accessors this crate
/// exposes never actually produce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok,
    NotConnected,
    BufferSize,
    PropertyNotFound,
    NoSuchEntity,
    OperationCanceled,
    ConnectionRefused,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::NotConnected => "not_connected",
            ErrorCode::BufferSize => "buffer_size",
            ErrorCode::PropertyNotFound => "property_not_found",
            ErrorCode::NoSuchEntity => "no_such_entity",
            ErrorCode::OperationCanceled => "operation_canceled",
            ErrorCode::ConnectionRefused => "connection_refused",
        }
    }
}

/// Top-level error type for the session engine.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Configuration(&'static str),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("fatal error: {0}")]
    Fatal(&'static str),
}

impl SessionError {
    /// Maps an error to the stable code the host sees on the wire event.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::Configuration(msg) if msg.contains("scene") || msg.contains("group") => {
                ErrorCode::NoSuchEntity
            }
            SessionError::Configuration(_) => ErrorCode::OperationCanceled,
            SessionError::Transport(_) => ErrorCode::NotConnected,
            SessionError::Protocol(_) => ErrorCode::OperationCanceled,
            SessionError::Fatal(msg) if msg.contains("refused") => ErrorCode::ConnectionRefused,
            SessionError::Fatal(_) => ErrorCode::OperationCanceled,
        }
    }
}
