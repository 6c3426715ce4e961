//! Outbound events drained by the host on its own tick via `do_work`.

use crate::error::ErrorCode;

/// Something the host needs to react to. Drained in FIFO order by `do_work`.
#[derive(Debug, Clone)]
pub enum Event {
    Error {
        timestamp_ms: i64,
        code: ErrorCode,
        message: String,
    },
    InteractivityStateChanged {
        timestamp_ms: i64,
        state: crate::state::SessionState,
    },
    ParticipantStateChanged {
        timestamp_ms: i64,
        mixer_id: u32,
        session_id: String,
        joined: bool,
    },
    Button {
        timestamp_ms: i64,
        control_id: String,
        participant_mixer_id: u32,
        is_pressed: bool,
        cost: u32,
        transaction_id: String,
    },
    Joystick {
        timestamp_ms: i64,
        control_id: String,
        participant_mixer_id: u32,
        x: f64,
        y: f64,
    },
    Custom {
        timestamp_ms: i64,
        method: String,
        params: serde_json::Value,
    },
}

/// Out-of-scope collaborator that wants a copy of every `trace!`/`warn!`/
/// `error!` line the engine emits, independent of whatever log subscriber
/// the host has installed.
pub trait DebugSink: Send {
    fn on_debug_message(&mut self, level: &str, message: &str);
}
