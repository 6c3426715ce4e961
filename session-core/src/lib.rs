//! Client-side session engine for the interactive broadcast protocol.
//!
//! Owns the websocket handshake, the JSON-RPC message pipeline, the session
//! lifecycle state machine, and a local mirror of scenes/groups/controls/
//! participants. Talks to the outside world only through the [`Transport`]
//! and [`Bootstrap`] traits; this crate never opens a socket itself.

mod batch;
mod config;
mod error;
mod event;
mod input;
mod message;
mod mirror;
mod pipeline;
mod session;
mod state;
mod transport;

pub use batch::ControlBatch;
pub use config::{BandwidthThrottle, SessionConfig};
pub use error::{ErrorCode, SessionError};
pub use event::{DebugSink, Event};
pub use mirror::{ButtonState, Control, Group, Participant, Scene};
pub use session::Session;
pub use state::SessionState;
pub use transport::{Bootstrap, FakeBootstrap, FakeTransport, Transport, TransportState};
