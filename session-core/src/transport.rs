//! The external-collaborator boundary for the websocket and for host discovery.
//!
//! This crate never opens a socket itself. Both of these traits describe what
//! the core consumes and produces; a real implementation (HTTP client, TLS
//! websocket) lives outside this crate. The fakes here exist for this crate's
//! own test suite.

use crate::error::SessionError;

/// Observable state of the duplex text-frame channel underneath a session.
///
/// `Activated` is part of the collaborator's state set but is never acted on
/// by the session engine; it is folded into `Connected` wherever the core
/// reads transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Activated,
}

impl TransportState {
    /// Whether the core should treat this state as usable for sending.
    pub fn is_connected(self) -> bool {
        matches!(self, TransportState::Connected | TransportState::Activated)
    }
}

/// Abstracts the websocket the session speaks JSON-RPC frames over.
///
/// Implementors own reconnection policy entirely; the core only observes
/// `state()` and reacts to it.
pub trait Transport: Send {
    /// Sets the URI to (re)connect to. Does not itself initiate a connection.
    fn set_uri(&mut self, uri: &str);

    /// Ensures a connection attempt is in flight if not already connected.
    fn ensure_connected(&mut self);

    /// Sends one JSON-RPC frame as a text message. Errors are transport errors,
    /// never protocol errors - the caller treats them as retry fodder.
    fn send(&mut self, text: &str) -> Result<(), SessionError>;

    /// Closes the connection. Best-effort: in-flight state is abandoned.
    fn close(&mut self);

    /// Current observed state.
    fn state(&self) -> TransportState;

    /// Drains any text messages received since the last call, in arrival order.
    fn poll_incoming(&mut self) -> Vec<String>;
}

/// Resolves the bootstrap URL to a websocket address and hands back the
/// connection headers the service expects.
pub trait Bootstrap: Send {
    /// Performs the HTTPS host-discovery request and returns a `wss://` URI.
    fn resolve(&mut self, bootstrap_url: &str) -> Result<String, SessionError>;
}

/// An in-memory `Transport` double for tests. Frames pushed with
/// [`FakeTransport::push_incoming`] are returned by the next `poll_incoming`;
/// frames handed to [`Transport::send`] land in [`FakeTransport::sent`].
pub struct FakeTransport {
    state: TransportState,
    uri: Option<String>,
    incoming: Vec<String>,
    pub sent: Vec<String>,
    /// When set, `send` fails once and then clears itself - used to exercise
    /// the pipeline's retry-on-send-failure path.
    pub fail_next_send: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        FakeTransport {
            state: TransportState::Disconnected,
            uri: None,
            incoming: Vec::new(),
            sent: Vec::new(),
            fail_next_send: false,
        }
    }

    pub fn set_state(&mut self, state: TransportState) {
        self.state = state;
    }

    pub fn push_incoming(&mut self, text: impl Into<String>) {
        self.incoming.push(text.into());
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for FakeTransport {
    fn set_uri(&mut self, uri: &str) {
        self.uri = Some(uri.to_string());
    }

    fn ensure_connected(&mut self) {
        if self.state == TransportState::Disconnected {
            self.state = TransportState::Connecting;
        }
    }

    fn send(&mut self, text: &str) -> Result<(), SessionError> {
        if self.fail_next_send {
            self.fail_next_send = false;
            return Err(SessionError::Transport("simulated send failure".to_string()));
        }
        self.sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.state = TransportState::Disconnected;
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn poll_incoming(&mut self) -> Vec<String> {
        std::mem::take(&mut self.incoming)
    }
}

/// An in-memory `Bootstrap` double for tests.
pub struct FakeBootstrap {
    pub address: Result<String, String>,
}

impl FakeBootstrap {
    pub fn new(address: impl Into<String>) -> Self {
        FakeBootstrap { address: Ok(address.into()) }
    }

    pub fn failing(error: impl Into<String>) -> Self {
        FakeBootstrap { address: Err(error.into()) }
    }
}

impl Bootstrap for FakeBootstrap {
    fn resolve(&mut self, _bootstrap_url: &str) -> Result<String, SessionError> {
        self.address.clone().map_err(SessionError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_connected_moves_disconnected_to_connecting() {
        let mut t = FakeTransport::new();
        t.ensure_connected();
        assert_eq!(t.state(), TransportState::Connecting);
    }

    #[test]
    fn send_failure_is_one_shot() {
        let mut t = FakeTransport::new();
        t.fail_next_send = true;
        assert!(t.send("a").is_err());
        assert!(t.send("b").is_ok());
        assert_eq!(t.sent, vec!["b".to_string()]);
    }
}
