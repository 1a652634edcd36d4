//! Router-solicitation transport strategy.
//!
//! The engine never opens sockets. Whoever embeds it supplies an
//! [`RsTransport`] that encodes and sends a single Router Solicitation on
//! the bound interface, and performs whatever one-time setup the wire
//! needs. Both calls are synchronous; a transport that must do async work
//! manages its own cancellation.
//!
//! Errors are opaque strings used only for logging. Send failures never
//! cancel the retry schedule.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

/// Opaque transport failure, surfaced in logs and deduplicated there.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        TransportError(msg.into())
    }
}

/// The two hooks the engine calls into the wire.
pub trait RsTransport: Send {
    /// One-time initialisation, called from `start()` after the RA
    /// timeout is armed, inside the engine's namespace.
    fn start(&mut self) -> Result<(), TransportError>;

    /// Send exactly one Router Solicitation on the bound interface.
    fn send_rs(&mut self) -> Result<(), TransportError>;
}

// ════════════════════════════════════════════════════════════════════════════
// MOCK TRANSPORT
// ════════════════════════════════════════════════════════════════════════════

/// Scriptable transport for tests.
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another: `let probe = mock.clone();`.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    starts: u32,
    sends: u32,
    fail_with: Option<String>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        MockTransport::default()
    }

    /// How many times `start` ran.
    #[must_use]
    pub fn starts(&self) -> u32 {
        self.inner.lock().starts
    }

    /// How many `send_rs` attempts were made (successful or not).
    #[must_use]
    pub fn sends(&self) -> u32 {
        self.inner.lock().sends
    }

    /// Make every subsequent `send_rs` fail with `msg`; `None` restores
    /// success.
    pub fn fail_sends_with(&self, msg: Option<&str>) {
        self.inner.lock().fail_with = msg.map(str::to_string);
    }
}

impl RsTransport for MockTransport {
    fn start(&mut self) -> Result<(), TransportError> {
        self.inner.lock().starts += 1;
        Ok(())
    }

    fn send_rs(&mut self) -> Result<(), TransportError> {
        let mut state = self.inner.lock();
        state.sends += 1;
        match &state.fail_with {
            Some(msg) => Err(TransportError(msg.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_counts_attempts() {
        let mock = MockTransport::new();
        let mut transport: Box<dyn RsTransport> = Box::new(mock.clone());
        assert!(transport.start().is_ok());
        assert!(transport.send_rs().is_ok());
        assert!(transport.send_rs().is_ok());
        assert_eq!(mock.starts(), 1);
        assert_eq!(mock.sends(), 2);
    }

    #[test]
    fn test_mock_scripted_failure() {
        let mock = MockTransport::new();
        let mut transport: Box<dyn RsTransport> = Box::new(mock.clone());
        mock.fail_sends_with(Some("link down"));
        let err = transport.send_rs().expect_err("should fail");
        assert_eq!(err.to_string(), "link down");
        // failed attempts still count
        assert_eq!(mock.sends(), 1);
        mock.fail_sends_with(None);
        assert!(transport.send_rs().is_ok());
    }
}
