//! Transport seam between the stream client and the socket layer
//!
//! The client never touches a socket directly. It drives a [`Transport`],
//! which queues outbound text frames and surfaces lifecycle notifications.
//! Socket-level retry policy belongs to the transport implementation; the
//! client only reacts to `Open` and `Close` and has no visibility into why
//! a close occurred.
//!
//! # Flow
//!
//! ```text
//! Stream Client ──send(text)──────────> Transport ──frames──> WebSocket
//! Stream Client <──recv(): Open/Close/Message(text)── Transport
//! ```

use crate::traits::error::Result;
use async_trait::async_trait;

/// Lifecycle notification delivered by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The underlying socket completed its handshake
    Open,
    /// The underlying socket dropped; the transport may redial on its own
    Close,
    /// One inbound text frame
    Message(String),
}

/// Contract the stream client requires from its socket layer
///
/// Implementations own their own dial/retry/backoff behavior and may emit
/// `Open`/`Close` pairs repeatedly over their lifetime. Frames sent while
/// the socket is down are queued and flushed once a session is back up.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Queue an outbound text frame
    fn send(&self, text: String) -> Result<()>;

    /// Wait for the next lifecycle notification
    ///
    /// Returns `None` once the transport has terminated for good (shut down
    /// or retries exhausted) and no further notifications will arrive.
    async fn recv(&mut self) -> Option<TransportEvent>;

    /// Tear the transport down
    ///
    /// Stops any internal redial loop. Idempotent.
    fn close(&self);
}

/// Opens fresh transports
///
/// A reconnect tears the current transport down and asks the connector for
/// a new one, so the connector outlives any single transport instance.
/// Tests substitute a scripted implementation here.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Transport type produced by this connector
    type Transport: Transport;

    /// Open a new transport
    async fn connect(&self) -> Result<Self::Transport>;
}
