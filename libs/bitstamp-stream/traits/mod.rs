//! Core traits and types for the bitstamp-stream client
//!
//! - **Transport / Connector**: the seam between the protocol core and the
//!   socket layer
//! - **ReconnectionStrategy**: transport-side redial policy
//! - **StreamError**: error taxonomy shared across the crate

pub mod error;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{Result, StreamError};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use transport::{Connector, Transport, TransportEvent};
