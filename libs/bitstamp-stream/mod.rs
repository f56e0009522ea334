//! # bitstamp-stream
//!
//! Streaming client for the Bitstamp live event feed (publish/subscribe over
//! a persistent WebSocket).
//!
//! ## Features
//!
//! - **Single owning driver task**: transport notifications, commands and
//!   watchdog ticks are serialized through one task, so subscription and
//!   liveness state never see parallel mutation
//! - **Heartbeat watchdog**: detects links that are open at the socket layer
//!   but no longer moving application data
//! - **Transport seam**: the socket layer sits behind a trait with its own
//!   redial policy; tests substitute a scripted transport
//! - **Typed events**: protocol acks and channel data surface as one typed
//!   event stream, with trade/order payloads enriched with a derived cost
//!
//! ## Example
//!
//! ```rust,ignore
//! use bitstamp_stream::{StreamClient, StreamConfig, StreamEvent};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> bitstamp_stream::Result<()> {
//!     let client = StreamClient::connect(
//!         StreamConfig::new().with_polling_interval(Duration::from_secs(15)),
//!     )
//!     .await?;
//!
//!     client.subscribe("live_trades", "btcusd")?;
//!
//!     while let Ok(event) = client.recv_event() {
//!         println!("event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod traits;
pub mod transport;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use crate::core::{
    client::{StreamClient, StreamEvent},
    config::{Credentials, StreamConfig, DEFAULT_URL},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    protocol,
    registry::SubscriptionRegistry,
    watchdog::{HeartbeatWatchdog, WatchdogVerdict},
};

// Re-export the production transport
pub use transport::{ReconnectingConnector, ReconnectingTransport};

/// Type alias for Result with StreamError
pub type Result<T> = std::result::Result<T, traits::StreamError>;
