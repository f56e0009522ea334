//! Core stream client: codec, registry, watchdog and the owning driver task

pub mod client;
pub mod config;
pub mod connection_state;
pub mod protocol;
pub mod registry;
pub mod watchdog;

// Re-export main types
pub use client::{StreamClient, StreamEvent};
pub use config::{Credentials, StreamConfig, DEFAULT_URL};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use registry::SubscriptionRegistry;
pub use watchdog::{HeartbeatWatchdog, WatchdogVerdict};

// Re-export traits for convenience
pub use crate::traits::*;
