//! Application-level heartbeat watchdog
//!
//! Detects a link that is open at the socket layer but no longer moving
//! application data, which the transport's own socket health checks cannot
//! see. The watchdog runs a probe/ack cycle:
//!
//! ```text
//! armed ──tick, alive──> probe sent, alive = false
//!   ^                         │
//!   └──inbound heartbeat ack──┘
//!
//! probe sent ──tick, still not alive──> unresponsive (timer stopped)
//! ```
//!
//! Declaring the link unresponsive is terminal for the running timer; a new
//! cycle starts only on the next successful open. The watchdog itself never
//! reconnects; the client decides what to do with the verdict.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Outcome of one watchdog tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// The link answered since the last probe; the next probe is due now
    ProbeDue,
    /// One full interval elapsed without a heartbeat ack; timer stopped
    Unresponsive,
}

/// Timer-driven liveness check for the stream connection
///
/// Disabled entirely when no polling interval is configured: it never arms,
/// sends no probes and produces no verdicts.
pub struct HeartbeatWatchdog {
    polling_interval: Option<Duration>,
    ticker: Option<Interval>,
    alive: bool,
}

impl HeartbeatWatchdog {
    /// Create a watchdog. `None` disables it entirely.
    pub fn new(polling_interval: Option<Duration>) -> Self {
        Self {
            polling_interval,
            ticker: None,
            alive: false,
        }
    }

    /// Whether a polling interval was configured at all
    pub fn enabled(&self) -> bool {
        self.polling_interval.is_some()
    }

    /// Whether a timer is currently running
    pub fn armed(&self) -> bool {
        self.ticker.is_some()
    }

    /// Start a fresh probe cycle. No-op when disabled.
    ///
    /// The first tick fires one full interval out; the link just opened, so
    /// probing it immediately would tell us nothing.
    pub fn arm(&mut self) {
        let Some(period) = self.polling_interval else {
            return;
        };
        let mut ticker = interval_at(Instant::now() + period, period);
        // If ticks pile up behind slow processing, skip them rather than bursting
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        self.alive = true;
        debug!("watchdog armed, interval {:?}", period);
    }

    /// Stop the timer without a verdict
    pub fn disarm(&mut self) {
        if self.ticker.take().is_some() {
            debug!("watchdog disarmed");
        }
    }

    /// Record an inbound heartbeat ack
    pub fn mark_alive(&mut self) {
        self.alive = true;
    }

    /// Wait for the next tick and judge the link
    ///
    /// Pending forever while disarmed, so it can sit in a `select!` arm
    /// without a guard.
    pub async fn tick(&mut self) -> WatchdogVerdict {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
                if self.alive {
                    self.alive = false;
                    WatchdogVerdict::ProbeDue
                } else {
                    self.disarm();
                    WatchdogVerdict::Unresponsive
                }
            }
            None => std::future::pending().await,
        }
    }
}
