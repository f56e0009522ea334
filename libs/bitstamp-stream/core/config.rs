//! Client configuration

use std::time::Duration;

/// Default public endpoint for the live event feed
pub const DEFAULT_URL: &str = "wss://ws.bitstamp.net";

/// Account credentials for private channel families
///
/// Immutable for the lifetime of a client. The token authenticates private
/// subscribe requests; the user id suffixes private channel names.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account identifier appended to private channel names
    pub user_id: String,
    /// Auth token sent with private subscribe requests
    pub token: String,
}

/// Configuration for a [`StreamClient`](crate::core::client::StreamClient)
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Feed endpoint
    pub url: String,
    /// Heartbeat probe period. `None` disables the watchdog entirely.
    pub polling_interval: Option<Duration>,
    /// Credentials for private channels, when any
    pub credentials: Option<Credentials>,
    /// Transport redial policy: initial backoff delay
    pub reconnect_initial_delay: Duration,
    /// Transport redial policy: backoff cap
    pub reconnect_max_delay: Duration,
    /// Transport redial policy: attempt limit (`None` = unlimited)
    pub reconnect_max_attempts: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            polling_interval: None,
            credentials: None,
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            reconnect_max_attempts: Some(10),
        }
    }
}

impl StreamConfig {
    /// Configuration with defaults for the public feed
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the feed endpoint
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Enable the heartbeat watchdog with the given probe period
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = Some(interval);
        self
    }

    /// Attach credentials for private channel families
    pub fn with_credentials(mut self, user_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user_id: user_id.into(),
            token: token.into(),
        });
        self
    }

    /// Tune the transport redial policy
    pub fn with_reconnect_policy(
        mut self,
        initial_delay: Duration,
        max_delay: Duration,
        max_attempts: Option<usize>,
    ) -> Self {
        self.reconnect_initial_delay = initial_delay;
        self.reconnect_max_delay = max_delay;
        self.reconnect_max_attempts = max_attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_the_public_feed() {
        let config = StreamConfig::new();
        assert_eq!(config.url, DEFAULT_URL);
        assert!(config.polling_interval.is_none());
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_builder_methods() {
        let config = StreamConfig::new()
            .with_url("ws://127.0.0.1:9000")
            .with_polling_interval(Duration::from_secs(5))
            .with_credentials("1234", "token-abc");

        assert_eq!(config.url, "ws://127.0.0.1:9000");
        assert_eq!(config.polling_interval, Some(Duration::from_secs(5)));
        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.user_id, "1234");
        assert_eq!(credentials.token, "token-abc");
    }
}
