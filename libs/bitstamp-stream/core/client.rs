//! Stream client orchestrator
//!
//! [`StreamClient`] is a cheap handle; the work happens in a single driver
//! task that exclusively owns the transport, the subscription registry and
//! the heartbeat watchdog. Every inbound notification (transport event,
//! command, watchdog tick) is processed to completion before the next one,
//! so registry and watchdog state never see parallel mutation and messages
//! are handled in the order the transport delivers them.
//!
//! Emitted events flow through an unbounded queue the consumer drains with
//! [`StreamClient::recv_event`] or [`StreamClient::try_recv_event`]; a slow
//! or absent consumer never blocks the driver.
//!
//! ```rust,ignore
//! let client = StreamClient::connect(
//!     StreamConfig::new().with_polling_interval(Duration::from_secs(15)),
//! )
//! .await?;
//!
//! let channel = client.subscribe("live_trades", "btcusd")?;
//!
//! while let Ok(event) = client.recv_event() {
//!     match event {
//!         StreamEvent::ChannelMessage { channel, data, .. } => {
//!             println!("{channel}: {data}");
//!         }
//!         StreamEvent::Unresponsive => client.reconnect()?,
//!         _ => {}
//!     }
//! }
//! ```

use crossbeam_channel::Receiver;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::config::StreamConfig;
use crate::core::connection_state::{
    AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics,
};
use crate::core::protocol;
use crate::core::registry::SubscriptionRegistry;
use crate::core::watchdog::{HeartbeatWatchdog, WatchdogVerdict};
use crate::traits::{Connector, Result, StreamError, Transport, TransportEvent};
use crate::transport::ReconnectingConnector;

/// Internal command messages for the driver task
#[derive(Debug)]
enum Command {
    Subscribe { channel: String, auth: Option<String> },
    Unsubscribe { channel: String },
    UnsubscribeAll,
    Reconnect,
    Close,
}

/// Events emitted to external observers
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Transport reported an open socket
    Connected,
    /// Transport reported a closed socket
    Disconnected,
    /// Server acknowledged a subscription
    Subscribed {
        /// Channel the ack names
        channel: String,
    },
    /// Server acknowledged an unsubscription
    Unsubscribed {
        /// Channel the ack names
        channel: String,
    },
    /// Heartbeat probe went unanswered for a full polling interval
    ///
    /// The client does not reconnect on its own here; that decision belongs
    /// to the consumer of this event.
    Unresponsive,
    /// A recoverable failure, e.g. malformed inbound text
    Error(String),
    /// One data message from a subscribed channel
    ChannelMessage {
        /// Channel the message arrived on
        channel: String,
        /// Wire event tag
        event: String,
        /// Payload, with `cost` attached on trade/order channels
        data: Value,
    },
}

/// Streaming client for the Bitstamp live event feed
///
/// Construct with [`StreamClient::connect`] for the real feed or
/// [`StreamClient::connect_with`] to supply a custom [`Connector`].
pub struct StreamClient {
    config: Arc<StreamConfig>,
    command_tx: mpsc::UnboundedSender<Command>,
    event_rx: Receiver<StreamEvent>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    registry: SubscriptionRegistry,
    driver: tokio::task::JoinHandle<()>,
}

impl StreamClient {
    /// Connect to the feed with the transport's default redial policy
    pub async fn connect(config: StreamConfig) -> Result<Self> {
        let connector = ReconnectingConnector::from_config(&config);
        Self::connect_with(config, connector).await
    }

    /// Connect through a custom transport connector
    pub async fn connect_with<C>(config: StreamConfig, connector: C) -> Result<Self>
    where
        C: Connector,
    {
        let config = Arc::new(config);
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connecting));
        let metrics = Arc::new(AtomicMetrics::new());
        let registry = SubscriptionRegistry::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let transport = connector.connect().await?;

        let driver = Driver {
            connector,
            transport,
            registry: registry.clone(),
            watchdog: HeartbeatWatchdog::new(config.polling_interval),
            state: Arc::clone(&state),
            metrics: Arc::clone(&metrics),
            command_rx,
            event_tx,
        };
        let driver = tokio::spawn(driver.run());

        Ok(Self {
            config,
            command_tx,
            event_rx,
            state,
            metrics,
            registry,
            driver,
        })
    }

    /// Subscribe to a channel
    ///
    /// Returns the computed channel name immediately, without waiting for
    /// the server ack; the registry reflects the subscription only once the
    /// ack arrives. Private channel bases get the `-<user_id>` suffix and an
    /// auth token when credentials are configured.
    pub fn subscribe(&self, channel_base: &str, currency_pair: &str) -> Result<String> {
        let (channel, auth) = self.resolve_channel(channel_base, currency_pair);
        self.send_command(Command::Subscribe {
            channel: channel.clone(),
            auth,
        })?;
        Ok(channel)
    }

    /// Unsubscribe from a channel
    ///
    /// Computes the channel name with the same grammar as [`subscribe`],
    /// private suffix included.
    ///
    /// [`subscribe`]: StreamClient::subscribe
    pub fn unsubscribe(&self, channel_base: &str, currency_pair: &str) -> Result<()> {
        let (channel, _) = self.resolve_channel(channel_base, currency_pair);
        self.send_command(Command::Unsubscribe { channel })
    }

    /// Send an unsubscribe request for every currently registered channel
    pub fn unsubscribe_all(&self) -> Result<()> {
        self.send_command(Command::UnsubscribeAll)
    }

    /// Tear down the current transport and open a fresh one
    ///
    /// The server does not remember subscriptions across a fresh connection,
    /// so the registry is reset to empty; re-subscribe after observing
    /// [`StreamEvent::Connected`].
    pub fn reconnect(&self) -> Result<()> {
        self.send_command(Command::Reconnect)
    }

    /// Close the client. Terminal.
    pub async fn close(self) -> Result<()> {
        // The driver may already be gone; joining it below reports that.
        let _ = self.command_tx.send(Command::Close);
        self.driver
            .await
            .map_err(|err| StreamError::ConnectionClosed(err.to_string()))
    }

    /// Try to receive an emitted event (non-blocking)
    pub fn try_recv_event(&self) -> Option<StreamEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an emitted event (blocking)
    pub fn recv_event(&self) -> std::result::Result<StreamEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    /// Read view of the acknowledged subscriptions
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Current lifecycle state
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Whether the transport currently reports an open socket
    pub fn is_connected(&self) -> bool {
        self.state.is_open()
    }

    /// Snapshot of the client counters
    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            connection_state: self.state.get(),
        }
    }

    fn resolve_channel(&self, channel_base: &str, currency_pair: &str) -> (String, Option<String>) {
        match &self.config.credentials {
            Some(credentials) if protocol::is_private_base(channel_base) => (
                protocol::channel_name(channel_base, currency_pair, Some(&credentials.user_id)),
                Some(credentials.token.clone()),
            ),
            _ => (
                protocol::channel_name(channel_base, currency_pair, None),
                None,
            ),
        }
    }

    fn send_command(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|err| StreamError::ChannelSend(err.to_string()))
    }
}

/// Single owning task behind a [`StreamClient`]
struct Driver<C>
where
    C: Connector,
{
    connector: C,
    transport: C::Transport,
    registry: SubscriptionRegistry,
    watchdog: HeartbeatWatchdog,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: crossbeam_channel::Sender<StreamEvent>,
}

impl<C> Driver<C>
where
    C: Connector,
{
    async fn run(mut self) {
        debug!("stream driver started");
        loop {
            tokio::select! {
                maybe_event = self.transport.recv() => match maybe_event {
                    Some(TransportEvent::Open) => self.on_open(),
                    Some(TransportEvent::Close) => self.on_close(),
                    Some(TransportEvent::Message(text)) => {
                        if !self.handle_message(text).await {
                            break;
                        }
                    }
                    None => {
                        warn!("transport terminated");
                        self.watchdog.disarm();
                        self.emit(StreamEvent::Error("transport terminated".to_string()));
                        self.state.set(ConnectionState::Closed);
                        break;
                    }
                },
                maybe_command = self.command_rx.recv() => match maybe_command {
                    Some(Command::Subscribe { channel, auth }) => {
                        debug!("subscribing to {}", channel);
                        self.send_raw(protocol::subscribe_request(&channel, auth.as_deref()));
                    }
                    Some(Command::Unsubscribe { channel }) => {
                        debug!("unsubscribing from {}", channel);
                        self.send_raw(protocol::unsubscribe_request(&channel));
                    }
                    Some(Command::UnsubscribeAll) => {
                        for channel in self.registry.all() {
                            self.send_raw(protocol::unsubscribe_request(&channel));
                        }
                    }
                    Some(Command::Reconnect) => {
                        if !self.rebuild_connection().await {
                            break;
                        }
                    }
                    Some(Command::Close) | None => {
                        self.on_shutdown();
                        break;
                    }
                },
                verdict = self.watchdog.tick() => self.on_watchdog(verdict),
            }
        }
        debug!("stream driver exiting");
    }

    fn on_open(&mut self) {
        info!("connected");
        self.state.set(ConnectionState::Open);
        self.watchdog.arm();
        self.emit(StreamEvent::Connected);
    }

    fn on_close(&mut self) {
        // The transport redials on its own; subscriptions survive until an
        // explicit reconnect rebuilds the connection.
        warn!("disconnected");
        self.watchdog.disarm();
        self.state.set(ConnectionState::Reconnecting);
        self.emit(StreamEvent::Disconnected);
    }

    fn on_shutdown(&mut self) {
        info!("closing stream client");
        self.state.set(ConnectionState::Closing);
        self.watchdog.disarm();
        self.transport.close();
        self.state.set(ConnectionState::Closed);
    }

    fn on_watchdog(&mut self, verdict: WatchdogVerdict) {
        match verdict {
            WatchdogVerdict::ProbeDue => {
                debug!("sending heartbeat probe");
                self.send_raw(protocol::heartbeat_probe());
            }
            WatchdogVerdict::Unresponsive => {
                warn!("no heartbeat ack within the polling interval");
                self.emit(StreamEvent::Unresponsive);
            }
        }
    }

    /// Dispatch one inbound frame. Returns false when the driver must stop.
    async fn handle_message(&mut self, text: String) -> bool {
        self.metrics.increment_received();

        let envelope = match protocol::decode(&text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("dropping undecodable frame: {}", err);
                self.emit(StreamEvent::Error(err.to_string()));
                return true;
            }
        };

        match envelope.event.as_str() {
            protocol::EVENT_SUBSCRIPTION_SUCCEEDED => match envelope.channel {
                Some(channel) => {
                    debug!("subscribed to {}", channel);
                    self.registry.add(&channel);
                    self.emit(StreamEvent::Subscribed { channel });
                }
                None => debug!("subscription ack without channel"),
            },
            protocol::EVENT_UNSUBSCRIPTION_SUCCEEDED => match envelope.channel {
                Some(channel) => {
                    debug!("unsubscribed from {}", channel);
                    self.registry.remove(&channel);
                    self.emit(StreamEvent::Unsubscribed { channel });
                }
                None => debug!("unsubscription ack without channel"),
            },
            protocol::EVENT_REQUEST_RECONNECT => {
                info!("server requested reconnect");
                return self.rebuild_connection().await;
            }
            protocol::EVENT_HEARTBEAT => {
                debug!("heartbeat ack");
                self.watchdog.mark_alive();
            }
            _ => match envelope.channel {
                Some(channel) => {
                    let mut data = envelope.data;
                    if protocol::carries_cost(&channel) {
                        protocol::enrich_cost(&mut data);
                    }
                    self.emit(StreamEvent::ChannelMessage {
                        channel,
                        event: envelope.event,
                        data,
                    });
                }
                None => debug!("data message without channel: {}", envelope.event),
            },
        }
        true
    }

    /// Tear down the transport and dial a fresh one.
    /// Returns false when the driver must stop.
    async fn rebuild_connection(&mut self) -> bool {
        self.watchdog.disarm();
        self.transport.close();
        self.registry.clear();
        self.state.set(ConnectionState::Reconnecting);
        self.metrics.increment_reconnects();

        match self.connector.connect().await {
            Ok(transport) => {
                self.transport = transport;
                true
            }
            Err(err) => {
                error!("failed to rebuild connection: {}", err);
                self.emit(StreamEvent::Error(err.to_string()));
                self.state.set(ConnectionState::Closed);
                false
            }
        }
    }

    fn send_raw(&self, text: String) {
        match self.transport.send(text) {
            Ok(()) => self.metrics.increment_sent(),
            Err(err) => {
                warn!("transport send failed: {}", err);
                self.emit(StreamEvent::Error(err.to_string()));
            }
        }
    }

    fn emit(&self, event: StreamEvent) {
        // Nobody listening is fine; events are informational.
        let _ = self.event_tx.send(event);
    }
}
