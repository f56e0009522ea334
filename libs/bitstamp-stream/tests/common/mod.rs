//! Common test utilities for bitstamp-stream integration tests
//!
//! Provides a mock feed server speaking the wire protocol over a real
//! WebSocket, and a scripted transport for driving the client without any
//! sockets at all.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};

use bitstamp_stream::{
    Connector, Result, StreamClient, StreamError, StreamEvent, Transport, TransportEvent,
};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Initialize tracing output for a test run (controlled by TEST_VERBOSE)
pub fn init_tracing() {
    if std::env::var("TEST_VERBOSE").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

// =============================================================================
// Mock feed server
// =============================================================================

/// A mock feed server speaking the live event protocol
///
/// Acks subscribe/unsubscribe requests, optionally answers heartbeat probes,
/// and pushes one canned trade after every trade-channel subscription.
pub struct MockFeedServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockFeedServer {
    /// Create and start a new mock feed server
    pub async fn start(answer_heartbeats: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown, answer_heartbeats)
                                        .await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        shutdown: Arc<Notify>,
        answer_heartbeats: bool,
    ) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            for reply in Self::replies_for(&text, answer_heartbeats) {
                                if write.send(Message::Text(reply)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            if write.send(Message::Pong(payload)).await.is_err() {
                                return;
                            }
                        }
                        Some(Ok(Message::Close(_))) => return,
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => return,
                    }
                }
                _ = shutdown.notified() => {
                    return;
                }
            }
        }
    }

    /// Protocol replies for one inbound request
    fn replies_for(text: &str, answer_heartbeats: bool) -> Vec<String> {
        let Ok(request) = serde_json::from_str::<Value>(text) else {
            return Vec::new();
        };
        let channel = request["data"]["channel"].as_str().unwrap_or_default();

        match request["event"].as_str() {
            Some("bts:subscribe") => {
                let mut replies = vec![json!({
                    "event": "bts:subscription_succeeded",
                    "channel": channel,
                    "data": {},
                })
                .to_string()];
                if channel.starts_with("live_trades") {
                    replies.push(
                        json!({
                            "event": "trade",
                            "channel": channel,
                            "data": { "id": 1, "amount": 2.0, "price": 100.0 },
                        })
                        .to_string(),
                    );
                }
                replies
            }
            Some("bts:unsubscribe") => vec![json!({
                "event": "bts:unsubscription_succeeded",
                "channel": channel,
                "data": {},
            })
            .to_string()],
            Some("bts:heartbeat") if answer_heartbeats => {
                vec![json!({ "event": "bts:heartbeat", "data": {} }).to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Scripted transport
// =============================================================================

/// Transport driven entirely by the test
pub struct ScriptedTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn send(&self, text: String) -> Result<()> {
        self.outbound
            .send(text)
            .map_err(|err| StreamError::ChannelSend(err.to_string()))
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Test-side controls for one [`ScriptedTransport`]
pub struct ScriptHandle {
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl ScriptHandle {
    /// Deliver an open notification
    pub fn open(&self) {
        self.events.send(TransportEvent::Open).unwrap();
    }

    /// Deliver a close notification
    pub fn close_socket(&self) {
        self.events.send(TransportEvent::Close).unwrap();
    }

    /// Deliver one inbound frame
    pub fn message(&self, text: &str) {
        self.events
            .send(TransportEvent::Message(text.to_string()))
            .unwrap();
    }

    /// Whether the client closed this transport
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Next outbound frame, parsed, or None on timeout
    pub async fn next_frame(&mut self, timeout: Duration) -> Option<Value> {
        let text = tokio::time::timeout(timeout, self.outbound.recv())
            .await
            .ok()??;
        serde_json::from_str(&text).ok()
    }

    /// Collect every outbound frame arriving within the window
    pub async fn frames_within(&mut self, window: Duration) -> Vec<Value> {
        let mut frames = Vec::new();
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return frames;
            }
            match tokio::time::timeout(remaining, self.outbound.recv()).await {
                Ok(Some(text)) => {
                    if let Ok(value) = serde_json::from_str(&text) {
                        frames.push(value);
                    }
                }
                _ => return frames,
            }
        }
    }
}

/// Connector handing out scripted transports
///
/// Every `connect()` call produces a fresh transport and pushes its control
/// handle to the paired receiver, so tests observe reconnects as new handles.
pub struct ScriptedConnector {
    handles: crossbeam_channel::Sender<ScriptHandle>,
}

/// Build a scripted connector and the receiver for its control handles
pub fn scripted_connector() -> (ScriptedConnector, crossbeam_channel::Receiver<ScriptHandle>) {
    let (handles_tx, handles_rx) = crossbeam_channel::unbounded();
    (
        ScriptedConnector {
            handles: handles_tx,
        },
        handles_rx,
    )
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self) -> Result<ScriptedTransport> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let handle = ScriptHandle {
            events: event_tx,
            outbound: outbound_rx,
            closed: Arc::clone(&closed),
        };
        self.handles
            .send(handle)
            .map_err(|err| StreamError::ChannelSend(err.to_string()))?;

        Ok(ScriptedTransport {
            events: event_rx,
            outbound: outbound_tx,
            closed,
        })
    }
}

// =============================================================================
// Async helpers (polling, never blocking the runtime thread)
// =============================================================================

/// Wait for the next emitted event
pub async fn wait_for_event(client: &StreamClient, timeout: Duration) -> Option<StreamEvent> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(event) = client.try_recv_event() {
            return Some(event);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait for an event matching the predicate, returning every event seen on
/// the way (the match included, last)
pub async fn wait_for_matching_event(
    client: &StreamClient,
    timeout: Duration,
    predicate: impl Fn(&StreamEvent) -> bool,
) -> Vec<StreamEvent> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut seen = Vec::new();
    loop {
        if let Some(event) = client.try_recv_event() {
            let done = predicate(&event);
            seen.push(event);
            if done {
                return seen;
            }
        } else {
            if tokio::time::Instant::now() >= deadline {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Collect every event emitted within the window
pub async fn events_within(client: &StreamClient, window: Duration) -> Vec<StreamEvent> {
    let deadline = tokio::time::Instant::now() + window;
    let mut events = Vec::new();
    while tokio::time::Instant::now() < deadline {
        while let Some(event) = client.try_recv_event() {
            events.push(event);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    events
}

/// Wait for a fresh transport handle after a reconnect
pub async fn wait_for_handle(
    handles: &crossbeam_channel::Receiver<ScriptHandle>,
    timeout: Duration,
) -> Option<ScriptHandle> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(handle) = handles.try_recv() {
            return Some(handle);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
