//! WebSocket transport with its own redial loop
//!
//! [`ReconnectingTransport`] owns a background worker that dials the feed,
//! pumps frames, and redials under a [`ReconnectionStrategy`] whenever the
//! socket drops. The stream client above it only ever sees `Open`, `Close`
//! and `Message` notifications; why a socket died is invisible by design of
//! the transport contract.
//!
//! Outbound frames are queued while the socket is down and flushed once a
//! session is back up, so a subscribe issued during a redial is not lost.

use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::traits::{
    Connector, ExponentialBackoff, ReconnectionStrategy, Result, StreamError, Transport,
    TransportEvent,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why an active socket session ended
enum SessionEnd {
    /// Told to stop; the worker must not redial
    Shutdown,
    /// The socket dropped; the worker may redial
    Lost,
}

/// Transport backed by tokio-tungstenite with automatic redial
pub struct ReconnectingTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
    event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    stopped: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl ReconnectingTransport {
    /// Spawn the worker and return the transport handle
    pub fn spawn(url: String, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(Notify::new());

        tokio::spawn(worker(
            url,
            strategy,
            outbound_rx,
            event_tx,
            Arc::clone(&stopped),
            Arc::clone(&stop),
        ));

        Self {
            outbound_tx,
            event_rx,
            stopped,
            stop,
        }
    }
}

#[async_trait::async_trait]
impl Transport for ReconnectingTransport {
    fn send(&self, text: String) -> Result<()> {
        self.outbound_tx
            .send(text)
            .map_err(|err| StreamError::ChannelSend(err.to_string()))
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.event_rx.recv().await
    }

    fn close(&self) {
        self.stopped.store(true, Ordering::Release);
        // notify_one stores a permit, so a worker that is not parked on the
        // Notify right now still observes the shutdown on its next wait
        self.stop.notify_one();
    }
}

impl Drop for ReconnectingTransport {
    fn drop(&mut self) {
        // A dropped handle must not leave the worker redialing forever
        self.close();
    }
}

/// Connector producing [`ReconnectingTransport`] instances
pub struct ReconnectingConnector {
    url: String,
    initial_delay: std::time::Duration,
    max_delay: std::time::Duration,
    max_attempts: Option<usize>,
}

impl ReconnectingConnector {
    /// Build a connector from the client configuration
    pub fn from_config(config: &crate::core::config::StreamConfig) -> Self {
        Self {
            url: config.url.clone(),
            initial_delay: config.reconnect_initial_delay,
            max_delay: config.reconnect_max_delay,
            max_attempts: config.reconnect_max_attempts,
        }
    }
}

#[async_trait::async_trait]
impl Connector for ReconnectingConnector {
    type Transport = ReconnectingTransport;

    async fn connect(&self) -> Result<ReconnectingTransport> {
        let strategy = Box::new(ExponentialBackoff::new(
            self.initial_delay,
            self.max_delay,
            self.max_attempts,
        ));
        Ok(ReconnectingTransport::spawn(self.url.clone(), strategy))
    }
}

/// Dial loop: connect, run a session, redial under the strategy
async fn worker(
    url: String,
    strategy: Box<dyn ReconnectionStrategy>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    stopped: Arc<AtomicBool>,
    stop: Arc<Notify>,
) {
    let mut pending: VecDeque<String> = VecDeque::new();
    let mut attempt = 0;

    loop {
        if stopped.load(Ordering::Acquire) {
            break;
        }

        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                info!("connected to {}", url);
                attempt = 0;
                let _ = event_tx.send(TransportEvent::Open);
                let outcome =
                    run_session(socket, &mut outbound_rx, &event_tx, &mut pending, &stop).await;
                let _ = event_tx.send(TransportEvent::Close);
                if matches!(outcome, SessionEnd::Shutdown) {
                    break;
                }
            }
            Err(err) => {
                warn!("connect to {} failed: {}", url, err);
            }
        }

        if stopped.load(Ordering::Acquire) {
            break;
        }

        match strategy.next_delay(attempt) {
            Some(delay) => {
                debug!("redialing in {:?} (attempt {})", delay, attempt + 1);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop.notified() => break,
                }
                attempt += 1;
            }
            None => {
                warn!("redial attempts exhausted for {}", url);
                break;
            }
        }
    }

    debug!("transport worker exiting");
}

/// Pump one socket session until it drops or the transport is closed
async fn run_session(
    socket: WsStream,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    event_tx: &mpsc::UnboundedSender<TransportEvent>,
    pending: &mut VecDeque<String>,
    stop: &Notify,
) -> SessionEnd {
    let (mut write, mut read) = socket.split();

    // Flush frames queued while the socket was down
    while let Some(text) = pending.pop_front() {
        if let Err(err) = write.send(Message::Text(text.clone())).await {
            warn!("flush failed: {}", err);
            pending.push_front(text);
            return SessionEnd::Lost;
        }
    }

    loop {
        tokio::select! {
            _ = stop.notified() => {
                let _ = write.close().await;
                return SessionEnd::Shutdown;
            }
            maybe_text = outbound_rx.recv() => match maybe_text {
                Some(text) => {
                    if let Err(err) = write.send(Message::Text(text.clone())).await {
                        warn!("send failed: {}", err);
                        pending.push_front(text);
                        return SessionEnd::Lost;
                    }
                }
                None => {
                    // Transport handle dropped
                    let _ = write.close().await;
                    return SessionEnd::Shutdown;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = event_tx.send(TransportEvent::Message(text));
                }
                Some(Ok(Message::Ping(payload))) => {
                    if write.send(Message::Pong(payload)).await.is_err() {
                        return SessionEnd::Lost;
                    }
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    debug!("server closed the socket");
                    return SessionEnd::Lost;
                }
                Some(Ok(_)) => {
                    // The feed is text-only; binary and raw frames are noise
                }
                Some(Err(err)) => {
                    warn!("socket error: {}", err);
                    return SessionEnd::Lost;
                }
                None => return SessionEnd::Lost,
            }
        }
    }
}
