//! WebSocket channel client.
//!
//! Each connection runs a reader task and a writer task. Outbound frames go
//! through an unbounded queue to the writer; the reader fans inbound text
//! frames out to subscribers. Failures are logged, never returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::error::ChannelError;
use crate::subscription::{Registry, SharedRegistry, Subscription, SubscriptionId, lock};

/// How long `close` waits for the close handshake before tearing down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

struct Connection {
    endpoint: String,
    outbound: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Best-effort, at-most-once text channel to a relay server.
///
/// No reconnection, heartbeat, or acknowledgment: a frame sent while the
/// channel is down is dropped with an error log.
#[derive(Default)]
pub struct ChannelClient {
    subscribers: SharedRegistry,
    connection: Option<Connection>,
}

impl ChannelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel to `endpoint`, replacing any existing one.
    ///
    /// The previous channel is dropped without a close handshake.
    /// Connection failures are logged; check [`ChannelClient::is_open`].
    pub async fn connect(&mut self, endpoint: &str) {
        if let Some(previous) = self.connection.take() {
            tracing::info!("Replacing channel to {}", previous.endpoint);
            previous.open.store(false, Ordering::Release);
            previous.cancel.cancel();
        }

        match self.open_connection(endpoint).await {
            Ok(connection) => {
                tracing::info!("Channel connection established to {endpoint}");
                self.connection = Some(connection);
            }
            Err(e) => tracing::error!("Channel error: {e}"),
        }
    }

    /// Queue `text` as one text frame.
    ///
    /// Returns whether the frame was handed to the writer. When the channel
    /// is not open the frame is dropped and an error is logged.
    pub fn send(&self, text: &str) -> bool {
        let Some(connection) = self.connection.as_ref() else {
            tracing::error!("Channel is not open; dropping outbound frame");
            return false;
        };
        if !connection.open.load(Ordering::Acquire) {
            tracing::error!(
                "Channel to {} is not open; dropping outbound frame",
                connection.endpoint
            );
            return false;
        }
        if connection.outbound.send(Message::text(text.to_owned())).is_err() {
            tracing::error!("Channel writer for {} has stopped", connection.endpoint);
            return false;
        }
        true
    }

    /// Register for inbound frames. Subscriptions outlive reconnects.
    pub fn subscribe(&self) -> Subscription {
        Registry::register(&self.subscribers)
    }

    /// Remove a subscription by id. Its receiver sees end-of-stream.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.subscribers).remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Whether the handshake completed and no close or error has been seen since.
    pub fn is_open(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.open.load(Ordering::Acquire))
    }

    /// Endpoint of the current connection, open or not.
    pub fn endpoint(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.endpoint.as_str())
    }

    /// Send a close frame and tear the connection down.
    pub async fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let Connection {
            endpoint,
            outbound,
            open,
            cancel,
            reader,
            writer,
        } = connection;

        if open.swap(false, Ordering::AcqRel) {
            let _ = outbound.send(Message::Close(None));
        }
        drop(outbound);

        let graceful = tokio::time::timeout(CLOSE_TIMEOUT, async {
            let _ = writer.await;
            let _ = reader.await;
        })
        .await;
        if graceful.is_err() {
            tracing::debug!("Close handshake with {endpoint} timed out");
        }
        cancel.cancel();
        tracing::info!("Channel connection to {endpoint} closed");
    }

    async fn open_connection(&self, endpoint: &str) -> Result<Connection, ChannelError> {
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(ChannelError::InvalidEndpoint(endpoint.to_string()));
        }

        let (stream, _) = connect_async(endpoint)
            .await
            .map_err(|e| ChannelError::Connect {
                endpoint: endpoint.to_string(),
                source: Box::new(e),
            })?;
        let (mut sink, mut source) = stream.split();

        let open = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        // Writer task: drains the outbound queue into the socket
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let writer_open = Arc::clone(&open);
        let writer_cancel = cancel.clone();
        let writer_endpoint = endpoint.to_string();
        let writer = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    () = writer_cancel.cancelled() => break,
                    message = outbound_rx.recv() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::error!("Channel send to {writer_endpoint} failed: {e}");
                    writer_open.store(false, Ordering::Release);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        // Reader task: fans inbound text frames out to subscribers
        let reader_open = Arc::clone(&open);
        let reader_cancel = cancel.clone();
        let registry = Arc::clone(&self.subscribers);
        let reader_endpoint = endpoint.to_string();
        let reader = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    () = reader_cancel.cancelled() => break,
                    next = source.next() => next,
                };
                match next {
                    Some(Ok(Message::Text(text))) => lock(&registry).dispatch(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!("Channel connection to {reader_endpoint} closed: {frame:?}");
                        break;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        tracing::debug!("Ignoring {}-byte binary frame", bytes.len());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("Channel error on {reader_endpoint}: {e}");
                        break;
                    }
                    None => {
                        tracing::info!("Channel connection to {reader_endpoint} closed");
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::Release);
        });

        Ok(Connection {
            endpoint: endpoint.to_string(),
            outbound,
            open,
            cancel,
            reader,
            writer,
        })
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        if let Some(connection) = &self.connection {
            connection.cancel.cancel();
        }
    }
}
