//! Integration tests for `ChannelClient` against a local WebSocket server.
//!
//! The test relay echoes every text frame back and records what it received,
//! the way the chat relay behaves in development.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use palaver_channel::ChannelClient;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Frames the relay received, in order.
type Received = Arc<Mutex<Vec<String>>>;

/// Start an echo relay. Every accepted connection echoes text frames back.
async fn start_echo_relay() -> (String, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&received);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let recorded = Arc::clone(&recorded);
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(socket).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    match message {
                        Message::Text(text) => {
                            recorded.lock().unwrap().push(text.as_str().to_owned());
                            if ws.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            });
        }
    });

    (format!("ws://{addr}"), received)
}

/// Start a relay that pushes `frames` to the client right after the handshake,
/// then waits for a signal before closing the connection.
async fn start_push_relay(frames: Vec<&'static str>) -> (String, mpsc::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (close_tx, mut close_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let Ok((socket, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = accept_async(socket).await else {
            return;
        };
        // Give the client a moment to finish its side of the handshake
        tokio::time::sleep(Duration::from_millis(50)).await;
        for frame in frames {
            let _ = ws.send(Message::text(frame.to_string())).await;
        }
        let _ = close_rx.recv().await;
        let _ = ws.close(None).await;
    });

    (format!("ws://{addr}"), close_tx)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 2s");
}

async fn recv_timeout(sub: &mut palaver_channel::Subscription) -> Option<String> {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn send_and_receive_echo_in_order() {
    let (url, received) = start_echo_relay().await;
    let mut client = ChannelClient::new();
    let mut sub = client.subscribe();

    client.connect(&url).await;
    assert!(client.is_open());
    assert_eq!(client.endpoint(), Some(url.as_str()));

    for text in ["one", "two", "three"] {
        assert!(client.send(text));
    }

    assert_eq!(recv_timeout(&mut sub).await.as_deref(), Some("one"));
    assert_eq!(recv_timeout(&mut sub).await.as_deref(), Some("two"));
    assert_eq!(recv_timeout(&mut sub).await.as_deref(), Some("three"));
    assert_eq!(*received.lock().unwrap(), ["one", "two", "three"]);

    client.close().await;
}

#[tokio::test]
async fn inbound_frames_reach_every_subscriber() {
    let (url, _close) = start_push_relay(vec!["hello", "world"]).await;
    let mut client = ChannelClient::new();
    let mut first = client.subscribe();
    let mut second = client.subscribe();

    client.connect(&url).await;

    for sub in [&mut first, &mut second] {
        assert_eq!(recv_timeout(sub).await.as_deref(), Some("hello"));
        assert_eq!(recv_timeout(sub).await.as_deref(), Some("world"));
    }
}

#[tokio::test]
async fn unsubscribed_receiver_gets_nothing_more() {
    let (url, _received) = start_echo_relay().await;
    let mut client = ChannelClient::new();
    let old = client.subscribe();
    let mut current = client.subscribe();
    client.connect(&url).await;

    old.unsubscribe();
    assert_eq!(client.subscriber_count(), 1);

    client.send("after switch");
    assert_eq!(
        recv_timeout(&mut current).await.as_deref(),
        Some("after switch")
    );

    client.close().await;
}

#[tokio::test]
async fn reconnect_replaces_previous_channel() {
    let (first_url, first_received) = start_echo_relay().await;
    let (second_url, second_received) = start_echo_relay().await;
    let mut client = ChannelClient::new();
    let mut sub = client.subscribe();

    client.connect(&first_url).await;
    client.send("to first");
    assert_eq!(recv_timeout(&mut sub).await.as_deref(), Some("to first"));

    client.connect(&second_url).await;
    assert_eq!(client.endpoint(), Some(second_url.as_str()));
    client.send("to second");
    assert_eq!(recv_timeout(&mut sub).await.as_deref(), Some("to second"));

    assert_eq!(*first_received.lock().unwrap(), ["to first"]);
    assert_eq!(*second_received.lock().unwrap(), ["to second"]);

    client.close().await;
}

#[tokio::test]
async fn server_close_marks_channel_closed_and_drops_sends() {
    let (url, close) = start_push_relay(vec![]).await;
    let mut client = ChannelClient::new();
    client.connect(&url).await;
    assert!(client.is_open());

    close.send(()).await.unwrap();
    wait_until(|| !client.is_open()).await;

    assert!(!client.send("nobody listening"));
}

#[tokio::test]
async fn close_is_idempotent() {
    let (url, _received) = start_echo_relay().await;
    let mut client = ChannelClient::new();
    client.connect(&url).await;

    client.close().await;
    assert!(!client.is_open());
    assert!(client.endpoint().is_none());
    assert!(!client.send("late"));

    client.close().await;
}
