//! End-to-end tests for `ChatController` against a local echo relay.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use palaver_channel::ChannelClient;
use palaver_core::ChatController;
use palaver_session::{ChatSession, MemoryStore, SESSIONS_KEY, SessionStore, write_json};
use palaver_types::{AuthUser, ChatMessage, SERVER_SENDER};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

type Received = Arc<Mutex<Vec<String>>>;

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

fn alice() -> AuthUser {
    AuthUser {
        id: 1,
        username: "alice".into(),
        email: "a@x.com".into(),
    }
}

async fn next_inbound(controller: &mut ChatController) -> ChatMessage {
    tokio::time::timeout(Duration::from_secs(2), controller.next_inbound())
        .await
        .expect("no inbound frame within 2s")
        .expect("subscription ended")
}

#[tokio::test]
async fn start_creates_session_and_connects() {
    let (url, _received) = start_echo_relay().await;
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let mut controller = ChatController::new(store.clone(), ChannelClient::new(), url);

    controller.start().await.unwrap();

    let active = controller.active_session().unwrap();
    assert!(controller.channel().is_open());
    assert!(controller.transcript().is_empty());
    assert_eq!(store.list_sessions().len(), 1);
    assert_eq!(store.list_sessions()[0].id, active);

    // A second start keeps the same session
    controller.start().await.unwrap();
    assert_eq!(controller.active_session(), Some(active));
    assert_eq!(store.list_sessions().len(), 1);

    controller.shutdown().await;
}

#[tokio::test]
async fn start_lists_previously_stored_sessions() {
    let (url, _received) = start_echo_relay().await;
    let kv = Arc::new(MemoryStore::new());
    let older = ChatSession::new(1, chrono::Utc::now());
    write_json(&*kv, SESSIONS_KEY, &[older.clone()]).unwrap();

    let mut controller =
        ChatController::new(SessionStore::new(kv), ChannelClient::new(), url);
    controller.start().await.unwrap();

    let ids: Vec<i64> = controller.sessions().iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], older.id);
    assert_ne!(controller.active_session(), Some(older.id));

    controller.shutdown().await;
}

#[tokio::test]
async fn start_with_resumes_existing_session() {
    let (url, _received) = start_echo_relay().await;
    let kv = Arc::new(MemoryStore::new());
    let mut older = ChatSession::new(42, chrono::Utc::now());
    older.messages.push(ChatMessage::outbound("alice", "earlier"));
    write_json(&*kv, SESSIONS_KEY, &[older]).unwrap();

    let store = SessionStore::new(kv);
    let mut controller = ChatController::new(store.clone(), ChannelClient::new(), url);
    controller.start_with(Some(42)).await.unwrap();

    assert_eq!(controller.active_session(), Some(42));
    assert_eq!(controller.transcript().len(), 1);
    assert_eq!(store.list_sessions().len(), 1);

    controller.shutdown().await;
}

#[tokio::test]
async fn send_reaches_relay_and_echo_is_recorded() {
    let (url, received) = start_echo_relay().await;
    let kv = Arc::new(MemoryStore::new());
    write_json(&*kv, SESSIONS_KEY, &[ChatSession::new(42, chrono::Utc::now())]).unwrap();
    let store = SessionStore::new(kv);
    let mut controller = ChatController::new(store.clone(), ChannelClient::new(), url);
    controller.start_with(Some(42)).await.unwrap();

    let sent = controller.send_message(Some(&alice()), "hello").unwrap();
    assert_eq!(sent.user, "alice");

    let echoed = next_inbound(&mut controller).await;
    assert_eq!(echoed.user, SERVER_SENDER);
    assert_eq!(echoed.message, "hello");

    assert_eq!(*received.lock().unwrap(), ["hello"]);

    let texts: Vec<(String, String)> = controller
        .transcript()
        .iter()
        .map(|m| (m.user.clone(), m.message.clone()))
        .collect();
    assert_eq!(
        texts,
        [
            ("alice".to_string(), "hello".to_string()),
            (SERVER_SENDER.to_string(), "hello".to_string()),
        ]
    );

    let stored = store.get_session(42).unwrap();
    assert_eq!(stored.messages, controller.transcript());

    controller.shutdown().await;
}

#[tokio::test]
async fn inbound_after_switch_lands_in_new_session() {
    let (url, _received) = start_echo_relay().await;
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let mut controller = ChatController::new(store.clone(), ChannelClient::new(), url);
    controller.start().await.unwrap();
    let first = controller.active_session().unwrap();

    let second = controller.new_session().unwrap();
    assert_eq!(controller.channel().subscriber_count(), 1);

    controller.send_message(Some(&alice()), "ping");
    let echoed = next_inbound(&mut controller).await;
    assert_eq!(echoed.message, "ping");

    assert!(store.get_session(first).unwrap().messages.is_empty());
    assert_eq!(store.get_session(second.id).unwrap().messages.len(), 2);

    controller.shutdown().await;
}

#[tokio::test]
async fn frames_pending_at_switch_stay_with_previous_session() {
    let (url, received) = start_echo_relay().await;
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let mut controller = ChatController::new(store.clone(), ChannelClient::new(), url);
    controller.start().await.unwrap();
    let first = controller.active_session().unwrap();

    controller.send_message(Some(&alice()), "hello");
    // Let the echo arrive without pulling it
    for _ in 0..100 {
        if !received.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = controller.new_session().unwrap();

    let messages: Vec<(String, String)> = store
        .get_session(first)
        .unwrap()
        .messages
        .iter()
        .map(|m| (m.user.clone(), m.message.clone()))
        .collect();
    assert_eq!(
        messages,
        [
            ("alice".to_string(), "hello".to_string()),
            (SERVER_SENDER.to_string(), "hello".to_string()),
        ]
    );
    assert!(store.get_session(second.id).unwrap().messages.is_empty());
    assert!(controller.transcript().is_empty());

    controller.shutdown().await;
}

#[tokio::test]
async fn shutdown_records_pending_frames() {
    let (url, received) = start_echo_relay().await;
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let mut controller = ChatController::new(store.clone(), ChannelClient::new(), url);
    controller.start().await.unwrap();
    let session = controller.active_session().unwrap();

    controller.send_message(Some(&alice()), "bye");
    for _ in 0..100 {
        if !received.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    controller.shutdown().await;

    let stored = store.get_session(session).unwrap();
    assert_eq!(stored.messages.len(), 2);
    assert!(stored.messages[1].is_inbound());
}

#[tokio::test]
async fn shutdown_closes_channel() {
    let (url, _received) = start_echo_relay().await;
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    let mut controller = ChatController::new(store, ChannelClient::new(), url);
    controller.start().await.unwrap();

    controller.shutdown().await;
    assert!(!controller.channel().is_open());
    assert_eq!(controller.channel().subscriber_count(), 0);
}
