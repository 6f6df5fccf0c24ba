//! End-to-end tests for the feed connector
//!
//! A local WebSocket server stands in for the push feed.
//!
//! Tests include:
//! - Subscribe on connect and ingestion of creation events
//! - Noise frames leaving the store untouched
//! - Oversized amounts not interrupting the session
//! - Reconnect and resubscribe after the server closes
//! - Outbound sends on the live connection

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use token_feed::config::{FeedConfig, StreamConfig};
use token_feed::events::SUBSCRIBE_NEW_TOKEN;
use token_feed::metrics::FeedMetrics;
use token_feed::{ConnectionState, RecencyStore, StreamConnector};
use types::ids::TokenId;

const CREATE_ABC: &str = r#"{"txType":"create","mint":"ABC","symbol":"FOO","name":"Foo Coin","marketCapSol":10,"vSolInBondingCurve":42.5}"#;

struct Harness {
    listener: TcpListener,
    connector: Arc<StreamConnector>,
    store: Arc<RecencyStore>,
    metrics: Arc<FeedMetrics>,
}

async fn harness(max_reconnect_attempts: u32) -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = FeedConfig {
        stream: StreamConfig {
            ws_url: format!("ws://{addr}/api/data"),
            reconnect_delay: Duration::from_millis(50),
            max_reconnect_attempts,
        },
        ..FeedConfig::default()
    };
    let store = Arc::new(RecencyStore::new(&config.store));
    let metrics = Arc::new(FeedMetrics::new());
    let connector = Arc::new(StreamConnector::new(&config, store.clone(), metrics.clone()));

    Harness {
        listener,
        connector,
        store,
        metrics,
    }
}

fn start(connector: &Arc<StreamConnector>) -> tokio::task::JoinHandle<()> {
    let connector = connector.clone();
    tokio::spawn(async move { connector.run().await })
}

/// Accept one client and check it subscribes first.
async fn accept_subscriber(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

    let first = next_text(&mut ws).await;
    assert_eq!(first, SUBSCRIBE_NEW_TOKEN);
    ws
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return text.as_str().to_string(),
            _ => continue,
        }
    }
}

async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

#[tokio::test]
async fn test_create_event_is_ingested() {
    let h = harness(3).await;
    let task = start(&h.connector);

    let mut ws = accept_subscriber(&h.listener).await;
    eventually("connected", || h.connector.is_connected()).await;

    ws.send(Message::text(r#"{"message":"Successfully subscribed to token creation events."}"#))
        .await
        .unwrap();
    ws.send(Message::text(r#"{"txType":"buy","mint":"ABC"}"#)).await.unwrap();
    ws.send(Message::text(CREATE_ABC)).await.unwrap();

    let id = TokenId::new("ABC");
    eventually("entry ABC", || h.store.contains(&id)).await;

    let entry = h.store.get(&id).unwrap();
    assert_eq!(entry.symbol, "FOO");
    assert_eq!(entry.display_name, "Foo Coin");
    assert_eq!(entry.market_cap, Decimal::from(1850));
    assert_eq!(entry.progress_pct, Decimal::from(50));
    assert_eq!(h.store.len(), 1);

    let counters = h.metrics.export();
    assert_eq!(counters["messages_received"], 3);
    assert_eq!(counters["messages_discarded"], 2);
    assert_eq!(counters["stream_upserts"], 1);

    task.abort();
}

#[tokio::test]
async fn test_oversized_amounts_keep_session_alive() {
    let h = harness(3).await;
    let task = start(&h.connector);

    let mut ws = accept_subscriber(&h.listener).await;
    eventually("connected", || h.connector.is_connected()).await;

    ws.send(Message::text(r#"{"txType":"create","mint":"BIG","marketCapSol":1e27}"#))
        .await
        .unwrap();
    ws.send(Message::text(r#"{"txType":"create","mint":"DEEP","vSolInBondingCurve":7e28}"#))
        .await
        .unwrap();
    ws.send(Message::text(CREATE_ABC)).await.unwrap();

    let id = TokenId::new("ABC");
    eventually("entry after oversized frames", || h.store.contains(&id)).await;

    assert_eq!(h.store.get(&TokenId::new("BIG")).unwrap().market_cap, Decimal::ZERO);
    assert_eq!(
        h.store.get(&TokenId::new("DEEP")).unwrap().progress_pct,
        Decimal::ONE_HUNDRED
    );
    assert_eq!(h.store.len(), 3);
    assert!(h.connector.is_connected());
    assert!(!task.is_finished());
    assert_eq!(h.metrics.export()["connect_attempts"], 1);

    // Same session keeps serving outbound sends.
    assert!(h.connector.send_text("ping"));
    assert_eq!(next_text(&mut ws).await, "ping");

    task.abort();
}

#[tokio::test]
async fn test_reconnects_and_resubscribes_after_close() {
    let h = harness(3).await;
    let task = start(&h.connector);

    let mut ws = accept_subscriber(&h.listener).await;
    ws.close(None).await.unwrap();
    drop(ws);

    // The connector must come back on its own and subscribe again.
    let mut ws = accept_subscriber(&h.listener).await;
    eventually("reconnected", || h.connector.is_connected()).await;

    ws.send(Message::text(CREATE_ABC)).await.unwrap();
    eventually("entry after reconnect", || h.store.contains(&TokenId::new("ABC"))).await;

    let counters = h.metrics.export();
    assert_eq!(counters["connect_attempts"], 2);
    assert_eq!(counters["reconnects_scheduled"], 1);

    task.abort();
}

#[tokio::test]
async fn test_terminates_when_server_goes_away() {
    let h = harness(2).await;
    let task = start(&h.connector);

    let mut ws = accept_subscriber(&h.listener).await;
    ws.send(Message::text(CREATE_ABC)).await.unwrap();
    eventually("entry ABC", || h.store.len() == 1).await;

    // Stop accepting: every further connect is refused.
    drop(h.listener);
    ws.close(None).await.unwrap();
    drop(ws);

    let mut state = h.connector.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ConnectionState::Terminated),
    )
    .await
    .unwrap()
    .unwrap();

    task.await.unwrap();
    assert_eq!(h.metrics.export()["reconnects_scheduled"], 2);
    // What was ingested before the outage is still served.
    assert_eq!(h.store.len(), 1);
    assert!(!h.connector.send_text("ping"));
}

#[tokio::test]
async fn test_send_text_reaches_server_while_connected() {
    let h = harness(1).await;
    let task = start(&h.connector);

    let mut ws = accept_subscriber(&h.listener).await;
    eventually("connected", || h.connector.is_connected()).await;

    let payload = r#"{"method":"subscribeTokenTrade","keys":["ABC"]}"#;
    assert!(h.connector.send_text(payload));
    assert_eq!(next_text(&mut ws).await, payload);

    task.abort();
}
