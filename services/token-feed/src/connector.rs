//! Live feed connector
//!
//! Maintains the WebSocket subscription to the push feed, decodes creation
//! events and upserts them into the store.
//!
//! Connection lifecycle:
//!
//! ```text
//! Disconnected → Connecting → Connected ─(close/error)→ Disconnected
//!      ↑                                                     │
//!      └──────────── fixed delay, attempt < max ─────────────┤
//!                                                            └─(attempt == max)→ Terminated
//! ```
//!
//! The retry counter resets on every successful connect. A failed connect
//! counts as a disconnect. `Terminated` is permanent until process restart;
//! the rest of the service keeps serving whatever the store holds.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{ConversionConfig, FeedConfig, ImageConfig, StreamConfig};
use crate::enrich::Enricher;
use crate::error::FeedError;
use crate::events::{decode_create_event, SUBSCRIBE_NEW_TOKEN};
use crate::metrics::FeedMetrics;
use crate::store::{RecencyStore, StoreCommand};

/// Connection state of the feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Retry budget exhausted; no further automatic reconnects.
    Terminated,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Terminated => "terminated",
        }
    }
}

/// What to do after the connection dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Wait `delay`, then make reconnect number `attempt`.
    Retry { attempt: u32, delay: Duration },
    /// Budget exhausted after `attempts` consecutive reconnects.
    GiveUp { attempts: u32 },
}

/// Bounded fixed-delay reconnect policy.
///
/// Pure state machine: the caller owns the timer.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    delay: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            attempts: 0,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.max_reconnect_attempts, config.reconnect_delay)
    }

    /// Connection established: the retry counter starts over.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    /// Connection closed or failed.
    pub fn on_disconnected(&mut self) -> ReconnectDecision {
        if self.attempts < self.max_attempts {
            self.attempts += 1;
            ReconnectDecision::Retry {
                attempt: self.attempts,
                delay: self.delay,
            }
        } else {
            ReconnectDecision::GiveUp {
                attempts: self.attempts,
            }
        }
    }

    /// Consecutive reconnects since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Persistent subscription to the push feed.
pub struct StreamConnector {
    config: StreamConfig,
    conversion: ConversionConfig,
    images: ImageConfig,
    store: Arc<RecencyStore>,
    metrics: Arc<FeedMetrics>,
    enricher: Option<Enricher>,
    state: watch::Sender<ConnectionState>,
    /// Live outbound handle; `None` whenever not connected.
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl StreamConnector {
    pub fn new(config: &FeedConfig, store: Arc<RecencyStore>, metrics: Arc<FeedMetrics>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config: config.stream.clone(),
            conversion: config.conversion.clone(),
            images: config.images.clone(),
            store,
            metrics,
            enricher: None,
            state,
            outbound: Mutex::new(None),
        }
    }

    /// Enable metadata enrichment for events that carry a URI.
    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Receiver notified on every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Queue a text frame on the live connection.
    ///
    /// No-op returning false unless connected.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        if !self.is_connected() {
            return false;
        }
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        match outbound.as_ref() {
            Some(tx) => tx.send(Message::text(text.into())).is_ok(),
            None => false,
        }
    }

    /// Decode one text frame and upsert it if it is a creation event.
    ///
    /// Returns whether the frame produced an entry.
    pub fn handle_text(&self, text: &str) -> bool {
        let Some(event) = decode_create_event(text) else {
            self.metrics.record_message(false);
            return false;
        };

        let entry = event.to_entry(&self.conversion, &self.images, Utc::now());
        let outcome = self.store.apply(StoreCommand::Upsert(entry));
        self.metrics.record_capacity_evictions(outcome.evicted());
        self.metrics.record_message(true);

        debug!(
            token = %event.mint,
            symbol = event.symbol.as_deref().unwrap_or_default(),
            ?outcome,
            "New token from feed"
        );

        if let (Some(enricher), Some(url), Some(generation)) = (
            &self.enricher,
            event.metadata_url(&self.images),
            outcome.generation(),
        ) {
            enricher.spawn(event.mint.clone(), generation, url);
        }

        true
    }

    /// Drive the connection until the retry budget is exhausted.
    pub async fn run(&self) {
        let mut policy = ReconnectPolicy::from_config(&self.config);

        loop {
            self.set_state(ConnectionState::Connecting);
            self.metrics.record_connect_attempt();
            info!(
                url = %self.config.ws_url,
                attempt = policy.attempts(),
                "Connecting to token feed"
            );

            match self.session(&mut policy).await {
                Ok(()) => info!("Token feed connection closed"),
                Err(e) => warn!(error = %e, kind = e.kind(), "Token feed connection failed"),
            }

            self.clear_outbound();
            self.set_state(ConnectionState::Disconnected);

            match policy.on_disconnected() {
                ReconnectDecision::Retry { attempt, delay } => {
                    self.metrics.record_reconnect_scheduled();
                    warn!(
                        attempt,
                        max_attempts = self.config.max_reconnect_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Scheduling token feed reconnect"
                    );
                    tokio::time::sleep(delay).await;
                }
                ReconnectDecision::GiveUp { attempts } => {
                    error!(
                        attempts,
                        "Token feed reconnect budget exhausted, stream ingestion stopped"
                    );
                    self.set_state(ConnectionState::Terminated);
                    return;
                }
            }
        }
    }

    /// One connection lifetime: connect, subscribe, read until close.
    async fn session(&self, policy: &mut ReconnectPolicy) -> Result<(), FeedError> {
        let url = Url::parse(&self.config.ws_url).map_err(|e| FeedError::InvalidUrl {
            url: self.config.ws_url.clone(),
            reason: e.to_string(),
        })?;

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(FeedError::Connect)?;
        let (mut sink, mut stream) = ws.split();

        sink.send(Message::text(SUBSCRIBE_NEW_TOKEN.to_string())).await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        self.install_outbound(tx);
        policy.on_connected();
        self.set_state(ConnectionState::Connected);
        info!(url = %self.config.ws_url, "Subscribed to new token events");

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.handle_text(text.as_str());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Token feed sent close frame");
                        return Ok(());
                    }
                    // Pongs are queued by tungstenite and flushed on the next read.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(FeedError::Transport(e)),
                    None => return Ok(()),
                },
                Some(outgoing) = rx.recv() => {
                    sink.send(outgoing).await?;
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = previous.label(), to = state.label(), "Feed state transition");
        }
    }

    fn install_outbound(&self, tx: mpsc::UnboundedSender<Message>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    fn clear_outbound(&self) {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use types::ids::TokenId;

    fn connector_with(config: FeedConfig) -> (StreamConnector, Arc<RecencyStore>, Arc<FeedMetrics>) {
        let store = Arc::new(RecencyStore::new(&config.store));
        let metrics = Arc::new(FeedMetrics::new());
        let connector = StreamConnector::new(&config, store.clone(), metrics.clone());
        (connector, store, metrics)
    }

    #[test]
    fn test_policy_schedules_min_n_10_reconnects() {
        for closes in [0u32, 1, 3, 10, 11, 25] {
            let mut policy = ReconnectPolicy::new(10, Duration::from_secs(5));
            let decisions: Vec<_> = (0..closes).map(|_| policy.on_disconnected()).collect();

            let retries: Vec<_> = decisions
                .iter()
                .filter_map(|d| match d {
                    ReconnectDecision::Retry { attempt, delay } => Some((*attempt, *delay)),
                    ReconnectDecision::GiveUp { .. } => None,
                })
                .collect();

            assert_eq!(retries.len() as u32, closes.min(10));
            for (i, (attempt, delay)) in retries.iter().enumerate() {
                assert_eq!(*attempt, i as u32 + 1);
                assert_eq!(*delay, Duration::from_secs(5));
            }
            // Nothing is retried once the budget is gone.
            for decision in decisions.iter().skip(10) {
                assert_eq!(*decision, ReconnectDecision::GiveUp { attempts: 10 });
            }
        }
    }

    #[test]
    fn test_policy_resets_on_connect() {
        let mut policy = ReconnectPolicy::new(2, Duration::from_secs(5));
        policy.on_disconnected();
        policy.on_disconnected();
        assert!(matches!(policy.on_disconnected(), ReconnectDecision::GiveUp { .. }));

        policy.on_connected();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(
            policy.on_disconnected(),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn test_handle_text_upserts_create_events() {
        let (connector, store, metrics) = connector_with(FeedConfig::default());

        let accepted = connector.handle_text(
            r#"{"txType":"create","mint":"ABC","symbol":"FOO","marketCapSol":10,"vSolInBondingCurve":42.5}"#,
        );

        assert!(accepted);
        let entry = store.get(&TokenId::new("ABC")).unwrap();
        assert_eq!(entry.symbol, "FOO");
        assert_eq!(entry.market_cap, Decimal::from(1850));
        assert_eq!(entry.progress_pct, Decimal::from(50));
        assert_eq!(metrics.export()["stream_upserts"], 1);
    }

    #[test]
    fn test_handle_text_survives_oversized_amounts() {
        let (connector, store, metrics) = connector_with(FeedConfig::default());

        assert!(connector.handle_text(r#"{"txType":"create","mint":"BIG","marketCapSol":1e27}"#));
        assert!(connector.handle_text(r#"{"txType":"create","mint":"DEEP","vSolInBondingCurve":7e28}"#));

        let big = store.get(&TokenId::new("BIG")).unwrap();
        assert_eq!(big.market_cap, Decimal::ZERO);
        let deep = store.get(&TokenId::new("DEEP")).unwrap();
        assert_eq!(deep.progress_pct, Decimal::ONE_HUNDRED);
        assert_eq!(metrics.export()["stream_upserts"], 2);
    }

    #[test]
    fn test_handle_text_ignores_noise() {
        let (connector, store, metrics) = connector_with(FeedConfig::default());

        assert!(!connector.handle_text(r#"{"message":"Successfully subscribed to token creation events."}"#));
        assert!(!connector.handle_text(r#"{"txType":"create"}"#));
        assert!(!connector.handle_text(r#"{"mint":"ABC"}"#));
        assert!(!connector.handle_text("garbage"));

        assert!(store.is_empty());
        let exported = metrics.export();
        assert_eq!(exported["messages_received"], 4);
        assert_eq!(exported["messages_discarded"], 4);
    }

    #[test]
    fn test_send_is_noop_when_not_connected() {
        let (connector, _store, _metrics) = connector_with(FeedConfig::default());
        assert_eq!(connector.state(), ConnectionState::Disconnected);
        assert!(!connector.send_text(SUBSCRIBE_NEW_TOKEN));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_gives_up_after_budget() {
        let mut config = FeedConfig::default();
        // Loopback port 1 refuses connections immediately.
        config.stream.ws_url = "ws://127.0.0.1:1/feed".to_string();
        let (connector, _store, metrics) = connector_with(config);
        let mut state_rx = connector.subscribe_state();

        let start = tokio::time::Instant::now();
        connector.run().await;

        assert_eq!(connector.state(), ConnectionState::Terminated);
        assert!(state_rx.has_changed().unwrap());
        assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Terminated);

        let exported = metrics.export();
        assert_eq!(exported["connect_attempts"], 11);
        assert_eq!(exported["reconnects_scheduled"], 10);
        assert!(start.elapsed() >= Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_zero_budget_terminates_immediately() {
        let mut config = FeedConfig::default();
        config.stream.ws_url = "not a url".to_string();
        config.stream.max_reconnect_attempts = 0;
        let (connector, _store, metrics) = connector_with(config);

        connector.run().await;

        assert_eq!(connector.state(), ConnectionState::Terminated);
        assert_eq!(metrics.export()["connect_attempts"], 1);
        assert_eq!(metrics.export()["reconnects_scheduled"], 0);
    }
}
