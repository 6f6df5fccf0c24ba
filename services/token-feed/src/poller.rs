//! Reconciliation poller
//!
//! Periodically pulls the newest tokens from a secondary HTTP source and
//! upserts them through the same path as stream events, so whichever
//! producer writes last wins for a given id. The first cycle runs
//! immediately; failures are logged and the next tick retries.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use types::ids::TokenId;
use types::numeric::{clamp_pct, decimal_from_f64, decimal_from_str};
use types::token::{EntrySource, TokenEntry};

use crate::config::{ConversionConfig, FeedConfig, ImageConfig, PollerConfig};
use crate::error::FeedError;
use crate::metrics::FeedMetrics;
use crate::normalize::resolve_uri;
use crate::store::{RecencyStore, StoreCommand};

/// Header carrying the secondary source API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

const ID_FIELDS: &[&str] = &["tokenAddress", "mint"];
const SYMBOL_FIELDS: &[&str] = &["symbol", "ticker"];
const NAME_FIELDS: &[&str] = &["name", "tokenName"];
const IMAGE_FIELDS: &[&str] = &["logo", "image"];
const PRICE_FIELDS: &[&str] = &["priceUsd", "price"];
const MARKET_CAP_FIELDS: &[&str] = &["fullyDilutedValuation", "marketCap"];
const PROGRESS_FIELDS: &[&str] = &["bondingCurveProgress", "progress"];

/// Periodic backfill from the secondary source.
pub struct ReconciliationPoller {
    client: reqwest::Client,
    config: PollerConfig,
    conversion: ConversionConfig,
    images: ImageConfig,
    store: Arc<RecencyStore>,
    metrics: Arc<FeedMetrics>,
}

impl ReconciliationPoller {
    pub fn new(
        config: &FeedConfig,
        client: reqwest::Client,
        store: Arc<RecencyStore>,
        metrics: Arc<FeedMetrics>,
    ) -> Self {
        Self {
            client,
            config: config.poller.clone(),
            conversion: config.conversion.clone(),
            images: config.images.clone(),
            store,
            metrics,
        }
    }

    /// Poll immediately, then on every interval tick, forever.
    pub async fn run(&self) {
        info!(
            url = %self.config.url,
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "Reconciliation poller started"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.poll_cycle().await;
        }
    }

    /// One logged cycle; never fails.
    ///
    /// Returns the number of upserted entries, or `None` if the cycle was skipped.
    pub async fn poll_cycle(&self) -> Option<usize> {
        let started = Instant::now();
        match self.poll_once().await {
            Ok(upserted) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.metrics.record_poll(upserted, duration_ms);
                info!(upserted, duration_ms, "Reconciliation poll completed");
                Some(upserted)
            }
            Err(e) => {
                self.metrics.record_poll_failure();
                warn!(error = %e, kind = e.kind(), "Reconciliation poll failed, skipping cycle");
                None
            }
        }
    }

    /// Fetch one batch and upsert every usable item.
    pub async fn poll_once(&self) -> Result<usize, FeedError> {
        let body = self.fetch().await?;
        let items = extract_items(&body).ok_or_else(|| {
            FeedError::Decode("expected an array or an object with a `result` array".to_string())
        })?;

        let now = Utc::now();
        let mut upserted = 0;
        for item in items.iter().take(self.config.batch_size) {
            let Some(entry) = normalize_item(item, &self.conversion, &self.images, now) else {
                debug!("Skipping polled item without id");
                continue;
            };
            let outcome = self.store.apply(StoreCommand::Upsert(entry));
            self.metrics.record_capacity_evictions(outcome.evicted());
            upserted += 1;
        }

        Ok(upserted)
    }

    async fn fetch(&self) -> Result<Value, FeedError> {
        let response = self
            .client
            .get(&self.config.url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: self.config.url.clone(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Items of a secondary source response: a bare array or `{"result": [...]}`.
pub fn extract_items(body: &Value) -> Option<&Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("result").and_then(Value::as_array),
        _ => None,
    }
}

/// Normalize one polled item; `None` when it has no usable id.
pub fn normalize_item(
    item: &Value,
    conversion: &ConversionConfig,
    images: &ImageConfig,
    now: DateTime<Utc>,
) -> Option<TokenEntry> {
    let id = TokenId::try_new(first_str(item, ID_FIELDS)?).ok()?;

    let mut entry = TokenEntry::new(id, EntrySource::Poll, now)
        .with_symbol(first_str(item, SYMBOL_FIELDS))
        .with_display_name(first_str(item, NAME_FIELDS));

    entry.image_ref =
        first_str(item, IMAGE_FIELDS).and_then(|raw| resolve_uri(raw, &images.ipfs_gateway));
    entry.price = first_decimal(item, PRICE_FIELDS).unwrap_or(conversion.placeholder_price);
    entry.market_cap = first_decimal(item, MARKET_CAP_FIELDS).unwrap_or(Decimal::ZERO);
    entry.progress_pct = first_decimal(item, PROGRESS_FIELDS)
        .map(clamp_pct)
        .unwrap_or(Decimal::ZERO);
    if let Some(created_at) = item.get("createdAt").and_then(parse_timestamp) {
        entry.created_at = created_at;
    }

    Some(entry)
}

/// First non-empty string among `fields`.
fn first_str<'a>(item: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|field| item.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// First field among `fields` holding a number or a numeric string.
fn first_decimal(item: &Value, fields: &'static [&'static str]) -> Option<Decimal> {
    fields.iter().copied().find_map(|field| match item.get(field)? {
        Value::Number(n) => decimal_from_f64(field, n.as_f64()?).ok(),
        Value::String(s) => decimal_from_str(field, s).ok(),
        _ => None,
    })
}

/// RFC 3339 string or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
