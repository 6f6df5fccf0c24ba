//! Configuration for the token feed core
//!
//! Every knob has a default matching the production feed; each can be
//! overridden through an environment variable. Values are trimmed, empty
//! values count as unset and unparsable values fall back to the default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

/// Default push feed endpoint.
pub const DEFAULT_WS_URL: &str = "wss://pumpportal.fun/api/data";

/// Default secondary (polling) source.
pub const DEFAULT_POLL_URL: &str =
    "https://solana-gateway.moralis.io/token/mainnet/exchange/pumpfun/new?limit=30";

/// Default gateway used to rewrite content-addressed URIs.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Recency store limits.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of entries kept (C).
    pub capacity: usize,
    /// Maximum entry age before a sweep removes it (W).
    pub window: Duration,
    /// How often the background sweeper runs.
    pub sweep_interval: Duration,
    /// Upper bound applied to snapshot limits.
    pub snapshot_max: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            window: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(60),
            snapshot_max: 100,
        }
    }
}

/// Fixed approximations used to derive estimates from feed payloads.
///
/// These are not live rates.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionConfig {
    /// Native currency (SOL) to USD.
    pub sol_usd_rate: Decimal,
    /// Native reserve at which the bonding curve completes.
    pub curve_completion_sol: Decimal,
    /// Price reported for stream entries, which carry no price.
    pub placeholder_price: Decimal,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            sol_usd_rate: Decimal::from(185),
            curve_completion_sol: Decimal::from(85),
            placeholder_price: Decimal::new(1, 5),
        }
    }
}

/// Image locator resolution settings.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// HTTP gateway prefix for content-addressed URIs, ending in `/`.
    pub ipfs_gateway: String,
    /// Optional direct image endpoint; `{id}` is replaced by the token id.
    pub placeholder_template: Option<String>,
    /// Hard deadline for metadata enrichment fetches.
    pub enrich_timeout: Duration,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            placeholder_template: None,
            enrich_timeout: Duration::from_secs(3),
        }
    }
}

/// Push feed connection settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub ws_url: String,
    /// Fixed delay between reconnect attempts (no exponential backoff).
    pub reconnect_delay: Duration,
    /// Reconnects allowed after consecutive failures before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 10,
        }
    }
}

/// Secondary source polling settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub enabled: bool,
    pub url: String,
    /// Sent verbatim as `X-API-Key`; empty when not configured.
    pub api_key: String,
    pub interval: Duration,
    /// Items taken from the front of each response.
    pub batch_size: usize,
    pub request_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_POLL_URL.to_string(),
            api_key: String::new(),
            interval: Duration::from_secs(30),
            batch_size: 30,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Complete configuration of the token feed core.
#[derive(Debug, Clone, Default)]
pub struct FeedConfig {
    pub store: StoreConfig,
    pub stream: StreamConfig,
    pub poller: PollerConfig,
    pub images: ImageConfig,
    pub conversion: ConversionConfig,
}

impl FeedConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let parse = |key: &str| get(key).and_then(|v| v.parse::<u64>().ok());
        let decimal = |key: &str, default: Decimal| {
            get(key)
                .and_then(|v| Decimal::from_str(&v).ok())
                .filter(|d| *d > Decimal::ZERO)
                .unwrap_or(default)
        };

        let defaults = FeedConfig::default();

        let store = StoreConfig {
            capacity: parse("STORE_CAPACITY")
                .map(|v| v.max(1) as usize)
                .unwrap_or(defaults.store.capacity),
            window: parse("STORE_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.store.window),
            sweep_interval: parse("STORE_SWEEP_INTERVAL_SECS")
                .map(|v| Duration::from_secs(v.max(1)))
                .unwrap_or(defaults.store.sweep_interval),
            snapshot_max: defaults.store.snapshot_max,
        };

        let stream = StreamConfig {
            ws_url: get("FEED_WS_URL").unwrap_or(defaults.stream.ws_url),
            reconnect_delay: parse("FEED_RECONNECT_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stream.reconnect_delay),
            max_reconnect_attempts: parse("FEED_MAX_RECONNECT_ATTEMPTS")
                .map(|v| v.min(u32::MAX as u64) as u32)
                .unwrap_or(defaults.stream.max_reconnect_attempts),
        };

        let poller = PollerConfig {
            enabled: get("POLL_ENABLED")
                .map(|v| {
                    matches!(
                        v.to_ascii_lowercase().as_str(),
                        "1" | "true" | "yes" | "y" | "on"
                    )
                })
                .unwrap_or(defaults.poller.enabled),
            url: get("POLL_URL").unwrap_or(defaults.poller.url),
            // Passthrough: not validated.
            api_key: lookup("POLL_API_KEY").unwrap_or_default(),
            interval: parse("POLL_INTERVAL_SECS")
                .map(|v| Duration::from_secs(v.max(1)))
                .unwrap_or(defaults.poller.interval),
            batch_size: parse("POLL_BATCH_SIZE")
                .map(|v| v as usize)
                .unwrap_or(defaults.poller.batch_size),
            request_timeout: defaults.poller.request_timeout,
        };

        let images = ImageConfig {
            ipfs_gateway: get("FEED_IPFS_GATEWAY")
                .map(|g| if g.ends_with('/') { g } else { format!("{g}/") })
                .unwrap_or(defaults.images.ipfs_gateway),
            placeholder_template: get("FEED_PLACEHOLDER_IMAGE_URL"),
            enrich_timeout: parse("FEED_ENRICH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.images.enrich_timeout),
        };

        let conversion = ConversionConfig {
            sol_usd_rate: decimal("SOL_USD_RATE", defaults.conversion.sol_usd_rate),
            curve_completion_sol: decimal(
                "CURVE_COMPLETION_SOL",
                defaults.conversion.curve_completion_sol,
            ),
            placeholder_price: decimal(
                "PLACEHOLDER_PRICE",
                defaults.conversion.placeholder_price,
            ),
        };

        Self {
            store,
            stream,
            poller,
            images,
            conversion,
        }
    }
}
