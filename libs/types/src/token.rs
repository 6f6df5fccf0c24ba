//! Token entry types
//!
//! A `TokenEntry` is the normalized record the service keeps for every
//! newly-created token, whichever producer observed it first.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::TokenId;

/// Symbol used when the source does not provide one
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Display name used when the source does not provide one
pub const UNKNOWN_NAME: &str = "Unknown Token";

/// Producer that created an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    /// Live push feed
    Stream,
    /// Secondary polling source
    Poll,
}

/// One observed token
///
/// Numeric estimates are serialized as JSON numbers so that API clients
/// do not have to parse strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEntry {
    pub id: TokenId,
    pub symbol: String,
    pub display_name: String,
    /// Resolved HTTP image locator
    pub image_ref: Option<String>,

    // Estimates
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub market_cap: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub progress_pct: Decimal,

    // Timestamps
    pub observed_at: DateTime<Utc>, // windowing only
    pub created_at: DateTime<Utc>,

    pub source: EntrySource,
}

impl TokenEntry {
    /// Create an entry with placeholder metadata and zeroed estimates.
    ///
    /// Producers fill in whatever their source provides.
    pub fn new(id: TokenId, source: EntrySource, now: DateTime<Utc>) -> Self {
        Self {
            id,
            symbol: UNKNOWN_SYMBOL.to_string(),
            display_name: UNKNOWN_NAME.to_string(),
            image_ref: None,
            price: Decimal::ZERO,
            market_cap: Decimal::ZERO,
            progress_pct: Decimal::ZERO,
            observed_at: now,
            created_at: now,
            source,
        }
    }

    /// Set the symbol, falling back to the placeholder when empty.
    pub fn with_symbol(mut self, symbol: Option<&str>) -> Self {
        self.symbol = non_empty(symbol).unwrap_or(UNKNOWN_SYMBOL).to_string();
        self
    }

    /// Set the display name, falling back to the placeholder when empty.
    pub fn with_display_name(mut self, name: Option<&str>) -> Self {
        self.display_name = non_empty(name).unwrap_or(UNKNOWN_NAME).to_string();
        self
    }

    /// Whether the entry was observed strictly before `cutoff`.
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.observed_at < cutoff
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
