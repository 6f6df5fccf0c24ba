//! Feed event decoding
//!
//! The push feed multiplexes several event types over one connection. Only
//! token-creation events are turned into entries; every other frame, and
//! every frame that fails to decode, is expected noise and is dropped
//! without logging above `trace`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::trace;
use types::ids::TokenId;
use types::numeric::decimal_from_f64;
use types::token::{EntrySource, TokenEntry};

use crate::config::{ConversionConfig, ImageConfig};
use crate::normalize::{curve_progress_pct, market_cap_usd, placeholder_image, resolve_uri};

/// Control frame sent once after every successful connect.
pub const SUBSCRIBE_NEW_TOKEN: &str = r#"{"method":"subscribeNewToken"}"#;

/// Discriminator value for token-creation events.
pub const CREATE_TX_TYPE: &str = "create";

/// Raw feed frame. All fields are optional so unrelated event types still
/// decode; filtering happens afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedMessage {
    tx_type: Option<String>,
    mint: Option<String>,
    symbol: Option<String>,
    name: Option<String>,
    uri: Option<String>,
    market_cap_sol: Option<f64>,
    v_sol_in_bonding_curve: Option<f64>,
}

/// A decoded token-creation event.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateEvent {
    pub mint: TokenId,
    pub symbol: Option<String>,
    pub name: Option<String>,
    /// Metadata URI as sent by the feed.
    pub uri: Option<String>,
    pub market_cap_sol: Option<Decimal>,
    pub v_sol_in_bonding_curve: Option<Decimal>,
}

/// Decode a text frame into a creation event.
///
/// Returns `None` for malformed JSON, for frames whose `txType` is not
/// `"create"`, and for frames without a non-empty `mint`.
pub fn decode_create_event(text: &str) -> Option<CreateEvent> {
    let message: FeedMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            trace!(error = %e, "Discarding undecodable frame");
            return None;
        }
    };

    if message.tx_type.as_deref() != Some(CREATE_TX_TYPE) {
        return None;
    }
    let mint = TokenId::try_new(message.mint?).ok()?;

    Some(CreateEvent {
        mint,
        symbol: message.symbol,
        name: message.name,
        uri: message.uri,
        market_cap_sol: message
            .market_cap_sol
            .and_then(|v| decimal_from_f64("marketCapSol", v).ok()),
        v_sol_in_bonding_curve: message
            .v_sol_in_bonding_curve
            .and_then(|v| decimal_from_f64("vSolInBondingCurve", v).ok()),
    })
}

impl CreateEvent {
    /// Metadata URL to fetch for enrichment, if the event carries a URI.
    pub fn metadata_url(&self, images: &ImageConfig) -> Option<String> {
        self.uri
            .as_deref()
            .and_then(|uri| resolve_uri(uri, &images.ipfs_gateway))
    }

    /// Normalize into a store entry observed at `now`.
    pub fn to_entry(
        &self,
        conversion: &ConversionConfig,
        images: &ImageConfig,
        now: DateTime<Utc>,
    ) -> TokenEntry {
        let mut entry = TokenEntry::new(self.mint.clone(), EntrySource::Stream, now)
            .with_symbol(self.symbol.as_deref())
            .with_display_name(self.name.as_deref());

        entry.image_ref = match &images.placeholder_template {
            Some(template) => Some(placeholder_image(template, &self.mint)),
            None => self.metadata_url(images),
        };
        entry.price = conversion.placeholder_price;
        entry.market_cap = self
            .market_cap_sol
            .map(|sol| market_cap_usd(sol, conversion))
            .unwrap_or(Decimal::ZERO);
        entry.progress_pct = curve_progress_pct(self.v_sol_in_bonding_curve, conversion);

        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_create_event_end_to_end_mapping() {
        let frame = r#"{"txType":"create","mint":"ABC","symbol":"FOO","marketCapSol":10,"vSolInBondingCurve":42.5}"#;
        let event = decode_create_event(frame).unwrap();
        let entry = event.to_entry(&ConversionConfig::default(), &ImageConfig::default(), now());

        assert_eq!(entry.id.as_str(), "ABC");
        assert_eq!(entry.symbol, "FOO");
        assert_eq!(entry.display_name, "Unknown Token");
        assert_eq!(entry.market_cap, Decimal::from(1850));
        assert_eq!(entry.progress_pct, Decimal::new(500, 1));
        assert_eq!(entry.price, Decimal::new(1, 5));
        assert_eq!(entry.observed_at, now());
        assert_eq!(entry.created_at, now());
        assert_eq!(entry.source, EntrySource::Stream);
        assert!(entry.image_ref.is_none());
    }

    #[test]
    fn test_missing_discriminator_is_ignored() {
        assert!(decode_create_event(r#"{"mint":"ABC","symbol":"FOO"}"#).is_none());
        assert!(decode_create_event(r#"{"txType":"buy","mint":"ABC"}"#).is_none());
    }

    #[test]
    fn test_missing_or_empty_mint_is_ignored() {
        assert!(decode_create_event(r#"{"txType":"create","symbol":"FOO"}"#).is_none());
        assert!(decode_create_event(r#"{"txType":"create","mint":""}"#).is_none());
    }

    #[test]
    fn test_malformed_frames_are_ignored() {
        assert!(decode_create_event("not json").is_none());
        assert!(decode_create_event(r#"{"message":"Successfully subscribed"}"#).is_none());
        assert!(decode_create_event("[1,2,3]").is_none());
        assert!(decode_create_event(r#"{"txType":"create","mint":42}"#).is_none());
    }

    #[test]
    fn test_uri_resolves_to_image_ref() {
        let frame = r#"{"txType":"create","mint":"ABC","name":"Foo Coin","uri":"ipfs://QmMeta"}"#;
        let event = decode_create_event(frame).unwrap();
        let images = ImageConfig::default();

        assert_eq!(
            event.metadata_url(&images).as_deref(),
            Some("https://ipfs.io/ipfs/QmMeta")
        );
        let entry = event.to_entry(&ConversionConfig::default(), &images, now());
        assert_eq!(entry.display_name, "Foo Coin");
        assert_eq!(entry.image_ref.as_deref(), Some("https://ipfs.io/ipfs/QmMeta"));
    }

    #[test]
    fn test_placeholder_template_used_as_initial_image() {
        let frame = r#"{"txType":"create","mint":"ABC","uri":"ipfs://QmMeta"}"#;
        let event = decode_create_event(frame).unwrap();
        let images = ImageConfig {
            placeholder_template: Some("https://images.example/{id}".to_string()),
            ..ImageConfig::default()
        };

        let entry = event.to_entry(&ConversionConfig::default(), &images, now());
        assert_eq!(entry.image_ref.as_deref(), Some("https://images.example/ABC"));
    }

    #[test]
    fn test_absent_estimates_default_to_zero() {
        let event = decode_create_event(r#"{"txType":"create","mint":"ABC"}"#).unwrap();
        let entry = event.to_entry(&ConversionConfig::default(), &ImageConfig::default(), now());
        assert_eq!(entry.market_cap, Decimal::ZERO);
        assert_eq!(entry.progress_pct, Decimal::ZERO);
    }
}
