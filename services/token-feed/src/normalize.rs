//! Normalization of provider values into entry fields
//!
//! Image locators arrive in provider-specific forms (content-addressed
//! `ipfs://` URIs, bare content hashes, plain HTTP URLs) and are rewritten
//! into fetchable HTTP URLs. Estimates are derived from native-currency
//! amounts with the fixed approximations in `ConversionConfig`.

use rust_decimal::Decimal;
use types::ids::TokenId;
use types::numeric::clamp_pct;

use crate::config::ConversionConfig;

const IPFS_SCHEME: &str = "ipfs://";

/// Resolve a raw URI into an HTTP locator.
///
/// - empty → `None`
/// - `ipfs://<cid>` → `<gateway><cid>`
/// - `http://…` / `https://…` → unchanged
/// - anything else is treated as a content-address path fragment
pub fn resolve_uri(raw: &str, gateway: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(rest) = strip_prefix_ignore_case(raw, IPFS_SCHEME) {
        // `ipfs://ipfs/<cid>` shows up in some metadata
        let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);
        return Some(join_gateway(gateway, rest));
    }

    if strip_prefix_ignore_case(raw, "http://").is_some()
        || strip_prefix_ignore_case(raw, "https://").is_some()
    {
        return Some(raw.to_string());
    }

    Some(join_gateway(gateway, raw))
}

/// Direct image endpoint for a token, built from a `{id}` template.
pub fn placeholder_image(template: &str, id: &TokenId) -> String {
    template.replace("{id}", id.as_str())
}

/// Market cap estimate: native amount times the fixed USD rate.
///
/// Zero when the product does not fit in a Decimal, same as an absent amount.
pub fn market_cap_usd(market_cap_sol: Decimal, conversion: &ConversionConfig) -> Decimal {
    market_cap_sol
        .checked_mul(conversion.sol_usd_rate)
        .unwrap_or(Decimal::ZERO)
}

/// Bonding-curve progress as a percentage in `[0, 100]`.
///
/// Zero when the reserve amount is absent. Reserves too large for the
/// arithmetic saturate at the bound matching their sign.
pub fn curve_progress_pct(reserve_sol: Option<Decimal>, conversion: &ConversionConfig) -> Decimal {
    let Some(reserve) = reserve_sol else {
        return Decimal::ZERO;
    };

    reserve
        .checked_div(conversion.curve_completion_sol)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(clamp_pct)
        .unwrap_or(if reserve.is_sign_positive() && !reserve.is_zero() {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        })
}

fn join_gateway(gateway: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if gateway.ends_with('/') {
        format!("{gateway}{path}")
    } else {
        format!("{gateway}/{path}")
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}
