//! Decimal helpers for price and market-cap estimates
//!
//! Feed payloads carry binary floats or numeric strings; both are converted
//! into `rust_decimal::Decimal` once at the edge so that every derived value
//! (market cap, curve progress) is computed with decimal arithmetic.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::errors::TypeError;

/// Convert a float from a feed payload into a Decimal.
///
/// Rejects NaN, infinities and values outside the Decimal range.
pub fn decimal_from_f64(field: &'static str, value: f64) -> Result<Decimal, TypeError> {
    Decimal::from_f64(value).ok_or_else(|| TypeError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Parse a numeric string (e.g. `"0.000012"`) into a Decimal.
///
/// Scientific notation is accepted as well since some providers emit it
/// for very small prices.
pub fn decimal_from_str(field: &'static str, value: &str) -> Result<Decimal, TypeError> {
    let trimmed = value.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| TypeError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

/// Clamp a percentage into `[0, 100]`.
pub fn clamp_pct(value: Decimal) -> Decimal {
    value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}
