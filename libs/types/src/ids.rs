//! Identifier types for observed tokens
//!
//! A token is identified by the address (mint) assigned by the feed. The
//! address is opaque to this service: it is only trimmed and checked for
//! emptiness, never decoded.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::errors::TypeError;

/// Unique identifier for a token (feed-assigned mint address)
///
/// Used as the identity key for deduplication in the recency store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Create a TokenId from an address
    ///
    /// # Panics
    /// Panics if the address is empty after trimming
    pub fn new(address: impl Into<String>) -> Self {
        match Self::try_new(address) {
            Ok(id) => id,
            Err(e) => panic!("{}", e),
        }
    }

    /// Try to create a TokenId, rejecting empty or whitespace-only addresses
    pub fn try_new(address: impl Into<String>) -> Result<Self, TypeError> {
        let raw = address.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyTokenId);
        }
        if trimmed.len() == raw.len() {
            Ok(Self(raw))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Get the address string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for TokenId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TokenId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.0
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
