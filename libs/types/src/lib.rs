//! Types library for the token feed service
//!
//! Shared data model used by the ingestion core and the HTTP gateway.
//!
//! # Modules
//! - `ids`: Token identifier (`TokenId`)
//! - `numeric`: Decimal conversion helpers for feed estimates
//! - `token`: Normalized token entry (`TokenEntry`)
//! - `errors`: Error taxonomy

pub mod errors;
pub mod ids;
pub mod numeric;
pub mod token;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::token::*;
}
