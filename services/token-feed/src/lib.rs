//! Token Feed Service
//!
//! Ingests newly created tokens from a live push feed and keeps a short
//! rolling window of the most recent ones in memory:
//! - Persistent WebSocket subscription with bounded fixed-delay reconnects
//! - Periodic reconciliation against a secondary HTTP source
//! - Best-effort image enrichment from token metadata
//! - Bounded, deduplicated, recency-ordered store with time-window expiry
//! - Read-only query facade for the API layer
//!
//! # Architecture
//!
//! ```text
//!  WebSocket feed        HTTP secondary source
//!        │                       │
//!  ┌─────▼─────┐         ┌───────▼───────┐
//!  │ Connector │         │    Poller     │
//!  └──┬─────┬──┘         └───────┬───────┘
//!     │     │ metadata URI       │
//!     │  ┌──▼───────┐            │
//!     │  │ Enricher │            │
//!     │  └──┬───────┘            │
//!     │     │ PatchImage         │ Upsert
//!  ┌──▼─────▼────────────────────▼──┐
//!  │         RecencyStore           │ ◄── Sweeper
//!  └───────────────┬────────────────┘
//!                  │
//!           ┌──────▼──────┐
//!           │ QueryFacade │
//!           └─────────────┘
//! ```

pub mod config;
pub mod connector;
pub mod enrich;
pub mod error;
pub mod events;
pub mod metrics;
pub mod normalize;
pub mod poller;
pub mod query;
pub mod service;
pub mod store;

pub use config::FeedConfig;
pub use connector::{ConnectionState, StreamConnector};
pub use error::FeedError;
pub use query::{FeedStats, Liveness, QueryFacade, RecentTokens};
pub use service::{ServiceHandle, TokenFeedService};
pub use store::{RecencyStore, StoreCommand, StoreOutcome};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
