//! Read-only access for the API layer
//!
//! Every read sweeps expired entries first, so a caller never sees an entry
//! older than the window even if the background sweeper has not run yet.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use types::token::TokenEntry;

use crate::connector::ConnectionState;
use crate::metrics::FeedMetrics;
use crate::store::RecencyStore;

/// Page size used when the caller gives no limit.
pub const DEFAULT_LIMIT: usize = 50;

/// Largest page a caller can request.
pub const MAX_LIMIT: usize = 100;

/// Most recent entries plus feed liveness.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTokens {
    pub entries: Vec<TokenEntry>,
    pub total_count: usize,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Liveness {
    pub connected: bool,
    pub count: usize,
}

/// Counter snapshot plus the current connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub connection: &'static str,
    pub stored: usize,
    pub counters: BTreeMap<String, u64>,
}

/// Cheap to clone; shared by every request handler.
#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<RecencyStore>,
    metrics: Arc<FeedMetrics>,
    connection: watch::Receiver<ConnectionState>,
    window: Duration,
}

impl QueryFacade {
    pub fn new(
        store: Arc<RecencyStore>,
        metrics: Arc<FeedMetrics>,
        connection: watch::Receiver<ConnectionState>,
        window: Duration,
    ) -> Self {
        Self {
            store,
            metrics,
            connection,
            window,
        }
    }

    /// Sweep, then return up to `limit` entries, most recent first.
    pub fn recent(&self, limit: Option<usize>) -> RecentTokens {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let (snapshot, removed) = self
            .store
            .sweep_then_snapshot(Utc::now(), self.window, limit);
        self.metrics.record_expired(removed);

        RecentTokens {
            entries: snapshot.entries,
            total_count: snapshot.total_count,
            connected: self.is_connected(),
        }
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            connected: self.is_connected(),
            count: self.store.len(),
        }
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            connection: self.connection.borrow().label(),
            stored: self.store.len(),
            counters: self.metrics.export(),
        }
    }

    fn is_connected(&self) -> bool {
        *self.connection.borrow() == ConnectionState::Connected
    }
}
