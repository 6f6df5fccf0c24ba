//! Service composition
//!
//! Owns the shared store and metrics, wires the producers to them and
//! spawns one task per long-running loop. Nothing in the crate is global;
//! everything a task needs is moved into it from here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::connector::{ConnectionState, StreamConnector};
use crate::enrich::Enricher;
use crate::error::FeedError;
use crate::metrics::FeedMetrics;
use crate::poller::ReconciliationPoller;
use crate::query::QueryFacade;
use crate::store::RecencyStore;

const USER_AGENT: &str = concat!("token-feed/", env!("CARGO_PKG_VERSION"));

/// The ingestion core: store, producers and the read facade.
pub struct TokenFeedService {
    config: FeedConfig,
    store: Arc<RecencyStore>,
    metrics: Arc<FeedMetrics>,
    connector: Arc<StreamConnector>,
    poller: Option<ReconciliationPoller>,
}

impl TokenFeedService {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let store = Arc::new(RecencyStore::new(&config.store));
        let metrics = Arc::new(FeedMetrics::new());

        let enricher = Enricher::new(client.clone(), store.clone(), metrics.clone(), &config.images);
        let connector = Arc::new(
            StreamConnector::new(&config, store.clone(), metrics.clone()).with_enricher(enricher),
        );

        let poller = config
            .poller
            .enabled
            .then(|| ReconciliationPoller::new(&config, client, store.clone(), metrics.clone()));

        Ok(Self {
            config,
            store,
            metrics,
            connector,
            poller,
        })
    }

    pub fn store(&self) -> &Arc<RecencyStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        &self.metrics
    }

    pub fn connector(&self) -> &Arc<StreamConnector> {
        &self.connector
    }

    pub fn facade(&self) -> QueryFacade {
        QueryFacade::new(
            self.store.clone(),
            self.metrics.clone(),
            self.connector.subscribe_state(),
            self.config.store.window,
        )
    }

    /// Spawn the stream, poller and sweeper tasks.
    pub fn spawn(self) -> ServiceHandle {
        let facade = self.facade();
        let mut tasks = Vec::with_capacity(3);

        let connector = self.connector.clone();
        tasks.push(("stream", tokio::spawn(async move { connector.run().await })));

        if let Some(poller) = self.poller {
            tasks.push(("poller", tokio::spawn(async move { poller.run().await })));
        } else {
            info!("Reconciliation poller disabled");
        }

        let store = self.store.clone();
        let metrics = self.metrics.clone();
        let window = self.config.store.window;
        let every = self.config.store.sweep_interval;
        tasks.push((
            "sweeper",
            tokio::spawn(async move { run_sweeper(store, metrics, window, every).await }),
        ));

        info!(tasks = tasks.len(), "Token feed service started");

        ServiceHandle {
            tasks,
            facade,
            connector: self.connector,
        }
    }
}

/// Running service. Dropping the handle leaves the tasks running.
pub struct ServiceHandle {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    facade: QueryFacade,
    connector: Arc<StreamConnector>,
}

impl ServiceHandle {
    pub fn facade(&self) -> QueryFacade {
        self.facade.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connector.state()
    }

    /// Abort every task and wait for them to finish.
    pub async fn shutdown(self) {
        for (_, task) in &self.tasks {
            task.abort();
        }
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    debug!(task = name, error = %e, "Task ended abnormally");
                }
            }
        }
        info!("Token feed service stopped");
    }
}

/// Periodically drop entries older than `window`.
async fn run_sweeper(
    store: Arc<RecencyStore>,
    metrics: Arc<FeedMetrics>,
    window: Duration,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let removed = store.sweep(Utc::now(), window);
        metrics.record_expired(removed);
    }
}
