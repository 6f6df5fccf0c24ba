//! Best-effort image enrichment
//!
//! Stream events carry a metadata URI rather than an image. For each such
//! event a detached task fetches the metadata document under a hard
//! deadline and, if it names an image, submits `StoreCommand::PatchImage`.
//! Nothing here can delay or fail ingestion of the base entry: all errors
//! are logged at `debug` and dropped.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;
use types::ids::TokenId;

use crate::config::ImageConfig;
use crate::error::FeedError;
use crate::metrics::FeedMetrics;
use crate::normalize::resolve_uri;
use crate::store::{RecencyStore, StoreCommand, StoreOutcome};

/// Spawns metadata fetches and patches resolved images into the store.
#[derive(Clone)]
pub struct Enricher {
    client: reqwest::Client,
    store: Arc<RecencyStore>,
    metrics: Arc<FeedMetrics>,
    gateway: String,
    timeout: Duration,
}

impl Enricher {
    pub fn new(
        client: reqwest::Client,
        store: Arc<RecencyStore>,
        metrics: Arc<FeedMetrics>,
        images: &ImageConfig,
    ) -> Self {
        Self {
            client,
            store,
            metrics,
            gateway: images.ipfs_gateway.clone(),
            timeout: images.enrich_timeout,
        }
    }

    /// Fire-and-forget enrichment for the entry upserted as `generation`.
    pub fn spawn(&self, id: TokenId, generation: u64, metadata_url: String) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let patched = match this.enrich(&id, generation, &metadata_url).await {
                Ok(patched) => patched,
                Err(e) => {
                    debug!(token = %id, url = %metadata_url, error = %e, "Enrichment failed");
                    false
                }
            };
            this.metrics.record_enrichment(patched);
        })
    }

    /// Fetch the metadata and patch the image if the same entry is still stored.
    ///
    /// Returns whether the store was patched.
    pub async fn enrich(
        &self,
        id: &TokenId,
        generation: u64,
        metadata_url: &str,
    ) -> Result<bool, FeedError> {
        let image = tokio::time::timeout(self.timeout, self.fetch_image(metadata_url))
            .await
            .map_err(|_| FeedError::Timeout(self.timeout))??;

        let Some(image_ref) = image else {
            debug!(token = %id, "Metadata has no image");
            return Ok(false);
        };

        // Lock is taken only here, after the fetch has completed.
        let outcome = self.store.apply(StoreCommand::PatchImage {
            id: id.clone(),
            generation,
            image_ref,
        });
        Ok(outcome == StoreOutcome::Patched)
    }

    /// Fetch a metadata document and extract its resolved `image` field.
    pub async fn fetch_image(&self, metadata_url: &str) -> Result<Option<String>, FeedError> {
        let response = self.client.get(metadata_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: metadata_url.to_string(),
            });
        }

        let body = response.bytes().await?;
        let metadata: Value = serde_json::from_slice(&body)?;

        Ok(extract_image(&metadata, &self.gateway))
    }
}

/// Resolved `image` field of a metadata document.
pub fn extract_image(metadata: &Value, gateway: &str) -> Option<String> {
    metadata
        .get("image")
        .and_then(Value::as_str)
        .and_then(|raw| resolve_uri(raw, gateway))
}
