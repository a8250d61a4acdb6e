use std::sync::Arc;

use thiserror::Error;

use crate::cache::{CacheError, CacheStore};
use crate::config::Config;
use crate::extractor::Extractor;
use crate::fingerprint::ClassifyError;
use crate::gateway::Gateway;
use crate::observability::Metrics;
use crate::queue::DownloadQueue;
use crate::worker::{DownloadPolicy, Downloader, FetchClient, FetchError, HttpConfig};

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to open cache: {0}")]
    Cache(#[from] CacheError),
    #[error("failed to build classifier: {0}")]
    Classifier(#[from] ClassifyError),
    #[error("failed to build HTTP client: {0}")]
    Fetch(#[from] FetchError),
}

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub store: Arc<CacheStore>,
    pub queue: Arc<DownloadQueue>,
    pub downloader: Arc<Downloader>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Open the cache and wire the gateway and downloader around `extractor`
    pub fn new(config: Config, extractor: Arc<dyn Extractor>) -> Result<Self, InitError> {
        let metrics = Arc::new(Metrics::new());
        let store = Arc::new(CacheStore::open(
            &config.cache.path,
            config.cache.max_size,
            metrics.clone(),
        )?);
        let queue = Arc::new(DownloadQueue::new());

        let downloader = Arc::new(Downloader::new(
            store.clone(),
            extractor.clone(),
            FetchClient::new(HttpConfig::default())?,
            queue.clone(),
            metrics.clone(),
            DownloadPolicy::from_config(&config),
        ));
        let gateway = Arc::new(Gateway::new(
            &config,
            store.clone(),
            queue.clone(),
            extractor,
            metrics.clone(),
        )?);

        Ok(Self {
            gateway,
            store,
            queue,
            downloader,
            metrics,
        })
    }
}
