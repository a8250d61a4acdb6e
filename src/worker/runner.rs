//! Download orchestrator: the background worker plus the on-demand YouTube download

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::http::{FetchClient, FetchError};
use crate::cache::{CacheError, CacheStore, TEMP_FILE_PREFIX};
use crate::config::Config;
use crate::extractor::{Extractor, ExtractorError, Invocation, selector};
use crate::fingerprint::{Family, Fingerprint, Format};
use crate::observability::Metrics;
use crate::queue::DownloadQueue;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Policy rejection (live stream, over-long video)
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("download finished without producing a file")]
    MissingOutput,
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// Knobs the orchestrator reads from configuration
#[derive(Debug, Clone)]
pub struct DownloadPolicy {
    pub cache_youtube: bool,
    pub cache_pypydance: bool,
    pub cache_vrdancing: bool,
    pub max_resolution: u32,
    /// Zero disables the length check
    pub max_length: Duration,
    pub dub_language: Option<String>,
}

impl DownloadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_youtube: config.cache.cache_youtube,
            cache_pypydance: config.cache.cache_pypydance,
            cache_vrdancing: config.cache.cache_vrdancing,
            max_resolution: config.cache.max_resolution,
            max_length: Duration::from_secs(config.cache.max_length_minutes * 60),
            dub_language: Some(config.ytdl.dub_language.trim().to_string()).filter(|lang| !lang.is_empty()),
        }
    }

    fn caches(&self, family: Family) -> bool {
        match family {
            Family::YouTube => self.cache_youtube,
            Family::PyPyDance => self.cache_pypydance,
            Family::VRDancing => self.cache_vrdancing,
            Family::Other => false,
        }
    }
}

/// Serializes every physical download behind one lock and one pair of temp files
pub struct Downloader {
    store: Arc<CacheStore>,
    extractor: Arc<dyn Extractor>,
    fetch: FetchClient,
    queue: Arc<DownloadQueue>,
    metrics: Arc<Metrics>,
    policy: DownloadPolicy,
    lock: Mutex<()>,
}

impl Downloader {
    pub fn new(
        store: Arc<CacheStore>,
        extractor: Arc<dyn Extractor>,
        fetch: FetchClient,
        queue: Arc<DownloadQueue>,
        metrics: Arc<Metrics>,
        policy: DownloadPolicy,
    ) -> Self {
        Self {
            store,
            extractor,
            fetch,
            queue,
            metrics,
            policy,
            lock: Mutex::new(()),
        }
    }

    fn temp_path(&self, format: Format) -> PathBuf {
        self.store
            .path_for(&format!("{TEMP_FILE_PREFIX}.{}", format.extension()))
    }

    async fn clear_temp_files(&self) {
        for format in [Format::Mp4, Format::Webm] {
            let path = self.temp_path(format);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => warn!(path = %path.display(), "Removed stray temp file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
            }
        }
    }

    /// Download a YouTube video now and return its cache file name
    ///
    /// Idempotent: an existing cache file is returned as-is. Also used by
    /// the worker for queued YouTube tasks.
    pub async fn download_youtube_now(&self, fingerprint: &Fingerprint) -> Result<String> {
        let _guard = self.lock.lock().await;

        let file_name = fingerprint.file_name();
        if self.store.exists(&file_name) {
            self.store.track(&file_name)?;
            info!(file_name, "YouTube video already cached");
            return Ok(file_name);
        }

        self.clear_temp_files().await;

        let metadata = self.extractor.probe(&fingerprint.url).await?;
        if metadata.is_live {
            return Err(DownloadError::Rejected(format!(
                "{} is a live stream",
                fingerprint.url
            )));
        }
        if !self.policy.max_length.is_zero() && metadata.duration > self.policy.max_length.as_secs_f64() {
            return Err(DownloadError::Rejected(format!(
                "video is {:.0}s long, limit is {} minutes",
                metadata.duration,
                self.policy.max_length.as_secs() / 60
            )));
        }

        let plan = selector::download_plan(
            fingerprint.format,
            self.policy.max_resolution,
            self.policy.dub_language.as_deref(),
        );
        let output = self.temp_path(fingerprint.format);

        info!(url = %fingerprint.url, id = %metadata.id, format = %fingerprint.format, "Downloading YouTube video");

        let primary = Invocation::new(&metadata.id)
            .selector(plan.primary.selector)
            .args(plan.primary.args);
        match self.extractor.download(primary, &output).await {
            Ok(()) => {}
            Err(ExtractorError::FormatUnavailable(_)) => {
                warn!(id = %metadata.id, "Requested format not available, retrying with fallback");
                let fallback = Invocation::new(&metadata.id)
                    .selector(plan.fallback.selector)
                    .args(plan.fallback.args);
                self.extractor.download(fallback, &output).await?;
            }
            Err(e) => return Err(e.into()),
        }

        self.commit(&file_name, fingerprint.format).await
    }

    /// Plain GET download for the CDN and redirect families
    pub async fn download_direct(&self, fingerprint: &Fingerprint) -> Result<String> {
        let _guard = self.lock.lock().await;

        let file_name = fingerprint.file_name();
        if self.store.exists(&file_name) {
            self.store.track(&file_name)?;
            return Ok(file_name);
        }

        self.clear_temp_files().await;

        info!(url = %fingerprint.url, "Downloading video");
        let output = self.temp_path(fingerprint.format);
        if let Err(e) = self.fetch.fetch_to_file(&fingerprint.url, &output).await {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(e.into());
        }

        self.commit(&file_name, fingerprint.format).await
    }

    /// Move the produced temp file into place and register it
    ///
    /// A file that appeared at the final path in the meantime wins; the new
    /// output is discarded.
    async fn commit(&self, file_name: &str, format: Format) -> Result<String> {
        let final_path = self.store.path_for(file_name);

        if tokio::fs::try_exists(&final_path).await? {
            warn!(file_name, "File already exists, discarding new download");
            self.clear_temp_files().await;
            return Ok(file_name.to_string());
        }

        let mut produced = None;
        for candidate in [self.temp_path(format), self.temp_path(format.alternate())] {
            if tokio::fs::try_exists(&candidate).await? {
                produced = Some(candidate);
                break;
            }
        }
        let produced = produced.ok_or(DownloadError::MissingOutput)?;

        tokio::fs::rename(&produced, &final_path).await?;
        self.store.track(file_name)?;
        info!(file_name, "Video downloaded");
        Ok(file_name.to_string())
    }

    /// Process one queued task according to its family and the cache flags
    pub async fn process(&self, fingerprint: &Fingerprint) {
        if !self.policy.caches(fingerprint.family) {
            debug!(id = %fingerprint.id, family = %fingerprint.family, "Caching disabled for family, skipping");
            return;
        }

        let result = match fingerprint.family {
            Family::YouTube => self.download_youtube_now(fingerprint).await,
            Family::PyPyDance | Family::VRDancing => self.download_direct(fingerprint).await,
            Family::Other => return,
        };

        match result {
            Ok(file_name) => {
                self.metrics.download_completed();
                debug!(file_name, "Queued download finished");
            }
            Err(e) => {
                self.metrics.download_failed();
                error!(id = %fingerprint.id, url = %fingerprint.url, error = %e, "Queued download failed");
            }
        }
    }

    /// Worker loop: wait for a head, process it, then drop it unconditionally
    pub async fn run(self: Arc<Self>) {
        info!("Download worker started");
        loop {
            let head = self.queue.next().await;
            self.process(&head).await;
            self.queue.pop_front();
        }
    }
}
