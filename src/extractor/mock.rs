use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{Extractor, ExtractorError, Invocation, Result, VideoMetadata};

/// Scripted outcome of one `download` call
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    /// Write these bytes to the output path
    Write(Vec<u8>),
    FormatUnavailable,
    Fail(String),
}

/// What the mock was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Resolve(Invocation),
    ResolveJson(Invocation),
    Probe(String),
    Download(Invocation),
}

/// In-process extractor for tests; no child processes are spawned
#[derive(Debug, Default)]
pub struct MockExtractor {
    resolved: Mutex<Option<String>>,
    json: Mutex<Option<String>>,
    metadata: Mutex<Option<VideoMetadata>>,
    downloads: Mutex<VecDeque<DownloadOutcome>>,
    download_delay: Mutex<Duration>,
    calls: Mutex<Vec<MockCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `resolve` succeeds with this URL; unset means it fails
    pub fn with_resolved(self, url: impl Into<String>) -> Self {
        *self.resolved.lock() = Some(url.into());
        self
    }

    pub fn with_json(self, json: impl Into<String>) -> Self {
        *self.json.lock() = Some(json.into());
        self
    }

    pub fn with_metadata(self, id: &str, duration: f64, is_live: bool) -> Self {
        *self.metadata.lock() = Some(VideoMetadata {
            id: id.to_string(),
            duration,
            is_live,
        });
        self
    }

    /// Queue outcomes for successive downloads; once drained, downloads write `b"video"`
    pub fn with_downloads(self, outcomes: impl IntoIterator<Item = DownloadOutcome>) -> Self {
        self.downloads.lock().extend(outcomes);
        self
    }

    pub fn with_download_delay(self, delay: Duration) -> Self {
        *self.download_delay.lock() = delay;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn download_calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MockCall::Download(invocation) => Some(invocation.clone()),
                _ => None,
            })
            .collect()
    }

    /// Highest number of downloads observed running at once
    pub fn max_concurrent_downloads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }
}

fn unscripted(what: &str) -> ExtractorError {
    ExtractorError::Failed {
        code: Some(1),
        message: format!("ERROR: no scripted {what}"),
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn resolve(&self, invocation: Invocation) -> Result<String> {
        self.record(MockCall::Resolve(invocation));
        self.resolved.lock().clone().ok_or_else(|| unscripted("resolution"))
    }

    async fn resolve_json(&self, invocation: Invocation) -> Result<String> {
        self.record(MockCall::ResolveJson(invocation));
        self.json.lock().clone().ok_or_else(|| unscripted("json"))
    }

    async fn probe(&self, target: &str) -> Result<VideoMetadata> {
        self.record(MockCall::Probe(target.to_string()));
        self.metadata.lock().clone().ok_or_else(|| unscripted("metadata"))
    }

    async fn download(&self, invocation: Invocation, output: &Path) -> Result<()> {
        self.record(MockCall::Download(invocation));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.download_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .downloads
            .lock()
            .pop_front()
            .unwrap_or_else(|| DownloadOutcome::Write(b"video".to_vec()));

        let result = match outcome {
            DownloadOutcome::Write(bytes) => tokio::fs::write(output, bytes)
                .await
                .map_err(|e| ExtractorError::Failed {
                    code: None,
                    message: e.to_string(),
                }),
            DownloadOutcome::FormatUnavailable => Err(ExtractorError::FormatUnavailable(
                "ERROR: Requested format is not available".to_string(),
            )),
            DownloadOutcome::Fail(message) => Err(ExtractorError::Failed {
                code: Some(1),
                message,
            }),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
