//! Request gateway
//!
//! Turns one `getvideo` request into a plain-text answer: a peer's answer, a
//! cached artifact URL, a freshly resolved stream URL, or an empty body.
//! Misses that resolve successfully hand a [`Fingerprint`] back to the caller,
//! which schedules the background download after responding.

pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::extractor::{CookieJar, Extractor, Invocation, is_valid_cookies, selector};
use crate::fingerprint::{
    Classifier, ClassifyError, Family, Fingerprint, Format, cache_file_name, is_youtube_url,
};
use crate::observability::Metrics;
use crate::queue::DownloadQueue;
use crate::remote::RemoteProxy;

const DEFAULT_SOURCE: &str = "vrchat";
const METADATA_SOURCE: &str = "resonite";
const SEARCH_MARKER: &str = "results?";
const IMPERSONATION_FLOOR: u32 = 360;

/// Inbound `getvideo` parameters
#[derive(Debug, Clone, Default)]
pub struct VideoRequest {
    pub url: Option<String>,
    pub avpro: bool,
    pub source: Option<String>,
}

/// Plain-text answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    pub fn empty() -> Self {
        Self::ok(String::new())
    }

    pub fn with_status(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Reply plus the asset to re-check and queue once the reply is sent
#[derive(Debug, Clone)]
pub struct Outcome {
    pub reply: Reply,
    pub follow_up: Option<FollowUp>,
}

impl From<Reply> for Outcome {
    fn from(reply: Reply) -> Self {
        Self {
            reply,
            follow_up: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FollowUp {
    pub fingerprint: Fingerprint,
    /// Impersonation flag as finally used, decides the cache lookup order
    pub avpro: bool,
}

/// Gateway settings derived from configuration
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub public_url: String,
    pub blocked_urls: Vec<String>,
    pub block_redirect: String,
    pub fallback_to_local: bool,
    pub skip_local_cache: bool,
    pub max_resolution: u32,
    pub dub_language: Option<String>,
    pub resolve_delay: Duration,
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            public_url: config.server.public_url.clone(),
            blocked_urls: config.gateway.blocked_urls.clone(),
            block_redirect: config.gateway.block_redirect.clone(),
            fallback_to_local: config.remote.fallback_to_local,
            skip_local_cache: config.remote.enabled && config.remote.disable_local_cache,
            max_resolution: config.cache.max_resolution,
            dub_language: Some(config.ytdl.dub_language.trim().to_string()).filter(|lang| !lang.is_empty()),
            resolve_delay: Duration::from_secs(config.ytdl.delay_seconds),
        }
    }
}

pub struct Gateway {
    settings: GatewaySettings,
    classifier: Classifier,
    remote: RemoteProxy,
    cookies: CookieJar,
    store: Arc<CacheStore>,
    queue: Arc<DownloadQueue>,
    extractor: Arc<dyn Extractor>,
    metrics: Arc<Metrics>,
}

impl Gateway {
    pub fn new(
        config: &Config,
        store: Arc<CacheStore>,
        queue: Arc<DownloadQueue>,
        extractor: Arc<dyn Extractor>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ClassifyError> {
        Ok(Self {
            settings: GatewaySettings::from_config(config),
            classifier: Classifier::new()?,
            remote: RemoteProxy::from_config(&config.remote),
            cookies: CookieJar::new(&config.ytdl.cookies_path, config.ytdl.use_cookies),
            store,
            queue,
            extractor,
            metrics,
        })
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Run one `getvideo` request up to the reply
    pub async fn get_video(&self, request: VideoRequest) -> Outcome {
        let raw = request.url.as_deref().unwrap_or_default();
        let mut url = rules::normalize_request_url(raw);
        if url.is_empty() {
            warn!("No URL provided");
            return Reply::ok("No URL provided.").into();
        }
        let source = request
            .source
            .filter(|source| !source.is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let mut avpro = request.avpro;

        info!(url = %url, avpro, source = %source, "Video requested");

        if let Some(redirect) =
            rules::apply_block_list(&url, &self.settings.blocked_urls, &self.settings.block_redirect)
        {
            warn!(url = %url, redirect, "URL is blocked, substituting redirect target");
            url = redirect.to_string();
        }

        let fingerprint = match self.classifier.classify(&url, avpro).await {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                info!(url = %url, error = %e, "Failed to classify URL");
                return Reply::empty().into();
            }
        };

        if self.remote.delegates(fingerprint.family) {
            let response = self.remote.get_video(&url, avpro, &source).await;
            if response.success {
                self.metrics.remote_hit();
                info!(url = %url, "Responding with remote answer");
                return Reply::ok(response.body).into();
            }
            if !self.settings.fallback_to_local {
                return Reply::with_status(response.status, response.body).into();
            }
            debug!(url = %url, "Remote servers failed, falling back to local resolution");
        }

        if !self.settings.skip_local_cache {
            if let Some(file_name) = self.cached_file(&fingerprint.id, avpro) {
                self.metrics.cache_hit();
                if let Err(e) = self.store.touch(&file_name) {
                    warn!(file_name, error = %e, "Failed to refresh cache entry");
                }
                let artifact = format!("{}/{}", self.settings.public_url, file_name);
                info!(url = %artifact, "Responding with cached URL");
                return Reply::ok(artifact).into();
            }
            self.metrics.cache_miss();
        }

        if fingerprint.id.is_empty() {
            info!(url = %url, "No video id, bypassing");
            return Reply::empty().into();
        }

        if rules::is_pre_resolution_bypass(&url) {
            info!(url = %url, "Source is bypassed");
            return Reply::empty().into();
        }

        if source == METADATA_SOURCE {
            return self.resolve_json(&url).await.into();
        }

        if self.settings.max_resolution <= IMPERSONATION_FLOOR {
            avpro = false;
        }
        let (avpro, bypass) = rules::impersonation_rule(&url, avpro);
        if bypass {
            info!(url = %url, "Source is bypassed");
            return Reply::empty().into();
        }

        let body = match self.resolve(&fingerprint, avpro).await {
            Ok(resolved) => resolved,
            Err(message) => {
                error!(url = %url, error = %message, "Failed to resolve URL");
                if fingerprint.family == Family::YouTube {
                    return Reply::with_status(StatusCode::INTERNAL_SERVER_ERROR, message).into();
                }
                String::new()
            }
        };

        info!(url = %body, "Responding with resolved URL");
        Outcome {
            reply: Reply::ok(body),
            follow_up: (!self.settings.skip_local_cache).then_some(FollowUp { fingerprint, avpro }),
        }
    }

    /// Re-check the cache after replying and queue the download if still missing
    ///
    /// Returns `true` when a task was queued.
    pub fn queue_if_missing(&self, follow_up: FollowUp) -> bool {
        if self.cached_file(&follow_up.fingerprint.id, follow_up.avpro).is_some() {
            return false;
        }
        let queued = self.queue.enqueue(follow_up.fingerprint);
        if queued {
            self.metrics.download_queued();
        }
        queued
    }

    /// Accept a cookie upload, forwarding it to peers when delegation is on
    pub async fn receive_cookies(&self, cookies: &str) -> Reply {
        if !is_valid_cookies(cookies) {
            error!("Invalid cookies received, not saving");
            return Reply::with_status(StatusCode::BAD_REQUEST, "Invalid cookies.");
        }

        if self.remote.is_enabled() {
            let response = self.remote.send_cookies(cookies).await;
            if !response.success {
                warn!(status = %response.status, "Failed to forward cookies to remote server");
            }
            return Reply::with_status(response.status, response.body);
        }

        if let Err(e) = self.cookies.store(cookies).await {
            error!(error = %e, "Failed to store cookies");
            return Reply::with_status(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store cookies.");
        }
        if !self.cookies.is_enabled() {
            warn!("Cookies received but ytdl.use_cookies is off");
        }
        Reply::ok("Cookies received.")
    }

    /// `{id}.webm` then `{id}.mp4` when impersonating, else only `{id}.mp4`
    fn cached_file(&self, id: &str, avpro: bool) -> Option<String> {
        let preferred = if avpro { Format::Webm } else { Format::Mp4 };
        let mut candidates = vec![cache_file_name(id, preferred)];
        if avpro {
            candidates.push(cache_file_name(id, preferred.alternate()));
        }
        candidates.into_iter().find(|file_name| self.store.exists(file_name))
    }

    async fn resolve(&self, fingerprint: &Fingerprint, avpro: bool) -> Result<String, String> {
        if fingerprint.family == Family::YouTube && fingerprint.url.contains(SEARCH_MARKER) {
            return Err("URL is a search query, cannot get video URL.".to_string());
        }

        let selection = selector::resolve_selection(avpro, self.settings.dub_language.as_deref());
        let invocation = Invocation::new(&fingerprint.url)
            .selector(selection.selector)
            .args(selection.args);

        let resolved = self.extractor.resolve(invocation).await.map_err(|e| e.to_string())?;

        if fingerprint.family == Family::YouTube {
            self.delay().await;
        }
        Ok(resolved)
    }

    async fn resolve_json(&self, url: &str) -> Reply {
        let mut invocation = Invocation::new(url).args(selector::metadata_args());
        invocation.selector = selector::metadata_selector(self.settings.dub_language.as_deref());

        match self.extractor.resolve_json(invocation).await {
            Ok(json) => {
                if is_youtube_url(url) {
                    self.delay().await;
                }
                Reply::ok(json)
            }
            Err(e) => {
                error!(url, error = %e, "JSON resolution failed");
                Reply::empty()
            }
        }
    }

    async fn delay(&self) {
        if !self.settings.resolve_delay.is_zero() {
            info!(delay = ?self.settings.resolve_delay, "Delaying YouTube response");
            tokio::time::sleep(self.settings.resolve_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{MockCall, MockExtractor};
    use crate::humanize::ByteSize;
    use tempfile::TempDir;

    const WATCH_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    struct Harness {
        temp_dir: TempDir,
        gateway: Gateway,
        extractor: Arc<MockExtractor>,
        queue: Arc<DownloadQueue>,
    }

    fn harness(extractor: MockExtractor, configure: impl FnOnce(&mut Config)) -> Harness {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.cache.path = temp_dir.path().join("cache");
        config.ytdl.cookies_path = temp_dir.path().join("cookies.txt");
        configure(&mut config);

        let metrics = Arc::new(Metrics::new());
        let store = Arc::new(CacheStore::open(&config.cache.path, ByteSize(0), metrics.clone()).unwrap());
        let queue = Arc::new(DownloadQueue::new());
        let extractor = Arc::new(extractor);
        let gateway = Gateway::new(&config, store, queue.clone(), extractor.clone(), metrics).unwrap();

        Harness {
            temp_dir,
            gateway,
            extractor,
            queue,
        }
    }

    fn request(url: &str, avpro: bool) -> VideoRequest {
        VideoRequest {
            url: Some(url.to_string()),
            avpro,
            source: None,
        }
    }

    #[tokio::test]
    async fn test_missing_url_is_ok_with_message() {
        let h = harness(MockExtractor::new(), |_| {});
        let outcome = h.gateway.get_video(VideoRequest::default()).await;
        assert_eq!(outcome.reply, Reply::ok("No URL provided."));
    }

    #[tokio::test]
    async fn test_cache_hit_returns_artifact_url() {
        let h = harness(MockExtractor::new(), |config| {
            config.server.public_url = "http://cache.local:9696".to_string();
        });
        std::fs::write(h.temp_dir.path().join("cache/dQw4w9WgXcQ.mp4"), b"v").unwrap();

        // webm missing, falls back to mp4
        let outcome = h.gateway.get_video(request(WATCH_URL, true)).await;

        assert_eq!(outcome.reply, Reply::ok("http://cache.local:9696/dQw4w9WgXcQ.mp4"));
        assert!(outcome.follow_up.is_none());
        assert!(h.extractor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_miss_resolves_then_queues_once() {
        let h = harness(MockExtractor::new().with_resolved("https://rr1.googlevideo.com/v"), |_| {});

        let outcome = h.gateway.get_video(request(WATCH_URL, false)).await;
        assert_eq!(outcome.reply, Reply::ok("https://rr1.googlevideo.com/v"));

        let follow_up = outcome.follow_up.unwrap();
        assert_eq!(follow_up.fingerprint.file_name(), "dQw4w9WgXcQ.mp4");
        assert!(h.gateway.queue_if_missing(follow_up.clone()));
        assert!(!h.gateway.queue_if_missing(follow_up));
        assert_eq!(h.queue.len(), 1);
    }

    /// Serves `/video` as a dynamic redirect to `/files/8842.mp4`
    async fn redirect_endpoint() -> String {
        use axum::{Router, response::Redirect, routing::get};

        let app = Router::new()
            .route("/video", get(|| async { Redirect::temporary("/files/8842.mp4") }))
            .route("/files/{name}", get(|| async { "video-bytes" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/video")
    }

    #[tokio::test]
    async fn test_redirect_endpoint_resolves_then_hits_cache() {
        let prefix = redirect_endpoint().await;
        let h = harness(MockExtractor::new().with_resolved("https://cdn.example/8842.mp4"), |config| {
            config.server.public_url = "http://cache.local:9696".to_string();
        });
        let gateway = h
            .gateway
            .with_classifier(Classifier::with_redirect_prefix(prefix.clone()).unwrap());
        let url = format!("{prefix}?id=8842");

        let outcome = gateway.get_video(request(&url, true)).await;
        assert_eq!(outcome.reply, Reply::ok("https://cdn.example/8842.mp4"));
        let follow_up = outcome.follow_up.unwrap();
        assert_eq!(follow_up.fingerprint.family, Family::PyPyDance);
        assert_eq!(follow_up.fingerprint.file_name(), "8842.mp4");
        assert!(follow_up.fingerprint.url.ends_with("/files/8842.mp4"));

        std::fs::write(h.temp_dir.path().join("cache/8842.mp4"), b"v").unwrap();
        let outcome = gateway.get_video(request(&url, true)).await;
        assert_eq!(outcome.reply, Reply::ok("http://cache.local:9696/8842.mp4"));
        assert_eq!(h.extractor.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_blocked_url_is_substituted() {
        let h = harness(MockExtractor::new().with_resolved("https://cdn/redirected"), |config| {
            config.gateway.blocked_urls = vec!["https://blocked.example/".to_string()];
            config.gateway.block_redirect = "https://www.youtube.com/watch?v=byv2bKekeWQ".to_string();
        });

        h.gateway
            .get_video(request("https://blocked.example/video.mp4", false))
            .await;

        match h.extractor.calls().as_slice() {
            [MockCall::Resolve(invocation)] => {
                assert_eq!(invocation.target, "https://www.youtube.com/watch?v=byv2bKekeWQ");
            }
            calls => panic!("unexpected calls: {calls:?}"),
        }
    }

    #[tokio::test]
    async fn test_youtube_failure_is_500_other_is_empty() {
        let h = harness(MockExtractor::new(), |_| {});

        let youtube = h.gateway.get_video(request(WATCH_URL, false)).await;
        assert_eq!(youtube.reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(youtube.reply.body.contains("no scripted resolution"));
        assert!(youtube.follow_up.is_none());

        let other = h
            .gateway
            .get_video(request("https://files.example.org/clip.mp4", false))
            .await;
        assert_eq!(other.reply, Reply::empty());
        assert!(other.follow_up.is_some());
    }

    #[tokio::test]
    async fn test_search_url_fails_without_extractor() {
        let h = harness(MockExtractor::new().with_resolved("unused"), |_| {});
        let outcome = h
            .gateway
            .get_video(request("https://www.youtube.com/results?search_query=x&v=dQw4w9WgXcQ", false))
            .await;

        assert_eq!(outcome.reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(outcome.reply.body.contains("search query"));
        assert!(h.extractor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bypassed_sources_answer_empty() {
        let h = harness(MockExtractor::new().with_resolved("unused"), |_| {});

        for url in [
            "https://mightygymcdn.nyc3.cdn.digitaloceanspaces.com/a.mp4",
            "https://stream.imvrcdn.com/a.m3u8",
            "https://cdn.illumination.media/a.mp4",
            "https://virtualfilm.institute/film/1",
        ] {
            let outcome = h.gateway.get_video(request(url, false)).await;
            assert_eq!(outcome.reply, Reply::empty(), "{url}");
            assert!(outcome.follow_up.is_none());
        }
        assert!(h.extractor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_low_resolution_disables_impersonation() {
        let h = harness(MockExtractor::new().with_resolved("https://cdn/v"), |config| {
            config.cache.max_resolution = 360;
        });

        h.gateway.get_video(request(WATCH_URL, true)).await;

        match h.extractor.calls().as_slice() {
            [MockCall::Resolve(invocation)] => {
                assert!(invocation.args.is_empty());
                assert!(invocation.selector.as_deref().unwrap().contains("[protocol^=http]"));
            }
            calls => panic!("unexpected calls: {calls:?}"),
        }
    }

    #[tokio::test]
    async fn test_metadata_source_uses_json_resolution() {
        let h = harness(MockExtractor::new().with_json(r#"{"id":"x"}"#), |config| {
            config.ytdl.dub_language = "en".to_string();
        });

        let outcome = h
            .gateway
            .get_video(VideoRequest {
                url: Some(WATCH_URL.to_string()),
                avpro: false,
                source: Some("resonite".to_string()),
            })
            .await;

        assert_eq!(outcome.reply, Reply::ok(r#"{"id":"x"}"#));
        assert!(outcome.follow_up.is_none());
        match h.extractor.calls().as_slice() {
            [MockCall::ResolveJson(invocation)] => {
                assert_eq!(invocation.selector.as_deref(), Some("[language=en]"));
                assert!(invocation.args.contains(&"-J".to_string()));
            }
            calls => panic!("unexpected calls: {calls:?}"),
        }
    }

    #[tokio::test]
    async fn test_cookies_validated_and_stored() {
        let h = harness(MockExtractor::new(), |_| {});

        let rejected = h.gateway.receive_cookies("nothing useful").await;
        assert_eq!(rejected, Reply::with_status(StatusCode::BAD_REQUEST, "Invalid cookies."));

        let cookies = ".youtube.com\tTRUE\t/\tTRUE\t0\tLOGIN_INFO\tabc";
        let accepted = h.gateway.receive_cookies(cookies).await;
        assert_eq!(accepted, Reply::ok("Cookies received."));
        assert_eq!(
            std::fs::read_to_string(h.temp_dir.path().join("cookies.txt")).unwrap(),
            cookies
        );
    }

    #[tokio::test]
    async fn test_remote_failure_without_fallback_propagates() {
        let h = harness(MockExtractor::new().with_resolved("unused"), |config| {
            config.remote.enabled = true;
            config.remote.urls = vec!["http://127.0.0.1:9".to_string()];
            config.remote.fallback_to_local = false;
            config.remote.timeout_seconds = 1;
        });

        let outcome = h.gateway.get_video(request(WATCH_URL, false)).await;

        assert_eq!(outcome.reply.status, StatusCode::BAD_GATEWAY);
        assert_eq!(outcome.reply.body, "Remote server unavailable.");
        assert!(h.extractor.calls().is_empty());
    }
}
