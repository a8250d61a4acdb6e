use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use super::{Family, Fingerprint, Format, YOUTUBE_ID_LEN, hash_url};

/// Dynamic redirect endpoint; the real asset name is only known after a HEAD
pub const PYPY_REDIRECT_PREFIX: &str = "http://api.pypy.dance/video";

const VRDANCING_PREFIXES: &[&str] = &[
    "https://na2.vrdancing.club",
    "https://eu2.vrdancing.club",
    "https://na2-lq.vrdancing.club",
];

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

const YOUTUBE_SHORTS_PREFIXES: &[&str] = &[
    "https://www.youtube.com/shorts/",
    "https://youtube.com/shorts/",
];

static YOUTUBE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube\.com/(?:[^/\n\s]+/\S+/|(?:v|e(?:mbed)?)/|live/|\S*?[?&]v=)|youtu\.be/)([a-zA-Z0-9_-]{11})",
    )
    .expect("YouTube id pattern is a valid regex")
});

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("no video id found in URL: {0}")]
    NoVideoId(String),

    #[error("failed to resolve redirect for {url}: {reason}")]
    Redirect { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, ClassifyError>;

/// Maps raw request URLs to fingerprints; rules are tried in order, first match wins
#[derive(Debug, Clone)]
pub struct Classifier {
    client: Client,
    redirect_prefix: String,
}

impl Classifier {
    pub fn new() -> Result<Self> {
        Self::with_redirect_prefix(PYPY_REDIRECT_PREFIX)
    }

    /// Use a different dynamic-redirect endpoint (local test servers)
    pub fn with_redirect_prefix(prefix: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vidcache/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ClassifyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            redirect_prefix: prefix.into(),
        })
    }

    /// Classify `url`; `avpro` selects WebM for the YouTube family
    pub async fn classify(&self, url: &str, avpro: bool) -> Result<Fingerprint> {
        let url = url.trim();

        if url.starts_with(&self.redirect_prefix) {
            return self.classify_redirect(url).await;
        }

        if VRDANCING_PREFIXES.iter().any(|prefix| url.starts_with(prefix)) {
            return Ok(Fingerprint {
                id: hash_url(url),
                family: Family::VRDancing,
                format: Format::Mp4,
                url: url.to_string(),
            });
        }

        if is_youtube_url(url) {
            let id = extract_youtube_id(url).ok_or_else(|| {
                error!(url, "Failed to parse video id from YouTube URL");
                ClassifyError::NoVideoId(url.to_string())
            })?;

            return Ok(Fingerprint {
                id,
                family: Family::YouTube,
                format: if avpro { Format::Webm } else { Format::Mp4 },
                url: url.to_string(),
            });
        }

        Ok(Fingerprint {
            id: hash_url(url),
            family: Family::Other,
            format: Format::Mp4,
            url: url.to_string(),
        })
    }

    /// HEAD the endpoint, follow redirects, and take the final file stem as id
    async fn classify_redirect(&self, url: &str) -> Result<Fingerprint> {
        let redirect_error = |reason: String| ClassifyError::Redirect {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| redirect_error(e.to_string()))?;

        let final_url = response.url().clone();
        let file_name = final_url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        let id = file_name.split('.').next().unwrap_or_default();

        if id.is_empty() {
            return Err(redirect_error(format!(
                "redirect target has no file name (status {})",
                response.status()
            )));
        }

        debug!(url, resolved = %final_url, id, "Resolved dynamic redirect");

        Ok(Fingerprint {
            id: id.to_string(),
            family: Family::PyPyDance,
            format: Format::Mp4,
            url: final_url.to_string(),
        })
    }
}

/// Host check against the closed YouTube host set; unparsable URLs never match
pub fn is_youtube_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| YOUTUBE_HOSTS.contains(&host)))
        .unwrap_or(false)
}

fn extract_youtube_id(url: &str) -> Option<String> {
    let raw = if let Some(captures) = YOUTUBE_ID_REGEX.captures(url) {
        captures.get(1)?.as_str().to_string()
    } else if YOUTUBE_SHORTS_PREFIXES.iter().any(|prefix| url.starts_with(prefix)) {
        let parsed = Url::parse(url).ok()?;
        parsed.path_segments()?.next_back()?.to_string()
    } else {
        return None;
    };

    if raw.is_empty() {
        return None;
    }

    Some(raw.chars().take(YOUTUBE_ID_LEN).collect())
}
