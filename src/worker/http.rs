//! HTTP client for direct (non-extractor) downloads

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected status {0}")]
    Status(StatusCode),

    #[error("Failed to write body: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
            user_agent: concat!("vidcache/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Streams a remote file to disk, following at most one redirect
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
}

impl FetchClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::RequestFailed(e.to_string()))?;

        Ok(Self { client })
    }

    /// GET `url` into `dest`, returning the number of bytes written
    pub async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.get(url).await?;

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| FetchError::InvalidUrl(format!("redirect from {url} has no location")))?;
            let target = Url::parse(url)
                .and_then(|base| base.join(location))
                .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

            debug!(url, redirect = %target, "Following redirect");
            response = self.get(target.as_str()).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(url, size = written, "Fetch completed");
        Ok(written)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client.get(url).send().await.map_err(map_reqwest)
    }
}

fn map_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_builder() {
        FetchError::InvalidUrl(e.to_string())
    } else {
        FetchError::RequestFailed(e.to_string())
    }
}
