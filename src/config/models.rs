use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ytdl: YtdlConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Base URL clients use to fetch cached artifacts (`{public_url}/{file}`)
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_url: default_public_url(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9696))
}

fn default_public_url() -> String {
    "http://localhost:9696".to_string()
}

/// Cache store and download policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// Capacity limit; 0 disables capacity eviction
    #[serde(default)]
    pub max_size: ByteSize,
    /// Idle sweep period; 0 disables idle eviction
    #[serde(default)]
    pub evict_interval_minutes: u64,
    /// Idle threshold; 0 disables idle eviction
    #[serde(default)]
    pub evict_unused_minutes: u64,
    #[serde(default = "default_true")]
    pub cache_youtube: bool,
    #[serde(default)]
    pub cache_pypydance: bool,
    #[serde(default)]
    pub cache_vrdancing: bool,
    #[serde(default = "default_max_resolution")]
    pub max_resolution: u32,
    #[serde(default = "default_max_length_minutes")]
    pub max_length_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            max_size: ByteSize::default(),
            evict_interval_minutes: 0,
            evict_unused_minutes: 0,
            cache_youtube: true,
            cache_pypydance: false,
            cache_vrdancing: false,
            max_resolution: default_max_resolution(),
            max_length_minutes: default_max_length_minutes(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("data/CachedAssets")
}

fn default_true() -> bool {
    true
}

fn default_max_resolution() -> u32 {
    2160
}

fn default_max_length_minutes() -> u64 {
    120
}

/// yt-dlp invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YtdlConfig {
    #[serde(default = "default_ytdl_path")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub use_cookies: bool,
    #[serde(default = "default_cookies_path")]
    pub cookies_path: PathBuf,
    #[serde(default)]
    pub additional_args: String,
    #[serde(default)]
    pub dub_language: String,
    /// Extra wait before answering a YouTube resolution
    #[serde(default)]
    pub delay_seconds: u64,
    #[serde(default)]
    pub po_token_url: String,
}

impl Default for YtdlConfig {
    fn default() -> Self {
        Self {
            path: default_ytdl_path(),
            use_cookies: true,
            cookies_path: default_cookies_path(),
            additional_args: String::new(),
            dub_language: String::new(),
            delay_seconds: 0,
            po_token_url: String::new(),
        }
    }
}

fn default_ytdl_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_cookies_path() -> PathBuf {
    PathBuf::from("data/youtube_cookies.txt")
}

/// Remote peer delegation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Peer base URLs, tried in order
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default = "default_remote_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub youtube_only: bool,
    #[serde(default = "default_true")]
    pub fallback_to_local: bool,
    #[serde(default)]
    pub disable_local_cache: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            urls: Vec::new(),
            timeout_seconds: default_remote_timeout_seconds(),
            youtube_only: false,
            fallback_to_local: true,
            disable_local_cache: false,
        }
    }
}

fn default_remote_timeout_seconds() -> u64 {
    15
}

/// Inbound URL filtering
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub blocked_urls: Vec<String>,
    #[serde(default = "default_block_redirect")]
    pub block_redirect: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            blocked_urls: Vec::new(),
            block_redirect: default_block_redirect(),
        }
    }
}

fn default_block_redirect() -> String {
    "https://www.youtube.com/watch?v=byv2bKekeWQ".to_string()
}

impl Config {
    /// Trim trailing slashes and drop blank peer URLs
    pub fn normalize(&mut self) {
        self.server.public_url = self.server.public_url.trim().trim_end_matches('/').to_string();
        self.ytdl.po_token_url = self.ytdl.po_token_url.trim().trim_end_matches('/').to_string();
        self.remote.urls = self
            .remote
            .urls
            .iter()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .collect();
    }
}
