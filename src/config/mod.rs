//! Gateway configuration
//!
//! Values are layered, later layers winning: struct defaults, the TOML file
//! (`config/vidcache.toml` or `$VIDCACHE_CONFIG`), then `VIDCACHE__SECTION__KEY`
//! variables from the process environment or a `.env` file. List keys take
//! comma-separated values.
//!
//! ```no_run
//! use vidcache::config::Config;
//!
//! # fn main() -> Result<(), vidcache::config::ConfigError> {
//! let config = Config::load()?;
//! println!("serving {} at {}", config.cache.path.display(), config.server.public_url);
//! # Ok(())
//! # }
//! ```
//!
//! ```text
//! VIDCACHE__CACHE__MAX_SIZE=20GB
//! VIDCACHE__REMOTE__URLS=http://peer-a:9696,http://peer-b:9696
//! ```

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{CacheConfig, Config, GatewayConfig, RemoteConfig, ServerConfig, YtdlConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load, normalise and validate from the default file location
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Same as [`Config::load`] with an explicit file
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[cache]
max_size = "512MB"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.cache.max_size.as_u64(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_validation_catches_empty_peer_list() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[remote]
enabled = true
urls = ["", "   "]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::NoRemotePeers)
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:9696"
public_url = "http://localhost:9696"

[cache]
path = "CachedAssets"
max_size = "50GB"
evict_interval_minutes = 10
evict_unused_minutes = 10080
cache_youtube = true
cache_pypydance = true
cache_vrdancing = true
max_resolution = 1080
max_length_minutes = 60

[ytdl]
path = "/usr/local/bin/yt-dlp"
use_cookies = true
cookies_path = "youtube_cookies.txt"
additional_args = "--force-ipv4"
dub_language = "en"
delay_seconds = 2
po_token_url = "http://127.0.0.1:4416/"

[remote]
enabled = true
urls = ["http://peer-a:9696", "http://peer-b:9696"]
timeout_seconds = 10
youtube_only = false
fallback_to_local = false
disable_local_cache = true

[gateway]
blocked_urls = ["https://blocked.example/"]
block_redirect = "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.cache.max_resolution, 1080);
        assert_eq!(config.cache.max_length_minutes, 60);
        assert_eq!(config.ytdl.dub_language, "en");
        assert_eq!(config.ytdl.po_token_url, "http://127.0.0.1:4416");
        assert_eq!(config.remote.urls.len(), 2);
        assert!(!config.remote.fallback_to_local);
        assert!(config.remote.disable_local_cache);
        assert_eq!(config.gateway.blocked_urls.len(), 1);
    }
}
