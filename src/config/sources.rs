use super::models::Config;
use config::{ConfigError, Environment, File};
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "VIDCACHE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/vidcache.toml";
const ENV_PREFIX: &str = "VIDCACHE";
const ENV_SEPARATOR: &str = "__";

/// Keys whose environment values are comma-separated lists
const LIST_KEYS: [&str; 2] = ["remote.urls", "gateway.blocked_urls"];

/// Resolve the config file from `VIDCACHE_CONFIG` (after `.env`) and load it
pub fn load() -> Result<Config, ConfigError> {
    // a missing .env is normal
    dotenvy::dotenv().ok();

    let config_path = std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Struct defaults, then `config_path` when present, then `VIDCACHE__SECTION__KEY`
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();
    if file_present(&config_path) {
        builder = builder.add_source(File::from(config_path).required(false));
    }

    let mut environment = Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .list_separator(",")
        .try_parsing(true);
    for key in LIST_KEYS {
        environment = environment.with_list_parse_key(key);
    }

    let mut config: Config = builder.add_source(environment).build()?.try_deserialize()?;
    config.normalize();
    Ok(config)
}

fn file_present(path: &Path) -> bool {
    if path.exists() {
        tracing::info!(path = %path.display(), "Loading configuration file");
        true
    } else {
        tracing::warn!(
            path = %path.display(),
            "Configuration file not found, using defaults and environment"
        );
        false
    }
}
