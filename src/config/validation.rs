use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.public_url must not be empty")]
    MissingPublicUrl,

    #[error("Remote delegation is enabled but no peer URLs are configured")]
    NoRemotePeers,

    #[error("Invalid remote peer URL '{url}': {reason}")]
    InvalidRemoteUrl { url: String, reason: String },

    #[error("cache.max_resolution must be positive")]
    InvalidMaxResolution,

    #[error("gateway.block_redirect must be set when blocked_urls is non-empty")]
    MissingBlockRedirect,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_remote(config)?;
    validate_cache(config)?;
    validate_gateway(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.public_url.trim().is_empty() {
        return Err(ValidationError::MissingPublicUrl);
    }
    Ok(())
}

/// Peers must parse as absolute http(s) URLs
fn validate_remote(config: &Config) -> Result<(), ValidationError> {
    if !config.remote.enabled {
        return Ok(());
    }

    if config.remote.urls.iter().all(|url| url.trim().is_empty()) {
        return Err(ValidationError::NoRemotePeers);
    }

    for raw in &config.remote.urls {
        let parsed = url::Url::parse(raw).map_err(|e| ValidationError::InvalidRemoteUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ValidationError::InvalidRemoteUrl {
                url: raw.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
    }

    Ok(())
}

fn validate_cache(config: &Config) -> Result<(), ValidationError> {
    if config.cache.max_resolution == 0 {
        return Err(ValidationError::InvalidMaxResolution);
    }
    Ok(())
}

fn validate_gateway(config: &Config) -> Result<(), ValidationError> {
    if !config.gateway.blocked_urls.is_empty() && config.gateway.block_redirect.trim().is_empty() {
        return Err(ValidationError::MissingBlockRedirect);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_missing_public_url() {
        let mut config = Config::default();
        config.server.public_url = "  ".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingPublicUrl)
        ));
    }

    #[test]
    fn test_remote_enabled_without_peers() {
        let mut config = Config::default();
        config.remote.enabled = true;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::NoRemotePeers)
        ));
    }

    #[test]
    fn test_remote_peer_scheme() {
        let mut config = Config::default();
        config.remote.enabled = true;
        config.remote.urls = vec!["ftp://peer:21".to_string()];

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidRemoteUrl { .. })
        ));
    }

    #[test]
    fn test_disabled_remote_ignores_urls() {
        let mut config = Config::default();
        config.remote.urls = vec!["not a url".to_string()];

        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_resolution() {
        let mut config = Config::default();
        config.cache.max_resolution = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidMaxResolution)
        ));
    }

    #[test]
    fn test_block_redirect_required() {
        let mut config = Config::default();
        config.gateway.blocked_urls = vec!["https://blocked.example".to_string()];
        config.gateway.block_redirect = String::new();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingBlockRedirect)
        ));
    }
}
