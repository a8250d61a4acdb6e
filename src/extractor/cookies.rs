use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

const DOMAIN_MARKER: &str = "youtube.com";
const SESSION_MARKER: &str = "LOGIN_INFO";

/// A Netscape cookie export is usable only when it carries a logged-in YouTube session
pub fn is_valid_cookies(cookies: &str) -> bool {
    cookies.contains(DOMAIN_MARKER) && cookies.contains(SESSION_MARKER)
}

/// Cookie file handed to the extractor
#[derive(Debug, Clone)]
pub struct CookieJar {
    path: PathBuf,
    enabled: bool,
}

impl CookieJar {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Path to pass with `--cookies`, if enabled and the stored file is valid
    pub async fn active_path(&self) -> Option<&Path> {
        if !self.enabled {
            return None;
        }
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if is_valid_cookies(&contents) => Some(&self.path),
            _ => None,
        }
    }

    /// Persist a validated payload, replacing the previous file
    pub async fn store(&self, cookies: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, cookies).await?;
        info!(path = %self.path.display(), "Stored YouTube cookies");
        Ok(())
    }

    /// Log once at start-up when cookies are expected but unusable
    pub async fn warn_if_missing(&self) {
        if self.enabled && self.active_path().await.is_none() {
            warn!(
                path = %self.path.display(),
                "No valid YouTube cookies found; upload them via POST /api/youtube-cookies"
            );
        }
    }
}
