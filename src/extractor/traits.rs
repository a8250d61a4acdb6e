use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Extractor errors
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The selector matched nothing; the caller may retry with a looser one
    #[error("requested format is not available: {0}")]
    FormatUnavailable(String),

    #[error("extractor exited with {code:?}: {message}")]
    Failed { code: Option<i32>, message: String },

    #[error("extractor binary not found: {0}")]
    NotFound(String),

    #[error("failed to start extractor: {0}")]
    Spawn(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("extractor produced no output")]
    EmptyOutput,
}

pub type Result<T> = std::result::Result<T, ExtractorError>;

/// The only metadata fields the gateway relies on
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    /// Seconds
    pub duration: f64,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_live: bool,
}

impl VideoMetadata {
    /// Parse probe output; `id` and `duration` must be present and non-null
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw.trim()).map_err(|e| ExtractorError::InvalidMetadata(e.to_string()))
    }
}

fn null_as_false<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// One extractor call: target, optional format selector and call-specific flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub target: String,
    pub selector: Option<String>,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// External video-resolution tool
///
/// Implementations never decide policy (duration caps, live streams); they
/// only run the tool and classify its failures.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Resolve to a directly playable stream URL
    async fn resolve(&self, invocation: Invocation) -> Result<String>;

    /// Resolve to the tool's JSON description, for clients that parse it themselves
    async fn resolve_json(&self, invocation: Invocation) -> Result<String>;

    /// Fetch the metadata of a single video
    async fn probe(&self, target: &str) -> Result<VideoMetadata>;

    /// Download into `output`
    async fn download(&self, invocation: Invocation, output: &Path) -> Result<()>;
}
