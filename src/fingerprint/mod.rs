//! URL classification
//!
//! Every play request is reduced to a [`Fingerprint`]: a stable id, the
//! [`Family`] of the hosting service and the container [`Format`] the cache
//! stores it under. The cache file name is always `{id}.{extension}`.

mod classifier;

pub use classifier::{Classifier, ClassifyError, PYPY_REDIRECT_PREFIX, is_youtube_url};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::fmt;

/// Canonical length of a YouTube video id
pub const YOUTUBE_ID_LEN: usize = 11;

/// Hosting-service bucket a URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    YouTube,
    /// Dynamic redirect endpoint, id taken from the redirect target
    PyPyDance,
    /// CDN hosts, id is the URL hash
    VRDancing,
    Other,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YouTube => write!(f, "youtube"),
            Self::PyPyDance => write!(f, "pypydance"),
            Self::VRDancing => write!(f, "vrdancing"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Container format of a cached asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Mp4,
    Webm,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }

    /// The other container, used for the cache lookup retry
    pub fn alternate(&self) -> Self {
        match self {
            Self::Mp4 => Self::Webm,
            Self::Webm => Self::Mp4,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Derived key for one play request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub id: String,
    pub family: Family,
    pub format: Format,
    /// URL the asset is fetched from (the redirect target for PyPyDance)
    pub url: String,
}

impl Fingerprint {
    pub fn file_name(&self) -> String {
        cache_file_name(&self.id, self.format)
    }

    /// Queue identity: two fingerprints with the same id and format are one download
    pub fn same_asset(&self, other: &Fingerprint) -> bool {
        self.id == other.id && self.format == other.format
    }
}

pub fn cache_file_name(id: &str, format: Format) -> String {
    format!("{}.{}", id, format.extension())
}

/// SHA-256 of the URL, base64 with `/`, `+` and `=` removed
pub fn hash_url(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    STANDARD
        .encode(digest)
        .chars()
        .filter(|c| !matches!(c, '/' | '+' | '='))
        .collect()
}
