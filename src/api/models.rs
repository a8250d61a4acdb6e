//! Request and response shapes of the HTTP API
//!
//! `GET /api/getvideo` and `POST /api/youtube-cookies` speak plain text; only
//! `GET /health` returns JSON.

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;

/// Query string of `GET /api/getvideo`
#[derive(Debug, Default, Deserialize)]
pub struct GetVideoParams {
    pub url: Option<String>,
    /// `true` (any case) asks for the impersonating/WebM path
    pub avpro: Option<String>,
    /// Client flavour, `vrchat` when absent
    pub source: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cache_entries: usize,
    pub cache_bytes: u64,
    pub queue_depth: usize,
    pub metrics: MetricsSnapshot,
}
