use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tracing::debug;

use super::{
    models::{GetVideoParams, HealthResponse},
    state::AppState,
    utils::{parse_flag, plain_text, validate_body_size},
};
use crate::api::error::ApiError;
use crate::gateway::VideoRequest;

/// Netscape cookie exports stay well below this
const MAX_COOKIE_PAYLOAD: usize = 1024 * 1024;

/// Resolve a video URL (GET /api/getvideo)
///
/// Answers with the URL the player should load: a peer's answer, a cached
/// artifact under this server, a resolved stream URL, or an empty body.
/// After the answer is built, a miss is re-checked and queued for download
/// on a detached task.
pub async fn get_video(
    State(state): State<AppState>,
    Query(params): Query<GetVideoParams>,
) -> Response {
    let request = VideoRequest {
        url: params.url,
        avpro: parse_flag(params.avpro.as_deref()),
        source: params.source,
    };

    let outcome = state.gateway.get_video(request).await;

    if let Some(follow_up) = outcome.follow_up {
        let gateway = state.gateway.clone();
        tokio::spawn(async move {
            if gateway.queue_if_missing(follow_up) {
                debug!("Background download scheduled");
            }
        });
    }

    plain_text(outcome.reply)
}

/// Receive browser-exported cookies (POST /api/youtube-cookies)
pub async fn youtube_cookies(
    State(state): State<AppState>,
    body: axum::body::Body,
) -> Result<Response, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes();
    validate_body_size(&data, MAX_COOKIE_PAYLOAD)?;

    let cookies = String::from_utf8(data.to_vec())
        .map_err(|_| ApiError::InvalidPayload("cookies must be UTF-8 text".to_string()))?;

    Ok(plain_text(state.gateway.receive_cookies(&cookies).await))
}

/// Health check endpoint (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_entries: state.store.len(),
        cache_bytes: state.store.total_size(),
        queue_depth: state.queue.len(),
        metrics: state.metrics.snapshot(),
    })
}
