//! Failover proxy to peer gateways
//!
//! Peers are tried in configuration order with a hard per-call timeout. The
//! first success wins; otherwise the last status failure is reported. Calls
//! never return an error: every outcome is a [`RemoteResponse`].

use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use tracing::{info, warn};
use url::Url;

use crate::config::RemoteConfig;
use crate::fingerprint::Family;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const UNAVAILABLE: &str = "Remote server unavailable.";

/// Outcome of a delegated call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub success: bool,
    pub status: StatusCode,
    pub body: String,
}

impl RemoteResponse {
    fn unavailable() -> Self {
        Self {
            success: false,
            status: StatusCode::BAD_GATEWAY,
            body: UNAVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteProxy {
    client: Client,
    peers: Vec<String>,
    enabled: bool,
    youtube_only: bool,
}

impl RemoteProxy {
    /// Enabled proxy over `peers` (base URLs, no trailing `/`)
    pub fn new(peers: Vec<String>, timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() { DEFAULT_TIMEOUT } else { timeout };
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vidcache/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build remote client, using defaults");
                Client::new()
            });

        Self {
            client,
            peers,
            enabled: true,
            youtube_only: false,
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        let mut proxy = Self::new(config.urls.clone(), Duration::from_secs(config.timeout_seconds));
        proxy.enabled = config.enabled;
        proxy.youtube_only = config.youtube_only;
        proxy
    }

    /// Delegation is on and at least one peer is configured
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.peers.is_empty()
    }

    /// Whether requests of `family` are delegated at all
    pub fn delegates(&self, family: Family) -> bool {
        self.is_enabled() && (!self.youtube_only || family == Family::YouTube)
    }

    /// Ask peers to resolve `url`
    pub async fn get_video(&self, url: &str, avpro: bool, source: &str) -> RemoteResponse {
        let mut last = RemoteResponse::unavailable();

        for peer in &self.peers {
            let endpoint = match Url::parse(&format!("{peer}/api/getvideo")) {
                Ok(mut endpoint) => {
                    endpoint
                        .query_pairs_mut()
                        .append_pair("url", url)
                        .append_pair("avpro", if avpro { "true" } else { "false" })
                        .append_pair("source", source);
                    endpoint
                }
                Err(e) => {
                    warn!(peer, error = %e, "Invalid remote server URL");
                    continue;
                }
            };

            match read_reply(peer, self.client.get(endpoint).send().await).await {
                Some(response) if response.success => {
                    info!(peer, "Remote server responded");
                    return response;
                }
                Some(response) => {
                    warn!(peer, status = %response.status, "Remote server error");
                    last = response;
                }
                None => {}
            }
        }

        last
    }

    /// Forward a cookie payload to peers
    pub async fn send_cookies(&self, cookies: &str) -> RemoteResponse {
        let mut last = RemoteResponse::unavailable();

        for peer in &self.peers {
            let result = self
                .client
                .post(format!("{peer}/api/youtube-cookies"))
                .header(header::CONTENT_TYPE, "text/plain")
                .body(cookies.to_string())
                .send()
                .await;

            match read_reply(peer, result).await {
                Some(response) if response.success => {
                    info!(peer, "Remote server accepted cookies");
                    return response;
                }
                Some(response) => {
                    warn!(peer, status = %response.status, "Remote server cookie error");
                    last = response;
                }
                None => {}
            }
        }

        last
    }
}

/// Status and full body of a peer reply; `None` for any transport failure,
/// including a body cut short after the headers
async fn read_reply(
    peer: &str,
    result: reqwest::Result<reqwest::Response>,
) -> Option<RemoteResponse> {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            warn!(peer, error = %e, "Remote server failed");
            return None;
        }
    };

    let status = response.status();
    match response.text().await {
        Ok(body) => Some(RemoteResponse {
            success: status.is_success(),
            status,
            body,
        }),
        Err(e) => {
            warn!(peer, %status, error = %e, "Remote server reply was cut short");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, extract::Query, routing::get, routing::post};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn slow_peer() -> String {
        serve(Router::new().route(
            "/api/getvideo",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }),
        ))
        .await
    }

    async fn failing_peer() -> String {
        serve(Router::new().route(
            "/api/getvideo",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        ))
        .await
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let hits = Arc::new(AtomicUsize::new(0));
        let a = slow_peer().await;
        let b = failing_peer().await;
        let c = serve(Router::new().route(
            "/api/getvideo",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                format!("resolved:{}:{}", params["url"], params["avpro"])
            }),
        ))
        .await;
        let d = {
            let hits = hits.clone();
            serve(Router::new().route(
                "/api/getvideo",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        "d"
                    }
                }),
            ))
            .await
        };

        let proxy = RemoteProxy::new(vec![a, b, c, d], Duration::from_millis(300));
        let response = proxy
            .get_video("https://youtu.be/dQw4w9WgXcQ?t=1&x=2", true, "vrchat")
            .await;

        assert!(response.success);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "resolved:https://youtu.be/dQw4w9WgXcQ?t=1&x=2:true");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_last_status_failure_is_reported() {
        let b = failing_peer().await;
        let a = slow_peer().await;

        let proxy = RemoteProxy::new(vec![b, a], Duration::from_millis(300));
        let response = proxy.get_video("https://youtu.be/x", false, "vrchat").await;

        assert!(!response.success);
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body, "busy");
    }

    #[tokio::test]
    async fn test_transport_failures_only_yield_unavailable() {
        let proxy = RemoteProxy::new(vec![slow_peer().await], Duration::from_millis(200));
        let response = proxy.get_video("https://youtu.be/x", false, "vrchat").await;
        assert_eq!(response, RemoteResponse::unavailable());
    }

    /// Advertises a longer body than it sends, then hangs up
    async fn truncating_peer() -> String {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 4096];
                let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut request).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nhttp:")
                    .await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_truncated_success_body_tries_next_peer() {
        let a = truncating_peer().await;
        let c = serve(Router::new().route("/api/getvideo", get(|| async { "from-c" }))).await;

        let proxy = RemoteProxy::new(vec![a, c], Duration::from_secs(5));
        let response = proxy.get_video("https://youtu.be/x", false, "vrchat").await;

        assert!(response.success);
        assert_eq!(response.body, "from-c");
    }

    #[tokio::test]
    async fn test_truncated_body_alone_is_unavailable() {
        let proxy = RemoteProxy::new(vec![truncating_peer().await], Duration::from_secs(5));
        let response = proxy.send_cookies("LOGIN_INFO youtube.com").await;
        assert_eq!(response, RemoteResponse::unavailable());
    }

    #[tokio::test]
    async fn test_send_cookies_forwards_body() {
        let peer = serve(Router::new().route(
            "/api/youtube-cookies",
            post(|body: String| async move { format!("got {} bytes", body.len()) }),
        ))
        .await;

        let proxy = RemoteProxy::new(vec![peer], Duration::from_secs(5));
        let response = proxy.send_cookies("LOGIN_INFO youtube.com").await;

        assert!(response.success);
        assert_eq!(response.body, "got 22 bytes");
    }

    #[test]
    fn test_delegation_rules() {
        let config = RemoteConfig {
            enabled: true,
            urls: vec!["http://peer:9696".to_string()],
            youtube_only: true,
            ..RemoteConfig::default()
        };
        let proxy = RemoteProxy::from_config(&config);
        assert!(proxy.delegates(Family::YouTube));
        assert!(!proxy.delegates(Family::VRDancing));

        let empty = RemoteProxy::from_config(&RemoteConfig {
            enabled: true,
            ..RemoteConfig::default()
        });
        assert!(!empty.is_enabled());
        assert!(!empty.delegates(Family::YouTube));
    }
}
