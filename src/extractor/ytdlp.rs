use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::cookies::CookieJar;
use super::traits::{Extractor, ExtractorError, Invocation, Result, VideoMetadata};
use crate::config::YtdlConfig;

const FORMAT_UNAVAILABLE: &str = "requested format is not available";
const SIGN_IN_REQUIRED: &str = "Sign in to confirm";
const PO_TOKEN_ARG: &str = "youtubepot-bgutilhttp:base_url=";

/// yt-dlp driven through a child process per call
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    cookies: CookieJar,
    additional_args: Vec<String>,
    po_token_url: Option<String>,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>, cookies: CookieJar) -> Self {
        Self {
            binary: binary.into(),
            cookies,
            additional_args: Vec::new(),
            po_token_url: None,
        }
    }

    pub fn from_config(config: &YtdlConfig) -> Self {
        let mut ytdlp = Self::new(
            &config.path,
            CookieJar::new(&config.cookies_path, config.use_cookies),
        );
        ytdlp.additional_args = config
            .additional_args
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        ytdlp.po_token_url = Some(config.po_token_url.clone()).filter(|url| !url.is_empty());
        ytdlp
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Flags appended to every call: PO token provider, cookies, operator extras
    fn trailing_args(&self, cookies: Option<&Path>) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(url) = &self.po_token_url {
            let already_set = self.additional_args.iter().any(|arg| arg.contains(PO_TOKEN_ARG));
            if !already_set {
                args.push("--extractor-args".to_string());
                args.push(format!("{PO_TOKEN_ARG}{url}"));
            }
        }

        if let Some(path) = cookies {
            args.push("--cookies".to_string());
            args.push(path.display().to_string());
        }

        args.extend(self.additional_args.iter().cloned());
        args
    }

    async fn finish_args(&self, mut args: Vec<String>, target: &str) -> Vec<String> {
        let cookies = self.cookies.active_path().await;
        args.extend(self.trailing_args(cookies));
        args.push("--".to_string());
        args.push(target.to_string());
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<String> {
        debug!(binary = %self.binary.display(), ?args, "Running extractor");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ExtractorError::NotFound(self.binary.display().to_string()),
                _ => ExtractorError::Spawn(e.to_string()),
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(output.status.code(), &stderr))
    }
}

fn base_args() -> Vec<String> {
    ["--encoding", "utf-8", "--no-playlist"]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
}

/// Map a non-zero exit to an error, singling out the retryable format miss
fn classify_failure(code: Option<i32>, stderr: &str) -> ExtractorError {
    let message = stderr.trim().to_string();

    if message.to_lowercase().contains(FORMAT_UNAVAILABLE) {
        return ExtractorError::FormatUnavailable(message);
    }

    if message.contains(SIGN_IN_REQUIRED) {
        warn!("YouTube requires sign-in; upload fresh cookies via POST /api/youtube-cookies or configure a PO token provider");
    }

    ExtractorError::Failed {
        code,
        message: if message.is_empty() {
            "no diagnostic output".to_string()
        } else {
            message
        },
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn resolve(&self, invocation: Invocation) -> Result<String> {
        let mut args = base_args();
        args.push("--no-warnings".to_string());
        if let Some(selector) = &invocation.selector {
            args.push("-f".to_string());
            args.push(selector.clone());
        }
        args.extend(invocation.args);
        args.push("--get-url".to_string());

        let args = self.finish_args(args, &invocation.target).await;
        let output = self.run(args).await?;

        output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned)
            .ok_or(ExtractorError::EmptyOutput)
    }

    async fn resolve_json(&self, invocation: Invocation) -> Result<String> {
        let mut args = base_args();
        args.push("--no-warnings".to_string());
        args.extend(invocation.args);
        if let Some(selector) = &invocation.selector {
            args.push("-f".to_string());
            args.push(selector.clone());
        }

        let args = self.finish_args(args, &invocation.target).await;
        let output = self.run(args).await?;
        if output.is_empty() {
            return Err(ExtractorError::EmptyOutput);
        }
        Ok(output)
    }

    async fn probe(&self, target: &str) -> Result<VideoMetadata> {
        let mut args = base_args();
        args.push("--no-warnings".to_string());
        args.push("-j".to_string());

        let args = self.finish_args(args, target).await;
        let output = self.run(args).await?;
        VideoMetadata::from_json(&output)
    }

    async fn download(&self, invocation: Invocation, output: &Path) -> Result<()> {
        let mut args = base_args();
        args.extend(["-q".to_string(), "-o".to_string(), output.display().to_string()]);
        if let Some(selector) = &invocation.selector {
            args.push("-f".to_string());
            args.push(selector.clone());
        }
        args.extend(["--no-mtime".to_string(), "--no-progress".to_string()]);
        args.extend(invocation.args);

        let args = self.finish_args(args, &invocation.target).await;
        self.run(args).await.map(|_| ())
    }
}
