//! Download worker
//!
//! A single background task drains the [`DownloadQueue`](crate::queue::DownloadQueue)
//! through the [`Downloader`], which also serves on-demand YouTube downloads
//! for the gateway. All physical downloads share one lock.

pub mod http;
pub mod runner;

pub use http::{FetchClient, FetchError, HttpConfig};
pub use runner::{DownloadError, DownloadPolicy, Downloader};
