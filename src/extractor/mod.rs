//! External video extractor
//!
//! The gateway talks to yt-dlp only through the [`Extractor`] trait. The
//! process-backed [`YtDlp`] is used in production; [`MockExtractor`] scripts
//! outcomes for tests.

pub mod cookies;
pub mod mock;
pub mod selector;
pub mod traits;
pub mod ytdlp;

pub use cookies::{CookieJar, is_valid_cookies};
pub use mock::{DownloadOutcome, MockCall, MockExtractor};
pub use selector::{DownloadPlan, Selection};
pub use traits::{Extractor, ExtractorError, Invocation, Result, VideoMetadata};
pub use ytdlp::YtDlp;
