//! Format selector construction
//!
//! Selectors are plain yt-dlp format expressions. Each download plan pairs a
//! strict primary selector with a looser fallback that is only tried when the
//! primary matches no format.

use crate::fingerprint::Format;

const RESOLVE_BASE: &str = "(mp4/best)[height<=?1080][height>=?64][width>=?64]";
const RESOLVE_PLAIN: &str =
    "(mp4/best)[vcodec!=av01][vcodec!=vp9.2][height<=?1080][height>=?64][width>=?64][protocol^=http]";
const IMPERSONATE_ARGS: &[&str] = &[
    "--impersonate=safari",
    "--extractor-args=youtube:player_client=web",
];

/// Selector plus the flags that must travel with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub selector: String,
    pub args: Vec<String>,
}

impl Selection {
    fn new(selector: impl Into<String>, args: &[&str]) -> Self {
        Self {
            selector: selector.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

/// Primary and fallback selection for one download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub primary: Selection,
    pub fallback: Selection,
}

/// Selection for a plain URL resolution
///
/// Impersonating clients get any progressive mp4 (optionally preferring the
/// dub language); the rest are kept on plain HTTP, non-AV1 streams.
pub fn resolve_selection(impersonate: bool, dub_language: Option<&str>) -> Selection {
    if !impersonate {
        return Selection::new(RESOLVE_PLAIN, &[]);
    }

    let selector = match language(dub_language) {
        Some(lang) => format!("{RESOLVE_BASE}[language={lang}]/{RESOLVE_BASE}"),
        None => RESOLVE_BASE.to_string(),
    };
    Selection::new(selector, IMPERSONATE_ARGS)
}

/// Optional language filter for the JSON-dump resolution
pub fn metadata_selector(dub_language: Option<&str>) -> Option<String> {
    language(dub_language).map(|lang| format!("[language={lang}]"))
}

/// Flags for the JSON-dump resolution
pub fn metadata_args() -> Vec<String> {
    ["--flat-playlist", "-i", "-J", "-s"]
        .iter()
        .chain(IMPERSONATE_ARGS)
        .map(|arg| arg.to_string())
        .collect()
}

/// Download selectors for the requested container
pub fn download_plan(format: Format, max_resolution: u32, dub_language: Option<&str>) -> DownloadPlan {
    let lang = language(dub_language);

    match format {
        Format::Webm => {
            let audio = match lang {
                Some(lang) => format!(
                    "+(ba[acodec=opus][ext=webm][language={lang}]/ba[acodec=opus][ext=webm])"
                ),
                None => "+ba[acodec=opus][ext=webm]".to_string(),
            };
            let primary = format!(
                "bv*[height<={max_resolution}][vcodec~='^av01'][ext=mp4][dynamic_range='SDR']{audio}/\
                 bv*[height<={max_resolution}][vcodec~='vp9'][ext=webm][dynamic_range='SDR']{audio}"
            );

            DownloadPlan {
                primary: Selection::new(primary, &[]),
                fallback: Selection::new(
                    "bestvideo[ext=webm]+bestaudio[ext=webm]/best[ext=webm]/best",
                    &["--merge-output-format", "webm"],
                ),
            }
        }
        Format::Mp4 => {
            let audio = match lang {
                Some(lang) => format!("+(ba[ext=m4a][language={lang}]/ba[ext=m4a])"),
                None => "+ba[ext=m4a]".to_string(),
            };
            let primary = format!(
                "bv*[height<=1080][vcodec~='^(avc|h264)']{audio}/\
                 bv*[height<=1080][vcodec~='^av01'][dynamic_range='SDR']"
            );

            DownloadPlan {
                primary: Selection::new(primary, &["--remux-video", "mp4"]),
                fallback: Selection::new(
                    "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
                    &["--merge-output-format", "mp4"],
                ),
            }
        }
    }
}

fn language(dub_language: Option<&str>) -> Option<&str> {
    dub_language.map(str::trim).filter(|lang| !lang.is_empty())
}
