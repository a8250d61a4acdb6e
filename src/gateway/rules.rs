//! Fixed per-site URL rules applied by the gateway

const DMN_PREFIX: &str = "https://dmn.moe";
const MIGHTY_GYM_PREFIX: &str = "https://mightygymcdn.nyc3.cdn.digitaloceanspaces.com";
const ANIME_ILLUMINATION_PREFIX: &str = "https://anime.illumination.media";
const YT_ILLUMINATION_PREFIX: &str = "https://yt.illumination.media";
const ILLUMINATION_HOST: &str = ".illumination.media";
const IMVR_HOST: &str = ".imvrcdn.com";
const VIRTUAL_FILM_PREFIX: &str = "https://virtualfilm.institute/";

/// Escape quotes, trim, and apply site rewrites
pub fn normalize_request_url(raw: &str) -> String {
    let url = raw.replace('"', "%22").trim().to_string();
    if url.starts_with(DMN_PREFIX) {
        return url.replace("/sr/", "/yt/");
    }
    url
}

/// Returns the redirect target when `url` starts with any non-empty blocked prefix
pub fn apply_block_list<'a>(url: &str, blocked: &[String], redirect: &'a str) -> Option<&'a str> {
    blocked
        .iter()
        .filter(|prefix| !prefix.is_empty())
        .any(|prefix| url.starts_with(prefix.as_str()))
        .then_some(redirect)
}

/// Sources answered with an empty body before any resolution
pub fn is_pre_resolution_bypass(url: &str) -> bool {
    url.starts_with(MIGHTY_GYM_PREFIX)
}

/// Final impersonation flag plus whether the source is skipped entirely
pub fn impersonation_rule(url: &str, avpro: bool) -> (bool, bool) {
    if url.starts_with(ANIME_ILLUMINATION_PREFIX) {
        return (true, false);
    }
    let illumination = url.contains(ILLUMINATION_HOST) && !url.starts_with(YT_ILLUMINATION_PREFIX);
    if url.contains(IMVR_HOST) || illumination {
        return (avpro, true);
    }
    (avpro, url.starts_with(VIRTUAL_FILM_PREFIX))
}
