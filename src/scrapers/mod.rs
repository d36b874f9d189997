//! Source page scraping: candidate extraction and image lookup.
//!
//! Every configured source is a listing page plus a CSS selector rule (see
//! [`crate::config::default_sources`]). Scraping is a single phase:
//!
//! 1. **Extraction** ([`extractor`]): fetch the listing page and turn matching
//!    anchors into [`CandidateArticle`](crate::models::CandidateArticle)s
//! 2. **Image lookup** ([`images`]): for each kept anchor, look around it in the
//!    same page for an illustrative image
//!
//! # Supported Sources
//!
//! | Source | Page | Notes |
//! |--------|------|-------|
//! | Running Magazine | `runningmagazine.ca/sections/news/` | WordPress `.entry-title` headings |
//! | FloTrack | `flotrack.org` | `/articles/` links and card layouts |
//! | Running USA | `runningusa.org` latest news | plain headings |
//! | The New York Times | running topic page | `data-testid="headline"` |
//! | Runner's World | `runnersworld.com/news` | listicle headings |
//!
//! Fetch failures are soft: a source that cannot be scraped contributes no
//! candidates and the run continues.

pub mod extractor;
pub mod images;

use url::Url;

/// Turn an `href`/`src` found on `source_url` into an absolute URL.
///
/// Root-relative paths resolve against the source origin, protocol-relative
/// URLs get `https:`, and scheme-less paths are appended to the source URL.
/// Empty input, fragment-only links and non-web schemes (`mailto:`,
/// `javascript:`, ...) yield `None`.
pub fn absolutize(raw: &str, source_url: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    if let Ok(parsed) = Url::parse(raw) {
        return matches!(parsed.scheme(), "http" | "https").then(|| raw.to_string());
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if raw.starts_with('/') {
        let origin = Url::parse(source_url).ok()?.origin().ascii_serialization();
        return Some(format!("{origin}{raw}"));
    }
    Some(format!("{}/{}", source_url.trim_end_matches('/'), raw))
}
