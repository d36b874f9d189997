//! Candidate extraction from a source's listing page.
//!
//! Fetches the page, applies the source's selector rule, and turns each
//! matching anchor into a [`CandidateArticle`]. Anchors whose visible text is
//! shorter than the minimum title length, or that have no `href`, are skipped.
//! Output keeps document order and is capped per source.
//!
//! Extraction never fails: network errors, non-2xx responses and unusable
//! pages all log and produce an empty list.

use crate::config::ExtractOptions;
use crate::document::{HtmlPage, PageDocument, PageElement};
use crate::error::{PipelineError, Result};
use crate::models::{CandidateArticle, SourceDescriptor};
use crate::scrapers::absolutize;
use crate::scrapers::images::image_for;
use crate::utils::collapse_whitespace;
use reqwest::Client;
use tracing::{debug, error, info, instrument};

/// Scrape one source. Failures are logged and yield no candidates.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
pub async fn extract(
    client: &Client,
    source: &SourceDescriptor,
    opts: &ExtractOptions,
) -> Vec<CandidateArticle> {
    match fetch_page(client, source).await {
        Ok(body) => {
            let candidates = extract_from_html(&body, source, opts);
            info!(count = candidates.len(), url = %source.url, "Extracted candidates");
            debug!(titles = ?candidates.iter().map(|c| &c.title).collect::<Vec<_>>(), "Candidate titles");
            candidates
        }
        Err(e) => {
            error!(error = %e, url = %source.url, "Source fetch failed; contributing no candidates");
            Vec::new()
        }
    }
}

async fn fetch_page(client: &Client, source: &SourceDescriptor) -> Result<String> {
    let response = client.get(&source.url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Fetch {
            source_name: source.name.clone(),
            reason: format!("HTTP {status}"),
        });
    }
    Ok(response.text().await?)
}

/// Parse `body` and extract candidates from it.
pub fn extract_from_html(
    body: &str,
    source: &SourceDescriptor,
    opts: &ExtractOptions,
) -> Vec<CandidateArticle> {
    let page = HtmlPage::parse(body);
    extract_from_page(&page, source, opts)
}

/// Extract candidates from an already parsed page.
pub fn extract_from_page<D: PageDocument>(
    page: &D,
    source: &SourceDescriptor,
    opts: &ExtractOptions,
) -> Vec<CandidateArticle> {
    page.find(&source.selector)
        .into_iter()
        .filter_map(|anchor| {
            let title = collapse_whitespace(&anchor.text());
            if title.chars().count() < opts.min_title_len {
                return None;
            }
            let link = absolutize(&anchor.attr("href")?, &source.url)?;
            let image_url = image_for(&anchor, page, &source.url, &title, opts.image_fallback);
            Some(CandidateArticle {
                title,
                link,
                source: source.name.clone(),
                image_url,
            })
        })
        .take(opts.max_per_source)
        .collect()
}
