//! Multi-source aggregation and article selection.
//!
//! All sources are scraped concurrently, then the flattened candidate list
//! goes through a fixed, order-preserving sequence:
//!
//! 1. partition into priority-source and other candidates
//! 2. drop blocked titles (weather, newsletter prompts, ...) and denylisted links
//! 3. concatenate priority-then-other
//! 4. deduplicate by normalized title or exact link, keeping the first
//! 5. pick one article per source until the target count, then fill
//! 6. if the filtered pool is too small, take the first deduplicated raw candidates instead
//!
//! Fan-in preserves source order, so the outcome never depends on which
//! fetch finished first.

use crate::config::{ExtractOptions, SelectionPolicy};
use crate::error::{PipelineError, Result};
use crate::models::{CandidateArticle, SelectedArticle, SourceDescriptor};
use crate::scrapers::extractor::extract;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use reqwest::Client;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Result of one aggregation run.
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Candidates found across all sources before filtering.
    pub found: usize,
    pub selected: Vec<SelectedArticle>,
}

/// Scrape every source concurrently and select the articles to summarize.
///
/// # Errors
///
/// [`PipelineError::NoCandidates`] when no source produced a single candidate.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn aggregate(
    client: &Client,
    sources: &[SourceDescriptor],
    opts: &ExtractOptions,
    policy: &SelectionPolicy,
) -> Result<Aggregation> {
    let fetches: Vec<_> = sources.iter().map(|source| extract(client, source, opts)).collect();
    let per_source: Vec<Vec<CandidateArticle>> = stream::iter(fetches)
        .buffered(sources.len().max(1))
        .collect()
        .await;

    let candidates: Vec<CandidateArticle> = per_source
        .into_iter()
        .flatten()
        .filter(|c| !c.title.is_empty() && !c.link.is_empty())
        .collect();

    if candidates.is_empty() {
        return Err(PipelineError::NoCandidates);
    }
    info!(count = candidates.len(), "Total candidates found");

    let selected = select(&candidates, policy);
    info!(
        count = selected.len(),
        titles = %selected.iter().map(|a| a.title.as_str()).join(" | "),
        "Selected articles for summarization"
    );

    Ok(Aggregation {
        found: candidates.len(),
        selected,
    })
}

/// Normalized form used for title deduplication.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// True when the candidate's title or link is on the policy's block-lists.
pub fn is_blocked(candidate: &CandidateArticle, policy: &SelectionPolicy) -> bool {
    let title = candidate.title.to_lowercase();
    policy
        .blocked_phrases
        .iter()
        .any(|phrase| title.contains(&phrase.to_lowercase()))
        || policy
            .blocked_link_fragments
            .iter()
            .any(|fragment| candidate.link.contains(fragment.as_str()))
}

/// Keep the first occurrence of each normalized title and each link.
pub fn dedupe(candidates: Vec<CandidateArticle>) -> Vec<CandidateArticle> {
    let mut titles = HashSet::new();
    let mut links = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            let title = normalize_title(&c.title);
            if titles.contains(&title) || links.contains(&c.link) {
                debug!(title = %c.title, link = %c.link, "Dropping duplicate candidate");
                return false;
            }
            titles.insert(title);
            links.insert(c.link.clone());
            true
        })
        .collect()
}

/// One article per source first, then fill from the pool in order.
pub fn pick_diverse(pool: &[CandidateArticle], target: usize) -> Vec<SelectedArticle> {
    let mut picked: Vec<SelectedArticle> = Vec::with_capacity(target);
    let mut seen_sources = HashSet::new();

    for candidate in pool {
        if picked.len() >= target {
            break;
        }
        if seen_sources.insert(candidate.source.as_str()) {
            picked.push(candidate.clone());
        }
    }

    for candidate in pool {
        if picked.len() >= target {
            break;
        }
        if !picked.iter().any(|p| p.link == candidate.link) {
            picked.push(candidate.clone());
        }
    }

    picked
}

/// Apply the full filter/dedupe/diversity/fallback sequence to raw candidates.
pub fn select(candidates: &[CandidateArticle], policy: &SelectionPolicy) -> Vec<SelectedArticle> {
    let target = policy.target_count;
    let (priority, other): (Vec<_>, Vec<_>) = candidates
        .iter()
        .cloned()
        .partition(|c| policy.priority_sources.iter().any(|p| p == &c.source));

    let pool: Vec<CandidateArticle> = priority
        .into_iter()
        .filter(|c| !is_blocked(c, policy))
        .chain(other.into_iter().filter(|c| !is_blocked(c, policy)))
        .collect();
    let pool = dedupe(pool);

    if pool.len() < target {
        warn!(
            pool = pool.len(),
            target_count = target,
            "Too few candidates survived filtering; falling back to raw candidates"
        );
        return dedupe(candidates.to_vec()).into_iter().take(target).collect();
    }

    pick_diverse(&pool, target)
}
