//! Data models for scraped candidates, summarized entries and the persisted store.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SourceDescriptor`]: a configured news site plus its selector rule
//! - [`CandidateArticle`]: a raw scraped article reference
//! - [`SummarizedEntry`]: the oracle's short write-up of one selected article
//! - [`PersistedEntry`]: a summarized entry with its position in the store
//!
//! The JSON shapes use camelCase field names to match what the static site
//! reads from `blog-posts.json`.

use serde::{Deserialize, Serialize};

/// A news website and the CSS selector rule used to find article links on it.
///
/// Defined at startup (built-in list or YAML file) and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceDescriptor {
    /// Display name; candidates reference their source by this value.
    pub name: String,
    /// Listing page to scrape.
    pub url: String,
    /// Comma-separated CSS selectors matching article anchors.
    pub selector: String,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            selector: selector.into(),
        }
    }
}

/// A raw article reference scraped from a source page.
///
/// Transient: created by the extractor, discarded after selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateArticle {
    /// Visible anchor text, trimmed and whitespace-collapsed.
    pub title: String,
    /// Absolute article URL.
    pub link: String,
    /// Name of the [`SourceDescriptor`] this came from.
    pub source: String,
    /// Illustrative image, if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A candidate that survived filtering, deduplication and selection.
pub type SelectedArticle = CandidateArticle;

/// The oracle's summary of one selected article.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizedEntry {
    pub title: String,
    /// Publication date, e.g. `"October 18, 2026"`.
    pub date: String,
    /// Short narrative body, two to five sentences.
    pub content: String,
    pub source: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A summarized entry as stored in `blog-posts.json`.
///
/// `id` is the 1-based position in the store, serialized as a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PersistedEntry {
    #[serde(flatten)]
    pub entry: SummarizedEntry,
    pub id: String,
}

/// How the ingestion endpoint got the entries onto the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PersistMethod {
    /// Durable optimistic-concurrency write through the store.
    #[serde(rename = "github-api")]
    GithubApi,
    /// No durable write; the site rebuild hook was asked to fire instead.
    #[serde(rename = "build-hook")]
    BuildHook,
}

/// Success body of the trigger endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub success: bool,
    pub articles: Vec<SummarizedEntry>,
    pub articles_found: usize,
    pub articles_processed: usize,
}

/// Body accepted by the ingestion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub articles: Option<Vec<SummarizedEntry>>,
}

/// Body returned by the ingestion endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    pub articles_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_articles: Option<usize>,
    pub method: PersistMethod,
    pub articles: Vec<PersistedEntry>,
}

/// Body accepted by the standalone article-creation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateArticleRequest {
    pub article: Option<SummarizedEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> SummarizedEntry {
        SummarizedEntry {
            title: "Kipchoge returns to Berlin".to_string(),
            date: "October 18, 2026".to_string(),
            content: "He is back. Fans are thrilled.".to_string(),
            source: "Runner's World".to_string(),
            link: "https://www.runnersworld.com/news/kipchoge".to_string(),
            image_url: None,
        }
    }

    #[test]
    fn test_persisted_entry_serializes_flat_with_string_id() {
        let persisted = PersistedEntry {
            entry: entry(),
            id: "1".to_string(),
        };
        let value = serde_json::to_value(&persisted).unwrap();
        assert_eq!(value["id"], "1");
        assert_eq!(value["title"], "Kipchoge returns to Berlin");
        assert!(value.get("entry").is_none());
        assert!(value.get("imageUrl").is_none());
    }

    #[test]
    fn test_persisted_entry_reads_store_without_image() {
        let json = r#"[{
            "title": "A",
            "date": "January 1, 2026",
            "content": "Body.",
            "source": "FloTrack",
            "link": "https://www.flotrack.org/articles/1",
            "id": "1"
        }]"#;
        let store: Vec<PersistedEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store[0].entry.source, "FloTrack");
        assert_eq!(store[0].entry.image_url, None);
    }

    #[test]
    fn test_summarized_entry_uses_camel_case_image() {
        let mut e = entry();
        e.image_url = Some("https://img.example.com/a.jpg".to_string());
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"imageUrl\""));
    }

    #[test]
    fn test_persist_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&PersistMethod::GithubApi).unwrap(),
            "\"github-api\""
        );
        assert_eq!(
            serde_json::to_string(&PersistMethod::BuildHook).unwrap(),
            "\"build-hook\""
        );
    }

    #[test]
    fn test_pipeline_report_field_names() {
        let report = PipelineReport {
            success: true,
            articles: vec![entry()],
            articles_found: 7,
            articles_processed: 1,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["articlesFound"], 7);
        assert_eq!(value["articlesProcessed"], 1);
    }
}
