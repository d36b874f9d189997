//! Runtime configuration: sources, selection policy, and external endpoints.
//!
//! [`Settings`] is assembled once from the parsed [`Cli`] (flags and
//! environment variables) and then shared read-only. The source list is
//! either the built-in running-news set or a YAML file of
//! [`SourceDescriptor`]s.

use crate::cli::Cli;
use crate::error::{PipelineError, Result};
use crate::models::SourceDescriptor;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

/// Identifying user agent sent with every outbound request.
pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; RunningReportBot/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// The five running-news sites scraped when no sources file is given.
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new(
            "Running Magazine",
            "https://runningmagazine.ca/sections/news/",
            "h2 a, h3 a, .entry-title a",
        ),
        SourceDescriptor::new(
            "FloTrack",
            "https://www.flotrack.org",
            r#"a[href*="/articles/"], .content-card a, .story-card a, .article-card a, h2 a, h3 a"#,
        ),
        SourceDescriptor::new(
            "Running USA",
            "https://www.runningusa.org/RUSA/News/Latest_News/RUSA/News/LatestNews.aspx",
            "h2 a, h3 a, .news-title a, .headline a",
        ),
        SourceDescriptor::new(
            "The New York Times",
            "https://www.nytimes.com/topic/subject/running",
            r#"h3 a, .css-1kv6qi a, .story-wrapper h2 a, [data-testid="headline"] a"#,
        ),
        SourceDescriptor::new(
            "Runner's World",
            "https://www.runnersworld.com/news",
            "h3 a, .headline a, .listicle-slide-hed a",
        ),
    ]
}

/// Parse a YAML list of sources.
///
/// ```yaml
/// - name: FloTrack
///   url: https://www.flotrack.org
///   selector: h2 a, h3 a
/// ```
pub fn parse_sources(yaml: &str) -> Result<Vec<SourceDescriptor>> {
    let sources: Vec<SourceDescriptor> = serde_yaml::from_str(yaml)
        .map_err(|e| PipelineError::Configuration(format!("Invalid sources file: {e}")))?;
    if sources.is_empty() {
        return Err(PipelineError::Configuration(
            "Sources file lists no sources".to_string(),
        ));
    }
    Ok(sources)
}

/// Per-source extraction limits.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Candidates kept per source, in document order.
    pub max_per_source: usize,
    /// Anchors with shorter visible text are skipped.
    pub min_title_len: usize,
    /// Use a deterministic stock image when none is found on the page.
    pub image_fallback: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_per_source: 3,
            min_title_len: 10,
            image_fallback: false,
        }
    }
}

/// Filtering and selection rules applied by the aggregator.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    /// Sources whose candidates are considered first.
    pub priority_sources: Vec<String>,
    /// Case-insensitive title phrases that disqualify a candidate.
    pub blocked_phrases: Vec<String>,
    /// Link substrings that disqualify a candidate.
    pub blocked_link_fragments: Vec<String>,
    /// Number of articles to summarize per run.
    pub target_count: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            priority_sources: ["The New York Times", "Runner's World", "FloTrack", "Running USA"]
                .into_iter()
                .map(String::from)
                .collect(),
            blocked_phrases: [
                "air quality",
                "weather",
                "forecast",
                "subscribe",
                "newsletter",
                "follow us",
                "sign up",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_link_fragments: vec!["/newsletter".to_string(), "/subscribe".to_string()],
            target_count: 2,
        }
    }
}

/// Chat-completions oracle settings.
#[derive(Debug, Clone)]
pub struct OracleSettings {
    /// `None` when `OPENAI_API_KEY` is unset; runs fail before any network work.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub max_retries: usize,
}

/// Where the post store lives.
#[derive(Debug, Clone)]
pub enum StoreSettings {
    GitHub {
        token: String,
        owner: String,
        repo: String,
        path: String,
        api_base: String,
    },
    File(PathBuf),
    /// No durable store; merges fall back to the rebuild hook.
    Unavailable,
}

/// Everything a pipeline run or the server needs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sources: Vec<SourceDescriptor>,
    pub extract: ExtractOptions,
    pub selection: SelectionPolicy,
    pub oracle: OracleSettings,
    pub store: StoreSettings,
    pub store_cap: usize,
    pub store_retries: usize,
    pub summarize_concurrency: usize,
    pub skip_failed_summaries: bool,
    pub request_timeout: Duration,
    pub webhook_url: Option<String>,
    pub build_hook_url: Option<String>,
    pub site_url: Option<String>,
}

impl Settings {
    /// Build settings from CLI flags, reading the sources file if one is given.
    #[instrument(level = "info", skip_all)]
    pub async fn from_cli(cli: &Cli) -> Result<Self> {
        let sources = match &cli.sources_file {
            Some(path) => {
                let yaml = tokio::fs::read_to_string(path).await?;
                let sources = parse_sources(&yaml)?;
                info!(%path, count = sources.len(), "Loaded sources file");
                sources
            }
            None => default_sources(),
        };

        let store = match (&cli.github_token, &cli.store_file) {
            (Some(token), _) if !token.is_empty() => StoreSettings::GitHub {
                token: token.clone(),
                owner: cli.github_owner.clone(),
                repo: cli.github_repo.clone(),
                path: cli.github_store_path.clone(),
                api_base: cli.github_api_base.clone(),
            },
            (_, Some(path)) => StoreSettings::File(PathBuf::from(path)),
            _ => StoreSettings::Unavailable,
        };

        let mut selection = SelectionPolicy {
            target_count: cli.target_count.max(1),
            ..SelectionPolicy::default()
        };
        if !cli.priority_sources.is_empty() {
            selection.priority_sources = cli.priority_sources.clone();
        }

        Ok(Self {
            sources,
            extract: ExtractOptions {
                max_per_source: cli.max_per_source,
                min_title_len: cli.min_title_len,
                image_fallback: cli.image_fallback,
            },
            selection,
            oracle: OracleSettings {
                api_key: cli.openai_api_key.clone().filter(|k| !k.is_empty()),
                endpoint: cli.openai_base_url.clone(),
                model: cli.openai_model.clone(),
                max_retries: cli.oracle_retries,
            },
            store,
            store_cap: cli.store_cap,
            store_retries: cli.store_retries,
            summarize_concurrency: cli.summarize_concurrency.max(1),
            skip_failed_summaries: cli.skip_failed_summaries,
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
            webhook_url: cli.webhook_url.clone().filter(|u| !u.is_empty()),
            build_hook_url: cli.build_hook_url.clone().filter(|u| !u.is_empty()),
            site_url: cli.site_url.clone().filter(|u| !u.is_empty()),
        })
    }

    /// The oracle key, or the configuration error that ends the run.
    pub fn require_api_key(&self) -> Result<&str> {
        self.oracle
            .api_key
            .as_deref()
            .ok_or_else(|| PipelineError::Configuration("OpenAI API key not configured".to_string()))
    }

    /// Shared HTTP client with the bot user agent and per-request timeout.
    pub fn http_client(&self) -> Result<Client> {
        Ok(Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.request_timeout)
            .build()?)
    }
}
