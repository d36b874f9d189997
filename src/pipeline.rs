//! One end-to-end run: scrape, select, summarize, notify, persist.
//!
//! [`Pipeline`] owns every collaborator a run needs. They are built once from
//! [`Settings`] in production and injected directly in tests.

use crate::aggregator::aggregate;
use crate::api::{OpenAiOracle, Oracle, RetryAsk};
use crate::config::{Settings, StoreSettings};
use crate::error::Result;
use crate::models::PipelineReport;
use crate::notify::{BuildHookNotifier, Notifier, NotifyEvent, WebhookNotifier};
use crate::store::{ContentStore, FileStore, GitHubStore, StoreMerger};
use crate::summarizer::summarize_all;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct Pipeline {
    settings: Settings,
    client: Client,
    oracle: Arc<dyn Oracle>,
    webhook: Option<Arc<dyn Notifier>>,
    merger: StoreMerger,
}

/// The configured store backend, if any.
pub fn build_store(settings: &Settings, client: &Client) -> Option<Arc<dyn ContentStore>> {
    match &settings.store {
        StoreSettings::GitHub {
            token,
            owner,
            repo,
            path,
            api_base,
        } => Some(Arc::new(GitHubStore::new(
            client.clone(),
            api_base.clone(),
            owner.clone(),
            repo.clone(),
            path.clone(),
            token.clone(),
        ))),
        StoreSettings::File(path) => Some(Arc::new(FileStore::new(path.clone()))),
        StoreSettings::Unavailable => None,
    }
}

impl Pipeline {
    /// Wire up the production collaborators.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let client = settings.http_client()?;

        let oracle: Arc<dyn Oracle> = Arc::new(RetryAsk::new(
            OpenAiOracle::new(
                client.clone(),
                settings.oracle.endpoint.clone(),
                settings.oracle.api_key.clone().unwrap_or_default(),
                settings.oracle.model.clone(),
            ),
            settings.oracle.max_retries,
            Duration::from_millis(500),
        ));

        let webhook = settings.webhook_url.as_ref().map(|url| {
            Arc::new(WebhookNotifier::new(client.clone(), url.clone(), settings.site_url.clone()))
                as Arc<dyn Notifier>
        });
        let rebuild = settings
            .build_hook_url
            .as_ref()
            .map(|url| Arc::new(BuildHookNotifier::new(client.clone(), url.clone())) as Arc<dyn Notifier>);

        let merger = StoreMerger::new(
            build_store(&settings, &client),
            rebuild,
            settings.store_cap,
            settings.store_retries,
        );

        if !merger.has_store() {
            warn!("No store configured; runs will only fire the build hook");
        }

        Ok(Self::new(settings, client, oracle, webhook, merger))
    }

    pub fn new(
        settings: Settings,
        client: Client,
        oracle: Arc<dyn Oracle>,
        webhook: Option<Arc<dyn Notifier>>,
        merger: StoreMerger,
    ) -> Self {
        Self {
            settings,
            client,
            oracle,
            webhook,
            merger,
        }
    }

    pub fn merger(&self) -> &StoreMerger {
        &self.merger
    }

    /// Run the whole batch once.
    ///
    /// # Errors
    ///
    /// - [`crate::error::PipelineError::Configuration`] when no oracle key is set, before any request
    /// - [`crate::error::PipelineError::NoCandidates`] when every source came back empty
    /// - [`crate::error::PipelineError::Summarization`] when a summary fails and failures are not skipped
    ///
    /// Notification and persistence problems are logged and never fail the run.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&self) -> Result<PipelineReport> {
        self.settings.require_api_key()?;

        let aggregation = aggregate(
            &self.client,
            &self.settings.sources,
            &self.settings.extract,
            &self.settings.selection,
        )
        .await?;

        let entries = summarize_all(
            self.oracle.as_ref(),
            &aggregation.selected,
            self.settings.summarize_concurrency,
            self.settings.skip_failed_summaries,
        )
        .await?;

        if let Some(webhook) = &self.webhook {
            let events: Vec<NotifyEvent> = entries.iter().cloned().map(NotifyEvent::ArticleAdded).collect();
            let delivered = join_all(events.iter().map(|event| webhook.notify(event))).await;
            let failed = delivered.iter().filter(|ok| !**ok).count();
            if failed > 0 {
                warn!(failed, "Some webhook notifications were not delivered");
            }
        }

        if !entries.is_empty() {
            let persisted = self.merger.persist(entries.clone()).await;
            info!(
                method = ?persisted.method,
                stored = persisted.articles_count,
                "Persistence finished"
            );
        }

        info!(
            found = aggregation.found,
            processed = entries.len(),
            "Pipeline run complete"
        );
        Ok(PipelineReport {
            success: true,
            articles_found: aggregation.found,
            articles_processed: entries.len(),
            articles: entries,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::ChatPrompt;
    use crate::config::{ExtractOptions, OracleSettings, SelectionPolicy, default_sources};
    use crate::error::PipelineError;
    use crate::models::{PersistedEntry, SourceDescriptor, SummarizedEntry};
    use async_trait::async_trait;

    /// Oracle that echoes the prompt's title and link back as a well-formed entry.
    pub(crate) struct EchoOracle;

    #[async_trait]
    impl Oracle for EchoOracle {
        async fn ask(&self, prompt: &ChatPrompt) -> Result<String> {
            let field = |prefix: &str| {
                prompt
                    .user
                    .lines()
                    .find_map(|l| l.strip_prefix(prefix))
                    .unwrap_or_default()
                    .trim_matches('"')
                    .to_string()
            };
            let reply = serde_json::json!({
                "title": field("Title: "),
                "date": "October 18, 2026",
                "content": "A quick race recap.",
                "source": field("Source: "),
                "link": field("Link: "),
            });
            Ok(format!("Here is your summary:\n{reply}"))
        }
    }

    pub(crate) fn test_settings(sources: Vec<SourceDescriptor>, api_key: Option<&str>) -> Settings {
        Settings {
            sources,
            extract: ExtractOptions::default(),
            selection: SelectionPolicy::default(),
            oracle: OracleSettings {
                api_key: api_key.map(str::to_string),
                endpoint: "http://127.0.0.1:1/v1/chat/completions".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                max_retries: 0,
            },
            store: StoreSettings::Unavailable,
            store_cap: 10,
            store_retries: 3,
            summarize_concurrency: 2,
            skip_failed_summaries: false,
            request_timeout: Duration::from_secs(5),
            webhook_url: None,
            build_hook_url: None,
            site_url: None,
        }
    }

    fn old_entry(i: usize) -> PersistedEntry {
        PersistedEntry {
            entry: SummarizedEntry {
                title: format!("Archive story {i}"),
                date: format!("January {i}, 2020"),
                content: "Old news.".to_string(),
                source: "Running USA".to_string(),
                link: format!("https://www.runningusa.org/news/{i}"),
                image_url: None,
            },
            id: i.to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_fetching() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", "/news")
            .expect(0)
            .create_async()
            .await;

        let settings = test_settings(
            vec![SourceDescriptor::new("A", format!("{}/news", server.url()), "h2 a")],
            None,
        );
        let pipeline = Pipeline::new(settings, Client::new(), Arc::new(EchoOracle), None, StoreMerger::new(None, None, 10, 1));

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        page.assert_async().await;
    }

    #[tokio::test]
    async fn test_end_to_end_two_sources_into_file_store() {
        let mut server = mockito::Server::new_async().await;
        let _a = server
            .mock("GET", "/flotrack")
            .with_status(200)
            .with_body(r#"<main><h2><a href="/articles/1">Teen breaks the mile record</a></h2></main>"#)
            .create_async()
            .await;
        let _b = server
            .mock("GET", "/rw")
            .with_status(200)
            .with_body(r#"<main><h3><a href="https://www.runnersworld.com/news/boston">Boston entry standards drop</a></h3></main>"#)
            .create_async()
            .await;
        let hook = server
            .mock("POST", "/hook")
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog-posts.json");
        let existing: Vec<PersistedEntry> = (1..=9).map(old_entry).collect();
        std::fs::write(&path, serde_json::to_string(&existing).unwrap()).unwrap();

        let mut settings = test_settings(
            vec![
                SourceDescriptor::new("FloTrack", format!("{}/flotrack", server.url()), "h2 a"),
                SourceDescriptor::new("Runner's World", format!("{}/rw", server.url()), "h3 a"),
            ],
            Some("sk-test"),
        );
        settings.store = StoreSettings::File(path.clone());

        let client = Client::new();
        let merger = StoreMerger::new(build_store(&settings, &client), None, 10, 3);
        let webhook: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(
            client.clone(),
            format!("{}/hook", server.url()),
            None,
        ));
        let pipeline = Pipeline::new(settings, client, Arc::new(EchoOracle), Some(webhook), merger);

        let report = pipeline.run().await.unwrap();
        assert!(report.success);
        assert_eq!(report.articles_found, 2);
        assert_eq!(report.articles_processed, 2);
        let sources: Vec<_> = report.articles.iter().map(|a| a.source.as_str()).collect();
        // Both are priority sources, kept in source order.
        assert_eq!(sources, vec!["FloTrack", "Runner's World"]);
        assert!(report.articles[0].link.ends_with("/articles/1"));
        hook.assert_async().await;

        let stored: Vec<PersistedEntry> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.len(), 10);
        assert_eq!(stored[0].entry.title, "Teen breaks the mile record");
        assert_eq!(stored[1].entry.title, "Boston entry standards drop");
        let ids: Vec<_> = stored.iter().map(|e| e.id.clone()).collect();
        let expected: Vec<_> = (1..=10).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_no_candidates_is_fatal() {
        let settings = test_settings(
            vec![SourceDescriptor::new("Dead", "http://127.0.0.1:1/", "h2 a")],
            Some("sk-test"),
        );
        let pipeline = Pipeline::new(settings, Client::new(), Arc::new(EchoOracle), None, StoreMerger::new(None, None, 10, 1));
        let err = pipeline.run().await.unwrap_err();
        assert_eq!(err.to_string(), "No articles found from any source");
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_run_future_is_send() {
        let pipeline = Pipeline::from_settings(test_settings(default_sources(), Some("sk-test"))).unwrap();
        assert_send(pipeline.run());
    }

    #[test]
    fn test_from_settings_without_store() {
        let pipeline = Pipeline::from_settings(test_settings(default_sources(), None)).unwrap();
        assert!(!pipeline.merger().has_store());
    }
}
