//! Outbound notifications: the legacy content webhook and the site rebuild hook.
//!
//! Notifications are best-effort. [`Notifier::notify`] reports success as a
//! boolean and never returns an error; callers log a `false` and move on.

use crate::models::SummarizedEntry;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, instrument};

/// Something worth telling the outside world about.
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    /// A new entry was summarized.
    ArticleAdded(SummarizedEntry),
    /// The store could not be written; the site should rebuild from what it has.
    RebuildRequested,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the event. `true` when delivered or not applicable to this notifier.
    async fn notify(&self, event: &NotifyEvent) -> bool;
}

async fn post_json(client: &Client, url: &str, body: &serde_json::Value) -> bool {
    match client.post(url).json(body).send().await {
        Ok(resp) if resp.status().is_success() => true,
        Ok(resp) => {
            error!(%url, status = %resp.status(), "Hook rejected notification");
            false
        }
        Err(e) => {
            error!(%url, error = %e, "Hook unreachable");
            false
        }
    }
}

/// Generic webhook that receives every summarized entry.
///
/// Body: `{"action": "add_article", "article": {...}, "timestamp": "...", "site": "..."}`.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    site_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: impl Into<String>, site_url: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            site_url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn notify(&self, event: &NotifyEvent) -> bool {
        let NotifyEvent::ArticleAdded(article) = event else {
            return true;
        };
        let mut body = json!({
            "action": "add_article",
            "article": article,
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let Some(site) = &self.site_url {
            body["site"] = json!(site);
        }
        let ok = post_json(&self.client, &self.url, &body).await;
        if ok {
            info!(title = %article.title, "Webhook notified");
        }
        ok
    }
}

/// Static-site build hook; an empty JSON POST starts a rebuild.
pub struct BuildHookNotifier {
    client: Client,
    url: String,
}

impl BuildHookNotifier {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for BuildHookNotifier {
    #[instrument(level = "info", skip_all)]
    async fn notify(&self, event: &NotifyEvent) -> bool {
        if !matches!(event, NotifyEvent::RebuildRequested) {
            return true;
        }
        let ok = post_json(&self.client, &self.url, &json!({})).await;
        if ok {
            info!("Site build triggered");
        }
        ok
    }
}
