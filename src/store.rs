//! The bounded, date-ordered post store and the merger that maintains it.
//!
//! The store is a JSON array of [`PersistedEntry`] (newest first, at most
//! `cap` entries, ids `"1"..="n"`). Two backends implement [`ContentStore`]:
//!
//! - [`GitHubStore`]: a file in a repository, through the contents API. The
//!   blob `sha` is the revision token.
//! - [`FileStore`]: a local JSON file. A hash of its bytes is the revision token.
//!
//! Every write carries the revision read beforehand and fails with
//! [`PipelineError::ConcurrentModification`] if the store moved on. The
//! [`StoreMerger`] re-reads and retries, and falls back to the rebuild hook
//! when no durable write is possible.

use crate::error::{PipelineError, Result};
use crate::models::{IngestResponse, PersistMethod, PersistedEntry, SummarizedEntry};
use crate::notify::{Notifier, NotifyEvent};
use crate::utils::{parse_entry_date, stable_hash};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Local;
use rand::{Rng, rng};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// Store contents plus the revision they were read at.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub entries: Vec<PersistedEntry>,
    /// `None` when the store does not exist yet.
    pub revision: Option<String>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn read(&self) -> Result<StoreSnapshot>;

    /// Replace the store contents if it is still at `expected`; returns the new revision.
    async fn write(
        &self,
        entries: &[PersistedEntry],
        expected: Option<&str>,
        message: &str,
    ) -> Result<String>;
}

static MERGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique per-merge token, so concurrent merges never share temporary ids.
fn merge_token() -> String {
    let seq = MERGE_SEQ.fetch_add(1, Ordering::Relaxed);
    let salt: u32 = rng().random();
    format!("{seq:x}{salt:08x}")
}

/// Merge new entries into the current store contents.
///
/// New entries go in front, the whole set is stably sorted by date
/// (newest first, unparseable dates last), cut to `cap`, and renumbered
/// `1..=n`.
pub fn merge(
    new_entries: Vec<SummarizedEntry>,
    current: Vec<PersistedEntry>,
    cap: usize,
) -> Vec<PersistedEntry> {
    let token = merge_token();
    let mut combined: Vec<PersistedEntry> = new_entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| PersistedEntry {
            entry,
            id: format!("new-{token}-{i}"),
        })
        .chain(current)
        .collect();

    combined.sort_by_key(|e| Reverse(parse_entry_date(&e.entry.date)));
    combined.truncate(cap);
    for (i, e) in combined.iter_mut().enumerate() {
        e.id = (i + 1).to_string();
    }
    combined
}

/// Number entries `1..=n` in their given order, without touching a store.
pub fn number_entries(entries: Vec<SummarizedEntry>) -> Vec<PersistedEntry> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| PersistedEntry {
            entry,
            id: (i + 1).to_string(),
        })
        .collect()
}

fn commit_message() -> String {
    format!("Update blog posts - {}", Local::now().format("%-m/%-d/%Y"))
}

fn encode_entries(entries: &[PersistedEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

fn decode_entries(raw: &str) -> Result<Vec<PersistedEntry>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

/// Post store kept in a GitHub repository file.
pub struct GitHubStore {
    client: Client,
    api_base: String,
    owner: String,
    repo: String,
    path: String,
    token: String,
}

impl GitHubStore {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
            token: token.into(),
        }
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct ContentsUpdate<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ContentsUpdateResponse {
    content: ContentsFileRef,
}

#[derive(Debug, Deserialize)]
struct ContentsFileRef {
    sha: String,
}

#[async_trait]
impl ContentStore for GitHubStore {
    fn name(&self) -> &str {
        "github"
    }

    #[instrument(level = "info", skip_all, fields(repo = %self.repo, path = %self.path))]
    async fn read(&self) -> Result<StoreSnapshot> {
        let response = self
            .client
            .get(self.contents_url())
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!("Store file does not exist yet");
            return Ok(StoreSnapshot::default());
        }
        if !status.is_success() {
            return Err(PipelineError::Persistence(format!(
                "GitHub read failed: HTTP {status}"
            )));
        }

        let file: ContentsFile = response.json().await?;
        let packed: String = file.content.split_whitespace().collect();
        let bytes = BASE64
            .decode(packed)
            .map_err(|e| PipelineError::Persistence(format!("Store content is not base64: {e}")))?;
        let raw = String::from_utf8(bytes)
            .map_err(|e| PipelineError::Persistence(format!("Store content is not UTF-8: {e}")))?;

        Ok(StoreSnapshot {
            entries: decode_entries(&raw)?,
            revision: Some(file.sha),
        })
    }

    #[instrument(level = "info", skip_all, fields(repo = %self.repo, path = %self.path, count = entries.len()))]
    async fn write(
        &self,
        entries: &[PersistedEntry],
        expected: Option<&str>,
        message: &str,
    ) -> Result<String> {
        let body = ContentsUpdate {
            message,
            content: BASE64.encode(encode_entries(entries)?),
            sha: expected,
        };
        let response = self
            .client
            .put(self.contents_url())
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(PipelineError::ConcurrentModification {
                expected: expected.map(str::to_string),
            });
        }
        if !status.is_success() {
            return Err(PipelineError::Persistence(format!(
                "GitHub write failed: HTTP {status}"
            )));
        }

        let updated: ContentsUpdateResponse = response.json().await?;
        info!(sha = %updated.content.sha, "Store updated via GitHub API");
        Ok(updated.content.sha)
    }
}

/// Post store kept in a local JSON file.
///
/// The revision check and the rename are serialized by an in-process lock,
/// so the optimistic-concurrency guarantee holds only for writers sharing one
/// `FileStore` in one process. Separate processes on the same file never
/// clobber each other's temp file, but can both pass the revision check.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_raw(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn revision_of(raw: &str) -> String {
    format!("{:08x}", stable_hash(raw))
}

#[async_trait]
impl ContentStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn read(&self) -> Result<StoreSnapshot> {
        Ok(match self.read_raw().await? {
            Some(raw) => StoreSnapshot {
                entries: decode_entries(&raw)?,
                revision: Some(revision_of(&raw)),
            },
            None => StoreSnapshot::default(),
        })
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = entries.len()))]
    async fn write(
        &self,
        entries: &[PersistedEntry],
        expected: Option<&str>,
        _message: &str,
    ) -> Result<String> {
        let _guard = self.write_lock.lock().await;

        let current = self.read_raw().await?.map(|raw| revision_of(&raw));
        if current.as_deref() != expected {
            return Err(PipelineError::ConcurrentModification {
                expected: expected.map(str::to_string),
            });
        }

        let raw = encode_entries(entries)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension(format!("{}.tmp", merge_token()));
        fs::write(&tmp, &raw).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(revision_of(&raw))
    }
}

/// Outcome of the standalone article-creation operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Stored; `None` id when the entry was too old to stay within the cap.
    Created { entry: SummarizedEntry, id: Option<String> },
    /// An entry with the same title is already stored.
    Duplicate,
}

/// Read-merge-write coordinator for the post store.
#[derive(Clone)]
pub struct StoreMerger {
    store: Option<Arc<dyn ContentStore>>,
    rebuild_hook: Option<Arc<dyn Notifier>>,
    cap: usize,
    attempts: usize,
}

impl StoreMerger {
    pub fn new(
        store: Option<Arc<dyn ContentStore>>,
        rebuild_hook: Option<Arc<dyn Notifier>>,
        cap: usize,
        attempts: usize,
    ) -> Self {
        Self {
            store,
            rebuild_hook,
            cap,
            attempts: attempts.max(1),
        }
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// One read-merge-write cycle against the store.
    ///
    /// # Errors
    ///
    /// [`PipelineError::ConcurrentModification`] when the store changed between
    /// read and write; [`PipelineError::Persistence`] when there is no store.
    pub async fn merge_once(&self, new_entries: &[SummarizedEntry]) -> Result<Vec<PersistedEntry>> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| PipelineError::Persistence("No store configured".to_string()))?;
        let snapshot = store.read().await?;
        let merged = merge(new_entries.to_vec(), snapshot.entries, self.cap);
        store
            .write(&merged, snapshot.revision.as_deref(), &commit_message())
            .await?;
        Ok(merged)
    }

    /// Merge `new_entries` into the store, retrying on concurrent modification.
    ///
    /// Never fails: if no durable write happens, the rebuild hook is fired
    /// and the response says `build-hook`.
    #[instrument(level = "info", skip_all, fields(new = new_entries.len()))]
    pub async fn persist(&self, new_entries: Vec<SummarizedEntry>) -> IngestResponse {
        if let Some(store) = &self.store {
            for attempt in 1..=self.attempts {
                match self.merge_once(&new_entries).await {
                    Ok(merged) => {
                        info!(store = store.name(), attempt, count = merged.len(), "Store updated");
                        return IngestResponse {
                            success: true,
                            message: "Blog posts updated automatically via GitHub API".to_string(),
                            articles_count: merged.len(),
                            new_articles: Some(new_entries.len()),
                            method: PersistMethod::GithubApi,
                            articles: merged,
                        };
                    }
                    Err(e) if e.is_concurrent_modification() => {
                        warn!(store = store.name(), attempt, "Store changed underneath; retrying");
                    }
                    Err(e) => {
                        error!(store = store.name(), error = %e, "Store update failed");
                        break;
                    }
                }
            }
        } else {
            info!("No store configured; falling back to build hook");
        }

        if let Some(hook) = &self.rebuild_hook {
            if !hook.notify(&NotifyEvent::RebuildRequested).await {
                warn!("Build hook did not accept the rebuild request");
            }
        }

        let formatted = number_entries(new_entries);
        IngestResponse {
            success: true,
            message: "Webhook processed - build triggered".to_string(),
            articles_count: formatted.len(),
            new_articles: None,
            method: PersistMethod::BuildHook,
            articles: formatted,
        }
    }

    /// Store a single entry unless one with the same title already exists.
    #[instrument(level = "info", skip_all, fields(title = %entry.title))]
    pub async fn create_article(&self, entry: SummarizedEntry) -> Result<CreateOutcome> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| PipelineError::Configuration("Article store not configured".to_string()))?;

        let mut last_error = None;
        for attempt in 1..=self.attempts {
            let snapshot = store.read().await?;
            if snapshot.entries.iter().any(|e| e.entry.title == entry.title) {
                info!("Article already exists");
                return Ok(CreateOutcome::Duplicate);
            }
            let merged = merge(vec![entry.clone()], snapshot.entries, self.cap);
            match store
                .write(&merged, snapshot.revision.as_deref(), &commit_message())
                .await
            {
                Ok(_) => {
                    let id = merged
                        .iter()
                        .find(|e| e.entry == entry)
                        .map(|e| e.id.clone());
                    return Ok(CreateOutcome::Created { entry, id });
                }
                Err(e) if e.is_concurrent_modification() => {
                    warn!(attempt, "Store changed underneath; retrying");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| PipelineError::Persistence("Store write failed".to_string())))
    }
}
