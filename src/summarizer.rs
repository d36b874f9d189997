//! Article summarization through the oracle.
//!
//! Each selected article becomes one prompt asking for a fixed-shape JSON
//! object. The oracle answers in free text, so [`parse_structured_reply`]
//! pulls the first well-formed JSON object out of the reply and checks it
//! has every field an entry needs.

use crate::api::{ChatPrompt, Oracle};
use crate::error::{ParseError, PipelineError, Result};
use crate::models::{SelectedArticle, SummarizedEntry};
use crate::utils::{long_date_today, truncate_for_log};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

const SYSTEM_PROMPT: &str =
    "You are a running news summarizer. Create concise, engaging summaries for The Running Report.";

static BRACE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("static regex"));

/// Build the oracle prompt for one article, stamped with `date`.
pub fn build_prompt(article: &SelectedArticle, date: &str) -> ChatPrompt {
    let image_line = article
        .image_url
        .as_deref()
        .map(|url| format!("Image: {url}\n"))
        .unwrap_or_default();
    let image_field = article
        .image_url
        .as_deref()
        .map(|url| format!(",\n  \"imageUrl\": \"{url}\""))
        .unwrap_or_default();

    let user = format!(
        r#"Create a JSON summary for this running news article:

Title: "{title}"
Source: {source}
Link: {link}
{image_line}
Return only valid JSON with this format:
{{
  "title": "Original article title",
  "date": "{date}",
  "content": "2-3 sentence engaging summary based on the title",
  "source": "{source}",
  "link": "{link}"{image_field}
}}"#,
        title = article.title,
        source = article.source,
        link = article.link,
    );

    ChatPrompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyPayload {
    title: Option<String>,
    date: Option<String>,
    content: Option<String>,
    source: Option<String>,
    link: Option<String>,
    image_url: Option<String>,
}

fn required(value: Option<String>, field: &'static str) -> std::result::Result<String, ParseError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ParseError::MissingField(field))
}

/// Extract the first well-formed JSON object from free text.
///
/// Tries every `{` inside the outermost brace span, left to right, and
/// returns the first position that parses as a JSON object.
pub fn parse_structured_reply(text: &str) -> std::result::Result<SummarizedEntry, ParseError> {
    let span = BRACE_BLOCK.find(text).ok_or(ParseError::NoPayload)?;
    let block = span.as_str();

    let mut first_error = None;
    let found = block
        .match_indices('{')
        .find_map(|(i, _)| {
            let mut values = serde_json::Deserializer::from_str(&block[i..]).into_iter::<Value>();
            match values.next() {
                Some(Ok(v @ Value::Object(_))) => Some(v),
                Some(Err(e)) => {
                    first_error.get_or_insert_with(|| e.to_string());
                    None
                }
                _ => None,
            }
        });
    let object = found.ok_or_else(|| {
        ParseError::Malformed(first_error.unwrap_or_else(|| "no JSON object".to_string()))
    })?;

    let payload: ReplyPayload =
        serde_json::from_value(object).map_err(|e| ParseError::Malformed(e.to_string()))?;

    Ok(SummarizedEntry {
        title: required(payload.title, "title")?,
        date: required(payload.date, "date")?,
        content: required(payload.content, "content")?,
        source: required(payload.source, "source")?,
        link: required(payload.link, "link")?,
        image_url: payload.image_url.filter(|u| !u.trim().is_empty()),
    })
}

/// Summarize one article.
///
/// # Errors
///
/// [`PipelineError::Summarization`] when the oracle call fails or its reply
/// has no usable JSON object.
#[instrument(level = "info", skip_all, fields(title = %article.title, source = %article.source))]
pub async fn summarize(oracle: &dyn Oracle, article: &SelectedArticle) -> Result<SummarizedEntry> {
    let prompt = build_prompt(article, &long_date_today());
    let reply = oracle.ask(&prompt).await.map_err(|e| match e {
        PipelineError::Summarization(_) => e,
        other => PipelineError::Summarization(other.to_string()),
    })?;

    let mut entry = parse_structured_reply(&reply).map_err(|e| {
        warn!(
            error = %e,
            response_preview = %truncate_for_log(&reply, 300),
            "Oracle returned non-conforming JSON"
        );
        PipelineError::Summarization(e.to_string())
    })?;

    if entry.image_url.is_none() {
        entry.image_url = article.image_url.clone();
    }
    info!(summary_title = %entry.title, "Summarized article");
    Ok(entry)
}

/// Summarize all articles concurrently, keeping selection order.
///
/// With `skip_failed` unset, the first failure fails the whole batch.
/// With it set, failed articles are logged and dropped.
#[instrument(level = "info", skip_all, fields(count = articles.len(), concurrency = concurrency))]
pub async fn summarize_all(
    oracle: &dyn Oracle,
    articles: &[SelectedArticle],
    concurrency: usize,
    skip_failed: bool,
) -> Result<Vec<SummarizedEntry>> {
    let calls: Vec<_> = articles.iter().map(|article| summarize(oracle, article)).collect();
    let results: Vec<Result<SummarizedEntry>> = stream::iter(calls)
        .buffered(concurrency.max(1))
        .collect()
        .await;

    if !skip_failed {
        return results.into_iter().collect();
    }

    Ok(results
        .into_iter()
        .zip(articles)
        .filter_map(|(result, article)| match result {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(title = %article.title, error = %e, "Dropping article whose summary failed");
                None
            }
        })
        .collect())
}
