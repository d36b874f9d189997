//! Command-line interface definitions for Running Report.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every external setting can also be supplied through the environment
//! variable named on its flag, which is how the hosted deployment configures it.

use clap::{Parser, Subcommand};
use std::time::Duration;

/// Command-line arguments for the Running Report pipeline.
///
/// # Examples
///
/// ```sh
/// # One scheduled-style run, persisting to a local JSON store
/// OPENAI_API_KEY=sk-... running_report --store-file ./blog-posts.json run
///
/// # HTTP endpoints, with a run every 24 hours
/// running_report serve --bind 0.0.0.0:8888 --run-every-hours 24
///
/// # Merge a batch of already summarized entries into the store
/// running_report ingest ./articles.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// API key for the chat-completions oracle
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Chat model used for summaries
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-3.5-turbo")]
    pub openai_model: String,

    /// Chat-completions endpoint
    #[arg(
        long,
        env = "OPENAI_BASE_URL",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    pub openai_base_url: String,

    /// Retries per oracle call before the article fails
    #[arg(long, default_value_t = 2)]
    pub oracle_retries: usize,

    /// GitHub token; enables the GitHub contents store
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Repository holding the post store
    #[arg(long, env = "GITHUB_REPO", default_value = "run-report")]
    pub github_repo: String,

    /// Owner of the repository holding the post store
    #[arg(long, env = "GITHUB_OWNER", default_value = "smallnumbers0")]
    pub github_owner: String,

    /// Path of the post store inside the repository
    #[arg(long, env = "GITHUB_STORE_PATH", default_value = "src/data/blog-posts.json")]
    pub github_store_path: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_BASE", default_value = "https://api.github.com")]
    pub github_api_base: String,

    /// Local JSON post store, used when no GitHub token is set
    #[arg(long, env = "STORE_FILE")]
    pub store_file: Option<String>,

    /// Legacy webhook notified with every summarized entry
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Site rebuild hook, fired when the store cannot be written
    #[arg(long, env = "NETLIFY_BUILD_HOOK")]
    pub build_hook_url: Option<String>,

    /// Public URL of the generated site
    #[arg(long, env = "URL")]
    pub site_url: Option<String>,

    /// YAML file of sources replacing the built-in list
    #[arg(long, env = "SOURCES_FILE")]
    pub sources_file: Option<String>,

    /// Sources whose candidates are preferred (repeatable); defaults to the built-in list
    #[arg(long = "priority-source")]
    pub priority_sources: Vec<String>,

    /// Articles summarized per run
    #[arg(long, default_value_t = 2)]
    pub target_count: usize,

    /// Candidates kept per source
    #[arg(long, default_value_t = 3)]
    pub max_per_source: usize,

    /// Minimum headline length in characters
    #[arg(long, default_value_t = 10)]
    pub min_title_len: usize,

    /// Use a deterministic stock image when a page offers none
    #[arg(long)]
    pub image_fallback: bool,

    /// Maximum number of posts kept in the store
    #[arg(long, default_value_t = 10)]
    pub store_cap: usize,

    /// Attempts at the read-merge-write cycle when the store changes underneath
    #[arg(long, default_value_t = 3)]
    pub store_retries: usize,

    /// Concurrent oracle calls
    #[arg(long, default_value_t = 4)]
    pub summarize_concurrency: usize,

    /// Drop articles whose summary fails instead of failing the run
    #[arg(long)]
    pub skip_failed_summaries: bool,

    /// Timeout for every outbound HTTP request, in seconds
    #[arg(long, default_value_t = 20)]
    pub request_timeout_secs: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the pipeline once and print the result as JSON
    Run,
    /// Serve the trigger, ingestion and article endpoints
    Serve {
        /// Listen address
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8888")]
        bind: String,

        /// Also run the pipeline on this interval
        #[arg(long)]
        run_every_hours: Option<u64>,
    },
    /// Merge a JSON `{"articles": [...]}` file into the store
    Ingest {
        /// Path of the JSON file
        file: String,
    },
}

/// Longest accepted `--run-every-hours`, one year.
pub const MAX_RUN_EVERY_HOURS: u64 = 24 * 365;

/// Period for scheduled runs; `None` when scheduling is off.
///
/// Zero disables scheduling and oversized values are clamped, so the timer
/// never overflows.
pub fn run_interval(hours: Option<u64>) -> Option<Duration> {
    hours
        .filter(|h| *h > 0)
        .map(|h| Duration::from_secs(h.min(MAX_RUN_EVERY_HOURS).saturating_mul(3600)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_interval() {
        assert_eq!(run_interval(None), None);
        assert_eq!(run_interval(Some(0)), None);
        assert_eq!(run_interval(Some(24)), Some(Duration::from_secs(86_400)));
        assert_eq!(
            run_interval(Some(u64::MAX)),
            Some(Duration::from_secs(MAX_RUN_EVERY_HOURS * 3600))
        );
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "running_report",
            "--target-count",
            "3",
            "--image-fallback",
            "--priority-source",
            "FloTrack",
            "--priority-source",
            "Runner's World",
            "run",
        ]);

        assert!(matches!(cli.command, Command::Run));
        assert_eq!(cli.target_count, 3);
        assert!(cli.image_fallback);
        assert_eq!(cli.priority_sources, vec!["FloTrack", "Runner's World"]);
    }

    #[test]
    fn test_serve_subcommand() {
        let cli = Cli::parse_from([
            "running_report",
            "serve",
            "--bind",
            "127.0.0.1:9000",
            "--run-every-hours",
            "24",
        ]);

        match cli.command {
            Command::Serve { bind, run_every_hours } => {
                assert_eq!(bind, "127.0.0.1:9000");
                assert_eq!(run_every_hours, Some(24));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_ingest_subcommand() {
        let cli = Cli::parse_from(["running_report", "ingest", "./articles.json"]);
        assert!(matches!(cli.command, Command::Ingest { ref file } if file == "./articles.json"));
    }
}
