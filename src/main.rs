//! # Running Report
//!
//! A running-news pipeline that scrapes a handful of running news sites,
//! picks the most relevant fresh headlines, has an LLM write a short summary
//! of each, and keeps a bounded, newest-first JSON store that a static site
//! renders.
//!
//! ## Usage
//!
//! ```sh
//! running_report run                  # one batch, result printed as JSON
//! running_report serve --bind 0.0.0.0:8888 --run-every-hours 24
//! running_report ingest ./articles.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Extraction**: every source page is fetched concurrently and its anchors become candidates
//! 2. **Selection**: block-lists, dedupe and source diversity pick the articles to cover
//! 3. **Summarization**: one oracle call per article, parsed into a fixed-shape entry
//! 4. **Persistence**: optimistic read-merge-write into the store, or a site rebuild hook

use clap::Parser;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod api;
mod cli;
mod config;
mod document;
mod error;
mod models;
mod notify;
mod pipeline;
mod scrapers;
mod server;
mod store;
mod summarizer;
mod utils;

use cli::{Cli, Command, run_interval};
use config::Settings;
use models::IngestRequest;
use pipeline::Pipeline;
use server::{AppState, create_app};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    let settings = Settings::from_cli(&args).await?;
    info!(
        sources = settings.sources.len(),
        target_count = settings.selection.target_count,
        "running_report starting up"
    );
    let pipeline = Arc::new(Pipeline::from_settings(settings)?);

    match args.command {
        Command::Run => {
            let start_time = std::time::Instant::now();
            let outcome = pipeline.run().await;
            info!(elapsed_ms = start_time.elapsed().as_millis(), "Run finished");
            match outcome {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(e) => {
                    error!(error = %e, "Pipeline run failed");
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({ "success": false, "error": e.to_string() }))?
                    );
                    std::process::exit(1);
                }
            }
        }
        Command::Serve {
            bind,
            run_every_hours,
        } => {
            if let Some(period) = run_interval(run_every_hours) {
                let scheduled = Arc::clone(&pipeline);
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    loop {
                        ticker.tick().await;
                        match scheduled.run().await {
                            Ok(report) => info!(
                                processed = report.articles_processed,
                                "Scheduled run complete"
                            ),
                            Err(e) => warn!(error = %e, "Scheduled run failed"),
                        }
                    }
                });
                info!(period_secs = period.as_secs(), "Scheduled runs enabled");
            }

            let app = create_app(AppState { pipeline });
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!(%bind, "Listening");
            axum::serve(listener, app).await?;
        }
        Command::Ingest { file } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let request: IngestRequest = serde_json::from_str(&raw)?;
            let articles = request.articles.unwrap_or_default();
            if articles.is_empty() {
                return Err("No articles provided".into());
            }
            let response = pipeline.merger().persist(articles).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
