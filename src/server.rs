//! HTTP endpoints: pipeline trigger, ingestion, article creation, health.
//!
//! Every handler answers JSON. Wrong methods get 405 `{"error": "Method not allowed"}`
//! and any failure becomes 500 `{"success": false, "error": "..."}`.

use crate::error::{PipelineError, Result};
use crate::models::{CreateArticleRequest, IngestRequest, SummarizedEntry};
use crate::pipeline::Pipeline;
use crate::store::CreateOutcome;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, instrument};

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/news/run", any(run_news))
        .route("/api/news/trigger", any(run_news))
        .route("/api/posts", any(ingest_posts))
        .route("/api/articles", any(create_article))
        .route("/health", get(health))
        .layer(cors)
        .with_state(Arc::new(state))
}

#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    scheduled: Option<String>,
}

impl RunParams {
    fn is_scheduled(&self) -> bool {
        self.scheduled.as_deref() == Some("true")
    }
}

fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

fn failure(e: PipelineError) -> Response {
    error!(error = %e, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": e.to_string() })),
    )
        .into_response()
}

async fn health() -> &'static str {
    "ok"
}

#[instrument(level = "info", skip_all, fields(%method))]
async fn run_news(
    State(state): State<Arc<AppState>>,
    method: Method,
    Query(params): Query<RunParams>,
) -> Response {
    if method != Method::POST && !params.is_scheduled() {
        return method_not_allowed();
    }
    match state.pipeline.run().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => failure(e),
    }
}

#[instrument(level = "info", skip_all, fields(%method))]
async fn ingest_posts(State(state): State<Arc<AppState>>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return method_not_allowed();
    }
    let articles = match parse_ingest(&body) {
        Ok(articles) => articles,
        Err(e) => return failure(e),
    };
    info!(count = articles.len(), "Ingesting articles");
    Json(state.pipeline.merger().persist(articles).await).into_response()
}

fn parse_ingest(body: &[u8]) -> Result<Vec<SummarizedEntry>> {
    let request: IngestRequest = serde_json::from_slice(body)?;
    request
        .articles
        .filter(|a| !a.is_empty())
        .ok_or_else(|| PipelineError::Configuration("No articles provided".to_string()))
}

#[instrument(level = "info", skip_all, fields(%method))]
async fn create_article(State(state): State<Arc<AppState>>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return method_not_allowed();
    }
    let request: CreateArticleRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return failure(e.into()),
    };
    let Some(article) = request.article else {
        return failure(PipelineError::Configuration("No article data provided".to_string()));
    };

    match state.pipeline.merger().create_article(article).await {
        Ok(CreateOutcome::Duplicate) => Json(json!({
            "success": false,
            "message": "Article already exists"
        }))
        .into_response(),
        Ok(CreateOutcome::Created { entry, id }) => {
            let mut article = json!(entry);
            if let Some(id) = id {
                article["id"] = json!(id);
            }
            Json(json!({ "success": true, "article": article })).into_response()
        }
        Err(e) => failure(e),
    }
}
