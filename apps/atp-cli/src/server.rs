//! HTTP surface: `GET /search` and `GET /health`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::signal;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use atp_core::config::SearchSettings;
use atp_core::{FilterField, QueryRequest};
use atp_search::{format_results, SearchPipeline};

#[derive(Clone)]
struct SharedState {
    pipeline: Arc<SearchPipeline>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SearchType {
    #[default]
    #[serde(rename = "vector")]
    Vector,
    #[serde(rename = "vector-rerank")]
    VectorRerank,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

/// Query string of `GET /search`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub search_type: SearchType,
    pub num_results: Option<usize>,
    pub num_rerank_results: Option<usize>,
    pub preacher: Option<String>,
    pub title: Option<String>,
    pub section: Option<String>,
    #[serde(rename = "videoID")]
    pub video_id: Option<String>,
    pub document_contains: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

impl SearchParams {
    pub fn to_request(&self, limits: &SearchSettings) -> QueryRequest {
        let mut request = QueryRequest::new(self.search_query.clone())
            .with_results(self.num_results.unwrap_or(limits.default_results));
        if self.search_type == SearchType::VectorRerank {
            let n = self.num_rerank_results.unwrap_or(limits.default_rerank_results);
            request = request.with_rerank(n);
        }
        for (field, value) in [
            (FilterField::VideoId, &self.video_id),
            (FilterField::Title, &self.title),
            (FilterField::Preacher, &self.preacher),
            (FilterField::Section, &self.section),
        ] {
            if let Some(v) = value {
                request.filters.push(field, v);
            }
        }
        if let Some(needle) = &self.document_contains {
            request = request.with_document_contains(needle.clone());
        }
        request
    }
}

#[derive(Debug)]
enum HttpError {
    Search(atp_core::Error),
    Task(String),
}

impl From<atp_core::Error> for HttpError {
    fn from(err: atp_core::Error) -> Self {
        Self::Search(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Search(e) if e.is_upstream() => (StatusCode::BAD_GATEWAY, e.to_string()),
            Self::Search(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Task(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("search task failed: {msg}"))
            }
        };
        tracing::error!(%status, error = %message, "search request failed");
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(pipeline: Arc<SearchPipeline>) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/health", get(health))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(SharedState { pipeline })
}

async fn health() -> &'static str {
    "ok"
}

async fn search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, HttpError> {
    let pipeline = state.pipeline.clone();
    let request = params.to_request(pipeline.limits());
    let results = tokio::task::spawn_blocking(move || pipeline.retrieve(&request))
        .await
        .map_err(|e| HttpError::Task(e.to_string()))??;

    Ok(match params.format {
        OutputFormat::Json => Json(results.to_columns()).into_response(),
        OutputFormat::Markdown => (
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            format_results(&results),
        )
            .into_response(),
    })
}

/// Serve until Ctrl+C or SIGTERM.
pub async fn serve(addr: SocketAddr, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}
