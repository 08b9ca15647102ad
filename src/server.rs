//! Read-only HTTP API over the article store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/articles` | Filtered, paginated article listing |
//! | `GET`  | `/articles/{id}` | One article by id |
//! | `GET`  | `/sources` | Provider adapters and whether they have credentials |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `GET /articles` accepts `source`, `category`, `author`,
//! `published_at` (`YYYY-MM-DD`), `title` and `page`. Blank values are
//! ignored. The page size is fixed by `[server].page_size`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "page must be a positive integer" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends
//! can call the API directly.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use newswire_core::{Article, ArticleQuery, ArticleStore};

use crate::config::Config;
use crate::providers::ProviderRegistry;
use crate::sources::{source_statuses, SourceStatus};

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ArticleStore>,
    registry: Arc<ProviderRegistry>,
    page_size: u32,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        registry: Arc<ProviderRegistry>,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            registry,
            page_size: page_size.max(1),
        }
    }
}

/// Build the router. Exposed separately from [`run_server`] so tests can
/// drive it without binding a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/articles", get(handle_list_articles))
        .route("/articles/{id}", get(handle_get_article))
        .route("/sources", get(handle_sources))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `[server].bind` until `shutdown` resolves.
pub async fn run_server(
    config: &Config,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "HTTP API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Store failures are logged in full; clients only see a generic message.
fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{err:#}"), "article store error");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "internal error".to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /articles ============

/// Raw query string. Everything is a string so malformed values produce
/// our own 400 body instead of the extractor's plain-text rejection.
#[derive(Deserialize, Default)]
struct ArticlesParams {
    source: Option<String>,
    category: Option<String>,
    author: Option<String>,
    published_at: Option<String>,
    title: Option<String>,
    page: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ArticlesParams {
    fn into_query(self, per_page: u32) -> Result<ArticleQuery, AppError> {
        let published_on = match present(self.published_at) {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                    bad_request(format!("published_at must be YYYY-MM-DD, got '{}'", raw))
                })?,
            ),
            None => None,
        };
        let page = match present(self.page) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(bad_request("page must be a positive integer")),
            },
            None => 1,
        };
        Ok(ArticleQuery {
            source: present(self.source),
            category: present(self.category),
            author: present(self.author),
            published_on,
            title: present(self.title),
            page,
            per_page,
        })
    }
}

#[derive(Serialize)]
struct PageMeta {
    current_page: u32,
    per_page: u32,
    total: u64,
    last_page: u32,
}

#[derive(Serialize)]
struct ArticlesResponse {
    data: Vec<Article>,
    meta: PageMeta,
}

async fn handle_list_articles(
    State(state): State<AppState>,
    Query(params): Query<ArticlesParams>,
) -> Result<Json<ArticlesResponse>, AppError> {
    let query = params.into_query(state.page_size)?;
    let page = state.store.query(&query).await.map_err(internal)?;

    Ok(Json(ArticlesResponse {
        meta: PageMeta {
            current_page: page.page,
            per_page: page.per_page,
            total: page.total,
            last_page: page.last_page,
        },
        data: page.items,
    }))
}

// ============ GET /articles/{id} ============

async fn handle_get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Article>, AppError> {
    state
        .store
        .get(&id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found(format!("no article with id: {}", id)))
}

// ============ GET /sources ============

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<SourceStatus>,
}

async fn handle_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: source_statuses(&state.registry),
    })
}
