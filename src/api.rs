// src/api.rs
//! HTTP surface: feed pages, categories, curation and ingest triggers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::ingest::config::FeedConfig;
use crate::ingest::http::HttpFetcher;
use crate::ingest::identity::{StableId, TimeDigestResolver};
use crate::ingest::providers::build_adapters;
use crate::ingest::types::{IngestReport, SourceAdapter};
use crate::ingest::Pipeline;
use crate::pagination::{parse_categories, PageError, PaginationService};
use crate::store::{FeedStats, FeedStore, MemoryFeedStore, StoreError, StoredItem};

/// Target for `POST /ingest/{source}` that runs every adapter.
pub const INGEST_ALL: &str = "all";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FeedStore>,
    pub pages: PaginationService,
    pub pipeline: Pipeline,
    pub adapters: Arc<Vec<Arc<dyn SourceAdapter>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn FeedStore>,
        pipeline: Pipeline,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Self {
        Self {
            pages: PaginationService::new(Arc::clone(&store)),
            store,
            pipeline,
            adapters: Arc::new(adapters),
        }
    }

    pub fn with_pagination(mut self, pages: PaginationService) -> Self {
        self.pages = pages;
        self
    }

    /// Wire store, pipeline and adapters from a loaded config.
    pub fn from_config(cfg: &FeedConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn FeedStore> = match &cfg.snapshot_path {
            Some(p) => Arc::new(MemoryFeedStore::open(p)?),
            None => Arc::new(MemoryFeedStore::new()),
        };
        let http = HttpFetcher::new(&cfg.user_agent, cfg.fetch_timeout())?;
        let adapters = build_adapters(cfg, &http);
        let pipeline = Pipeline::new(
            Arc::clone(&store),
            Arc::new(TimeDigestResolver),
            cfg.ingest_options(),
        );
        let pages = PaginationService::new(Arc::clone(&store))
            .with_limits(cfg.page_size_default, cfg.page_size_max);
        Ok(Self::new(store, pipeline, adapters).with_pagination(pages))
    }

    fn adapters_for(&self, source: &str) -> Option<Vec<Arc<dyn SourceAdapter>>> {
        if source.eq_ignore_ascii_case(INGEST_ALL) {
            return Some(self.adapters.to_vec());
        }
        self.adapters
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(source))
            .map(|a| vec![Arc::clone(a)])
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/feed", get(feed_page))
        .route("/categories", get(categories))
        .route("/items/{id}", get(item_by_id))
        .route("/stats", get(stats))
        .route("/ingest/{source}", post(ingest_source))
        .route("/admin/items/{id}/visibility", put(set_visibility))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, msg: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: msg.to_string(),
        }),
    )
}

fn store_error(e: StoreError) -> ApiError {
    tracing::warn!(target: "api", error = %e, "store error");
    match e {
        StoreError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e),
        StoreError::Unavailable(_) => api_error(StatusCode::SERVICE_UNAVAILABLE, e),
        StoreError::Snapshot(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

fn parse_id(raw: &str) -> Result<StableId, ApiError> {
    raw.parse::<StableId>()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid id: {e}")))
}

/// Public view of a stored item; draft flag and bookkeeping stay internal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedItemOut {
    id: StableId,
    title: String,
    summary: String,
    category: String,
    url: String,
    published_at: i64,
    icon_url: String,
    source_name: String,
}

impl From<StoredItem> for FeedItemOut {
    fn from(s: StoredItem) -> Self {
        Self {
            id: s.id,
            title: s.item.title,
            summary: s.item.summary,
            category: s.item.category,
            url: s.item.url,
            published_at: s.item.published_at,
            icon_url: s.item.icon_url,
            source_name: s.item.source_name,
        }
    }
}

#[derive(Deserialize)]
struct FeedQuery {
    cursor: Option<String>,
    categories: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedPageOut {
    items: Vec<FeedItemOut>,
    next_cursor: Option<String>,
    has_more: bool,
}

async fn feed_page(
    State(state): State<AppState>,
    Query(q): Query<FeedQuery>,
) -> Result<Json<FeedPageOut>, ApiError> {
    let cats = parse_categories(q.categories.as_deref());
    let page = state
        .pages
        .page(q.cursor.as_deref(), q.limit, cats.as_ref())
        .await
        .map_err(|e| match e {
            PageError::Cursor(c) => api_error(StatusCode::BAD_REQUEST, c),
            PageError::Store(s) => store_error(s),
        })?;
    Ok(Json(FeedPageOut {
        items: page.items.into_iter().map(FeedItemOut::from).collect(),
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}

async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    state.store.categories().await.map(Json).map_err(store_error)
}

async fn item_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FeedItemOut>, ApiError> {
    let id = parse_id(&id)?;
    match state.store.get(id).await.map_err(store_error)? {
        Some(it) if it.visible => Ok(Json(it.into())),
        _ => Err(api_error(StatusCode::NOT_FOUND, format!("item {id} not found"))),
    }
}

async fn stats(State(state): State<AppState>) -> Result<Json<FeedStats>, ApiError> {
    state.store.stats().await.map(Json).map_err(store_error)
}

async fn ingest_source(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Result<Json<IngestReport>, ApiError> {
    let adapters = state
        .adapters_for(source.trim())
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("unknown source '{source}'")))?;
    tracing::info!(target: "api", %source, adapters = adapters.len(), "ingest triggered");
    Ok(Json(state.pipeline.ingest(&adapters).await))
}

#[derive(Deserialize)]
struct VisibilityReq {
    visible: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VisibilityOut {
    id: StableId,
    visible: bool,
}

async fn set_visibility(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<VisibilityReq>,
) -> Result<Json<VisibilityOut>, ApiError> {
    let id = parse_id(&id)?;
    let it = state
        .store
        .set_visible(id, body.visible)
        .await
        .map_err(store_error)?;
    if let Err(e) = state.store.flush().await {
        tracing::warn!(target: "api", error = %e, "flush after curation failed");
    }
    Ok(Json(VisibilityOut {
        id: it.id,
        visible: it.visible,
    }))
}
