use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sparrow_core::{
    Error, FieldSelection, IndexReader, Query as SearchQuery, ReRanker, Record, Retriever, Similarity,
    SimilarityArgs, TextLoader,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Upper bound on `k` for ad-hoc searches.
const MAX_K: usize = 1000;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_similarity")]
    pub similarity: String,
    /// Treat `q` as query syntax rather than plain text.
    #[serde(default)]
    pub parsed: bool,
    pub k1: Option<f64>,
    pub b: Option<f64>,
    pub mu: Option<f64>,
    /// Comma-separated stored fields to return with each hit.
    pub fields: Option<String>,
}
fn default_k() -> usize { 10 }
fn default_similarity() -> String { "BM25".into() }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub similarity: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub docno: String,
    pub score: f64,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
pub struct RetrieveRequest {
    #[serde(default = "default_similarity")]
    pub similarity: String,
    #[serde(default)]
    pub args: SimilarityArgs,
    pub num_results: Option<usize>,
    #[serde(default)]
    pub include_fields: Vec<String>,
    pub rows: Vec<Record>,
}

#[derive(Deserialize)]
pub struct RerankRequest {
    #[serde(default = "default_similarity")]
    pub similarity: String,
    #[serde(default)]
    pub args: SimilarityArgs,
    pub rows: Vec<Record>,
}

#[derive(Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub fields: FieldSelection,
    pub rows: Vec<Record>,
}

#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<IndexReader>,
}

/// Library errors rendered as `{"error": ...}` with a status by kind.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::UnknownDocument(_) => StatusCode::NOT_FOUND,
            e if e.is_invalid_input() => StatusCode::BAD_REQUEST,
            Error::AlreadyBuilt(_)
            | Error::IndexClosed
            | Error::IndexLocked(_)
            | Error::NotBuilt(_)
            | Error::Interrupted(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub fn build_app(index_dir: String) -> Result<Router> {
    // Load the committed index once at startup
    let reader = Arc::new(IndexReader::open(&index_dir)?);
    Ok(router(reader))
}

pub fn router(reader: Arc<IndexReader>) -> Router {
    let app_state = AppState { reader };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats_handler))
        .route("/search", get(search_handler))
        .route("/retrieve", post(retrieve_handler))
        .route("/rerank", post(rerank_handler))
        .route("/text", post(text_handler))
        .route("/doc/:docno", get(doc_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<Value> {
    let stats = state.reader.dictionary().collection_stats();
    Json(serde_json::json!({
        "meta": state.reader.meta(),
        "fields": state.reader.fields(),
        "total_docs": stats.total_docs,
        "total_terms": stats.total_terms,
        "avg_doc_length": stats.avg_doc_length,
    }))
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let start = std::time::Instant::now();
    let mut args = SimilarityArgs::new();
    for (key, value) in [("bm25.k1", params.k1), ("bm25.b", params.b), ("qld.mu", params.mu)] {
        if let Some(v) = value {
            args.insert(key.into(), v);
        }
    }
    let similarity = Similarity::from_name(&params.similarity, &args)?;
    let query = if params.parsed { SearchQuery::parse(&params.q)? } else { SearchQuery::text(params.q.clone()) };
    let fields: Vec<String> = params
        .fields
        .as_deref()
        .map(|f| f.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let top = state.reader.top_docs(&query, &similarity, params.k.min(MAX_K))?;
    let results = top
        .hits
        .into_iter()
        .enumerate()
        .map(|(rank, hit)| {
            let stored = fields
                .iter()
                .map(|f| {
                    let value = state.reader.documents().get_field(hit.ordinal, f);
                    (f.clone(), value.map(Value::from).unwrap_or(Value::Null))
                })
                .collect();
            SearchHit { rank, docno: hit.docno, score: hit.score, fields: stored }
        })
        .collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        similarity: similarity.to_string(),
        took_s: elapsed.as_secs_f64(),
        total_hits: top.total_hits,
        results,
    }))
}

pub async fn retrieve_handler(
    State(state): State<AppState>,
    Json(req): Json<RetrieveRequest>,
) -> ApiResult<Vec<Record>> {
    let similarity = Similarity::from_name(&req.similarity, &req.args)?;
    let mut retriever = Retriever::new(Arc::clone(&state.reader), similarity)?.include_fields(req.include_fields);
    if let Some(n) = req.num_results {
        retriever = retriever.num_results(n);
    }
    Ok(Json(retriever.transform(&req.rows)?))
}

pub async fn rerank_handler(
    State(state): State<AppState>,
    Json(req): Json<RerankRequest>,
) -> ApiResult<Vec<Record>> {
    let similarity = Similarity::from_name(&req.similarity, &req.args)?;
    let reranker = ReRanker::new(Arc::clone(&state.reader), similarity)?;
    Ok(Json(reranker.transform(&req.rows)?))
}

pub async fn text_handler(State(state): State<AppState>, Json(req): Json<TextRequest>) -> ApiResult<Vec<Record>> {
    let fields = match req.fields {
        FieldSelection::All => None,
        FieldSelection::Only(fields) => Some(fields),
    };
    let loader = TextLoader::new(Arc::clone(&state.reader), fields);
    Ok(Json(loader.transform(&req.rows)?))
}

pub async fn doc_handler(State(state): State<AppState>, Path(docno): Path<String>) -> ApiResult<Value> {
    let fields: serde_json::Map<String, Value> = state
        .reader
        .stored_fields(&docno)?
        .into_iter()
        .map(|(name, value)| (name, Value::from(value)))
        .collect();
    let mut obj = serde_json::json!({ "docno": docno, "fields": fields });
    if let Some(vector) = state.reader.doc_vector(&docno)? {
        let vector: serde_json::Map<String, Value> =
            vector.into_iter().map(|(term, tf)| (term, Value::from(tf))).collect();
        obj["vector"] = Value::Object(vector);
    }
    Ok(Json(obj))
}
