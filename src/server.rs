//! HTTP API server.
//!
//! Thin axum plumbing over the orchestrator, the quiz pass-through, and the
//! history reads. Handlers parse the request, build a [`RequestContext`],
//! call into the library, and map the outcome to a status code.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/analyze` | Multipart upload, repeated `documents` fields, optional `collectionId` |
//! | `POST` | `/generate-quiz` | JSON `{text}` forwarded to the engine |
//! | `GET`  | `/documents` | Caller's documents, optional `?collectionId=` filter |
//! | `GET`  | `/documents/{id}/analysis` | Latest analysis of one document |
//!
//! # Identity
//!
//! Callers are authenticated upstream. The owner id arrives in the trusted
//! `X-User-Id` header; requests without it get `401`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "no documents uploaded" },
//!   "correlationId": "…" }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `internal_error` (500), `service_unavailable` (503).
//!
//! Every response carries the request's correlation id in `X-Request-ID`,
//! taken from the inbound header or generated.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use doclens_core::error::{EngineError, ErrorCategory};
use doclens_core::models::{AnalysisResult, Scope};

use crate::analyze::{Analyzer, RequestContext};
use crate::config::Config;
use crate::engine::{HttpEngineClient, RemoteAnalysisClient};
use crate::history;
use crate::quiz::{self, QuizError};
use crate::source::{MemoryContent, UploadedFile};
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const USER_HEADER: &str = "x-user-id";

/// Multipart framing allowance on top of the payload limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    analyzer: Analyzer,
    store: Arc<SqliteStore>,
}

impl AppState {
    pub fn new(config: Config, store: SqliteStore, engine: Arc<dyn RemoteAnalysisClient>) -> Self {
        let store = Arc::new(store);
        let analyzer = Analyzer::new(store.clone(), engine, config.limits.allow_list());
        Self {
            config: Arc::new(config),
            analyzer,
            store,
        }
    }
}

/// Correlation id of the current request, set by the middleware.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

/// Build the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    let body_limit = (state.config.limits.max_upload_bytes as usize).saturating_add(MULTIPART_OVERHEAD);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([CORRELATION_HEADER]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/analyze", post(handle_analyze))
        .route("/generate-quiz", post(handle_quiz))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{id}/analysis", get(handle_latest_analysis))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(middleware::from_fn(correlation))
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Applies migrations and builds the engine client once; both are shared by
/// every request. Runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let engine = Arc::new(HttpEngineClient::new(&config.engine)?);
    let state = AppState::new(config.clone(), SqliteStore::new(pool), engine);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, engine = %config.engine.base_url, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

// ============ Middleware ============

async fn correlation(mut req: Request, next: Next) -> Response {
    let cid = req
        .headers()
        .get(&CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut().insert(CorrelationId(cid.clone()));
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&cid) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

fn owner_of(headers: &HeaderMap, cid: &str) -> Result<String, AppError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", "missing user identity", cid))
}

// ============ Error response ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: ErrorDetail,
    correlation_id: String,
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
    correlation_id: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>, cid: &str) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            correlation_id: cid.to_string(),
        }
    }

    fn category(status: StatusCode, category: ErrorCategory, cid: &str) -> Self {
        Self::new(status, category.code(), category.message(), cid)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
            correlation_id: self.correlation_id,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>, cid: &str) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message, cid)
}

fn internal(cid: &str) -> AppError {
    AppError::category(StatusCode::INTERNAL_SERVER_ERROR, ErrorCategory::InternalError, cid)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DataBody<T: Serialize> {
    data: T,
    correlation_id: String,
}

fn data<T: Serialize>(data: T, cid: String) -> Json<DataBody<T>> {
    Json(DataBody {
        data,
        correlation_id: cid,
    })
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

// ============ POST /analyze ============

#[derive(Serialize)]
struct ResultsPayload {
    results: Vec<AnalysisResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DegradedBody {
    error: ErrorDetail,
    data: ResultsPayload,
    correlation_id: String,
}

async fn handle_analyze(
    State(state): State<AppState>,
    Extension(CorrelationId(cid)): Extension<CorrelationId>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let owner = owner_of(&headers, &cid)?;
    let (files, scope) = read_upload(multipart, &state.config, &cid).await?;

    let ctx = RequestContext {
        correlation_id: cid.clone(),
        owner,
        scope,
    };

    // Dropped with the handler on client disconnect.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let outcome = state.analyzer.analyze_files(&ctx, files, &cancel).await;
    let payload = ResultsPayload {
        results: outcome.results,
    };

    if outcome.degraded {
        tracing::warn!(cid = %cid, files = payload.results.len(), "every file failed to reach the engine");
        let category = ErrorCategory::ServiceUnavailable;
        let body = DegradedBody {
            error: ErrorDetail {
                code: category.code().to_string(),
                message: category.message().to_string(),
            },
            data: payload,
            correlation_id: cid,
        };
        return Ok((StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response());
    }

    Ok(data(payload, cid).into_response())
}

/// Collect `documents` file fields and the optional `collectionId`.
async fn read_upload(
    mut multipart: Multipart,
    config: &Config,
    cid: &str,
) -> Result<(Vec<UploadedFile>, Scope), AppError> {
    let limits = &config.limits;
    let mut files = Vec::new();
    let mut total: u64 = 0;
    let mut collection_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e.body_text()), cid))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("documents") => {
                if files.len() >= limits.max_files {
                    return Err(bad_request(
                        format!("at most {} documents per request", limits.max_files),
                        cid,
                    ));
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("invalid multipart body: {}", e.body_text()), cid))?;
                total += bytes.len() as u64;
                if total > limits.max_upload_bytes {
                    return Err(bad_request(
                        format!("upload exceeds {} bytes", limits.max_upload_bytes),
                        cid,
                    ));
                }
                files.push(UploadedFile::new(file_name, MemoryContent::new(bytes)));
            }
            Some("collectionId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid multipart body: {}", e.body_text()), cid))?;
                collection_id = parse_collection_id(&text, cid)?;
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(bad_request("no documents uploaded", cid));
    }
    Ok((files, Scope::from_collection(collection_id)))
}

fn parse_collection_id(raw: &str, cid: &str) -> Result<Option<i64>, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| bad_request("collectionId must be an integer", cid))
}

// ============ POST /generate-quiz ============

#[derive(Deserialize)]
struct QuizRequest {
    text: String,
}

async fn handle_quiz(
    State(state): State<AppState>,
    Extension(CorrelationId(cid)): Extension<CorrelationId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    owner_of(&headers, &cid)?;
    let request: QuizRequest = serde_json::from_slice(&body)
        .map_err(|_| bad_request("body must be JSON with a text field", &cid))?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let quiz = quiz::generate_quiz(
        state.analyzer.engine().as_ref(),
        &request.text,
        state.config.limits.quiz_max_chars,
        &cid,
        &cancel,
    )
    .await
    .map_err(|e| match e {
        QuizError::EmptyText | QuizError::TextTooLarge { .. } => bad_request(e.to_string(), &cid),
        QuizError::Engine(EngineError::Decode(_)) => internal(&cid),
        QuizError::Engine(_) => AppError::category(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::ServiceUnavailable,
            &cid,
        ),
    })?;

    Ok(data(quiz, cid).into_response())
}

// ============ GET /documents ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    collection_id: Option<String>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
    Extension(CorrelationId(cid)): Extension<CorrelationId>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let owner = owner_of(&headers, &cid)?;
    let scope = match query.collection_id.as_deref() {
        Some(raw) => parse_collection_id(raw, &cid)?.map(Scope::Collection),
        None => None,
    };

    let documents = history::list_documents(state.store.as_ref(), &owner, scope)
        .await
        .map_err(|e| {
            tracing::error!(cid = %cid, error = %e, "failed to list documents");
            internal(&cid)
        })?;

    Ok(data(serde_json::json!({ "documents": documents }), cid).into_response())
}

// ============ GET /documents/{id}/analysis ============

async fn handle_latest_analysis(
    State(state): State<AppState>,
    Extension(CorrelationId(cid)): Extension<CorrelationId>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let owner = owner_of(&headers, &cid)?;

    let detail = history::latest_analysis(state.store.as_ref(), &owner, &id)
        .await
        .map_err(|e| {
            if e.to_string().contains("not found") {
                AppError::new(StatusCode::NOT_FOUND, "not_found", "document not found", &cid)
            } else {
                tracing::error!(cid = %cid, error = %e, "failed to load analysis");
                internal(&cid)
            }
        })?;

    Ok(data(detail, cid).into_response())
}
