//! Gateway HTTP server.
//!
//! Exposes the knowledge base to clients as a small JSON API. Every route
//! sits behind the access-control middleware ([`crate::access`]).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/docs` | Ask a question (`{question, requestSessionId?, modelId?}`) |
//! | `GET`  | `/urls` | Current seed URLs and filters of the web data source |
//! | `POST` | `/web-urls` | Replace seed URLs and filters |
//! | `GET`  | `/models` | Live on-demand foundation models |
//! | `GET`  | `/models/catalog` | Built-in model catalog |
//! | `POST` | `/events/object-created` | Storage event hook; re-syncs the document data source |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! `POST /docs` always answers with the `{response, citation, sessionId}`
//! shape, including on failure. Every other error response is:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "at most 10 seed URLs are allowed, got 11" } }
//! ```
//!
//! Error codes: `bad_request` (400), `forbidden` (403), `throttled` (429),
//! `upstream_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kb_gateway_core::backend::{FoundationModelSummary, IngestionJob, KnowledgeBase};
use kb_gateway_core::catalog::{ModelInfo, MODEL_CATALOG};
use kb_gateway_core::conversation::QueryReply;
use kb_gateway_core::datasource::{UrlSettings, UrlUpdate};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::access::{self, AccessControl};
use crate::bedrock::BedrockClient;
use crate::config::Config;
use crate::ingest::{self, IngestTrigger, StorageEvent};
use crate::query::{self, QueryRequest};
use crate::sources;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    kb: Arc<dyn KnowledgeBase>,
}

/// Starts the gateway against the managed knowledge base.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let kb = Arc::new(BedrockClient::from_config(config)?);
    run_server_with_backend(config, kb).await
}

/// Starts the gateway with a caller-supplied [`KnowledgeBase`].
///
/// ```rust,no_run
/// use kb_gateway::bedrock::BedrockClient;
/// use kb_gateway::server::run_server_with_backend;
/// use std::sync::Arc;
///
/// # async fn example(config: &kb_gateway::config::Config) -> anyhow::Result<()> {
/// let kb = Arc::new(BedrockClient::from_config(config)?);
/// run_server_with_backend(config, kb).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with_backend(
    config: &Config,
    kb: Arc<dyn KnowledgeBase>,
) -> anyhow::Result<()> {
    let config = Arc::new(config.clone());
    let app = router(config.clone(), kb.clone())?;

    if config.ingest.schedule_secs > 0 {
        tokio::spawn(ingest::run_schedule(kb, config.clone()));
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "gateway listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Build the gateway router with access control, CORS and request tracing.
pub fn router(config: Arc<Config>, kb: Arc<dyn KnowledgeBase>) -> anyhow::Result<Router> {
    let access = AccessControl::from_config(&config.server)?;
    let state = AppState { config, kb };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/docs", post(handle_docs))
        .route("/urls", get(handle_get_urls))
        .route("/web-urls", post(handle_update_urls))
        .route("/models", get(handle_models))
        .route("/models/catalog", get(handle_model_catalog))
        .route("/events/object-created", post(handle_object_created))
        .route("/health", get(handle_health))
        .layer(middleware::from_fn_with_state(access, access::enforce))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"throttled"`).
    code: String,
    message: String,
}

/// Error type that converts into an axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
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
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Log an upstream failure and turn it into a 500.
fn upstream_error(operation: &str, err: anyhow::Error) -> AppError {
    tracing::error!(operation, error = %format!("{:#}", err), "upstream call failed");
    AppError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "upstream_error",
        format!("{:#}", err),
    )
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

// ============ POST /docs ============

async fn handle_docs(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> (StatusCode, Json<QueryReply>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "malformed question body");
            QueryRequest::default()
        }
    };
    let (status, reply) = query::ask(state.kb.as_ref(), &state.config, &request).await;
    (status, Json(reply))
}

// ============ GET /urls, POST /web-urls ============

async fn handle_get_urls(State(state): State<AppState>) -> Result<Json<UrlSettings>, AppError> {
    sources::read(state.kb.as_ref(), &state.config)
        .await
        .map(Json)
        .map_err(|e| upstream_error("GetDataSource", e))
}

async fn handle_update_urls(
    State(state): State<AppState>,
    payload: Result<Json<UrlUpdate>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(update) = payload.map_err(|e| bad_request(e.body_text()))?;
    sources::validate_update(&update).map_err(|e| bad_request(e.to_string()))?;

    sources::update(state.kb.as_ref(), &state.config, &update)
        .await
        .map(Json)
        .map_err(|e| upstream_error("UpdateDataSource", e))
}

// ============ GET /models, GET /models/catalog ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelListResponse<T: Serialize> {
    model_list: Vec<T>,
}

async fn handle_models(
    State(state): State<AppState>,
) -> Result<Json<ModelListResponse<FoundationModelSummary>>, AppError> {
    let models = state
        .kb
        .list_foundation_models()
        .await
        .map_err(|e| upstream_error("ListFoundationModels", e))?;
    Ok(Json(ModelListResponse { model_list: models }))
}

async fn handle_model_catalog() -> Json<ModelListResponse<&'static ModelInfo>> {
    Json(ModelListResponse {
        model_list: MODEL_CATALOG.iter().collect(),
    })
}

// ============ POST /events/object-created ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ingestion_job: Option<IngestionJob>,
}

async fn handle_object_created(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<StorageEvent>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(event) = payload.map_err(|e| bad_request(e.body_text()))?;

    if !event.has_object_created() {
        let body = EventResponse {
            status: "ignored",
            ingestion_job: None,
        };
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    let request_id = request_id(&headers);
    tracing::info!(
        keys = ?event.object_created_keys(),
        %request_id,
        "objects created"
    );

    let job = ingest::start_ingestion(
        state.kb.as_ref(),
        &state.config,
        IngestTrigger::ObjectCreated,
        &request_id,
    )
    .await
    .map_err(|e| upstream_error("StartIngestionJob", e))?;

    let body = EventResponse {
        status: "started",
        ingestion_job: Some(job),
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// The caller's request id, or a fresh one.
fn request_id(headers: &HeaderMap) -> String {
    ["x-amz-request-id", "x-request-id"]
        .iter()
        .find_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
