//! HTTP server for the browser client.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/get_content` | Select the next piece of content |
//! | `GET`  | `/get_custom_folders` | Local folders with file counts (`?refresh=true` bypasses the 60 s cache) |
//! | `POST` | `/update_credentials` | Save Reddit credentials and drop the current session |
//! | `GET`  | `/credentials/status` | Which credential fields are present |
//! | `GET`  | `/load_settings` | Saved client settings |
//! | `POST` | `/save_settings` | Persist client settings |
//! | `GET`  | `/cache` | Listing cache entries |
//! | `GET`  | `/media/content/*`, `/media/punishment/*` | Local media files |
//! | `GET`  | anything else | Static client assets from `[server].static_dir` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_eligible_source", "message": "no eligible source: no enabled subreddits" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `auth_error` | 401 |
//! | `no_eligible_source`, `invalid_collection_name` | 400 |
//! | `no_content_available` | 404 |
//! | `source_unavailable` | 502 |
//! | `storage_error`, `internal` | 500 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::catalog::{FolderCatalog, FolderKind, FolderListing};
use crate::config::Config;
use crate::connector_reddit::RedditGateway;
use crate::credentials::{CredentialStatus, CredentialStore, Credentials};
use crate::error::SelectionError;
use crate::listing_cache::{CacheEntryStats, ListingCache};
use crate::models::{ContentDescriptor, ContentRequest, SelectionRequest};
use crate::selection::SelectionEngine;
use crate::settings::{Settings, SettingsStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    engine: Arc<SelectionEngine>,
    credentials: CredentialStore,
    settings: SettingsStore,
}

impl AppState {
    /// Wire up the production gateway, caches, and stores from `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let gateway = Arc::new(RedditGateway::new(&config.reddit)?);
        let catalog = Arc::new(FolderCatalog::from_config(&config.content)?);
        let engine = SelectionEngine::new(gateway, Arc::new(ListingCache::new()), catalog);
        Ok(Self::new(config, engine))
    }

    /// State around an already-built engine (custom gateways, seeded RNG).
    pub fn new(config: &Config, engine: SelectionEngine) -> Self {
        Self {
            config: Arc::new(config.clone()),
            engine: Arc::new(engine),
            credentials: CredentialStore::new(&config.reddit.credentials_path),
            settings: SettingsStore::new(&config.settings.path),
        }
    }

    pub fn engine(&self) -> &Arc<SelectionEngine> {
        &self.engine
    }
}

/// Build the router. Media directories are resolved (and created) here.
pub fn router(state: AppState) -> anyhow::Result<Router> {
    let catalog = state.engine.catalog();
    let content_dir = catalog.resolve_base_dir(FolderKind::Content)?;
    let punishment_dir = catalog.resolve_base_dir(FolderKind::Punishment)?;
    info!(
        content = %content_dir.display(),
        punishment = %punishment_dir.display(),
        "serving local media"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_dir = state.config.server.static_dir.clone();

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/get_content", post(handle_get_content))
        .route("/get_custom_folders", get(handle_get_custom_folders))
        .route("/update_credentials", post(handle_update_credentials))
        .route("/credentials/status", get(handle_credentials_status))
        .route("/load_settings", get(handle_load_settings))
        .route("/save_settings", post(handle_save_settings))
        .route("/cache", get(handle_cache))
        .nest_service("/media/content", ServeDir::new(content_dir))
        .nest_service("/media/punishment", ServeDir::new(punishment_dir))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

/// Starts the HTTP server on `[server].bind` with the production gateway.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    run_server_with_state(config, AppState::from_config(config)?).await
}

/// Starts the HTTP server with caller-supplied state.
pub async fn run_server_with_state(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = router(state)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Content rotator listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;
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

impl From<SelectionError> for AppError {
    fn from(err: SelectionError) -> Self {
        let status = match &err {
            SelectionError::Auth(_) => StatusCode::UNAUTHORIZED,
            SelectionError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
            SelectionError::NoEligibleSource(_) | SelectionError::InvalidCollectionName(_) => {
                StatusCode::BAD_REQUEST
            }
            SelectionError::NoContentAvailable(_) => StatusCode::NOT_FOUND,
            SelectionError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(code = err.code(), error = %err, "request failed");
        } else {
            warn!(code = err.code(), error = %err, "request rejected");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "internal error");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{:#}", err),
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

// ============ POST /get_content ============

async fn handle_get_content(
    State(state): State<AppState>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<Json<ContentDescriptor>, AppError> {
    let Json(body) = body.map_err(|e| bad_request(e.body_text()))?;
    let req = SelectionRequest::try_from(body).map_err(|e| bad_request(e.to_string()))?;
    info!(
        mode = ?req.mode,
        favorites = req.favorites.len(),
        punishments = req.punishments.len(),
        history = req.history.len(),
        "content request"
    );
    let descriptor = state.engine.select(&req).await?;
    Ok(Json(descriptor))
}

// ============ GET /get_custom_folders ============

#[derive(Deserialize)]
struct FoldersQuery {
    #[serde(default)]
    refresh: bool,
}

async fn handle_get_custom_folders(
    State(state): State<AppState>,
    Query(query): Query<FoldersQuery>,
) -> Result<Json<FolderListing>, AppError> {
    Ok(Json(state.engine.catalog().list_all(query.refresh)?))
}

// ============ Credentials ============

#[derive(Deserialize)]
struct CredentialsUpdate {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
    #[serde(default)]
    user_agent: Option<String>,
}

#[derive(Serialize)]
struct CredentialsUpdated {
    status: &'static str,
    message: String,
    #[serde(flatten)]
    credentials: CredentialStatus,
}

async fn handle_update_credentials(
    State(state): State<AppState>,
    body: Result<Json<CredentialsUpdate>, JsonRejection>,
) -> Result<Json<CredentialsUpdated>, AppError> {
    let Json(update) = body.map_err(|e| bad_request(e.body_text()))?;
    let creds = Credentials::new(update.client_id, update.client_secret, update.user_agent);
    if !creds.is_reset() && !creds.is_complete() {
        return Err(bad_request(
            "client_id and client_secret must both be set, or both be empty to reset",
        ));
    }

    state.credentials.save(&creds).map_err(internal)?;
    state.engine.gateway().invalidate_session();

    let message = if creds.is_reset() {
        "Credentials reset".to_string()
    } else {
        "Credentials updated".to_string()
    };
    Ok(Json(CredentialsUpdated {
        status: "success",
        message,
        credentials: CredentialStatus::from(&creds),
    }))
}

async fn handle_credentials_status(
    State(state): State<AppState>,
) -> Result<Json<CredentialStatus>, AppError> {
    let creds = state.credentials.load().map_err(internal)?;
    Ok(Json(CredentialStatus::from(&creds)))
}

// ============ Settings ============

async fn handle_load_settings(State(state): State<AppState>) -> Result<Json<Settings>, AppError> {
    Ok(Json(state.settings.load().map_err(internal)?))
}

async fn handle_save_settings(
    State(state): State<AppState>,
    body: Result<Json<Settings>, JsonRejection>,
) -> Result<Json<Settings>, AppError> {
    let Json(settings) = body.map_err(|e| bad_request(e.body_text()))?;
    Ok(Json(state.settings.save(settings).map_err(internal)?))
}

// ============ GET /cache ============

#[derive(Serialize)]
struct CacheResponse {
    count: usize,
    entries: Vec<CacheEntryStats>,
}

async fn handle_cache(State(state): State<AppState>) -> Json<CacheResponse> {
    let entries = state.engine.listings().stats(Utc::now());
    Json(CacheResponse {
        count: entries.len(),
        entries,
    })
}
