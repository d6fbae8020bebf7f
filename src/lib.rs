//! Stockroom API Library
//!
//! CSV bulk import of products, inventory and orders, gated by role-based
//! permission evaluation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{
    extract::DefaultBodyLimit,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthConfig, AuthRouterExt, AuthService, AuthState, SeaOrmPermissionSource, SessionRegistry};
use crate::services::imports::{ImportService, SeaOrmImportStore};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub sessions: Arc<SessionRegistry>,
    pub imports: Arc<ImportService>,
}

impl AppState {
    /// Wires the database-backed services for one connection pool
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let sessions = Arc::new(
            SessionRegistry::new(Arc::new(SeaOrmPermissionSource::new(db.clone())))
                .with_ttl(Duration::from_secs(config.session_ttl_secs)),
        );
        let imports = Arc::new(ImportService::new(
            Arc::new(SeaOrmImportStore::new(db.clone())),
            config.import.clone(),
        ));

        Self {
            db,
            config,
            auth,
            sessions,
            imports,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            auth: self.auth.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`
pub fn api_v1_routes(state: &AppState) -> Router<AppState> {
    let imports = Router::new()
        .route("/imports", post(handlers::imports::import_csv))
        .route("/imports/detect", post(handlers::imports::detect_format))
        .layer(DefaultBodyLimit::max(state.config.max_import_body_size))
        .with_auth(state.auth_state());

    let session = Router::new()
        .route("/session", get(handlers::session::current_session))
        .route(
            "/session/permissions",
            get(handlers::session::check_permission),
        )
        .route("/session/refresh", post(handlers::session::refresh_session))
        .with_auth(state.auth_state());

    Router::new()
        // Templates are public downloads
        .route(
            "/imports/templates/:kind",
            get(handlers::imports::download_template),
        )
        .merge(imports)
        .merge(session)
}

/// Full application router with health, API and HTTP middleware
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes(&state))
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// Request logging middleware
async fn request_logging_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    tracing::debug!(method = %method, uri = %uri, "Incoming request");

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
