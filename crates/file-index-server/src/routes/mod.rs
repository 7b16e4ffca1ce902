//! HTTP routing

pub mod files;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth;
use crate::auth::middleware::require_session;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins());

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/login", get(auth::routes::login))
        .route("/callback", get(auth::routes::callback))
        .route("/logout", get(auth::routes::logout))
        .route("/check_auth", get(auth::routes::check_auth))
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .with_state(state.clone());

    // Session-gated routes, unauthenticated callers are sent to /login
    let protected_routes = Router::new()
        .route_service(
            "/",
            ServeFile::new(state.config.static_dir.join("index.html")),
        )
        .route("/index_files", post(files::index_files))
        .route("/files", get(files::list_files))
        .route("/search", get(files::search_files))
        .layer(from_fn_with_state(state.clone(), require_session))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.store.ping().await {
        Ok(()) => Ok(Json(serde_json::json!({
            "status": "healthy",
            "database": state.store.backend_name(),
            "version": env!("CARGO_PKG_VERSION")
        }))),
        Err(e) => {
            warn!("Health check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
