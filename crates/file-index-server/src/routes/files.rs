//! File indexing and browsing routes

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use file_index::{build_tree, reindex, IndexError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::auth::middleware::UserContext;
use crate::state::AppState;

/// Body of POST /index_files
#[derive(Debug, Default, Deserialize)]
pub struct IndexFilesRequest {
    pub path: Option<String>,
}

fn index_error(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(json!({
            "status": "error",
            "message": message
        })),
    )
        .into_response()
}

/// Walk a directory and replace the caller's stored files with what was found
pub async fn index_files(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    body: Bytes,
) -> Response {
    let request: IndexFilesRequest = if body.is_empty() {
        IndexFilesRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => return index_error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    };

    let Some(path) = request
        .path
        .or_else(|| state.config.default_index_path.clone())
    else {
        return index_error(
            StatusCode::BAD_REQUEST,
            "No path given and no default index path configured".to_string(),
        );
    };

    match reindex(state.store.as_ref(), &path, &ctx.email).await {
        Ok(summary) => Json(json!({
            "status": "success",
            "message": format!("Indexed {} files", summary.count),
            "files_count": summary.count
        }))
        .into_response(),
        Err(e) => {
            error!("Indexing {} for {} failed: {}", path, ctx.email, e);
            index_error(e.status_code(), e.to_string())
        }
    }
}

/// Search parameters for GET /search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// All of the caller's files as a folder tree
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
) -> Result<Response, IndexError> {
    let records = state
        .store
        .list_user_files(&ctx.email)
        .await
        .inspect_err(|e| error!("Listing files for {} failed: {}", ctx.email, e))?;

    Ok(Json(build_tree(&records, None)).into_response())
}

/// The caller's files whose name or folder contains `q`, as a folder tree
pub async fn search_files(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<UserContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, IndexError> {
    let records = state
        .store
        .list_user_files(&ctx.email)
        .await
        .inspect_err(|e| error!("Searching files for {} failed: {}", ctx.email, e))?;

    Ok(Json(build_tree(&records, Some(&query.q))).into_response())
}
