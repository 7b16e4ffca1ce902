//! Authentication routes

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::middleware::{current_session, LOGIN_PATH, SESSION_COOKIE_NAME};
use super::oauth::OAuthError;
use super::session::{PendingLoginStore, SessionService, SESSION_TTL_DAYS};
use crate::state::AppState;

/// Build cookie string with optional Secure flag
fn build_session_cookie(session_id: &str, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE_NAME,
        session_id,
        SESSION_TTL_DAYS * 24 * 60 * 60,
        secure_flag
    )
}

/// Build clear-cookie string with optional Secure flag
fn build_clear_cookie(secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
        SESSION_COOKIE_NAME, secure_flag
    )
}

fn server_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

/// Send the browser to the identity provider
pub async fn login(State(state): State<Arc<AppState>>) -> Response {
    let request = state.identity.authorization_request();

    let pending = PendingLoginStore::new(state.pool.clone());
    if let Err(e) = pending.save(&request.csrf_state, &request.pkce_verifier).await {
        error!("Failed to store login state: {}", e);
        return server_error("Failed to start login".to_string());
    }

    Redirect::to(&request.url).into_response()
}

/// Query parameters the provider sends back to /callback
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Finish a login and start a session
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(provider_error) = query.error {
        error!("Provider refused login: {}", provider_error);
        return server_error(format!("Login failed: {}", provider_error));
    }
    let (Some(code), Some(csrf_state)) = (query.code, query.state) else {
        return server_error("Login failed: missing code or state".to_string());
    };

    let pending = PendingLoginStore::new(state.pool.clone());
    let verifier = match pending.take(&csrf_state).await {
        Ok(Some(verifier)) => verifier,
        Ok(None) => {
            error!("Callback with unknown login state");
            return server_error(OAuthError::UnknownState.to_string());
        }
        Err(e) => {
            error!("Failed to read login state: {}", e);
            return server_error("Login failed".to_string());
        }
    };

    let user = match state.identity.exchange_code(&code, &verifier).await {
        Ok(user) => user,
        Err(e) => {
            error!("Login exchange failed: {}", e);
            return server_error(e.to_string());
        }
    };

    let sessions = SessionService::new(state.pool.clone());
    match sessions.create_session(&user.email, user.display_name()).await {
        Ok(session) => {
            info!("User signed in: {}", session.user_email);
            let cookie = build_session_cookie(&session.id, state.config.secure_cookies);
            ([(SET_COOKIE, cookie)], Redirect::to("/")).into_response()
        }
        Err(e) => {
            error!("Failed to create session: {}", e);
            server_error("Login failed".to_string())
        }
    }
}

/// Clear the session and go back to the login page
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        let service = SessionService::new(state.pool.clone());
        if let Err(e) = service.delete_session(cookie.value()).await {
            error!("Failed to delete session: {}", e);
        }
    }

    let clear_cookie = build_clear_cookie(state.config.secure_cookies);
    ([(SET_COOKIE, clear_cookie)], Redirect::to(LOGIN_PATH)).into_response()
}

/// Report whether the caller is signed in
pub async fn check_auth(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match current_session(&state, &headers).await {
        Some(session) => Json(json!({
            "authenticated": true,
            "name": session.display_name
        }))
        .into_response(),
        None => Json(json!({ "authenticated": false })).into_response(),
    }
}
