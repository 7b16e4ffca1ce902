//! Authentication middleware

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tracing::{debug, error};

use crate::auth::session::{Session, SessionService};
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "file_index_session";

/// Page unauthenticated browsers are sent to
pub const LOGIN_PATH: &str = "/login";

/// User context extracted from authentication
#[derive(Clone, Debug)]
pub struct UserContext {
    pub email: String,
    pub display_name: String,
}

impl From<Session> for UserContext {
    fn from(session: Session) -> Self {
        Self {
            email: session.user_email,
            display_name: session.display_name,
        }
    }
}

/// Resolve the session named by the request's cookie, if it is still valid
pub async fn current_session(state: &AppState, headers: &HeaderMap) -> Option<Session> {
    let jar = CookieJar::from_headers(headers);
    let session_id = jar.get(SESSION_COOKIE_NAME)?.value().to_string();

    let service = SessionService::new(state.pool.clone());
    match service.validate_session(&session_id).await {
        Ok(session) => session,
        Err(e) => {
            error!("Session lookup failed: {}", e);
            None
        }
    }
}

/// Require a signed-in user; anyone else is redirected to the login page
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match current_session(&state, request.headers()).await {
        Some(session) => {
            request.extensions_mut().insert(UserContext::from(session));
            next.run(request).await
        }
        None => {
            debug!(
                "No session for {}, redirecting to login",
                request.uri().path()
            );
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}
