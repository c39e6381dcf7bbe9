//! services/dashboard/src/web/middleware.rs
//!
//! Session guards for the protected API and the dashboard pages.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::web::state::{AppState, Session};

pub const SESSION_COOKIE: &str = "session";

/// Extracts the session id from the `Cookie` header, if present.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

async fn live_session(state: &AppState, headers: &HeaderMap) -> Option<Arc<Session>> {
    let session_id = session_cookie(headers)?;
    let session = state.sessions.get(session_id).await;
    if session.is_none() {
        debug!("Rejected unknown or expired session");
        state.progress.forget(session_id);
    }
    session
}

/// Middleware that validates the session cookie for API routes.
///
/// If valid, inserts the `Arc<Session>` into request extensions for handlers to use.
/// If invalid, missing or expired, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = live_session(&state, req.headers())
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Middleware for page routes: without a live session, redirect to the sign-in view.
pub async fn guard_pages(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    match live_session(&state, req.headers()).await {
        Some(_) => next.run(req).await,
        None => Redirect::to("/").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; lang=en"),
        );
        assert_eq!(session_cookie(&headers), Some("abc123"));
    }

    #[test]
    fn ignores_lookalike_and_empty_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("old_session=x; session="),
        );
        assert_eq!(session_cookie(&headers), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }
}
