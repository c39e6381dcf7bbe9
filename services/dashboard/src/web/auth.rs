//! services/dashboard/src/web/auth.rs
//!
//! Authentication endpoints for sign-up, sign-in and sign-out.
//!
//! Credentials are checked by the academic backend. The dashboard keeps the
//! issued bearer token server-side in a session and hands the browser only an
//! opaque session cookie.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracker_core::domain::{AuthContext, BearerToken, UserRole};
use tracker_core::ports::{Credentials, PortError, SignUp};
use utoipa::ToSchema;

use crate::error::{from_port, HandlerError};
use crate::web::middleware::{session_cookie, SESSION_COOKIE};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub role: Option<UserRole>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub display_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub user_id: String,
    pub email: String,
}

fn session_set_cookie(session_id: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        max_age_secs.max(0)
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account on the backend
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = SignUpResponse),
        (status = 400, description = "Rejected by the backend"),
        (status = 502, description = "Backend unavailable")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Email and password are required.".to_string(),
        ));
    }

    let user = state
        .auth
        .sign_up(&SignUp {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            password: req.password,
            role: req.role.unwrap_or_default(),
        })
        .await
        .map_err(|e| {
            error!("Sign-up failed: {}", e);
            from_port(e)
        })?;

    info!("Created account {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user_id: user.id,
            email: user.email,
        }),
    ))
}

/// POST /auth/signin - Exchange credentials for a session cookie
#[utoipa::path(
    post,
    path = "/auth/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 502, description = "Backend unavailable")
    )
)]
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let credentials = Credentials {
        email: req.email,
        password: req.password,
    };

    let raw_token = state.auth.sign_in(&credentials).await.map_err(|e| match e {
        PortError::Unauthorized | PortError::NotFound(_) | PortError::Invalid(_) => (
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        ),
        other => {
            error!("Sign-in failed: {}", other);
            from_port(other)
        }
    })?;

    let claims = state.tokens.decode(&raw_token).map_err(|e| {
        error!("Backend issued an unreadable token: {}", e);
        (
            StatusCode::BAD_GATEWAY,
            "Backend issued an unreadable token".to_string(),
        )
    })?;

    let now = Utc::now();
    let expires_at = match claims.expires_at {
        Some(token_expiry) => token_expiry.min(now + state.config.session_ttl),
        None => now + state.config.session_ttl,
    };
    if expires_at <= now {
        return Err((StatusCode::UNAUTHORIZED, "Token already expired".to_string()));
    }

    let auth = AuthContext {
        user_id: claims.user_id,
        display_name: claims.display_name,
        token: BearerToken::new(raw_token),
    };
    let session = state.sessions.open(auth, expires_at).await;
    info!("User {} signed in", session.auth.user_id);

    // Warm the progress views so the dashboard has data on first load.
    state
        .progress
        .schedule(session.id.clone(), session.auth.clone());

    let cookie = session_set_cookie(&session.id, (expires_at - now).num_seconds());
    let response = SessionResponse {
        user_id: session.auth.user_id.clone(),
        display_name: session.auth.display_name.clone(),
        expires_at,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/signout - End the session
#[utoipa::path(
    post,
    path = "/auth/signout",
    responses(
        (status = 200, description = "Signed out; the session cookie is cleared")
    )
)]
pub async fn signout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(session_id) = session_cookie(&headers) {
        if let Some(session) = state.sessions.close(session_id).await {
            state.progress.forget(&session.id);
            if let Err(e) = state.auth.sign_out(&session.auth).await {
                warn!("Backend sign-out for user {} failed: {}", session.auth.user_id, e);
            }
            info!("User {} signed out", session.auth.user_id);
        }
    }

    (
        StatusCode::OK,
        [(header::SET_COOKIE, session_set_cookie("", 0))],
    )
}
