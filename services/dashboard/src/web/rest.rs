//! services/dashboard/src/web/rest.rs
//!
//! Contains the Axum handlers for the dashboard's own REST endpoints (progress,
//! profile, settings, notifications) and the master definition for the
//! OpenAPI specification.

use crate::error::{from_port, from_validation, HandlerError};
use crate::web::auth::{SessionResponse, SignInRequest, SignUpRequest, SignUpResponse};
use crate::web::crud::{checked_id, merge_patch};
use crate::web::refresh::{ProgressSnapshot, RefreshOutcome};
use crate::web::state::{AppState, Session};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};
use tracker_core::domain::{Notification, User, UserSettings};
use tracker_core::ports::PortError;
use tracker_core::reminders::due_soon_reminders;
use tracker_core::Validate;
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::signin_handler,
        crate::web::auth::signout_handler,
        progress_handler,
        get_me_handler,
        update_me_handler,
        get_settings_handler,
        update_settings_handler,
        delete_settings_handler,
        mark_read_handler,
        reminders_handler,
    ),
    components(
        schemas(
            SignInRequest,
            SignUpRequest,
            SessionResponse,
            SignUpResponse,
            ProgressStatus
        )
    ),
    tags(
        (name = "Academic Tracker Dashboard", description = "Progress views and proxied CRUD for the academic backend.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Progress
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Fresh,
    Superseded,
    Unavailable,
    Cached,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProgressQuery {
    /// Return the last committed snapshot without contacting the backend.
    #[serde(default)]
    pub cached: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse<'a> {
    pub status: ProgressStatus,
    pub snapshot: Option<&'a ProgressSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run a progress cycle for the signed-in user.
///
/// Answers with the per-subject totals and the assignment list annotated with
/// grades. When the backend cannot be reached, the last consistent snapshot is
/// returned alongside a 503. With `cached=true` only the last committed
/// snapshot is returned, which is what background refreshes after edits fill.
#[utoipa::path(
    get,
    path = "/api/progress",
    params(ProgressQuery),
    responses(
        (status = 200, description = "A fresh, superseded or cached snapshot"),
        (status = 401, description = "No live session"),
        (status = 404, description = "Nothing committed yet for a cached read"),
        (status = 503, description = "Backend unavailable; last good snapshot included")
    )
)]
pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<Session>>,
    Query(query): Query<ProgressQuery>,
) -> Response {
    if query.cached {
        let snapshot = state.progress.snapshot(&session.id).await;
        let status = if snapshot.is_some() {
            StatusCode::OK
        } else {
            StatusCode::NOT_FOUND
        };
        let body = ProgressResponse {
            status: ProgressStatus::Cached,
            snapshot: snapshot.as_deref(),
            error: None,
        };
        return (status, Json(body)).into_response();
    }

    let outcome = state.progress.refresh(&session.id, &session.auth).await;
    let (status, body) = match &outcome {
        RefreshOutcome::Fresh(snapshot) => (
            StatusCode::OK,
            ProgressResponse {
                status: ProgressStatus::Fresh,
                snapshot: Some(snapshot),
                error: None,
            },
        ),
        RefreshOutcome::Superseded(last_good) => (
            StatusCode::OK,
            ProgressResponse {
                status: ProgressStatus::Superseded,
                snapshot: last_good.as_deref(),
                error: None,
            },
        ),
        RefreshOutcome::Unavailable { error, last_good } => (
            match error {
                PortError::Unauthorized => StatusCode::UNAUTHORIZED,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            },
            ProgressResponse {
                status: ProgressStatus::Unavailable,
                snapshot: last_good.as_deref(),
                error: Some(error.to_string()),
            },
        ),
    };
    (status, Json(body)).into_response()
}

//=========================================================================================
// Profile
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "The signed-in user's profile"),
        (status = 401, description = "No live session")
    )
)]
pub async fn get_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<Session>>,
) -> Result<Json<User>, HandlerError> {
    state
        .users
        .get_by_id(&session.auth, &session.auth.user_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Failed to load profile {}: {}", session.auth.user_id, e);
            from_port(e)
        })
}

/// Partially update the signed-in user's profile.
#[utoipa::path(
    put,
    path = "/api/me",
    request_body(content_type = "application/json", description = "Profile fields to change"),
    responses(
        (status = 200, description = "The updated profile"),
        (status = 422, description = "The merged profile is invalid")
    )
)]
pub async fn update_me_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<Session>>,
    Json(patch): Json<Value>,
) -> Result<Json<User>, HandlerError> {
    let user_id = &session.auth.user_id;
    let current = state
        .users
        .get_by_id(&session.auth, user_id)
        .await
        .map_err(from_port)?;

    let merged: User = merge_patch(&current, patch)?;
    merged.validate().map_err(from_validation)?;

    let updated = state
        .users
        .update(&session.auth, user_id, &merged)
        .await
        .map_err(|e| {
            error!("Failed to update profile {}: {}", user_id, e);
            from_port(e)
        })?;
    info!("Updated profile {}", user_id);
    Ok(Json(updated))
}

//=========================================================================================
// Settings
//=========================================================================================

async fn current_settings(state: &AppState, session: &Session) -> Result<UserSettings, HandlerError> {
    let user_id = &session.auth.user_id;
    match state.settings.get_settings(&session.auth, user_id).await {
        Ok(settings) => Ok(settings),
        Err(PortError::NotFound(_)) => Ok(UserSettings::defaults_for(user_id.as_str())),
        Err(e) => {
            error!("Failed to load settings for {}: {}", user_id, e);
            Err(from_port(e))
        }
    }
}

/// Fetch the signed-in user's settings, falling back to defaults.
#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "The stored settings, or defaults when none exist")
    )
)]
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<Session>>,
) -> Result<Json<UserSettings>, HandlerError> {
    current_settings(&state, &session).await.map(Json)
}

#[utoipa::path(
    put,
    path = "/api/settings",
    request_body(content_type = "application/json", description = "Settings toggles to change"),
    responses(
        (status = 200, description = "The saved settings"),
        (status = 422, description = "Malformed settings")
    )
)]
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<Session>>,
    Json(patch): Json<Value>,
) -> Result<Json<UserSettings>, HandlerError> {
    let current = current_settings(&state, &session).await?;
    let merged: UserSettings = merge_patch(&current, patch)?;

    state
        .settings
        .save_settings(&session.auth, &merged)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Failed to save settings for {}: {}", session.auth.user_id, e);
            from_port(e)
        })
}

#[utoipa::path(
    delete,
    path = "/api/settings",
    responses(
        (status = 204, description = "Settings removed")
    )
)]
pub async fn delete_settings_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<Session>>,
) -> Result<StatusCode, HandlerError> {
    state
        .settings
        .delete_settings(&session.auth, &session.auth.user_id)
        .await
        .map_err(from_port)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Notifications
//=========================================================================================

#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "The notification, now marked read"),
        (status = 404, description = "No such notification")
    )
)]
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<Session>>,
    Path(id): Path<String>,
) -> Result<Json<Notification>, HandlerError> {
    let id = checked_id(&id)?;
    state
        .inbox
        .mark_as_read(&session.auth, id)
        .await
        .map(Json)
        .map_err(from_port)
}

/// Create reminders for assignments that are due soon.
///
/// Assignments already reminded about are skipped, so calling this repeatedly
/// is safe.
#[utoipa::path(
    post,
    path = "/api/notifications/reminders",
    responses(
        (status = 201, description = "The reminders that were created (possibly none)")
    )
)]
pub async fn reminders_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Arc<Session>>,
) -> Result<(StatusCode, Json<Vec<Notification>>), HandlerError> {
    let ctx = &session.auth;
    let (assignments, existing) = tokio::try_join!(
        state.assignments.list_by_user(ctx, &ctx.user_id),
        state.notifications.list_by_user(ctx, &ctx.user_id),
    )
    .map_err(|e| {
        error!("Failed to load reminder inputs for {}: {}", ctx.user_id, e);
        from_port(e)
    })?;

    let today = Utc::now().date_naive();
    let pending = due_soon_reminders(
        &assignments,
        &existing,
        today,
        state.config.reminder_window_days,
    );

    let created = try_join_all(
        pending
            .iter()
            .map(|reminder| state.notifications.create(ctx, reminder)),
    )
    .await
    .map_err(|e| {
        error!("Failed to create reminders for {}: {}", ctx.user_id, e);
        from_port(e)
    })?;

    info!("Created {} reminders for user {}", created.len(), ctx.user_id);
    Ok((StatusCode::CREATED, Json(created)))
}
