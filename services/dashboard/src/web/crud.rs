//! services/dashboard/src/web/crud.rs
//!
//! Generic CRUD routes for one entity collection.
//!
//! Every collection gets the same six endpoints under `/api/<segment>`. Writes
//! are validated locally first so a malformed entity never reaches the backend,
//! and writes to the collections feeding the progress views schedule a refresh.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{error, info};
use tracker_core::domain::Entity;
use tracker_core::ports::{EntityService, PortError};
use tracker_core::Validate;

use crate::error::{from_port, from_validation, HandlerError};
use crate::web::state::{AppState, Session};

/// An entity that can be served through [`CrudRoutes`].
pub trait CrudEntity: Entity + Validate + Serialize + DeserializeOwned {}

impl<T> CrudEntity for T where T: Entity + Validate + Serialize + DeserializeOwned {}

type ServiceFor<T> = fn(&AppState) -> Arc<dyn EntityService<T>>;

pub struct CrudRoutes<T> {
    segment: &'static str,
    service: ServiceFor<T>,
    refreshes_progress: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for CrudRoutes<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CrudRoutes<T> {}

impl<T: CrudEntity> CrudRoutes<T> {
    pub fn new(segment: &'static str, service: ServiceFor<T>) -> Self {
        Self {
            segment,
            service,
            refreshes_progress: false,
            _entity: PhantomData,
        }
    }

    /// Mutations through these routes schedule a progress refresh.
    pub fn refreshes_progress(mut self) -> Self {
        self.refreshes_progress = true;
        self
    }

    pub fn router(self) -> Router<Arc<AppState>> {
        let r = self;
        let collection = format!("/api/{}", r.segment);
        let all = format!("/api/{}/all", r.segment);
        let item = format!("/api/{}/{{id}}", r.segment);

        Router::new()
            .route(
                &collection,
                get(
                    move |State(state): State<Arc<AppState>>,
                          Extension(session): Extension<Arc<Session>>| {
                        list_mine(r, state, session)
                    },
                )
                .post(
                    move |State(state): State<Arc<AppState>>,
                          Extension(session): Extension<Arc<Session>>,
                          Json(entity): Json<T>| {
                        create(r, state, session, entity)
                    },
                ),
            )
            .route(
                &all,
                get(
                    move |State(state): State<Arc<AppState>>,
                          Extension(session): Extension<Arc<Session>>| {
                        list_all(r, state, session)
                    },
                ),
            )
            .route(
                &item,
                get(
                    move |State(state): State<Arc<AppState>>,
                          Extension(session): Extension<Arc<Session>>,
                          Path(id): Path<String>| { get_one(r, state, session, id) },
                )
                .put(
                    move |State(state): State<Arc<AppState>>,
                          Extension(session): Extension<Arc<Session>>,
                          Path(id): Path<String>,
                          Json(patch): Json<Value>| {
                        update(r, state, session, id, patch)
                    },
                )
                .delete(
                    move |State(state): State<Arc<AppState>>,
                          Extension(session): Extension<Arc<Session>>,
                          Path(id): Path<String>| { delete(r, state, session, id) },
                ),
            )
    }

    fn failure(&self, action: &str, err: PortError) -> HandlerError {
        error!("Failed to {} {}: {}", action, T::KIND, err);
        from_port(err)
    }

    fn after_mutation(&self, state: &AppState, session: &Session) {
        if self.refreshes_progress {
            state
                .progress
                .schedule(session.id.clone(), session.auth.clone());
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

async fn list_mine<T: CrudEntity>(
    r: CrudRoutes<T>,
    state: Arc<AppState>,
    session: Arc<Session>,
) -> Result<Json<Vec<T>>, HandlerError> {
    (r.service)(&state)
        .list_by_user(&session.auth, &session.auth.user_id)
        .await
        .map(Json)
        .map_err(|e| r.failure("list", e))
}

async fn list_all<T: CrudEntity>(
    r: CrudRoutes<T>,
    state: Arc<AppState>,
    session: Arc<Session>,
) -> Result<Json<Vec<T>>, HandlerError> {
    (r.service)(&state)
        .list_all(&session.auth)
        .await
        .map(Json)
        .map_err(|e| r.failure("list", e))
}

async fn get_one<T: CrudEntity>(
    r: CrudRoutes<T>,
    state: Arc<AppState>,
    session: Arc<Session>,
    id: String,
) -> Result<Json<T>, HandlerError> {
    let id = checked_id(&id)?;
    (r.service)(&state)
        .get_by_id(&session.auth, id)
        .await
        .map(Json)
        .map_err(|e| r.failure("fetch", e))
}

async fn create<T: CrudEntity>(
    r: CrudRoutes<T>,
    state: Arc<AppState>,
    session: Arc<Session>,
    mut entity: T,
) -> Result<(StatusCode, Json<T>), HandlerError> {
    entity.set_owner(&session.auth.user_id);
    entity.validate().map_err(from_validation)?;

    let created = (r.service)(&state)
        .create(&session.auth, &entity)
        .await
        .map_err(|e| r.failure("create", e))?;

    info!("Created {} {}", T::KIND, created.id());
    r.after_mutation(&state, &session);
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update<T: CrudEntity>(
    r: CrudRoutes<T>,
    state: Arc<AppState>,
    session: Arc<Session>,
    id: String,
    patch: Value,
) -> Result<Json<T>, HandlerError> {
    let id = checked_id(&id)?;
    let service = (r.service)(&state);
    let current = service
        .get_by_id(&session.auth, id)
        .await
        .map_err(|e| r.failure("fetch", e))?;

    let merged: T = merge_patch(&current, patch)?;
    merged.validate().map_err(from_validation)?;

    let updated = service
        .update(&session.auth, id, &merged)
        .await
        .map_err(|e| r.failure("update", e))?;

    info!("Updated {} {}", T::KIND, id);
    r.after_mutation(&state, &session);
    Ok(Json(updated))
}

async fn delete<T: CrudEntity>(
    r: CrudRoutes<T>,
    state: Arc<AppState>,
    session: Arc<Session>,
    id: String,
) -> Result<StatusCode, HandlerError> {
    let id = checked_id(&id)?;
    (r.service)(&state)
        .delete(&session.auth, id)
        .await
        .map_err(|e| r.failure("delete", e))?;

    info!("Deleted {} {}", T::KIND, id);
    r.after_mutation(&state, &session);
    Ok(StatusCode::NO_CONTENT)
}

/// Rejects ids that would not name a single backend record.
pub fn checked_id(id: &str) -> Result<&str, HandlerError> {
    let malformed = id.is_empty()
        || id == "."
        || id == ".."
        || id.chars().any(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_control());
    if malformed {
        return Err((StatusCode::BAD_REQUEST, format!("Malformed id: {:?}", id)));
    }
    Ok(id)
}

//=========================================================================================
// Partial Updates
//=========================================================================================

// Fields a partial update may not touch.
const PINNED_FIELDS: [&str; 2] = ["id", "ownerRef"];

/// Applies the top-level fields of a JSON object onto the current value.
pub fn merge_patch<T>(current: &T, patch: Value) -> Result<T, HandlerError>
where
    T: Serialize + DeserializeOwned,
{
    let unprocessable = |msg: String| (StatusCode::UNPROCESSABLE_ENTITY, msg);

    let Value::Object(patch) = patch else {
        return Err(unprocessable("Update body must be a JSON object".to_string()));
    };

    let mut base = serde_json::to_value(current)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if let Value::Object(fields) = &mut base {
        for (key, value) in patch {
            if !PINNED_FIELDS.contains(&key.as_str()) {
                fields.insert(key, value);
            }
        }
    }

    serde_json::from_value(base).map_err(|e| unprocessable(format!("Invalid update: {}", e)))
}
