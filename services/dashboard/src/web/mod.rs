pub mod auth;
pub mod crud;
pub mod middleware;
pub mod refresh;
pub mod rest;
pub mod state;

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::middleware as axum_middleware;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracker_core::domain::{
    Assignment, Event, Grade, Notification, Semester, Subject, Teacher, TimetableEntry, User,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use crud::CrudRoutes;
pub use middleware::{guard_pages, require_auth};
pub use state::AppState;

use auth::{signin_handler, signout_handler, signup_handler};
use rest::{
    delete_settings_handler, get_me_handler, get_settings_handler, mark_read_handler,
    progress_handler, reminders_handler, update_me_handler, update_settings_handler, ApiDoc,
};

/// Dashboard pages that require a signed-in user. All of them serve the SPA shell.
pub const GUARDED_PAGES: [&str; 10] = [
    "/dashboard",
    "/grades",
    "/assignments",
    "/subjects",
    "/semesters",
    "/teachers",
    "/agenda",
    "/profile",
    "/settings",
    "/help",
];

/// Builds the complete application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let config = state.config.clone();
    let shell = config.static_dir.join("index.html");

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/signin", post(signin_handler))
        .route("/auth/signout", post(signout_handler))
        .route_service("/", ServeFile::new(&shell));

    // Protected API routes (401 without a session)
    let api_routes = Router::new()
        .route("/api/progress", get(progress_handler))
        .route("/api/me", get(get_me_handler).put(update_me_handler))
        .route(
            "/api/settings",
            get(get_settings_handler)
                .put(update_settings_handler)
                .delete(delete_settings_handler),
        )
        .route("/api/notifications/{id}/read", put(mark_read_handler))
        .route("/api/notifications/reminders", post(reminders_handler))
        .merge(
            CrudRoutes::<Subject>::new("subjects", |s| s.subjects.clone())
                .refreshes_progress()
                .router(),
        )
        .merge(
            CrudRoutes::<Assignment>::new("assignments", |s| s.assignments.clone())
                .refreshes_progress()
                .router(),
        )
        .merge(
            CrudRoutes::<Grade>::new("grades", |s| s.grades.clone())
                .refreshes_progress()
                .router(),
        )
        .merge(CrudRoutes::<Semester>::new("semesters", |s| s.semesters.clone()).router())
        .merge(CrudRoutes::<Teacher>::new("teachers", |s| s.teachers.clone()).router())
        .merge(CrudRoutes::<Event>::new("events", |s| s.events.clone()).router())
        .merge(CrudRoutes::<TimetableEntry>::new("timetable", |s| s.timetable.clone()).router())
        .merge(
            CrudRoutes::<Notification>::new("notifications", |s| s.notifications.clone())
                .router(),
        )
        .merge(CrudRoutes::<User>::new("users", |s| s.users.clone()).router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Page routes (redirect to the sign-in view without a session)
    let page_routes = GUARDED_PAGES
        .iter()
        .fold(Router::<Arc<AppState>>::new(), |router, page| {
            router.route_service(page, ServeFile::new(&shell))
        })
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            guard_pages,
        ));

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.clone())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(page_routes)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(cors)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
