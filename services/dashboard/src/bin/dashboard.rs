//! services/dashboard/src/bin/dashboard.rs

use dashboard_lib::{
    adapters::{HttpBackend, JwtTokenDecoder},
    config::Config,
    error::ApiError,
    web::{build_router, refresh::ProgressLoader, state::SessionStore, AppState},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting dashboard...");

    // --- 2. Initialize the Backend Adapter ---
    info!("Using academic backend at {}", config.backend_url);
    let backend = Arc::new(HttpBackend::new(
        config.backend_url.clone(),
        config.request_timeout,
    )?);

    // --- 3. Build the Shared AppState ---
    let progress = Arc::new(ProgressLoader::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        config.bar_scale,
    ));
    let app_state = Arc::new(AppState {
        config: config.clone(),
        users: backend.clone(),
        subjects: backend.clone(),
        assignments: backend.clone(),
        grades: backend.clone(),
        semesters: backend.clone(),
        teachers: backend.clone(),
        events: backend.clone(),
        timetable: backend.clone(),
        notifications: backend.clone(),
        inbox: backend.clone(),
        settings: backend.clone(),
        auth: backend,
        tokens: Arc::new(JwtTokenDecoder),
        sessions: SessionStore::new(),
        progress,
    });

    // --- 4. Evict Expired Sessions Periodically ---
    let sweeper_state = app_state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweeper_state.config.session_sweep_interval);
        loop {
            ticker.tick().await;
            sweeper_state.sweep_sessions().await;
        }
    });

    // --- 5. Create the Web Router ---
    let app = build_router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
