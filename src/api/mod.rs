mod errors;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::{CallRunner, ScenarioCatalog};

/// Shared application state accessible by all handlers.
pub struct AppState {
    pub runner: CallRunner,
    pub catalog: ScenarioCatalog,
    /// Default length of the recent-calls list in stats reports.
    pub recent_limit: usize,
}

impl AppState {
    pub fn new(runner: CallRunner, recent_limit: usize) -> Self {
        Self {
            catalog: ScenarioCatalog::new(runner.repository().clone()),
            runner,
            recent_limit,
        }
    }
}

/// All routes, without transport layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/scenarios",
            get(handlers::list_scenarios).post(handlers::create_scenario),
        )
        .route("/scenarios/export", get(handlers::export_scenarios))
        .route("/scenarios/import", post(handlers::import_scenarios))
        .route(
            "/scenarios/{id}",
            get(handlers::get_scenario)
                .put(handlers::update_scenario)
                .delete(handlers::delete_scenario),
        )
        .route("/scenarios/{id}/check", get(handlers::check_scenario))
        .route("/scenarios/{id}/steps", post(handlers::add_step))
        .route("/scenarios/{id}/steps/move", post(handlers::move_step))
        .route(
            "/scenarios/{id}/steps/{step_id}",
            delete(handlers::remove_step),
        )
        .route(
            "/scenarios/{id}/steps/{step_id}/duplicate",
            post(handlers::duplicate_step),
        )
        .route(
            "/scenarios/{id}/steps/{step_id}/options",
            post(handlers::add_option),
        )
        .route(
            "/scenarios/{id}/steps/{step_id}/options/{index}",
            delete(handlers::remove_option),
        )
        .route(
            "/scenarios/{id}/steps/{step_id}/connections",
            get(handlers::step_connections),
        )
        .route("/scenarios/{id}/stats", get(handlers::get_stats))
        .route("/scenarios/{id}/stats/export", get(handlers::export_stats))
        .route("/runs/start", post(handlers::start_run))
        .route("/runs/action", post(handlers::run_action))
        .route("/runs/outcome", post(handlers::record_outcome))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Start the REST API server.
pub async fn serve(
    host: &str,
    port: u16,
    runner: CallRunner,
    recent_limit: usize,
    max_body: usize,
) -> Result<()> {
    let state = Arc::new(AppState::new(runner, recent_limit));
    state.catalog.ensure_seeded().await?;

    let app = router(state)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("CallScript API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
