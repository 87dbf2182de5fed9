use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{modules, projects, recon_ws};
use crate::infra::app_state::AppState;

/// Create the API router with all routes, matching the paths the dashboard
/// consumes.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .route("/api/projects", get(projects::list_projects))
        .route("/api/create-project", post(projects::create_project))
        .route("/api/projects/{name}", get(projects::get_project))
        .route(
            "/api/projects/{name}/targets",
            post(projects::add_target).delete(projects::remove_target),
        )
        .route("/api/projects/{name}/stats", get(projects::project_stats))
        .route("/api/modules", get(modules::list_modules))
        .route("/ws", get(recon_ws::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
