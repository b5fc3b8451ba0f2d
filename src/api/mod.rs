pub mod health;
pub mod middleware;
pub mod parking;

use crate::config::Config;
use crate::gate::InitGate;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub gate: InitGate,
    pub config: Config,
}

impl AppState {
    pub fn new(gate: InitGate, config: Config) -> Self {
        Self { gate, config }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Every data-access route waits for the database first.
    let data_routes = Router::new()
        .nest("/parking", parking::router())
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_database,
        ));

    let api = Router::new()
        .route("/health", get(health::health))
        .merge(data_routes)
        .fallback(health::not_found);

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
