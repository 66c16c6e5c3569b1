use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub mod settlement;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/markets/:id/status", get(settlement::market_status))
        .route("/markets/:id/settle", post(settlement::manual_settle))
        .route("/markets/:id/settlement", get(settlement::get_settlement))
        .route(
            "/participants/:address/settlements",
            get(settlement::participant_settlements),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
