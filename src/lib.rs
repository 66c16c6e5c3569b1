pub mod config;
pub mod engine;
pub mod ledger;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod types;

use axum::Router;

use state::AppState;

// Expose a router builder so main.rs can be tiny.
pub fn app(state: AppState) -> Router {
    routes::router(state)
}
