mod errors;
mod handlers;
mod middleware;
mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use errors::HttpError;
pub use middleware::{ADMIN_TOKEN_HEADER, AdminGate, StaticTokenGate};
pub use state::{HttpState, generate_admin_token};

pub fn router(state: HttpState) -> Router<()> {
    let api = Router::new()
        .route("/usage/stats", get(handlers::usage_stats))
        .route("/usage/series", get(handlers::usage_series))
        .route("/usage/aggregate", post(handlers::aggregate))
        .route(
            "/usage/records",
            get(handlers::list_records).post(handlers::record),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
