pub mod middleware;
pub mod state;
pub mod status;

use axum::{Router, middleware as axum_middleware, routing::get};
use tower_http::trace::TraceLayer;

pub use state::{AppState, AppStateInner};

/// Health and admin routes. `/health` is open; `/admin/*` needs the bearer
/// token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(status::health))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/status", get(status::admin_status))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin_token,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
}
