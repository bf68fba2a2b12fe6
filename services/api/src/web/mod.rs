pub mod cors;
pub mod middleware;
pub mod oauth;
pub mod rest;
pub mod session;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use middleware::require_auth;
pub use oauth::{authorize_handler, callback_handler};
pub use rest::{
    auth_status_handler, delete_asset_handler, health_handler, list_sites_handler,
    logout_handler, ApiDoc,
};
pub use session::session_layer;
pub use state::AppState;

/// Builds the complete application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors::cors_layer(state.config.cors_origins.clone());

    // Routes that need an authorized site
    let protected_routes = Router::new()
        .route("/api/sites", get(list_sites_handler))
        .layer(axum_middleware::from_fn(require_auth));

    // Everything that reads or writes the session
    let session_routes = Router::new()
        .route("/auth", get(authorize_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/api/auth/status", get(auth_status_handler))
        .route("/api/logout", post(logout_handler))
        .route(
            "/api/sites/{site_id}/assets/{asset_id}",
            delete(delete_asset_handler),
        )
        .merge(protected_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            session_layer,
        ));

    let api_router = Router::new()
        .merge(session_routes)
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
