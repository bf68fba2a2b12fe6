//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::ApiError;
use crate::web::session::SessionHandle;

/// Middleware that lets a request through only when its session is authenticated.
///
/// Authenticated means at least one authorized site carries a token; a bare OAuth
/// token with no site does not count. Must run inside `session_layer`.
pub async fn require_auth(req: Request, next: Next) -> Response {
    let Some(session) = req.extensions().get::<SessionHandle>().cloned() else {
        return ApiError::Internal("session layer missing".to_string()).into_response();
    };

    if !session.read().await.is_authenticated() {
        debug!("Rejecting unauthenticated request");
        return ApiError::NotAuthenticated.into_response();
    }

    next.run(req).await
}
