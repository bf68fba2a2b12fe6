//! services/api/src/web/cors.rs
//!
//! CORS for credentialed requests from the extension and local development.

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    request::Parts,
    HeaderValue, Method,
};
use reqwest::Url;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Any `localhost` or `127.0.0.1` origin, whatever the scheme or port.
pub fn is_local_origin(origin: &str) -> bool {
    Url::parse(origin)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "localhost" || h == "127.0.0.1"))
        .unwrap_or(false)
}

pub fn origin_allowed(origin: &str, allow_list: &[String]) -> bool {
    let origin = origin.trim_end_matches('/');
    allow_list.iter().any(|o| o == origin) || is_local_origin(origin)
}

pub fn cors_layer(allow_list: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|o| origin_allowed(o, &allow_list))
                    .unwrap_or(false)
            },
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT])
}
