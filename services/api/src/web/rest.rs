//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the session-scoped REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::{oauth, session::SessionHandle, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{OpenApi, ToSchema};

use asset_cleaner_core::domain::{AuthStatus, AuthorizedSite};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        oauth::authorize_handler,
        oauth::callback_handler,
        auth_status_handler,
        list_sites_handler,
        delete_asset_handler,
        logout_handler,
        health_handler,
    ),
    components(
        schemas(AuthStatusResponse, SitesResponse, SiteEntry, HealthResponse)
    ),
    tags(
        (name = "Asset Cleaner API", description = "OAuth relay and asset deletion proxy for the unused-asset cleaner extension.")
    )
)]
pub struct ApiDoc;

/// The OpenAPI document as pretty-printed JSON.
pub fn openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    authenticated: bool,
    authorized_sites_count: usize,
    site_ids: Vec<String>,
}

impl From<AuthStatus> for AuthStatusResponse {
    fn from(status: AuthStatus) -> Self {
        Self {
            authenticated: status.authenticated,
            authorized_sites_count: status.authorized_sites_count,
            site_ids: status.site_ids,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteEntry {
    id: String,
    display_name: String,
    short_name: String,
}

#[derive(Serialize, ToSchema)]
pub struct SitesResponse {
    sites: Vec<SiteEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    ok: bool,
}

/// A path parameter that names exactly one upstream path segment.
fn is_plain_segment(value: &str) -> bool {
    !matches!(value, "" | "." | "..") && !value.contains(['/', '\\'])
}

/// Display name ignoring case, lowercase first among case variants, then id.
fn compare_sites(a: &AuthorizedSite, b: &AuthorizedSite) -> Ordering {
    a.display_name
        .to_lowercase()
        .cmp(&b.display_name.to_lowercase())
        .then_with(|| b.display_name.cmp(&a.display_name))
        .then_with(|| a.id.cmp(&b.id))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Report whether this session holds a usable token.
#[utoipa::path(
    get,
    path = "/api/auth/status",
    responses(
        (status = 200, description = "Authorization state of the session", body = AuthStatusResponse)
    )
)]
pub async fn auth_status_handler(
    Extension(session): Extension<SessionHandle>,
) -> Json<AuthStatusResponse> {
    let data = session.read().await;
    Json(AuthStatus::from(&data).into())
}

/// List the sites authorized in this session.
#[utoipa::path(
    get,
    path = "/api/sites",
    responses(
        (status = 200, description = "Authorized sites sorted by display name", body = SitesResponse),
        (status = 401, description = "No authorized site in this session")
    )
)]
pub async fn list_sites_handler(
    Extension(session): Extension<SessionHandle>,
) -> Json<SitesResponse> {
    let data = session.read().await;
    let mut sites: Vec<&AuthorizedSite> = data
        .sites
        .values()
        .filter(|s| !s.access_token.is_empty())
        .collect();
    sites.sort_by(|a, b| compare_sites(a, b));

    Json(SitesResponse {
        sites: sites
            .into_iter()
            .map(|s| SiteEntry {
                id: s.id.clone(),
                display_name: s.display_name.clone(),
                short_name: s.short_name.clone(),
            })
            .collect(),
    })
}

/// Delete an asset from an authorized site.
#[utoipa::path(
    delete,
    path = "/api/sites/{site_id}/assets/{asset_id}",
    params(
        ("site_id" = String, Path, description = "The site the asset belongs to."),
        ("asset_id" = String, Path, description = "The asset to delete.")
    ),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 400, description = "The asset id is not a single path segment"),
        (status = 401, description = "No token for this site"),
        (status = 403, description = "Site not authorized in this session, or missing scope"),
        (status = 502, description = "The external API failed")
    )
)]
pub async fn delete_asset_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path((site_id, asset_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let data = session.read().await;
    let site = data
        .sites
        .get(&site_id)
        .ok_or_else(|| ApiError::SiteNotAuthorized(site_id.clone()))?;
    if site.access_token.is_empty() {
        return Err(ApiError::NotAuthenticated);
    }
    if !is_plain_segment(&asset_id) {
        return Err(ApiError::InvalidInput("asset id"));
    }

    state
        .site_api
        .delete_asset(&site.access_token, &asset_id)
        .await
        .map_err(|e| {
            warn!(site_id = %site_id, asset_id = %asset_id, "Upstream delete failed: {}", e);
            ApiError::Port(e)
        })?;

    info!(site_id = %site_id, asset_id = %asset_id, "Asset deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Destroy the session.
#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 204, description = "Session destroyed")
    )
)]
pub async fn logout_handler(Extension(session): Extension<SessionHandle>) -> StatusCode {
    session.destroy();
    StatusCode::NO_CONTENT
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { ok: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn site(id: &str, name: &str) -> AuthorizedSite {
        AuthorizedSite {
            id: id.to_string(),
            display_name: name.to_string(),
            short_name: String::new(),
            access_token: "t".to_string(),
            scope: String::new(),
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn sites_sort_by_name_then_id() {
        let mut sites = vec![
            site("3", "beta"),
            site("2", "Alpha"),
            site("1", "Alpha"),
            site("0", "alpha"),
        ];
        sites.sort_by(compare_sites);
        let ids: Vec<&str> = sites.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn document_lists_every_relay_route() {
        let document: serde_json::Value = serde_json::from_str(&openapi_json().unwrap()).unwrap();
        for path in [
            "/auth",
            "/auth/callback",
            "/api/auth/status",
            "/api/sites",
            "/api/sites/{site_id}/assets/{asset_id}",
            "/api/logout",
            "/health",
        ] {
            assert!(document["paths"].get(path).is_some(), "{} missing", path);
        }
    }

    #[test]
    fn only_plain_segments_are_forwarded() {
        assert!(is_plain_segment("64a1f0c2e4b0a1b2c3d4e5f6"));
        for bad in ["", ".", "..", "../sites", "a/b", "a\\b"] {
            assert!(!is_plain_segment(bad), "{:?} should be rejected", bad);
        }
    }
}
