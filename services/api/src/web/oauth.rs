//! services/api/src/web/oauth.rs
//!
//! The OAuth relay: sends the browser to the external authorization page and completes
//! the code exchange on the way back, recording every site the token covers in the
//! caller's session.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::IntoParams;

use crate::config::{Config, REQUIRED_SCOPES};
use crate::error::ApiError;
use crate::web::session::SessionHandle;
use crate::web::state::AppState;
use asset_cleaner_core::domain::SiteSummary;

//=========================================================================================
// Scopes and Redirect Targets
//=========================================================================================

fn split_scopes(list: &str) -> impl Iterator<Item = &str> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Required scopes first, then configured extras, without duplicates.
pub fn merge_scopes(required: &str, extra: &str) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for scope in split_scopes(required).chain(split_scopes(extra)) {
        if !merged.iter().any(|s| s == scope) {
            merged.push(scope.to_string());
        }
    }
    merged
}

fn is_trusted_host(scheme: &str, host: &str) -> bool {
    match (scheme, host) {
        (_, "localhost" | "127.0.0.1") => scheme == "http" || scheme == "https",
        ("https", "webflow.com") => true,
        ("https", h) => h.ends_with(".webflow.com") || h.ends_with(".webflow-ext.com"),
        _ => false,
    }
}

/// Keeps `target` only when it points at the dashboard, the extension's own domain,
/// or localhost. Everything else falls back to `default`.
pub fn sanitize_redirect(target: Option<&str>, default: &str) -> String {
    let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) else {
        return default.to_string();
    };
    match Url::parse(target) {
        Ok(url) if url.host_str().is_some_and(|h| is_trusted_host(url.scheme(), h)) => {
            target.to_string()
        }
        _ => {
            warn!("Ignoring untrusted redirect target");
            default.to_string()
        }
    }
}

/// The external authorization URL for this client.
pub fn authorize_url(config: &Config, workspace: Option<&str>) -> Result<String, ApiError> {
    let scope = merge_scopes(REQUIRED_SCOPES, &config.extra_scopes).join(" ");
    let mut params = vec![
        ("response_type", "code"),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", scope.as_str()),
    ];
    if let Some(workspace) = workspace.filter(|w| !w.is_empty()) {
        params.push(("workspace", workspace));
    }
    Url::parse_with_params(&config.authorize_url, &params)
        .map(String::from)
        .map_err(|e| ApiError::Internal(format!("Invalid authorize URL: {}", e)))
}

fn with_query(destination: &str, key: &str, value: &str) -> String {
    if let Ok(mut url) = Url::parse(destination) {
        url.query_pairs_mut().append_pair(key, value);
        return url.into();
    }
    let encoded = Url::parse_with_params("http://localhost/", &[(key, value)])
        .ok()
        .and_then(|u| u.query().map(str::to_string))
        .unwrap_or_default();
    let separator = if destination.contains('?') { '&' } else { '?' };
    format!("{}{}{}", destination, separator, encoded)
}

/// A plain `302 Found`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

//=========================================================================================
// Handlers
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuthorizeQuery {
    /// Where to send the browser once authorization completes.
    pub redirect_to: Option<String>,
    /// Preselects a workspace on the authorization page.
    pub workspace: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// GET /auth - Start the OAuth flow
#[utoipa::path(
    get,
    path = "/auth",
    params(AuthorizeQuery),
    responses(
        (status = 302, description = "Redirect to the external authorization page")
    )
)]
pub async fn authorize_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, ApiError> {
    let target = sanitize_redirect(
        query.redirect_to.as_deref(),
        &state.config.post_auth_redirect,
    );
    let url = authorize_url(&state.config, query.workspace.as_deref())?;
    session.update(|s| s.redirect_to = Some(target)).await;
    Ok(found(&url))
}

/// GET /auth/callback - Complete the OAuth flow
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackQuery),
    responses(
        (status = 302, description = "Redirect to the stored destination"),
        (status = 400, description = "The authorization code was rejected upstream"),
        (status = 502, description = "The token exchange failed upstream")
    )
)]
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let destination = session
        .update(|s| s.redirect_to.take())
        .await
        .unwrap_or_else(|| state.config.post_auth_redirect.clone());

    if let Some(reason) = query.error.filter(|e| !e.is_empty()) {
        warn!("Authorization was declined: {}", reason);
        return Ok(found(&with_query(&destination, "auth_error", &reason)));
    }
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Ok(found(&with_query(&destination, "auth_error", "missing_code")));
    };

    let count = complete_authorization(&state, &session, &code).await?;
    info!(sites = count, "Authorization completed");
    Ok(found(&destination))
}

/// Exchanges the code and merges every covered site into the session.
/// Introspection and site listing are best-effort; only the exchange itself can fail.
async fn complete_authorization(
    state: &AppState,
    session: &SessionHandle,
    code: &str,
) -> Result<usize, ApiError> {
    let grant = state.site_api.exchange_code(code).await?;

    let mut site_ids = state
        .site_api
        .introspect_token(&grant.access_token)
        .await
        .unwrap_or_else(|e| {
            warn!("Token introspection failed: {}", e);
            Vec::new()
        });
    let listed = state
        .site_api
        .list_sites(&grant.access_token)
        .await
        .unwrap_or_else(|e| {
            warn!("Site listing failed: {}", e);
            Vec::new()
        });
    if site_ids.is_empty() {
        site_ids = listed.iter().map(|s| s.id.clone()).collect();
    }
    site_ids.sort();
    site_ids.dedup();

    let names: HashMap<&str, &SiteSummary> = listed.iter().map(|s| (s.id.as_str(), s)).collect();
    let now = Utc::now();
    session
        .update(|s| {
            s.access_token = Some(grant.access_token.clone());
            for id in &site_ids {
                let summary = names.get(id.as_str()).map(|s| (*s).clone()).unwrap_or(SiteSummary {
                    id: id.clone(),
                    display_name: String::new(),
                    short_name: String::new(),
                });
                s.upsert_site(&summary, &grant, now);
            }
        })
        .await;

    Ok(site_ids.len())
}
