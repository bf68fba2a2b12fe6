//! services/api/src/adapters/webflow.rs
//!
//! This module contains the adapter for the external site REST API.
//! It implements the `SiteApiService` port from the `core` crate using `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::config::Config;
use asset_cleaner_core::domain::{SiteSummary, TokenGrant};
use asset_cleaner_core::ports::{PortError, PortResult, SiteApiService};

//=========================================================================================
// Upstream Payloads
//=========================================================================================

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AuthorizedTo {
    #[serde(default)]
    site_ids: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Authorization {
    #[serde(default)]
    authorized_to: AuthorizedTo,
}

#[derive(Deserialize)]
struct IntrospectResponse {
    #[serde(default)]
    authorization: Authorization,
}

#[derive(Deserialize)]
struct SitesResponse {
    #[serde(default)]
    sites: Vec<SiteSummary>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `SiteApiService` over HTTP.
#[derive(Clone)]
pub struct WebflowClient {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    oauth_base: String,
    api_base: String,
}

impl WebflowClient {
    /// Creates a new `WebflowClient` from the loaded configuration.
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            oauth_base: config.oauth_base.clone(),
            api_base: config.api_base.clone(),
        }
    }
}

/// `base` with `segments` appended, each percent-encoded as a single path segment.
/// Empty, `.` and `..` segments are refused since they would not stay in place.
pub(crate) fn join_segments(base: &str, segments: &[&str]) -> PortResult<Url> {
    let mut url = Url::parse(base).map_err(|e| PortError::Unexpected(e.to_string()))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| PortError::Unexpected(format!("{} cannot take a path", base)))?;
        path.pop_if_empty();
        for segment in segments {
            if matches!(*segment, "" | "." | "..") {
                return Err(PortError::NotFound(segment.to_string()));
            }
            path.push(segment);
        }
    }
    Ok(url)
}

fn transport(e: reqwest::Error) -> PortError {
    PortError::Transport(e.to_string())
}

/// Turns a non-2xx answer into `PortError::Upstream`, keeping status and body.
async fn ensure_success(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PortError::Upstream {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> PortResult<T> {
    let response = ensure_success(response).await?;
    let body = response.text().await.map_err(transport)?;
    serde_json::from_str(&body).map_err(|e| PortError::MalformedJson(e.to_string()))
}

//=========================================================================================
// `SiteApiService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SiteApiService for WebflowClient {
    async fn exchange_code(&self, code: &str) -> PortResult<TokenGrant> {
        let response = self
            .http
            .post(format!("{}/oauth/access_token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let token: TokenResponse = read_json(response).await?;
        Ok(TokenGrant {
            access_token: token.access_token,
            scope: token.scope.unwrap_or_default(),
        })
    }

    async fn introspect_token(&self, access_token: &str) -> PortResult<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/token/introspect", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        let body: IntrospectResponse = read_json(response).await?;
        let ids = body.authorization.authorized_to.site_ids;
        debug!(count = ids.len(), "Token introspected");
        Ok(ids)
    }

    async fn list_sites(&self, access_token: &str) -> PortResult<Vec<SiteSummary>> {
        let response = self
            .http
            .get(format!("{}/sites", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        let body: SitesResponse = read_json(response).await?;
        Ok(body.sites)
    }

    async fn delete_asset(&self, access_token: &str, asset_id: &str) -> PortResult<()> {
        let response = self
            .http
            .delete(join_segments(&self.api_base, &["assets", asset_id])?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn introspection_payload_yields_site_ids() {
        let body = r#"{
            "authorization": {
                "id": "x",
                "authorizedTo": { "siteIds": ["s1", "s2"], "workspaceIds": [], "userIds": [] }
            },
            "application": { "id": "app" }
        }"#;
        let parsed: IntrospectResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.authorization.authorized_to.site_ids, vec!["s1", "s2"]);
    }

    #[test]
    fn asset_ids_stay_inside_the_assets_path() {
        let url = join_segments("https://api.webflow.com/v2", &["assets", "../sites"]).unwrap();
        assert_eq!(url.as_str(), "https://api.webflow.com/v2/assets/..%2Fsites");

        let url = join_segments("https://api.webflow.com/v2/", &["assets", "a1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.webflow.com/v2/assets/a1");

        assert!(join_segments("https://api.webflow.com/v2", &["assets", ".."]).is_err());
    }

    #[test]
    fn empty_introspection_yields_nothing() {
        let parsed: IntrospectResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.authorization.authorized_to.site_ids.is_empty());
    }

    #[test]
    fn site_list_tolerates_missing_names() {
        let body = r#"{ "sites": [ { "id": "s1", "displayName": "Shop" }, { "id": "s2" } ] }"#;
        let parsed: SitesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.sites[0].display_name, "Shop");
        assert_eq!(parsed.sites[1].display_name, "");
    }
}
