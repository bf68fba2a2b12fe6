//! services/api/src/adapters/relay_client.rs
//!
//! The extension's view of the relay: an implementation of the `CleanerBackend` port
//! that calls a running relay over HTTP with the caller's session cookie.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;

use asset_cleaner_core::domain::AuthStatus;
use asset_cleaner_core::endpoint::normalize_api_base;
use asset_cleaner_core::ports::{CleanerBackend, PortError, PortResult};

use crate::adapters::webflow::join_segments;
use crate::web::session::SESSION_COOKIE;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct HttpCleanerBackend {
    http: Client,
    base: String,
    session_id: Option<String>,
}

impl HttpCleanerBackend {
    /// `base` is normalized: trailing slashes dropped, HTTPS required off localhost.
    pub fn new(http: Client, base: &str, session_id: Option<String>) -> PortResult<Self> {
        Ok(Self {
            http,
            base: normalize_api_base(base)?,
            session_id,
        })
    }

    fn with_cookie(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_id {
            Some(id) => request.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, id)),
            None => request,
        }
    }
}

/// Maps the relay's error statuses back onto port errors.
async fn into_error(response: Response) -> PortError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    match status {
        StatusCode::UNAUTHORIZED => PortError::Unauthorized,
        StatusCode::FORBIDDEN => PortError::Forbidden(message),
        _ => PortError::Upstream {
            status: status.as_u16(),
            body: message,
        },
    }
}

#[async_trait]
impl CleanerBackend for HttpCleanerBackend {
    async fn auth_status(&self) -> PortResult<AuthStatus> {
        let request = self.http.get(format!("{}/api/auth/status", self.base));
        let response = self
            .with_cookie(request)
            .send()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(into_error(response).await);
        }
        response
            .json::<AuthStatus>()
            .await
            .map_err(|e| PortError::MalformedJson(e.to_string()))
    }

    async fn delete_asset(&self, site_id: &str, asset_id: &str) -> PortResult<()> {
        let url = join_segments(&self.base, &["api", "sites", site_id, "assets", asset_id])?;
        let request = self.http.delete(url);
        let response = self
            .with_cookie(request)
            .send()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(into_error(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_plain_http_relays() {
        assert!(HttpCleanerBackend::new(Client::new(), "http://relay.example.com", None).is_err());
        let client =
            HttpCleanerBackend::new(Client::new(), "http://localhost:3000/", None).unwrap();
        assert_eq!(client.base, "http://localhost:3000");
    }

    #[tokio::test]
    async fn dot_segments_never_leave_the_client() {
        let client = HttpCleanerBackend::new(Client::new(), "http://localhost:1", None).unwrap();
        assert!(matches!(
            client.delete_asset("s1", "..").await,
            Err(PortError::NotFound(_))
        ));
    }
}
