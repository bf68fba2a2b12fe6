//! services/api/tests/routes.rs
//!
//! Drives the full router against a fake site API and the in-memory session store.

use api_lib::adapters::InMemorySessionStore;
use api_lib::config::{Config, CookieSecure};
use api_lib::web::{
    router,
    state::{session_ttl, AppState},
};
use asset_cleaner_core::domain::{AuthorizedSite, SessionData, SiteSummary, TokenGrant};
use asset_cleaner_core::ports::{PortError, PortResult, SessionStore, SiteApiService};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use chrono::Utc;
use tracing::Level;

//=========================================================================================
// Fixtures
//=========================================================================================

#[derive(Default)]
struct FakeSiteApi {
    introspected: Vec<String>,
    sites: Vec<SiteSummary>,
    exchange_error: Option<PortError>,
    delete_error: Option<PortError>,
    deleted: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SiteApiService for FakeSiteApi {
    async fn exchange_code(&self, code: &str) -> PortResult<TokenGrant> {
        if let Some(e) = &self.exchange_error {
            return Err(e.clone());
        }
        Ok(TokenGrant {
            access_token: format!("token-for-{}", code),
            scope: "assets:read assets:write sites:read".to_string(),
        })
    }

    async fn introspect_token(&self, _access_token: &str) -> PortResult<Vec<String>> {
        Ok(self.introspected.clone())
    }

    async fn list_sites(&self, _access_token: &str) -> PortResult<Vec<SiteSummary>> {
        Ok(self.sites.clone())
    }

    async fn delete_asset(&self, access_token: &str, asset_id: &str) -> PortResult<()> {
        if let Some(e) = &self.delete_error {
            return Err(e.clone());
        }
        self.deleted
            .lock()
            .unwrap()
            .push((access_token.to_string(), asset_id.to_string()));
        Ok(())
    }
}

fn site(id: &str, name: &str) -> SiteSummary {
    SiteSummary {
        id: id.to_string(),
        display_name: name.to_string(),
        short_name: name.to_lowercase(),
    }
}

const EXTENSION_ORIGIN: &str = "https://abc123.webflow-ext.com";

fn config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        log_level: Level::INFO,
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "https://relay.example.com/auth/callback".to_string(),
        extra_scopes: String::new(),
        authorize_url: "https://webflow.com/oauth/authorize".to_string(),
        oauth_base: "https://api.webflow.com".to_string(),
        api_base: "https://api.webflow.com/v2".to_string(),
        post_auth_redirect: "/".to_string(),
        cors_origins: vec![EXTENSION_ORIGIN.to_string()],
        cookie_secure: CookieSecure::Auto,
        trust_proxy: false,
    }
}

fn build_app(fake: FakeSiteApi) -> (Router, Arc<FakeSiteApi>) {
    build_app_with_store(fake, Arc::new(InMemorySessionStore::new()))
}

fn build_app_with_store(
    fake: FakeSiteApi,
    sessions: Arc<InMemorySessionStore>,
) -> (Router, Arc<FakeSiteApi>) {
    let fake = Arc::new(fake);
    let state = Arc::new(AppState {
        config: Arc::new(config()),
        site_api: fake.clone(),
        sessions,
    });
    (router(state), fake)
}

/// A router whose store already holds `data` under the returned cookie.
async fn build_app_with_session(data: SessionData) -> (Router, Arc<FakeSiteApi>, String) {
    let sessions = Arc::new(InMemorySessionStore::new());
    sessions.save("seeded", data, session_ttl()).await.unwrap();
    let (app, fake) = build_app_with_store(FakeSiteApi::default(), sessions);
    (app, fake, "sid=seeded".to_string())
}

async fn send(app: &Router, method: &str, uri: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn preflight(app: &Router, origin: &str) -> Response {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/auth/status")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> String {
    response.headers()[header::LOCATION].to_str().unwrap().to_string()
}

/// `sid=...` from the response, if it set one.
fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("sid="))
        .map(|v| v.split(';').next().unwrap().to_string())
}

/// Runs `/auth` then `/auth/callback` and returns the session cookie.
async fn authorize(app: &Router) -> String {
    let start = send(app, "GET", "/auth?redirectTo=http://localhost:1337/app", None).await;
    let cookie = session_cookie(&start).expect("session cookie");
    let done = send(app, "GET", "/auth/callback?code=abc", Some(&cookie)).await;
    assert_eq!(done.status(), StatusCode::FOUND);
    cookie
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn health_is_public_and_sessionless() {
    let (app, _) = build_app(FakeSiteApi::default());
    let response = send(&app, "GET", "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert_eq!(json(response).await, serde_json::json!({ "ok": true }));
}

#[tokio::test]
async fn auth_redirects_with_merged_scopes() {
    let (app, _) = build_app(FakeSiteApi::default());
    let response = send(&app, "GET", "/auth?workspace=acme", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let to = location(&response);
    assert!(to.starts_with("https://webflow.com/oauth/authorize?"));
    assert!(to.contains("scope=assets%3Aread+assets%3Awrite+sites%3Aread"));
    assert!(to.contains("workspace=acme"));
    assert!(session_cookie(&response).is_some());
}

#[tokio::test]
async fn callback_stores_sites_and_returns_to_target() {
    let (app, _) = build_app(FakeSiteApi {
        introspected: vec!["s1".to_string(), "s2".to_string()],
        sites: vec![site("s1", "Shop")],
        ..Default::default()
    });
    let start = send(&app, "GET", "/auth?redirectTo=http://localhost:1337/app", None).await;
    let cookie = session_cookie(&start).unwrap();

    let done = send(&app, "GET", "/auth/callback?code=abc", Some(&cookie)).await;
    assert_eq!(done.status(), StatusCode::FOUND);
    assert_eq!(location(&done), "http://localhost:1337/app");

    let status = json(send(&app, "GET", "/api/auth/status", Some(&cookie)).await).await;
    assert_eq!(status["authenticated"], true);
    assert_eq!(status["authorizedSitesCount"], 2);
    assert_eq!(status["siteIds"], serde_json::json!(["s1", "s2"]));
}

#[tokio::test]
async fn untrusted_target_falls_back_to_default() {
    let (app, _) = build_app(FakeSiteApi {
        introspected: vec!["s1".to_string()],
        ..Default::default()
    });
    let start = send(&app, "GET", "/auth?redirectTo=https://evil.example.com/", None).await;
    let cookie = session_cookie(&start).unwrap();
    let done = send(&app, "GET", "/auth/callback?code=abc", Some(&cookie)).await;
    assert_eq!(location(&done), "/");
}

#[tokio::test]
async fn site_list_fills_in_when_introspection_is_empty() {
    let (app, _) = build_app(FakeSiteApi {
        sites: vec![site("s9", "Blog")],
        ..Default::default()
    });
    let cookie = authorize(&app).await;
    let status = json(send(&app, "GET", "/api/auth/status", Some(&cookie)).await).await;
    assert_eq!(status["siteIds"], serde_json::json!(["s9"]));
}

#[tokio::test]
async fn no_resolved_sites_means_not_authenticated() {
    let (app, _) = build_app(FakeSiteApi::default());
    let cookie = authorize(&app).await;
    let status = json(send(&app, "GET", "/api/auth/status", Some(&cookie)).await).await;
    assert_eq!(status["authenticated"], false);
    assert_eq!(status["authorizedSitesCount"], 0);

    let sites = send(&app, "GET", "/api/sites", Some(&cookie)).await;
    assert_eq!(sites.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn declined_authorization_redirects_with_reason() {
    let (app, _) = build_app(FakeSiteApi::default());
    let start = send(&app, "GET", "/auth?redirectTo=http://localhost:1337/app", None).await;
    let cookie = session_cookie(&start).unwrap();
    let done = send(&app, "GET", "/auth/callback?error=access_denied", Some(&cookie)).await;
    assert_eq!(
        location(&done),
        "http://localhost:1337/app?auth_error=access_denied"
    );
}

#[tokio::test]
async fn failed_exchange_surfaces_upstream_status() {
    let (app, _) = build_app(FakeSiteApi {
        exchange_error: Some(PortError::Upstream {
            status: 400,
            body: "invalid_grant".to_string(),
        }),
        ..Default::default()
    });
    let response = send(&app, "GET", "/auth/callback?code=stale", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn sites_are_sorted_by_display_name() {
    let (app, _) = build_app(FakeSiteApi {
        introspected: vec!["b".to_string(), "a".to_string(), "c".to_string()],
        sites: vec![site("a", "zeta"), site("b", "Alpha"), site("c", "beta")],
        ..Default::default()
    });
    let cookie = authorize(&app).await;
    let body = json(send(&app, "GET", "/api/sites", Some(&cookie)).await).await;
    let names: Vec<&str> = body["sites"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["displayName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
    assert_eq!(body["sites"][0]["shortName"], "alpha");
}

#[tokio::test]
async fn delete_uses_the_sites_token() {
    let (app, fake) = build_app(FakeSiteApi {
        introspected: vec!["s1".to_string()],
        ..Default::default()
    });
    let cookie = authorize(&app).await;
    let response = send(&app, "DELETE", "/api/sites/s1/assets/asset-7", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        fake.deleted.lock().unwrap().as_slice(),
        &[("token-for-abc".to_string(), "asset-7".to_string())]
    );
}

#[tokio::test]
async fn delete_for_unauthorized_site_is_forbidden() {
    let (app, fake) = build_app(FakeSiteApi {
        introspected: vec!["s1".to_string()],
        ..Default::default()
    });
    let cookie = authorize(&app).await;
    let response = send(&app, "DELETE", "/api/sites/other/assets/x", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(fake.deleted.lock().unwrap().is_empty());

    // also without any session at all
    let response = send(&app, "DELETE", "/api/sites/s1/assets/x", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn upstream_scope_refusal_passes_through() {
    let (app, _) = build_app(FakeSiteApi {
        introspected: vec!["s1".to_string()],
        delete_error: Some(PortError::Upstream {
            status: 403,
            body: "missing_scopes".to_string(),
        }),
        ..Default::default()
    });
    let cookie = authorize(&app).await;
    let response = send(&app, "DELETE", "/api/sites/s1/assets/x", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json(response).await["error"], "missing_scopes");
}

#[tokio::test]
async fn logout_destroys_the_session() {
    let (app, _) = build_app(FakeSiteApi {
        introspected: vec!["s1".to_string()],
        ..Default::default()
    });
    let cookie = authorize(&app).await;

    let response = send(&app, "POST", "/api/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let status = json(send(&app, "GET", "/api/auth/status", Some(&cookie)).await).await;
    assert_eq!(status["authenticated"], false);
}

#[tokio::test]
async fn site_without_token_is_unauthenticated() {
    let now = Utc::now();
    let mut data = SessionData {
        access_token: Some("global".to_string()),
        ..Default::default()
    };
    data.sites.insert(
        "s1".to_string(),
        AuthorizedSite {
            id: "s1".to_string(),
            display_name: "Shop".to_string(),
            short_name: "shop".to_string(),
            access_token: String::new(),
            scope: String::new(),
            first_seen: now,
            last_seen: now,
        },
    );
    let (app, fake, cookie) = build_app_with_session(data).await;

    let response = send(&app, "DELETE", "/api/sites/s1/assets/x", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(fake.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn asset_ids_that_escape_the_path_are_rejected() {
    let (app, fake) = build_app(FakeSiteApi {
        introspected: vec!["s1".to_string()],
        ..Default::default()
    });
    let cookie = authorize(&app).await;

    for uri in [
        "/api/sites/s1/assets/..%2Fsites",
        "/api/sites/s1/assets/%2E%2E",
        "/api/sites/s1/assets/a%2Fb",
    ] {
        let response = send(&app, "DELETE", uri, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
    assert!(fake.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn preflight_allows_listed_and_local_origins_with_credentials() {
    let (app, _) = build_app(FakeSiteApi::default());
    for origin in [EXTENSION_ORIGIN, "http://localhost:5173"] {
        let response = preflight(&app, origin).await;
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], origin);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}

#[tokio::test]
async fn preflight_from_foreign_origin_is_not_allowed() {
    let (app, _) = build_app(FakeSiteApi::default());
    let response = preflight(&app, "https://evil.example.com").await;
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
