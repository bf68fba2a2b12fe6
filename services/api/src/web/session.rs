//! services/api/src/web/session.rs
//!
//! Cookie-backed server-side sessions.
//!
//! The `session_layer` middleware loads the session named by the cookie, hands handlers
//! a `SessionHandle` through request extensions, and after the handler persists,
//! refreshes or destroys it. Handlers never touch the store directly.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::CookieSecure;
use crate::error::ApiError;
use crate::web::state::{session_ttl, AppState};
use asset_cleaner_core::domain::SessionData;

pub const SESSION_COOKIE: &str = "sid";

//=========================================================================================
// SessionHandle
//=========================================================================================

struct SessionInner {
    existing_id: Option<String>,
    data: Mutex<SessionData>,
    dirty: AtomicBool,
    destroyed: AtomicBool,
}

/// The current request's session. Cloning shares the same underlying state.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    pub fn new(existing_id: Option<String>, data: SessionData) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                existing_id,
                data: Mutex::new(data),
                dirty: AtomicBool::new(false),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// A copy of the session data.
    pub async fn read(&self) -> SessionData {
        self.inner.data.lock().await.clone()
    }

    /// Mutates the session; it will be saved once the handler returns.
    pub async fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let mut data = self.inner.data.lock().await;
        let out = f(&mut data);
        self.inner.dirty.store(true, Ordering::Relaxed);
        out
    }

    /// Marks the session for destruction.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Relaxed);
    }

    fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Relaxed)
    }

    fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Relaxed)
    }
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}

/// True when a trusted proxy reports the original request as HTTPS.
pub fn request_is_https(headers: &HeaderMap, trust_proxy: bool) -> bool {
    if !trust_proxy {
        return false;
    }
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// `Secure` and `SameSite` for the configured mode.
pub fn cookie_attributes(mode: CookieSecure, https: bool) -> &'static str {
    match mode {
        CookieSecure::Always => "Secure; SameSite=None",
        CookieSecure::Never => "SameSite=Lax",
        CookieSecure::Auto if https => "Secure; SameSite=None",
        CookieSecure::Auto => "SameSite=Lax",
    }
}

pub fn session_cookie(id: &str, mode: CookieSecure, https: bool) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; {}",
        SESSION_COOKIE,
        id,
        session_ttl().num_seconds(),
        cookie_attributes(mode, https)
    )
}

pub fn clear_cookie(mode: CookieSecure, https: bool) -> String {
    format!(
        "{}=; HttpOnly; Path=/; Max-Age=0; {}",
        SESSION_COOKIE,
        cookie_attributes(mode, https)
    )
}

fn set_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => error!("Invalid session cookie value: {}", e),
    }
}

//=========================================================================================
// Middleware
//=========================================================================================

/// Loads the session before the handler and persists it afterwards.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let https = request_is_https(req.headers(), state.config.trust_proxy);
    let cookie_id = read_cookie(req.headers(), SESSION_COOKIE).map(str::to_string);

    let loaded = match &cookie_id {
        Some(id) => state
            .sessions
            .load(id, session_ttl())
            .await
            .unwrap_or_else(|e| {
                error!("Failed to load session: {}", e);
                None
            }),
        None => None,
    };
    let existing_id = if loaded.is_some() { cookie_id } else { None };
    let handle = SessionHandle::new(existing_id, loaded.unwrap_or_default());
    req.extensions_mut().insert(handle.clone());

    let mut response = next.run(req).await;
    let mode = state.config.cookie_secure;

    if handle.is_destroyed() {
        if let Some(id) = &handle.inner.existing_id {
            if let Err(e) = state.sessions.destroy(id).await {
                error!("Failed to destroy session: {}", e);
            }
        }
        set_cookie(&mut response, &clear_cookie(mode, https));
        return response;
    }

    if handle.is_dirty() {
        let id = handle
            .inner
            .existing_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let data = handle.read().await;
        if let Err(e) = state.sessions.save(&id, data, session_ttl()).await {
            return ApiError::Port(e).into_response();
        }
        debug!("Session saved");
        set_cookie(&mut response, &session_cookie(&id, mode, https));
    } else if let Some(id) = &handle.inner.existing_id {
        // the store already slid the expiry on load; keep the cookie in step
        set_cookie(&mut response, &session_cookie(id, mode, https));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sid=abc-123; other=x"),
        );
        assert_eq!(read_cookie(&headers, SESSION_COOKIE), Some("abc-123"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn https_detection_requires_trusted_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        assert!(request_is_https(&headers, true));
        assert!(!request_is_https(&headers, false));
    }

    #[test]
    fn auto_mode_upgrades_behind_https_proxy() {
        assert_eq!(cookie_attributes(CookieSecure::Auto, false), "SameSite=Lax");
        assert_eq!(
            cookie_attributes(CookieSecure::Auto, true),
            "Secure; SameSite=None"
        );
        assert_eq!(
            cookie_attributes(CookieSecure::Never, true),
            "SameSite=Lax"
        );
        let cookie = session_cookie("abc", CookieSecure::Always, false);
        assert!(cookie.starts_with("sid=abc; HttpOnly; Path=/; Max-Age=604800"));
        assert!(cookie.ends_with("Secure; SameSite=None"));
    }

    #[tokio::test]
    async fn update_marks_dirty() {
        let handle = SessionHandle::new(None, SessionData::default());
        assert!(!handle.is_dirty());
        handle
            .update(|s| s.redirect_to = Some("/".to_string()))
            .await;
        assert!(handle.is_dirty());
        assert_eq!(handle.read().await.redirect_to.as_deref(), Some("/"));
    }
}
