//! crates/asset_cleaner_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the design tool's extension runtime, the external site API,
//! and the relay's session storage.

use async_trait::async_trait;
use chrono::Duration;

use crate::domain::{
    Asset, AuthStatus, ElementRef, PageRef, SessionData, SiteSummary, StyleRef, TokenGrant,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., host runtime, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// A non-success answer from an upstream HTTP service.
    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),
    #[error("Transport failure: {0}")]
    Transport(String),
    /// The host runtime does not expose the named capability.
    #[error("Host capability unavailable: {0}")]
    Unavailable(&'static str),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// The HTTP status this error carries, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PortError::Unauthorized => Some(401),
            PortError::Forbidden(_) => Some(403),
            PortError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, PortError::Unavailable(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The design tool's extension API.
///
/// Different host versions expose different method sets, so every method defaults to
/// `PortError::Unavailable`. Implementors override only what their host provides.
#[async_trait]
pub trait DesignerHost: Send + Sync {
    /// The id of the site the extension is running in.
    async fn current_site_id(&self) -> PortResult<String> {
        Err(PortError::Unavailable("current_site_id"))
    }

    async fn list_assets(&self) -> PortResult<Vec<Asset>> {
        Err(PortError::Unavailable("list_assets"))
    }

    async fn list_pages(&self) -> PortResult<Vec<PageRef>> {
        Err(PortError::Unavailable("list_pages"))
    }

    /// Makes `page` the current page; element enumeration follows it.
    async fn switch_page(&self, _page: &PageRef) -> PortResult<()> {
        Err(PortError::Unavailable("switch_page"))
    }

    /// Elements of the current page.
    async fn list_elements(&self) -> PortResult<Vec<ElementRef>> {
        Err(PortError::Unavailable("list_elements"))
    }

    /// The asset bound to an image element, if any.
    async fn image_asset_id(&self, _element: &ElementRef) -> PortResult<Option<String>> {
        Err(PortError::Unavailable("image_asset_id"))
    }

    /// Every style attached to an element, including its inline style.
    async fn element_styles(&self, _element: &ElementRef) -> PortResult<Vec<StyleRef>> {
        Err(PortError::Unavailable("element_styles"))
    }

    /// The serialized property payload of a style.
    async fn style_properties(&self, _style: &StyleRef) -> PortResult<serde_json::Value> {
        Err(PortError::Unavailable("style_properties"))
    }

    /// Social-preview (open graph / search) image URLs of a page.
    async fn page_social_images(&self, _page: &PageRef) -> PortResult<Vec<String>> {
        Err(PortError::Unavailable("page_social_images"))
    }

    async fn list_styles(&self) -> PortResult<Vec<StyleRef>> {
        Err(PortError::Unavailable("list_styles"))
    }

    /// Removal through the asset object itself.
    async fn remove_asset_object(&self, _asset_id: &str) -> PortResult<()> {
        Err(PortError::Unavailable("remove_asset_object"))
    }

    /// Removal through a host-level call.
    async fn remove_asset_via_host(&self, _asset_id: &str) -> PortResult<()> {
        Err(PortError::Unavailable("remove_asset_via_host"))
    }
}

/// The external site REST API the relay proxies.
#[async_trait]
pub trait SiteApiService: Send + Sync {
    /// Exchanges an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> PortResult<TokenGrant>;

    /// Returns the site ids a token is authorized for.
    async fn introspect_token(&self, access_token: &str) -> PortResult<Vec<String>>;

    async fn list_sites(&self, access_token: &str) -> PortResult<Vec<SiteSummary>>;

    async fn delete_asset(&self, access_token: &str, asset_id: &str) -> PortResult<()>;
}

/// Server-side session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a live session and extends its expiry by `ttl`.
    async fn load(&self, session_id: &str, ttl: Duration) -> PortResult<Option<SessionData>>;

    async fn save(&self, session_id: &str, data: SessionData, ttl: Duration) -> PortResult<()>;

    async fn destroy(&self, session_id: &str) -> PortResult<()>;
}

/// The relay as seen from the extension.
#[async_trait]
pub trait CleanerBackend: Send + Sync {
    async fn auth_status(&self) -> PortResult<AuthStatus>;

    async fn delete_asset(&self, site_id: &str, asset_id: &str) -> PortResult<()>;
}
