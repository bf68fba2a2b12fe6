//! crates/asset_cleaner_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! Wire-facing types use camelCase so the frontend and relay agree on field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

//=========================================================================================
// Assets and the Scan Result
//=========================================================================================

/// An uploaded image resource in the hosted project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub url: String,
    /// Computed by the sweep, never persisted.
    #[serde(default)]
    pub used: bool,
}

impl Asset {
    pub fn is_image(&self) -> bool {
        self.mime_type.trim().to_ascii_lowercase().starts_with("image/")
    }
}

/// Counters collected while sweeping a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total_assets: usize,
    pub unused_count: usize,
    pub scanned_pages: usize,
    pub scanned_elements: usize,
    pub scanned_styles: usize,
    pub detected_references: usize,
    pub elapsed_ms: u64,
}

/// The asset list annotated with "used"/"unused", plus scan metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub assets: Vec<Asset>,
    pub stats: ScanStats,
}

impl ScanResult {
    pub fn unused(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter().filter(|a| !a.used)
    }

    pub fn unused_count(&self) -> usize {
        self.unused().count()
    }

    /// Drops the given ids from the asset list and keeps the counters in step.
    pub fn remove_assets(&mut self, ids: &[String]) {
        self.assets.retain(|a| !ids.contains(&a.id));
        self.stats.total_assets = self.assets.len();
        self.stats.unused_count = self.unused_count();
    }
}

//=========================================================================================
// Host Document Handles
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    #[serde(alias = "Image")]
    Image,
    #[serde(untagged)]
    Other(String),
}

impl Default for ElementKind {
    fn default() -> Self {
        ElementKind::Other("Block".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    pub id: String,
    pub kind: ElementKind,
}

impl ElementRef {
    pub fn is_image(&self) -> bool {
        self.kind == ElementKind::Image
    }
}

/// A style object as the host exposes it; inline styles are just another handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleRef {
    pub id: String,
}

//=========================================================================================
// Authorization
//=========================================================================================

/// A single authorized site, stored per session and keyed by site id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedSite {
    pub id: String,
    pub display_name: String,
    pub short_name: String,
    pub access_token: String,
    pub scope: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A site as listed by the external site API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSummary {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub short_name: String,
}

/// The result of exchanging an authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub scope: String,
}

/// Per-session state held by the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub redirect_to: Option<String>,
    pub access_token: Option<String>,
    pub sites: HashMap<String, AuthorizedSite>,
}

impl SessionData {
    /// At least one site carries a non-empty token. A bare OAuth token does not count.
    pub fn is_authenticated(&self) -> bool {
        self.sites.values().any(|s| !s.access_token.is_empty())
    }

    pub fn authorized_site_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sites
            .values()
            .filter(|s| !s.access_token.is_empty())
            .map(|s| s.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Merges a freshly authorized site, preserving when it was first seen.
    pub fn upsert_site(
        &mut self,
        summary: &SiteSummary,
        grant: &TokenGrant,
        now: DateTime<Utc>,
    ) {
        let entry = self
            .sites
            .entry(summary.id.clone())
            .or_insert_with(|| AuthorizedSite {
                id: summary.id.clone(),
                display_name: String::new(),
                short_name: String::new(),
                access_token: String::new(),
                scope: String::new(),
                first_seen: now,
                last_seen: now,
            });
        if !summary.display_name.is_empty() {
            entry.display_name = summary.display_name.clone();
        }
        if !summary.short_name.is_empty() {
            entry.short_name = summary.short_name.clone();
        }
        entry.access_token = grant.access_token.clone();
        entry.scope = grant.scope.clone();
        entry.last_seen = now;
    }
}

/// What the relay reports from `GET /api/auth/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    pub authorized_sites_count: usize,
    pub site_ids: Vec<String>,
}

impl From<&SessionData> for AuthStatus {
    fn from(session: &SessionData) -> Self {
        let site_ids = session.authorized_site_ids();
        Self {
            authenticated: !site_ids.is_empty(),
            authorized_sites_count: site_ids.len(),
            site_ids,
        }
    }
}
