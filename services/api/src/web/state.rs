//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use asset_cleaner_core::ports::{SessionStore, SiteApiService};
use chrono::Duration;
use std::sync::Arc;

/// Sliding lifetime of a relay session.
pub const SESSION_TTL_DAYS: i64 = 7;

pub fn session_ttl() -> Duration {
    Duration::days(SESSION_TTL_DAYS)
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub site_api: Arc<dyn SiteApiService>,
    pub sessions: Arc<dyn SessionStore>,
}
