//! crates/asset_cleaner_core/src/endpoint.rs
//!
//! Normalization of the relay base URL the extension talks to.

use crate::ports::{PortError, PortResult};

const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Strips trailing slashes and requires HTTPS, except for local development hosts.
pub fn normalize_api_base(raw: &str) -> PortResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(PortError::Unexpected("API base URL is empty".to_string()));
    }

    if trimmed.starts_with("https://") {
        return Ok(trimmed.to_string());
    }
    if let Some(rest) = trimmed.strip_prefix("http://") {
        if LOCAL_HOSTS.contains(&host_of(rest)) {
            return Ok(trimmed.to_string());
        }
    }
    Err(PortError::Unexpected(format!(
        "API base URL must use https: {}",
        trimmed
    )))
}

fn host_of(authority_and_path: &str) -> &str {
    let authority = authority_and_path.split('/').next().unwrap_or_default();
    authority.split(':').next().unwrap_or_default()
}
