//! services/api/src/adapters/sessions.rs
//!
//! An in-process implementation of the `SessionStore` port. Entries carry their own
//! expiry; expired entries read as absent and are swept by `purge_expired`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use asset_cleaner_core::domain::SessionData;
use asset_cleaner_core::ports::{PortResult, SessionStore};

struct Entry {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired session and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "Expired sessions purged");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str, ttl: Duration) -> PortResult<Option<SessionData>> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(session_id) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + ttl;
                Ok(Some(entry.data.clone()))
            }
            Some(_) => {
                entries.remove(session_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, session_id: &str, data: SessionData, ttl: Duration) -> PortResult<()> {
        let entry = Entry {
            data,
            expires_at: Utc::now() + ttl,
        };
        self.entries
            .write()
            .await
            .insert(session_id.to_string(), entry);
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> PortResult<()> {
        self.entries.write().await.remove(session_id);
        Ok(())
    }
}
