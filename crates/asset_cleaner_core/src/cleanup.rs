//! crates/asset_cleaner_core/src/cleanup.rs
//!
//! The delete pipeline. Each selected asset is deleted through the relay when a site id
//! is known, and removed from the local document state on a best-effort basis. The run
//! always covers the whole selection; failures are collected, never fatal.

use tracing::{debug, info, warn};

use crate::ports::{CleanerBackend, DesignerHost, PortError, PortResult};

/// Why deletions failed, in order of how the user should fix it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureCategory {
    Generic,
    Permission,
    Auth,
}

impl FailureCategory {
    pub fn classify(error: &PortError) -> Self {
        match error.status() {
            Some(401) => FailureCategory::Auth,
            Some(403) => FailureCategory::Permission,
            _ if error.to_string().to_ascii_lowercase().contains("scope") => {
                FailureCategory::Permission
            }
            _ => FailureCategory::Generic,
        }
    }

    /// The aggregated message shown once a run finishes with failures.
    pub fn message(self, failed: usize) -> String {
        match self {
            FailureCategory::Auth => format!(
                "{} asset(s) could not be deleted because the app is no longer authorized for this site. Please re-authorize and try again.",
                failed
            ),
            FailureCategory::Permission => format!(
                "{} asset(s) could not be deleted because the app lacks permission to modify assets. Re-authorize with asset write access and try again.",
                failed
            ),
            FailureCategory::Generic => {
                format!("{} asset(s) could not be deleted. Please try again.", failed)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelete {
    pub asset_id: String,
    pub reason: String,
    pub category: FailureCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDelete>,
}

impl DeleteReport {
    /// The most actionable category among failed items.
    pub fn category(&self) -> Option<FailureCategory> {
        self.failed.iter().map(|f| f.category).max()
    }

    pub fn message(&self) -> Option<String> {
        self.category().map(|c| c.message(self.failed.len()))
    }
}

pub struct DeletePipeline<'a> {
    host: &'a dyn DesignerHost,
    backend: &'a dyn CleanerBackend,
}

impl<'a> DeletePipeline<'a> {
    pub fn new(host: &'a dyn DesignerHost, backend: &'a dyn CleanerBackend) -> Self {
        Self { host, backend }
    }

    /// Deletes `asset_ids` one at a time, calling `on_progress(done, total)` after each.
    pub async fn run<F>(
        &self,
        asset_ids: &[String],
        site_id: Option<&str>,
        mut on_progress: F,
    ) -> DeleteReport
    where
        F: FnMut(usize, usize),
    {
        let total = asset_ids.len();
        let mut report = DeleteReport::default();

        for (i, asset_id) in asset_ids.iter().enumerate() {
            let remote = match site_id {
                Some(site_id) => Some(self.backend.delete_asset(site_id, asset_id).await),
                None => None,
            };
            let local = self.remove_locally(asset_id).await;

            match (remote, local) {
                (Some(Ok(())), _) | (_, Ok(())) => report.deleted.push(asset_id.clone()),
                (Some(Err(e)), Err(_)) | (None, Err(e)) => {
                    warn!(asset_id = %asset_id, "Delete failed: {}", e);
                    report.failed.push(FailedDelete {
                        asset_id: asset_id.clone(),
                        category: FailureCategory::classify(&e),
                        reason: e.to_string(),
                    });
                }
            }
            on_progress(i + 1, total);
        }

        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Delete pipeline finished"
        );
        report
    }

    /// Object removal first, host-level removal when the host lacks it.
    async fn remove_locally(&self, asset_id: &str) -> PortResult<()> {
        match self.host.remove_asset_object(asset_id).await {
            Err(e) if e.is_unavailable() => {
                debug!("Falling back to host-level asset removal");
                self.host.remove_asset_via_host(asset_id).await
            }
            other => other,
        }
    }
}
