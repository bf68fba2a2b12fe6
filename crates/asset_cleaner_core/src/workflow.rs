//! crates/asset_cleaner_core/src/workflow.rs
//!
//! The extension's screen state machine:
//! `Idle -> Scanning -> {Results | Success}`, with errors collapsing back to `Idle`.
//! Only one sweep or delete run is in flight at a time.

use std::collections::HashSet;

use crate::cleanup::DeleteReport;
use crate::domain::{Asset, AuthStatus, ScanResult};
use crate::ports::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Idle,
    Scanning,
    Results,
    Success,
}

/// Whether the relay holds a usable token for this session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthGate {
    #[default]
    Unknown,
    Unauthenticated,
    Authenticated { site_ids: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Another operation is already running")]
    Busy,
    #[error("Nothing to delete")]
    EmptySelection,
    #[error("No scan results available")]
    NoResults,
    #[error("Authorization required. Please authorize the app again.")]
    NotAuthorized,
}

#[derive(Debug)]
pub struct Workflow {
    screen: Screen,
    result: Option<ScanResult>,
    selection: HashSet<String>,
    busy: bool,
    message: Option<String>,
    auth: AuthGate,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            screen: Screen::Idle,
            result: None,
            selection: HashSet::new(),
            busy: false,
            message: None,
            auth: AuthGate::Unknown,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn result(&self) -> Option<&ScanResult> {
        self.result.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    pub fn selection(&self) -> &HashSet<String> {
        &self.selection
    }

    /// Selected ids in result order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.unused_assets()
            .into_iter()
            .filter(|a| self.selection.contains(&a.id))
            .map(|a| a.id.clone())
            .collect()
    }

    pub fn unused_assets(&self) -> Vec<&Asset> {
        self.result
            .as_ref()
            .map(|r| r.unused().collect())
            .unwrap_or_default()
    }

    pub fn apply_auth_status(&mut self, status: &AuthStatus) {
        self.auth = if status.authenticated {
            AuthGate::Authenticated {
                site_ids: status.site_ids.clone(),
            }
        } else {
            AuthGate::Unauthenticated
        };
    }

    /// An auth failure from the relay sends the user back through authorization.
    pub fn auth_failed(&mut self) {
        self.auth = AuthGate::Unauthenticated;
        self.message = Some("Your authorization has expired. Please authorize the app again.".to_string());
    }

    //=====================================================================================
    // Sweep
    //=====================================================================================

    pub fn begin_scan(&mut self) -> Result<(), WorkflowError> {
        if self.busy {
            return Err(WorkflowError::Busy);
        }
        self.busy = true;
        self.screen = Screen::Scanning;
        self.result = None;
        self.selection.clear();
        self.message = None;
        Ok(())
    }

    pub fn finish_scan(&mut self, outcome: Result<ScanResult, PortError>) {
        if self.screen != Screen::Scanning {
            // abandoned; the late result is discarded
            return;
        }
        self.busy = false;
        match outcome {
            Ok(result) => {
                self.screen = if result.unused_count() == 0 {
                    Screen::Success
                } else {
                    Screen::Results
                };
                self.result = Some(result);
            }
            Err(e) => {
                if e.status() == Some(401) {
                    self.auth = AuthGate::Unauthenticated;
                }
                self.screen = Screen::Idle;
                self.message = Some(format!("Scan failed: {}", e));
            }
        }
    }

    /// The user left the scan screen. In-flight host calls finish and are ignored.
    pub fn abandon_scan(&mut self) {
        if self.screen == Screen::Scanning {
            self.busy = false;
            self.screen = Screen::Idle;
        }
    }

    /// Discards results and returns to the start screen.
    pub fn reset(&mut self) {
        *self = Self {
            auth: std::mem::take(&mut self.auth),
            ..Self::new()
        };
    }

    //=====================================================================================
    // Selection
    //=====================================================================================

    pub fn toggle_select(&mut self, asset_id: &str) {
        let listed = self.unused_assets().iter().any(|a| a.id == asset_id);
        if !listed {
            return;
        }
        if !self.selection.remove(asset_id) {
            self.selection.insert(asset_id.to_string());
        }
    }

    /// Selects every listed unused asset, or clears the selection if all are selected.
    pub fn toggle_select_all(&mut self) {
        let unused: HashSet<String> = self.unused_assets().iter().map(|a| a.id.clone()).collect();
        if !unused.is_empty() && self.selection == unused {
            self.selection.clear();
        } else {
            self.selection = unused;
        }
    }

    //=====================================================================================
    // Delete
    //=====================================================================================

    /// Locks the workflow for a delete run and returns the ids to delete.
    /// Deleting through a site needs the relay to hold a token for the session.
    pub fn begin_delete(&mut self, site_id: Option<&str>) -> Result<Vec<String>, WorkflowError> {
        if self.busy {
            return Err(WorkflowError::Busy);
        }
        if site_id.is_some() && self.auth == AuthGate::Unauthenticated {
            return Err(WorkflowError::NotAuthorized);
        }
        if self.result.is_none() {
            return Err(WorkflowError::NoResults);
        }
        let ids = self.selected_ids();
        if ids.is_empty() {
            return Err(WorkflowError::EmptySelection);
        }
        self.busy = true;
        self.message = None;
        Ok(ids)
    }

    pub fn finish_delete(&mut self, report: &DeleteReport) {
        self.busy = false;
        if let Some(result) = self.result.as_mut() {
            result.remove_assets(&report.deleted);
        }
        for id in &report.deleted {
            self.selection.remove(id);
        }
        self.message = report.message();

        let remaining = self.result.as_ref().map(|r| r.unused_count()).unwrap_or(0);
        self.screen = if remaining == 0 {
            Screen::Success
        } else {
            Screen::Results
        };
    }
}
