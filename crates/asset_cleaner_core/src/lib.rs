pub mod cleanup;
pub mod domain;
pub mod endpoint;
pub mod ports;
pub mod progress;
pub mod snapshot;
pub mod sweep;
pub mod workflow;

pub use cleanup::{DeletePipeline, DeleteReport, FailedDelete, FailureCategory};
pub use domain::{
    Asset, AuthStatus, AuthorizedSite, ElementKind, ElementRef, PageRef, ScanResult, ScanStats,
    SessionData, SiteSummary, StyleRef, TokenGrant,
};
pub use ports::{
    CleanerBackend, DesignerHost, PortError, PortResult, SessionStore, SiteApiService,
};
pub use progress::ProgressTracker;
pub use snapshot::DocumentSnapshot;
pub use sweep::ReferenceSweep;
pub use workflow::{AuthGate, Screen, Workflow, WorkflowError};
