//! services/api/src/bin/sweep.rs
//!
//! Command-line driver for the extension logic. It runs the reference sweep against a
//! JSON export of a project and can delete the unused assets through a running relay.

use api_lib::{adapters::HttpCleanerBackend, error::ApiError};
use asset_cleaner_core::{
    ports::{CleanerBackend, DesignerHost},
    progress, DeletePipeline, DocumentSnapshot, ProgressTracker, ReferenceSweep, Workflow,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "sweep", about = "Find and delete image assets nothing references")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify every image asset in a project export as used or unused.
    Scan {
        snapshot: PathBuf,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Scan, then delete unused assets through the relay.
    Clean {
        snapshot: PathBuf,
        /// Base URL of the relay.
        #[arg(long, env = "CLEANER_API_BASE")]
        relay: String,
        /// Value of the relay's session cookie.
        #[arg(long, env = "CLEANER_SESSION")]
        session: Option<String>,
        /// Overrides the site id recorded in the export.
        #[arg(long)]
        site_id: Option<String>,
        /// Only delete these assets (default: every unused asset).
        #[arg(long = "asset")]
        assets: Vec<String>,
        /// Write the export back without the deleted assets.
        #[arg(long)]
        write: bool,
    },
}

fn load_snapshot(path: &Path) -> Result<DocumentSnapshot, ApiError> {
    let text = std::fs::read_to_string(path)?;
    Ok(DocumentSnapshot::from_json(&text)?)
}

/// Runs the sweep with a timer nudging the progress estimate between checkpoints.
async fn scan(host: &DocumentSnapshot, workflow: &mut Workflow) -> Result<(), ApiError> {
    workflow
        .begin_scan()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let tracker = Arc::new(ProgressTracker::new());
    let ticker = {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(250));
            while tracker.tick(progress::STYLES_END) {
                debug!("Scanning... {}%", tracker.percent());
                interval.tick().await;
            }
        })
    };

    let outcome = ReferenceSweep::new().run(host, &tracker).await;
    tracker.stop();
    ticker.abort();
    workflow.finish_scan(outcome);

    if let Some(message) = workflow.message() {
        return Err(ApiError::Internal(message.to_string()));
    }
    Ok(())
}

fn print_summary(workflow: &Workflow) {
    if let Some(result) = workflow.result() {
        let stats = &result.stats;
        println!(
            "{} image assets, {} unused ({} pages, {} elements, {} styles scanned, {} references, {}ms)",
            stats.total_assets,
            stats.unused_count,
            stats.scanned_pages,
            stats.scanned_elements,
            stats.scanned_styles,
            stats.detected_references,
            stats.elapsed_ms
        );
    }
    for asset in workflow.unused_assets() {
        println!("  {}  {}  {}", asset.id, asset.name, asset.url);
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut workflow = Workflow::new();

    match cli.command {
        Command::Scan { snapshot, json } => {
            let host = load_snapshot(&snapshot)?;
            scan(&host, &mut workflow).await?;
            if json {
                let text = serde_json::to_string_pretty(&workflow.result())
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                println!("{}", text);
            } else {
                print_summary(&workflow);
            }
        }
        Command::Clean {
            snapshot,
            relay,
            session,
            site_id,
            assets,
            write,
        } => {
            let mut host = load_snapshot(&snapshot)?;
            let backend = HttpCleanerBackend::new(reqwest::Client::new(), &relay, session)?;

            match backend.auth_status().await {
                Ok(status) => workflow.apply_auth_status(&status),
                Err(e) => {
                    warn!("Could not read authorization status: {}", e);
                    workflow.auth_failed();
                }
            }

            scan(&host, &mut workflow).await?;
            if assets.is_empty() {
                workflow.toggle_select_all();
            } else {
                for id in &assets {
                    workflow.toggle_select(id);
                }
            }
            let site_id = match site_id {
                Some(id) => Some(id),
                None => host.current_site_id().await.ok(),
            };
            if site_id.is_none() {
                warn!("No site id known; assets will only be removed from the export");
            }

            let selected = match workflow.begin_delete(site_id.as_deref()) {
                Ok(ids) => ids,
                Err(e) => {
                    println!("{}", e);
                    return Ok(());
                }
            };

            let report = DeletePipeline::new(&host, &backend)
                .run(&selected, site_id.as_deref(), |done, total| {
                    info!("Deleting... {}/{}", done, total)
                })
                .await;
            workflow.finish_delete(&report);

            println!(
                "Deleted {} of {} selected assets.",
                report.deleted.len(),
                selected.len()
            );
            if let Some(message) = workflow.message() {
                println!("{}", message);
            }

            if write {
                host.prune_removed();
                std::fs::write(&snapshot, host.to_json()?)?;
                info!("Export updated at {}", snapshot.display());
            }
        }
    }

    Ok(())
}
