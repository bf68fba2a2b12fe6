//! crates/asset_cleaner_core/src/sweep.rs
//!
//! The reference sweep: a read-only pass over every page, element and style object
//! that classifies each image asset as used or unused.
//!
//! Detection is heuristic. Style payloads are serialized to text and searched for
//! 24-character hex ids and http(s) URLs, so references hidden in custom code or split
//! across fields are not seen. A failed fetch only ever loses reference information,
//! which can produce a false "unused" but never a false "used".

use futures::future::join_all;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{Asset, PageRef, ScanResult, ScanStats, StyleRef};
use crate::ports::{DesignerHost, PortResult};
use crate::progress::{self, ProgressTracker};

/// How many style payloads are fetched concurrently in the global style pass.
pub const STYLE_BATCH_SIZE: usize = 40;

const ASSET_ID_LEN: usize = 24;

/// Maximal runs of hex digits. Ids are the runs exactly 24 long, so an id followed by
/// `_` in a CDN file name still counts while a longer hex string does not.
fn hex_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[0-9a-f]+").expect("hex run pattern is valid"))
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s"'()<>\\]+"#).expect("url pattern is valid")
    })
}

/// Substrings that look like asset ids.
pub fn find_hex_ids(text: &str) -> Vec<&str> {
    hex_run_regex()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|run| run.len() == ASSET_ID_LEN)
        .collect()
}

/// Substrings that look like absolute http(s) URLs, trailing punctuation removed.
pub fn find_urls(text: &str) -> Vec<&str> {
    url_regex()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']))
        .collect()
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

//=========================================================================================
// Sweep State
//=========================================================================================

/// Lookup tables built from the asset list plus the running classification.
struct SweepState {
    assets: Vec<Asset>,
    by_id: HashMap<String, usize>,
    by_url: HashMap<String, usize>,
    scanned_styles: HashSet<String>,
    stats: ScanStats,
}

impl SweepState {
    fn new(assets: Vec<Asset>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_url = HashMap::new();
        for (idx, asset) in assets.iter().enumerate() {
            by_id.insert(asset.id.to_ascii_lowercase(), idx);
            if !asset.url.is_empty() {
                by_url.insert(asset.url.clone(), idx);
                by_url.entry(strip_query(&asset.url).to_string()).or_insert(idx);
            }
        }
        let stats = ScanStats {
            total_assets: assets.len(),
            ..Default::default()
        };
        Self {
            assets,
            by_id,
            by_url,
            scanned_styles: HashSet::new(),
            stats,
        }
    }

    /// First match wins; later marks of the same asset are no-ops.
    fn mark(&mut self, idx: usize) {
        let asset = &mut self.assets[idx];
        if !asset.used {
            asset.used = true;
            self.stats.detected_references += 1;
            debug!(asset_id = %asset.id, "Asset reference detected");
        }
    }

    fn mark_id(&mut self, id: &str) {
        if let Some(&idx) = self.by_id.get(&id.to_ascii_lowercase()) {
            self.mark(idx);
        }
    }

    fn mark_url(&mut self, url: &str) {
        let idx = self
            .by_url
            .get(url)
            .or_else(|| self.by_url.get(strip_query(url)))
            .copied();
        if let Some(idx) = idx {
            self.mark(idx);
        }
    }

    fn scan_payload(&mut self, payload: &serde_json::Value) {
        let text = payload.to_string();
        for id in find_hex_ids(&text) {
            self.mark_id(id);
        }
        for url in find_urls(&text) {
            self.mark_url(url);
        }
    }

    /// Returns `true` the first time a style is seen.
    fn claim_style(&mut self, style: &StyleRef) -> bool {
        let fresh = self.scanned_styles.insert(style.id.clone());
        if fresh {
            self.stats.scanned_styles += 1;
        }
        fresh
    }

    fn finish(mut self, started: Instant) -> ScanResult {
        self.stats.unused_count = self.assets.iter().filter(|a| !a.used).count();
        self.stats.elapsed_ms = started.elapsed().as_millis() as u64;
        ScanResult {
            assets: self.assets,
            stats: self.stats,
        }
    }
}

//=========================================================================================
// The Sweep
//=========================================================================================

#[derive(Debug, Clone)]
pub struct ReferenceSweep {
    batch_size: usize,
}

impl Default for ReferenceSweep {
    fn default() -> Self {
        Self {
            batch_size: STYLE_BATCH_SIZE,
        }
    }
}

impl ReferenceSweep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Runs the full sweep. Only a failure to enumerate assets is fatal.
    pub async fn run(
        &self,
        host: &dyn DesignerHost,
        progress: &ProgressTracker,
    ) -> PortResult<ScanResult> {
        let started = Instant::now();

        let assets: Vec<Asset> = host
            .list_assets()
            .await?
            .into_iter()
            .filter(Asset::is_image)
            .map(|mut a| {
                a.used = false;
                a
            })
            .collect();
        info!(count = assets.len(), "Image assets enumerated");
        progress.advance_to(progress::ASSETS_LISTED);

        let mut state = SweepState::new(assets);

        let pages = host.list_pages().await.unwrap_or_else(|e| {
            warn!("Could not enumerate pages: {}", e);
            Vec::new()
        });
        let total_pages = pages.len();
        for (i, page) in pages.iter().enumerate() {
            self.scan_page(host, page, &mut state).await;
            progress.advance_to(progress::page_percent(i + 1, total_pages));
        }
        progress.advance_to(progress::PAGES_END);

        progress.advance_to(progress::STYLES_START);
        self.scan_all_styles(host, &mut state).await;
        progress.advance_to(progress::STYLES_END);

        let result = state.finish(started);
        progress.advance_to(progress::DONE);
        info!(
            total = result.stats.total_assets,
            unused = result.stats.unused_count,
            pages = result.stats.scanned_pages,
            references = result.stats.detected_references,
            "Sweep finished in {}ms",
            result.stats.elapsed_ms
        );
        Ok(result)
    }

    async fn scan_page(&self, host: &dyn DesignerHost, page: &PageRef, state: &mut SweepState) {
        if let Err(e) = host.switch_page(page).await {
            debug!(page_id = %page.id, "Skipping page: {}", e);
            return;
        }
        state.stats.scanned_pages += 1;

        if let Ok(urls) = host.page_social_images(page).await {
            for url in urls {
                state.mark_url(&url);
            }
        }

        let elements = match host.list_elements().await {
            Ok(elements) => elements,
            Err(e) => {
                debug!(page_id = %page.id, "Could not enumerate elements: {}", e);
                return;
            }
        };

        for element in &elements {
            state.stats.scanned_elements += 1;

            if element.is_image() {
                if let Ok(Some(asset_id)) = host.image_asset_id(element).await {
                    state.mark_id(&asset_id);
                }
            }

            let styles = host.element_styles(element).await.unwrap_or_default();
            for style in styles {
                if !state.claim_style(&style) {
                    continue;
                }
                if let Ok(payload) = host.style_properties(&style).await {
                    state.scan_payload(&payload);
                }
            }
        }
    }

    /// Catches styles not attached to any visited element.
    async fn scan_all_styles(&self, host: &dyn DesignerHost, state: &mut SweepState) {
        let styles = match host.list_styles().await {
            Ok(styles) => styles,
            Err(e) => {
                debug!("Could not enumerate styles: {}", e);
                return;
            }
        };
        let pending: Vec<StyleRef> = styles
            .into_iter()
            .filter(|s| state.claim_style(s))
            .collect();

        for batch in pending.chunks(self.batch_size) {
            let payloads = join_all(batch.iter().map(|s| host.style_properties(s))).await;
            for payload in payloads.into_iter().flatten() {
                state.scan_payload(&payload);
            }
        }
    }
}
