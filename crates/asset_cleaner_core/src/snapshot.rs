//! crates/asset_cleaner_core/src/snapshot.rs
//!
//! An in-memory document that implements `DesignerHost`. It is loaded from a JSON
//! export of a project and can pretend to be an older host version by listing
//! capabilities under `missing`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{Asset, ElementKind, ElementRef, PageRef, StyleRef};
use crate::ports::{DesignerHost, PortError, PortResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotElement {
    pub id: String,
    pub kind: ElementKind,
    #[serde(default)]
    pub asset_id: Option<String>,
    /// Style ids attached to this element, inline style included.
    #[serde(default)]
    pub styles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPage {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub elements: Vec<SnapshotElement>,
    #[serde(default)]
    pub social_images: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotStyle {
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub pages: Vec<SnapshotPage>,
    #[serde(default)]
    pub styles: Vec<SnapshotStyle>,
    /// Capabilities this host version does not expose.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    /// Pages whose context switch fails.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub broken_pages: Vec<String>,
    /// Styles whose property fetch fails.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub broken_styles: Vec<String>,
    #[serde(skip)]
    pub(crate) current_page: Mutex<Option<String>>,
    #[serde(skip)]
    pub(crate) removed: Mutex<HashSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DocumentSnapshot {
    pub fn from_json(text: &str) -> PortResult<Self> {
        serde_json::from_str(text).map_err(|e| PortError::MalformedJson(e.to_string()))
    }

    pub fn to_json(&self) -> PortResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    /// Ids removed through either removal capability.
    pub fn removed_assets(&self) -> HashSet<String> {
        lock(&self.removed).clone()
    }

    /// Drops removed assets from the document itself.
    pub fn prune_removed(&mut self) {
        let removed = std::mem::take(&mut *lock(&self.removed));
        self.assets.retain(|a| !removed.contains(&a.id));
    }

    fn check(&self, capability: &'static str) -> PortResult<()> {
        if self.missing.iter().any(|m| m == capability) {
            Err(PortError::Unavailable(capability))
        } else {
            Ok(())
        }
    }

    fn current(&self) -> PortResult<&SnapshotPage> {
        let current = lock(&self.current_page).clone();
        let id = current.ok_or_else(|| PortError::NotFound("no current page".to_string()))?;
        self.pages
            .iter()
            .find(|p| p.id == id)
            .ok_or(PortError::NotFound(id))
    }

    fn remove(&self, asset_id: &str) -> PortResult<()> {
        if !self.assets.iter().any(|a| a.id == asset_id) {
            return Err(PortError::NotFound(asset_id.to_string()));
        }
        lock(&self.removed).insert(asset_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl DesignerHost for DocumentSnapshot {
    async fn current_site_id(&self) -> PortResult<String> {
        self.check("current_site_id")?;
        self.site_id
            .clone()
            .ok_or_else(|| PortError::NotFound("site id".to_string()))
    }

    async fn list_assets(&self) -> PortResult<Vec<Asset>> {
        self.check("list_assets")?;
        let removed = lock(&self.removed);
        Ok(self
            .assets
            .iter()
            .filter(|a| !removed.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn list_pages(&self) -> PortResult<Vec<PageRef>> {
        self.check("list_pages")?;
        Ok(self
            .pages
            .iter()
            .map(|p| PageRef {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect())
    }

    async fn switch_page(&self, page: &PageRef) -> PortResult<()> {
        self.check("switch_page")?;
        if self.broken_pages.contains(&page.id) {
            return Err(PortError::Transport(format!("page {} failed to load", page.id)));
        }
        if !self.pages.iter().any(|p| p.id == page.id) {
            return Err(PortError::NotFound(page.id.clone()));
        }
        *lock(&self.current_page) = Some(page.id.clone());
        Ok(())
    }

    async fn list_elements(&self) -> PortResult<Vec<ElementRef>> {
        self.check("list_elements")?;
        Ok(self
            .current()?
            .elements
            .iter()
            .map(|e| ElementRef {
                id: e.id.clone(),
                kind: e.kind.clone(),
            })
            .collect())
    }

    async fn image_asset_id(&self, element: &ElementRef) -> PortResult<Option<String>> {
        self.check("image_asset_id")?;
        Ok(self
            .current()?
            .elements
            .iter()
            .find(|e| e.id == element.id)
            .and_then(|e| e.asset_id.clone()))
    }

    async fn element_styles(&self, element: &ElementRef) -> PortResult<Vec<StyleRef>> {
        self.check("element_styles")?;
        let found = self
            .current()?
            .elements
            .iter()
            .find(|e| e.id == element.id)
            .ok_or_else(|| PortError::NotFound(element.id.clone()))?;
        Ok(found
            .styles
            .iter()
            .map(|id| StyleRef { id: id.clone() })
            .collect())
    }

    async fn style_properties(&self, style: &StyleRef) -> PortResult<serde_json::Value> {
        self.check("style_properties")?;
        if self.broken_styles.contains(&style.id) {
            return Err(PortError::Transport(format!("style {} failed to load", style.id)));
        }
        self.styles
            .iter()
            .find(|s| s.id == style.id)
            .map(|s| s.properties.clone())
            .ok_or_else(|| PortError::NotFound(style.id.clone()))
    }

    async fn page_social_images(&self, page: &PageRef) -> PortResult<Vec<String>> {
        self.check("page_social_images")?;
        self.pages
            .iter()
            .find(|p| p.id == page.id)
            .map(|p| p.social_images.clone())
            .ok_or_else(|| PortError::NotFound(page.id.clone()))
    }

    async fn list_styles(&self) -> PortResult<Vec<StyleRef>> {
        self.check("list_styles")?;
        Ok(self
            .styles
            .iter()
            .map(|s| StyleRef { id: s.id.clone() })
            .collect())
    }

    async fn remove_asset_object(&self, asset_id: &str) -> PortResult<()> {
        self.check("remove_asset_object")?;
        self.remove(asset_id)
    }

    async fn remove_asset_via_host(&self, asset_id: &str) -> PortResult<()> {
        self.check("remove_asset_via_host")?;
        self.remove(asset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "siteId": "site-1",
        "assets": [
            {"id": "a1", "name": "a.png", "mimeType": "image/png", "url": "https://cdn.example.com/a.png"}
        ],
        "pages": [
            {"id": "p1", "elements": [{"id": "e1", "kind": "image", "assetId": "a1"}, {"id": "e2", "kind": "Heading"}]}
        ],
        "missing": ["remove_asset_object"]
    }"#;

    #[tokio::test]
    async fn loads_export_and_walks_pages() {
        let doc = DocumentSnapshot::from_json(EXPORT).unwrap();
        assert_eq!(doc.current_site_id().await.unwrap(), "site-1");

        // no page selected yet
        assert!(doc.list_elements().await.is_err());

        let pages = doc.list_pages().await.unwrap();
        doc.switch_page(&pages[0]).await.unwrap();
        let elements = doc.list_elements().await.unwrap();
        assert_eq!(elements.len(), 2);
        assert!(elements[0].is_image());
        assert_eq!(elements[1].kind, ElementKind::Other("Heading".to_string()));
        assert_eq!(
            doc.image_asset_id(&elements[0]).await.unwrap().as_deref(),
            Some("a1")
        );
    }

    #[tokio::test]
    async fn missing_capability_reports_unavailable() {
        let mut doc = DocumentSnapshot::from_json(EXPORT).unwrap();
        assert_eq!(
            doc.remove_asset_object("a1").await,
            Err(PortError::Unavailable("remove_asset_object"))
        );
        doc.remove_asset_via_host("a1").await.unwrap();
        assert!(doc.list_assets().await.unwrap().is_empty());

        doc.prune_removed();
        assert!(doc.assets.is_empty());
        assert!(doc.removed_assets().is_empty());
    }

    #[test]
    fn malformed_export_is_rejected() {
        assert!(matches!(
            DocumentSnapshot::from_json("{\"assets\": 3}"),
            Err(PortError::MalformedJson(_))
        ));
    }
}
