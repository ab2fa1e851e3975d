//! Collaborator contracts the engine consumes: entity search, detail
//! popover content, and navigation. Concrete endpoint paths are owned
//! by the hosting application; the engine only sees these traits.

pub mod cache;
#[cfg(feature = "http-search")]
pub mod http;

use crate::{
    core::{
        entity::{format_price, EntityKind, MapEntity},
        geo::LatLngBounds,
    },
    Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Listing filters forwarded to the search collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub price_min: Option<u64>,
    pub price_max: Option<u64>,
    pub beds_min: Option<u32>,
    pub baths_min: Option<u32>,
    pub kind: Option<EntityKind>,
    /// Host-specific filter parameters passed through untouched
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl SearchFilters {
    /// Stable hash used as part of cache keys
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = fxhash::FxHasher::default();
        self.price_min.hash(&mut hasher);
        self.price_max.hash(&mut hasher);
        self.beds_min.hash(&mut hasher);
        self.baths_min.hash(&mut hasher);
        self.kind.hash(&mut hasher);
        serde_json::to_string(&self.extra)
            .unwrap_or_default()
            .hash(&mut hasher);
        hasher.finish()
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub entities: Vec<MapEntity>,
    pub displayed_count: usize,
    pub total_count: usize,
}

impl SearchPage {
    /// Indicator copy, e.g. "50 of 500"
    pub fn count_caption(&self) -> String {
        format!("{} of {}", self.displayed_count, self.total_count)
    }
}

/// Entity search collaborator. Called with filters alone on initial
/// load, or with filters plus bounds for viewport-scoped refinement.
/// Errors surface as rejected futures; the engine never retries.
#[async_trait]
pub trait EntitySearch: Send + Sync {
    async fn search(
        &self,
        filters: &SearchFilters,
        bounds: Option<&LatLngBounds>,
    ) -> Result<SearchPage>;
}

/// Renderable summary for the detail popover
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopoverContent {
    pub heading: String,
    pub price_line: Option<String>,
    pub meta_line: Option<String>,
    pub thumbnail_url: Option<String>,
    pub detail_url: Option<String>,
}

impl PopoverContent {
    /// Compact text rendering for the widget's info panel
    pub fn panel_text(&self) -> String {
        let mut lines = vec![self.heading.clone()];
        if let Some(price) = &self.price_line {
            lines.push(price.clone());
        }
        if let Some(meta) = &self.meta_line {
            lines.push(meta.clone());
        }
        if let Some(url) = &self.detail_url {
            lines.push(url.clone());
        }
        lines.join("\n")
    }
}

/// Produces popover content from an entity's detail record
pub trait DetailContent: Send + Sync {
    fn summarize(&self, entity: &MapEntity) -> PopoverContent;
}

/// Default summary built from the conventional detail-record fields
pub struct ListingSummary;

impl DetailContent for ListingSummary {
    fn summarize(&self, entity: &MapEntity) -> PopoverContent {
        let detail = &entity.detail;
        let heading = detail
            .get("address")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| entity.label.clone());
        let price_line = detail
            .get("price")
            .and_then(serde_json::Value::as_f64)
            .map(format_price);
        let beds = detail.get("beds").and_then(serde_json::Value::as_u64);
        let baths = detail.get("baths").and_then(serde_json::Value::as_u64);
        let meta_line = match (beds, baths) {
            (Some(beds), Some(baths)) => Some(format!("{} bd, {} ba", beds, baths)),
            (Some(beds), None) => Some(format!("{} bd", beds)),
            (None, Some(baths)) => Some(format!("{} ba", baths)),
            (None, None) => None,
        };
        let thumbnail_url = detail
            .get("photo")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let detail_url = detail
            .get("url")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        PopoverContent {
            heading,
            price_line,
            meta_line,
            thumbnail_url,
            detail_url,
        }
    }
}

/// Resolves entities to URLs and performs full-page navigation.
/// The engine resolves and hands off; the host owns the actual jump.
pub trait Navigator: Send + Sync {
    fn entity_url(&self, entity: &MapEntity) -> String;
    fn navigate(&self, url: &str);
}

/// Path-based navigator with conventional marketplace routes
pub struct UrlNavigator {
    pub listing_base: String,
    pub building_base: String,
}

impl Default for UrlNavigator {
    fn default() -> Self {
        Self {
            listing_base: "/listings".to_string(),
            building_base: "/buildings".to_string(),
        }
    }
}

impl Navigator for UrlNavigator {
    fn entity_url(&self, entity: &MapEntity) -> String {
        match entity.kind {
            EntityKind::Listing => format!("{}/{}", self.listing_base, entity.id),
            EntityKind::Building => format!("{}/{}", self.building_base, entity.id),
        }
    }

    fn navigate(&self, url: &str) {
        log::info!("navigating to {url}");
    }
}
