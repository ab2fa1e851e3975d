//! reqwest-backed entity search against a marketplace REST endpoint.

use crate::{
    core::{
        entity::{EntityKind, MapEntity},
        geo::{LatLng, LatLngBounds},
    },
    search::{EntitySearch, SearchFilters, SearchPage},
    Result,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;

/// Shared async HTTP client for search requests
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("estatemap/0.1.0")
        .timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(30))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build reqwest async client")
});

#[derive(Debug, Deserialize)]
struct EntityDto {
    id: String,
    lat: f64,
    lng: f64,
    #[serde(default)]
    label: String,
    #[serde(default)]
    kind: EntityKind,
    #[serde(default)]
    detail: serde_json::Value,
}

impl From<EntityDto> for MapEntity {
    fn from(dto: EntityDto) -> Self {
        MapEntity {
            id: dto.id,
            position: LatLng::new(dto.lat, dto.lng),
            label: dto.label,
            kind: dto.kind,
            detail: dto.detail,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageDto {
    #[serde(default)]
    entities: Vec<EntityDto>,
    #[serde(default)]
    displayed_count: usize,
    #[serde(default)]
    total_count: usize,
}

/// Entity search over a REST endpoint serving map coordinates
pub struct HttpEntitySearch {
    base_url: String,
}

impl HttpEntitySearch {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    fn query_params(
        filters: &SearchFilters,
        bounds: Option<&LatLngBounds>,
    ) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = Vec::new();
        if let Some(price_min) = filters.price_min {
            params.push(("price_min".into(), price_min.to_string()));
        }
        if let Some(price_max) = filters.price_max {
            params.push(("price_max".into(), price_max.to_string()));
        }
        if let Some(beds_min) = filters.beds_min {
            params.push(("beds_min".into(), beds_min.to_string()));
        }
        if let Some(baths_min) = filters.baths_min {
            params.push(("baths_min".into(), baths_min.to_string()));
        }
        if let Some(kind) = filters.kind {
            let kind = match kind {
                EntityKind::Listing => "listing",
                EntityKind::Building => "building",
            };
            params.push(("kind".into(), kind.into()));
        }
        if let Some(extra) = filters.extra.as_object() {
            for (key, value) in extra {
                let value = match value.as_str() {
                    Some(text) => text.to_string(),
                    None => value.to_string(),
                };
                params.push((key.clone(), value));
            }
        }
        if let Some(bounds) = bounds {
            params.push(("north".into(), bounds.north().to_string()));
            params.push(("south".into(), bounds.south().to_string()));
            params.push(("east".into(), bounds.east().to_string()));
            params.push(("west".into(), bounds.west().to_string()));
        }
        params
    }
}

#[async_trait]
impl EntitySearch for HttpEntitySearch {
    async fn search(
        &self,
        filters: &SearchFilters,
        bounds: Option<&LatLngBounds>,
    ) -> Result<SearchPage> {
        let url = format!("{}/api/map-coordinates", self.base_url);
        let params = Self::query_params(filters, bounds);

        let dto: PageDto = HTTP_CLIENT
            .get(&url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(SearchPage {
            entities: dto.entities.into_iter().map(Into::into).collect(),
            displayed_count: dto.displayed_count,
            total_count: dto.total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let search = HttpEntitySearch::new("https://example.com/");
        assert_eq!(search.base_url, "https://example.com");
    }

    #[test]
    fn test_query_params_include_filters_and_bounds() {
        let filters = SearchFilters {
            price_min: Some(400_000),
            beds_min: Some(2),
            kind: Some(EntityKind::Listing),
            extra: json!({ "neighbourhood": "riverdale" }),
            ..Default::default()
        };
        let bounds = LatLngBounds::from_coords(43.0, -80.0, 44.0, -79.0);

        let params = HttpEntitySearch::query_params(&filters, Some(&bounds));
        assert!(params.contains(&("price_min".into(), "400000".into())));
        assert!(params.contains(&("beds_min".into(), "2".into())));
        assert!(params.contains(&("kind".into(), "listing".into())));
        assert!(params.contains(&("neighbourhood".into(), "riverdale".into())));
        assert!(params.contains(&("north".into(), "44".into())));
        assert!(params.contains(&("west".into(), "-80".into())));
    }

    #[test]
    fn test_page_dto_parses_entities() {
        let payload = json!({
            "entities": [
                { "id": "a", "lat": 43.65, "lng": -79.38, "label": "$725,000", "kind": "listing" },
                { "id": "b", "lat": 43.66, "lng": -79.39, "label": "The Residences", "kind": "building" }
            ],
            "displayed_count": 2,
            "total_count": 120
        });

        let dto: PageDto = serde_json::from_value(payload).unwrap();
        assert_eq!(dto.entities.len(), 2);
        assert_eq!(dto.entities[1].kind, EntityKind::Building);
        assert_eq!(dto.total_count, 120);
    }
}
