use crate::core::geo::LatLng;
use crate::prelude::HashSet;
use serde::{Deserialize, Serialize};

/// What a point on the map represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Listing,
    Building,
}

impl Default for EntityKind {
    fn default() -> Self {
        EntityKind::Listing
    }
}

/// A point-like thing to display on the map.
///
/// Identity is `id`. The `detail` record is opaque to the engine and is
/// never mutated; it is handed back to the detail-content collaborator
/// when a popover opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapEntity {
    pub id: String,
    pub position: LatLng,
    pub label: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl MapEntity {
    pub fn new(id: impl Into<String>, kind: EntityKind, lat: f64, lng: f64, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position: LatLng::new(lat, lng),
            label: label.into(),
            kind,
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Drops entities with non-finite coordinates and deduplicates by id,
/// keeping the first occurrence. Invalid entries are dropped silently;
/// they must never crash marker creation.
pub fn sanitize(entities: &[MapEntity]) -> Vec<MapEntity> {
    let mut seen: HashSet<&str> = HashSet::default();
    entities
        .iter()
        .filter(|entity| entity.position.is_finite())
        .filter(|entity| seen.insert(entity.id.as_str()))
        .cloned()
        .collect()
}

/// Average position of the given entities, if any
pub fn centroid(entities: &[MapEntity]) -> Option<LatLng> {
    if entities.is_empty() {
        return None;
    }
    let (lat_sum, lng_sum) = entities.iter().fold((0.0, 0.0), |(lat, lng), entity| {
        (lat + entity.position.lat, lng + entity.position.lng)
    });
    let n = entities.len() as f64;
    Some(LatLng::new(lat_sum / n, lng_sum / n))
}

/// Derives the pin label for an entity.
///
/// Listings show a price when the detail record carries one, buildings
/// show their name. Anything longer than `max_len` is truncated with a
/// trailing ellipsis to keep pins compact.
pub fn marker_label(entity: &MapEntity, max_len: usize) -> String {
    let base = match entity.kind {
        EntityKind::Listing => entity
            .detail
            .get("price")
            .and_then(serde_json::Value::as_f64)
            .map(format_price)
            .unwrap_or_else(|| entity.label.clone()),
        EntityKind::Building => entity.label.clone(),
    };
    truncate_label(&base, max_len)
}

/// Formats a dollar amount with thousands separators, e.g. "$1,234,000"
pub fn format_price(value: f64) -> String {
    let cents_free = value.round().abs() as u64;
    let digits = cents_free.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${}", grouped)
}

fn truncate_label(label: &str, max_len: usize) -> String {
    let count = label.chars().count();
    if count <= max_len {
        return label.to_string();
    }
    let keep = max_len.saturating_sub(1);
    let mut truncated: String = label.chars().take(keep).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(id: &str, lat: f64, lng: f64) -> MapEntity {
        MapEntity::new(id, EntityKind::Listing, lat, lng, "label")
    }

    #[test]
    fn test_sanitize_drops_non_finite() {
        let entities = vec![
            listing("a", 43.65, -79.38),
            listing("b", f64::NAN, -79.38),
            listing("c", 43.65, f64::INFINITY),
        ];

        let clean = sanitize(&entities);
        assert_eq!(clean.len(), 1);
        assert_eq!(clean[0].id, "a");
    }

    #[test]
    fn test_sanitize_dedupes_by_id_first_wins() {
        let mut first = listing("a", 43.65, -79.38);
        first.label = "first".into();
        let mut second = listing("a", 44.0, -80.0);
        second.label = "second".into();

        let clean = sanitize(&[first, second, listing("b", 43.0, -79.0)]);
        assert_eq!(clean.len(), 2);
        assert_eq!(clean[0].label, "first");
    }

    #[test]
    fn test_centroid() {
        let entities = vec![listing("a", 43.0, -79.0), listing("b", 45.0, -81.0)];
        let center = centroid(&entities).unwrap();
        assert!((center.lat - 44.0).abs() < 1e-9);
        assert!((center.lng - -80.0).abs() < 1e-9);

        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(450000.0), "$450,000");
        assert_eq!(format_price(1234000.0), "$1,234,000");
        assert_eq!(format_price(999.0), "$999");
    }

    #[test]
    fn test_listing_label_prefers_detail_price() {
        let entity = listing("a", 43.65, -79.38).with_detail(json!({ "price": 725000 }));
        assert_eq!(marker_label(&entity, 24), "$725,000");
    }

    #[test]
    fn test_building_label_uses_name() {
        let entity = MapEntity::new("b", EntityKind::Building, 43.65, -79.38, "The Residences");
        assert_eq!(marker_label(&entity, 24), "The Residences");
    }

    #[test]
    fn test_label_truncation() {
        let entity = MapEntity::new(
            "b",
            EntityKind::Building,
            43.65,
            -79.38,
            "A Very Long Building Name That Keeps Going",
        );
        let label = marker_label(&entity, 16);
        assert_eq!(label.chars().count(), 16);
        assert!(label.ends_with('…'));
        assert_eq!(label, "A Very Long Bui…");

        // At the limit the label passes through unchanged
        let exact = MapEntity::new("c", EntityKind::Building, 43.65, -79.38, "Sixteen chars!!!");
        assert_eq!(marker_label(&exact, 16), "Sixteen chars!!!");
    }
}
