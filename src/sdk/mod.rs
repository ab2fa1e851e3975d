//! Object-safe abstraction over the third-party map widget.
//!
//! The engine never talks to a concrete widget SDK directly; everything
//! it needs is expressed through the traits here. A hosting application
//! supplies real implementations (backed by whatever retained-mode
//! widget it embeds), while [`mock`] supplies fully inspectable ones
//! for tests and headless runs.

pub mod loader;
pub mod mock;

use crate::{
    core::geo::{project, LatLng, LatLngBounds},
    prelude::HashMap,
    Result,
};
use async_trait::async_trait;
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// Size/colour bucket for aggregate cluster markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterTier {
    Small,
    Medium,
    Large,
}

impl ClusterTier {
    pub fn for_count(count: usize) -> Self {
        if count < 10 {
            ClusterTier::Small
        } else if count < 100 {
            ClusterTier::Medium
        } else {
            ClusterTier::Large
        }
    }
}

/// Visual presentation of a marker pin
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerIcon {
    Pin,
    PinEmphasis,
    Cluster { count: usize, tier: ClusterTier },
}

/// Everything the widget needs to place one marker
#[derive(Debug, Clone)]
pub struct MarkerSpec {
    pub id: String,
    pub position: LatLng,
    pub label: String,
    pub icon: MarkerIcon,
}

/// Events the widget reports back to the engine
#[derive(Debug, Clone)]
pub enum MapEvent {
    /// Pan/zoom came to rest
    Idle { bounds: LatLngBounds, zoom: f64 },
    /// The user started dragging the map
    DragStart,
    /// The user started a zoom gesture
    ZoomStart,
    /// A marker was clicked
    MarkerClicked { id: String },
    /// The pointer entered or left a marker
    MarkerHover { id: String, entered: bool },
}

/// Opaque handle to the DOM node the widget renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle {
    pub id: u64,
}

/// Initial view state handed to the widget at creation
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub center: LatLng,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

/// One marker object owned by the widget
pub trait MarkerObject: Send {
    fn id(&self) -> &str;
    fn position(&self) -> LatLng;
    fn set_icon(&mut self, icon: MarkerIcon) -> Result<()>;
    fn set_label(&mut self, label: &str) -> Result<()>;
    /// Removes the marker from the map and detaches its listeners
    fn remove(&mut self) -> Result<()>;
}

/// One live map created by the widget SDK
pub trait MapInstance: Send {
    fn center(&self) -> LatLng;
    fn zoom(&self) -> f64;
    fn set_center(&mut self, center: LatLng);
    fn set_zoom(&mut self, zoom: f64);
    fn bounds(&self) -> LatLngBounds;
    fn fit_bounds(&mut self, bounds: &LatLngBounds) -> Result<()>;
    fn add_marker(&mut self, spec: MarkerSpec) -> Result<Box<dyn MarkerObject>>;
    /// Opens the single shared detail panel anchored to a marker.
    /// Opening implicitly closes any previously open panel.
    fn open_info_panel(&mut self, anchor_id: &str, text: &str) -> Result<()>;
    fn close_info_panel(&mut self);
    /// Event stream for this instance; receivers may be cloned freely
    fn events(&self) -> Receiver<MapEvent>;
    /// Best-effort removal of widget-level listeners before teardown
    fn clear_listeners(&mut self);
}

/// Entry point the widget SDK exposes once its script has loaded
pub trait MapSdk: Send + Sync {
    fn create_map(&self, container: ContainerHandle, options: &MapOptions) -> Result<Box<dyn MapInstance>>;
}

/// Loads the widget SDK (script injection in a browser host)
#[async_trait]
pub trait SdkProvider: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn MapSdk>>;
}

/// Loads the optional clustering capability
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn ClusterCapability>>;
}

/// Input to the grouping computation
#[derive(Debug, Clone)]
pub struct ClusterPoint {
    pub id: String,
    pub position: LatLng,
}

/// One group produced by the grouping computation
#[derive(Debug, Clone)]
pub struct ClusterGroup {
    pub id: String,
    pub members: Vec<String>,
    pub center: LatLng,
    pub bounds: LatLngBounds,
}

/// Radius-based grouping of markers at a zoom level
pub trait ClusterCapability: Send + Sync {
    fn group(&self, points: &[ClusterPoint], zoom: f64) -> Vec<ClusterGroup>;
}

/// Grid-based clustering: points whose projected positions land in the
/// same pixel cell at the current zoom bucket collapse into one group.
pub struct GridClusterer {
    radius_px: f64,
}

impl GridClusterer {
    pub fn new(radius_px: f64) -> Self {
        Self { radius_px }
    }
}

impl ClusterCapability for GridClusterer {
    fn group(&self, points: &[ClusterPoint], zoom: f64) -> Vec<ClusterGroup> {
        let bucket_zoom = zoom.floor();
        let mut cells: HashMap<(i64, i64), Vec<&ClusterPoint>> = HashMap::default();

        for point in points {
            let pixel = project(&point.position, bucket_zoom);
            let cell = (
                (pixel.x / self.radius_px).floor() as i64,
                (pixel.y / self.radius_px).floor() as i64,
            );
            cells.entry(cell).or_default().push(point);
        }

        let mut groups: Vec<ClusterGroup> = cells
            .into_iter()
            .map(|((cell_x, cell_y), members)| {
                let bounds = LatLngBounds::around(members.iter().map(|p| p.position))
                    .unwrap_or_else(|| LatLngBounds::new(LatLng::default(), LatLng::default()));
                ClusterGroup {
                    id: format!("cluster_{}_{}", cell_x, cell_y),
                    members: members.iter().map(|p| p.id.clone()).collect(),
                    center: bounds.center(),
                    bounds,
                }
            })
            .collect();

        groups.sort_by(|a, b| a.id.cmp(&b.id));
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, lat: f64, lng: f64) -> ClusterPoint {
        ClusterPoint {
            id: id.to_string(),
            position: LatLng::new(lat, lng),
        }
    }

    #[test]
    fn test_tier_buckets() {
        assert_eq!(ClusterTier::for_count(3), ClusterTier::Small);
        assert_eq!(ClusterTier::for_count(10), ClusterTier::Medium);
        assert_eq!(ClusterTier::for_count(99), ClusterTier::Medium);
        assert_eq!(ClusterTier::for_count(100), ClusterTier::Large);
    }

    #[test]
    fn test_nearby_points_group_at_low_zoom() {
        let clusterer = GridClusterer::new(80.0);
        let points = vec![
            point("a", 43.6500, -79.3800),
            point("b", 43.6501, -79.3801),
            point("c", 43.6502, -79.3802),
        ];

        let groups = clusterer.group(&points, 3.0);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 3);

        for p in &points {
            assert!(groups[0].bounds.contains(&p.position));
        }
    }

    #[test]
    fn test_distant_points_stay_apart_at_high_zoom() {
        let clusterer = GridClusterer::new(80.0);
        let points = vec![point("a", 43.65, -79.38), point("b", 49.28, -123.12)];

        let groups = clusterer.group(&points, 10.0);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.members.len() == 1));
    }
}
