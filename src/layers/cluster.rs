//! Optional cluster grouping over the marker layer.
//!
//! The grouping capability loads lazily through the shared loader; a
//! load failure degrades permanently to pass-through ungrouped markers
//! and never blocks rendering. Aggregate markers are destroyed and
//! rebuilt as a whole whenever the underlying entity set or zoom bucket
//! changes; they are never partially patched.

use crate::{
    core::{
        config::ClusterConfig,
        entity::{sanitize, MapEntity},
        geo::LatLngBounds,
    },
    layers::marker::{MarkerLayer, SyncStats},
    prelude::{HashMap, HashSet},
    sdk::{
        loader::SharedLoader, ClusterCapability, ClusterPoint, ClusterProvider, ClusterTier,
        MapInstance, MarkerIcon, MarkerObject, MarkerSpec,
    },
    search::{DetailContent, Navigator},
    Result,
};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

enum Capability {
    Unresolved,
    Ready(Arc<dyn ClusterCapability>),
    Unavailable,
}

/// One aggregate marker grouping several entities at the current zoom
pub struct ClusterHandle {
    marker: Box<dyn MarkerObject>,
    pub members: Vec<String>,
    pub bounds: LatLngBounds,
    pub count: usize,
}

pub struct ClusterLayer {
    inner: MarkerLayer,
    config: ClusterConfig,
    capability: Capability,
    clusters: HashMap<String, ClusterHandle>,
    entities: Vec<MapEntity>,
    last_signature: Option<u64>,
    fitted: bool,
}

impl ClusterLayer {
    pub fn new(inner: MarkerLayer, config: ClusterConfig) -> Self {
        Self {
            inner,
            config,
            capability: Capability::Unresolved,
            clusters: HashMap::default(),
            entities: Vec::new(),
            last_signature: None,
            fitted: false,
        }
    }

    /// Resolves the grouping capability once. A failed load leaves the
    /// layer in pass-through mode for good.
    pub async fn ensure_capability(
        &mut self,
        loader: &SharedLoader<dyn ClusterCapability>,
        provider: &dyn ClusterProvider,
    ) {
        if !matches!(self.capability, Capability::Unresolved) {
            return;
        }
        match loader.get_or_load(|| provider.load()).await {
            Ok(capability) => self.capability = Capability::Ready(capability),
            Err(error) => {
                log::debug!("clustering unavailable, markers stay ungrouped: {error}");
                self.capability = Capability::Unavailable;
            }
        }
    }

    pub fn grouping_available(&self) -> bool {
        matches!(self.capability, Capability::Ready(_))
    }

    /// Ids of the current aggregate markers, sorted
    pub fn cluster_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clusters.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn cluster(&self, id: &str) -> Option<&ClusterHandle> {
        self.clusters.get(id)
    }

    /// Ids of the individually rendered markers, sorted
    pub fn marker_ids(&self) -> Vec<String> {
        self.inner.ids()
    }

    /// Bounding box over the full entity set
    pub fn entity_bounds(&self) -> Option<LatLngBounds> {
        LatLngBounds::around(self.entities.iter().map(|entity| entity.position))
    }

    pub fn sync(
        &mut self,
        map: &mut dyn MapInstance,
        entities: &[MapEntity],
        suppress_fit: bool,
    ) -> Result<SyncStats> {
        self.entities = sanitize(entities);
        self.regroup(map, suppress_fit)
    }

    /// Recomputes grouping against the current zoom, delegating single
    /// markers to the inner layer. The first-population fit spans the
    /// whole entity set, grouped or not, and runs before grouping so
    /// clusters form at the final zoom.
    pub fn regroup(&mut self, map: &mut dyn MapInstance, suppress_fit: bool) -> Result<SyncStats> {
        self.fit_first_population(map, suppress_fit)?;

        let zoom = map.zoom();
        let capability = match &self.capability {
            Capability::Ready(capability) if zoom < self.config.disable_at_zoom => {
                Some(capability.clone())
            }
            _ => None,
        };

        let Some(capability) = capability else {
            self.destroy_clusters()?;
            self.last_signature = None;
            let entities = self.entities.clone();
            return self.inner.sync(map, &entities, true);
        };

        let bucket = zoom.floor() as i64;
        let signature = Self::signature(&self.entities, bucket);

        let points: Vec<ClusterPoint> = self
            .entities
            .iter()
            .map(|entity| ClusterPoint {
                id: entity.id.clone(),
                position: entity.position,
            })
            .collect();
        let groups = capability.group(&points, zoom);

        let single_ids: HashSet<&str> = groups
            .iter()
            .filter(|group| group.members.len() == 1)
            .flat_map(|group| group.members.iter().map(String::as_str))
            .collect();
        let singles: Vec<MapEntity> = self
            .entities
            .iter()
            .filter(|entity| single_ids.contains(entity.id.as_str()))
            .cloned()
            .collect();

        let stats = self.inner.sync(map, &singles, true)?;

        if self.last_signature != Some(signature) {
            self.destroy_clusters()?;
            for group in groups.iter().filter(|group| group.members.len() >= 2) {
                let count = group.members.len();
                let marker = map.add_marker(MarkerSpec {
                    id: group.id.clone(),
                    position: group.center,
                    label: count.to_string(),
                    icon: MarkerIcon::Cluster {
                        count,
                        tier: ClusterTier::for_count(count),
                    },
                })?;
                self.clusters.insert(
                    group.id.clone(),
                    ClusterHandle {
                        marker,
                        members: group.members.clone(),
                        bounds: group.bounds.clone(),
                        count,
                    },
                );
            }
            self.last_signature = Some(signature);
        }

        Ok(stats)
    }

    /// Expands a clicked aggregate: fit its members, then step the zoom
    /// in by the configured increment, capped at max zoom. Non-cluster
    /// ids fall through to the marker layer.
    pub fn handle_click(
        &mut self,
        map: &mut dyn MapInstance,
        id: &str,
        navigator: &dyn Navigator,
        content: &dyn DetailContent,
    ) -> Result<()> {
        if let Some(cluster) = self.clusters.get(id) {
            let bounds = cluster.bounds.clone();
            map.fit_bounds(&bounds)?;
            let target = (map.zoom() + self.config.expand_zoom_step).min(self.config.max_zoom);
            map.set_zoom(target);
            return Ok(());
        }
        self.inner.handle_click(map, id, navigator, content)
    }

    pub fn handle_hover(&mut self, map: &mut dyn MapInstance, id: &str, entered: bool) -> Result<()> {
        if self.clusters.contains_key(id) {
            return Ok(());
        }
        self.inner.handle_hover(map, id, entered)
    }

    pub fn clear(&mut self, map: &mut dyn MapInstance) -> Result<()> {
        self.destroy_clusters()?;
        self.entities.clear();
        self.last_signature = None;
        self.inner.clear(map)
    }

    /// Fits the map to the full entity set on first population only,
    /// clamping the resulting zoom. Suppressed (and spent) when the
    /// user already controls the viewport.
    fn fit_first_population(&mut self, map: &mut dyn MapInstance, suppress_fit: bool) -> Result<()> {
        if self.fitted || self.entities.is_empty() {
            return Ok(());
        }
        if !suppress_fit {
            if let Some(bounds) = self.entity_bounds() {
                map.fit_bounds(&bounds)?;
                let max_auto_zoom = self.inner.config().max_auto_zoom;
                if map.zoom() > max_auto_zoom {
                    map.set_zoom(max_auto_zoom);
                }
            }
        }
        self.fitted = true;
        Ok(())
    }

    fn destroy_clusters(&mut self) -> Result<()> {
        for (_, mut handle) in self.clusters.drain() {
            handle.marker.remove()?;
        }
        Ok(())
    }

    fn signature(entities: &[MapEntity], bucket: i64) -> u64 {
        let mut ids: Vec<&str> = entities.iter().map(|entity| entity.id.as_str()).collect();
        ids.sort_unstable();
        let mut hasher = fxhash::FxHasher::default();
        ids.hash(&mut hasher);
        bucket.hash(&mut hasher);
        hasher.finish()
    }
}
