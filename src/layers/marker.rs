//! Synchronizes one marker per entity against the widget.
//!
//! The layer exclusively owns its marker handles. Each sync pass diffs
//! the incoming entity list against the rendered set: departed ids are
//! destroyed, new ids are created, surviving ids keep their existing
//! marker object untouched. Recreating a surviving marker would cancel
//! in-flight hover state and flicker, so reuse is a correctness
//! requirement here, not an optimization.

use crate::{
    core::{
        config::MarkerConfig,
        entity::{marker_label, sanitize, EntityKind, MapEntity},
        geo::LatLngBounds,
    },
    prelude::{HashMap, HashSet},
    sdk::{MapInstance, MarkerIcon, MarkerObject, MarkerSpec},
    search::{DetailContent, Navigator},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverPhase {
    Enter,
    Leave,
}

/// Host-supplied reactions to marker interactions
#[derive(Default)]
pub struct MarkerCallbacks {
    pub on_click: Option<Box<dyn FnMut(&MapEntity) + Send>>,
    pub on_hover: Option<Box<dyn FnMut(&MapEntity, HoverPhase) + Send>>,
}

/// One rendered entity: the widget marker plus its entity snapshot
pub struct MarkerHandle {
    marker: Box<dyn MarkerObject>,
    entity: MapEntity,
    emphasized: bool,
}

impl MarkerHandle {
    pub fn entity(&self) -> &MapEntity {
        &self.entity
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub created: usize,
    pub removed: usize,
    pub kept: usize,
}

pub struct MarkerLayer {
    config: MarkerConfig,
    handles: HashMap<String, MarkerHandle>,
    callbacks: MarkerCallbacks,
    fitted: bool,
    open_popover: Option<String>,
}

impl MarkerLayer {
    pub fn new(config: MarkerConfig) -> Self {
        Self {
            config,
            handles: HashMap::default(),
            callbacks: MarkerCallbacks::default(),
            fitted: false,
            open_popover: None,
        }
    }

    pub fn with_callbacks(mut self, callbacks: MarkerCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handles.contains_key(id)
    }

    /// Rendered marker ids, sorted for stable output
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handles.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn entity(&self, id: &str) -> Option<&MapEntity> {
        self.handles.get(id).map(|handle| &handle.entity)
    }

    /// Bounding box over all rendered markers
    pub fn marker_bounds(&self) -> Option<LatLngBounds> {
        LatLngBounds::around(self.handles.values().map(|handle| handle.entity.position))
    }

    /// Brings the rendered marker set in line with `entities`.
    ///
    /// On the first non-empty population the map is fitted to the
    /// marker bounding box (zoom clamped) unless `suppress_fit` is set,
    /// which the facade does once the user has taken control of the
    /// viewport.
    pub fn sync(
        &mut self,
        map: &mut dyn MapInstance,
        entities: &[MapEntity],
        suppress_fit: bool,
    ) -> Result<SyncStats> {
        let wanted = sanitize(entities);
        let wanted_ids: HashSet<&str> = wanted.iter().map(|entity| entity.id.as_str()).collect();
        let mut stats = SyncStats::default();

        let departed: Vec<String> = self
            .handles
            .keys()
            .filter(|id| !wanted_ids.contains(id.as_str()))
            .cloned()
            .collect();
        for id in departed {
            if let Some(mut handle) = self.handles.remove(&id) {
                handle.marker.remove()?;
                if self.open_popover.as_deref() == Some(id.as_str()) {
                    map.close_info_panel();
                    self.open_popover = None;
                }
                stats.removed += 1;
            }
        }

        for entity in &wanted {
            match self.handles.get_mut(&entity.id) {
                Some(handle) => {
                    // Keep the marker, refresh the snapshot the popover reads
                    handle.entity = entity.clone();
                    stats.kept += 1;
                }
                None => {
                    let label = marker_label(entity, self.config.label_max_len);
                    let marker = map.add_marker(MarkerSpec {
                        id: entity.id.clone(),
                        position: entity.position,
                        label,
                        icon: MarkerIcon::Pin,
                    })?;
                    self.handles.insert(
                        entity.id.clone(),
                        MarkerHandle {
                            marker,
                            entity: entity.clone(),
                            emphasized: false,
                        },
                    );
                    stats.created += 1;
                }
            }
        }

        if !self.fitted && !self.handles.is_empty() {
            if !suppress_fit {
                if let Some(bounds) = self.marker_bounds() {
                    map.fit_bounds(&bounds)?;
                    if map.zoom() > self.config.max_auto_zoom {
                        map.set_zoom(self.config.max_auto_zoom);
                    }
                }
            }
            self.fitted = true;
        }

        Ok(stats)
    }

    /// Swaps the hovered marker's icon and notifies the host
    pub fn handle_hover(
        &mut self,
        _map: &mut dyn MapInstance,
        id: &str,
        entered: bool,
    ) -> Result<()> {
        let Some(handle) = self.handles.get_mut(id) else {
            return Ok(());
        };
        if entered != handle.emphasized {
            let icon = if entered {
                MarkerIcon::PinEmphasis
            } else {
                MarkerIcon::Pin
            };
            handle.marker.set_icon(icon)?;
            handle.emphasized = entered;
        }
        let entity = handle.entity.clone();
        if let Some(on_hover) = self.callbacks.on_hover.as_mut() {
            let phase = if entered { HoverPhase::Enter } else { HoverPhase::Leave };
            on_hover(&entity, phase);
        }
        Ok(())
    }

    /// Buildings navigate straight to their page; listings open the
    /// shared detail popover and notify the host.
    pub fn handle_click(
        &mut self,
        map: &mut dyn MapInstance,
        id: &str,
        navigator: &dyn Navigator,
        content: &dyn DetailContent,
    ) -> Result<()> {
        let Some(handle) = self.handles.get(id) else {
            return Ok(());
        };
        let entity = handle.entity.clone();
        match entity.kind {
            EntityKind::Building => {
                let url = navigator.entity_url(&entity);
                navigator.navigate(&url);
            }
            EntityKind::Listing => {
                let summary = content.summarize(&entity);
                map.open_info_panel(&entity.id, &summary.panel_text())?;
                self.open_popover = Some(entity.id.clone());
                if let Some(on_click) = self.callbacks.on_click.as_mut() {
                    on_click(&entity);
                }
            }
        }
        Ok(())
    }

    pub fn close_popover(&mut self, map: &mut dyn MapInstance) {
        if self.open_popover.take().is_some() {
            map.close_info_panel();
        }
    }

    /// Destroys every marker; used on unmount
    pub fn clear(&mut self, map: &mut dyn MapInstance) -> Result<()> {
        for (_, mut handle) in self.handles.drain() {
            handle.marker.remove()?;
        }
        self.close_popover(map);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::mock::MockInstance;
    use crate::sdk::MapOptions;
    use crate::search::{ListingSummary, UrlNavigator};
    use crate::LatLng;

    fn instance() -> MockInstance {
        MockInstance::new(&MapOptions {
            center: LatLng::new(43.65, -79.38),
            zoom: 12.0,
            min_zoom: 0.0,
            max_zoom: 18.0,
        })
    }

    fn listing(id: &str, lat: f64, lng: f64) -> MapEntity {
        MapEntity::new(id, EntityKind::Listing, lat, lng, "$500,000")
    }

    #[test]
    fn test_sync_creates_and_removes() {
        let mut map = instance();
        let handles = map.handles();
        let mut layer = MarkerLayer::new(MarkerConfig::default());

        let stats = layer
            .sync(&mut map, &[listing("a", 43.65, -79.38), listing("b", 43.66, -79.39)], false)
            .unwrap();
        assert_eq!(stats.created, 2);
        assert_eq!(layer.ids(), vec!["a", "b"]);

        let stats = layer
            .sync(&mut map, &[listing("b", 43.66, -79.39), listing("c", 43.67, -79.40)], false)
            .unwrap();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.kept, 1);
        assert_eq!(layer.ids(), vec!["b", "c"]);

        let state = handles.state.lock().unwrap();
        assert_eq!(state.live_ids(), vec!["b", "c"]);
        assert_eq!(state.removed, vec!["a"]);
    }

    #[test]
    fn test_surviving_marker_is_reused() {
        let mut map = instance();
        let handles = map.handles();
        let mut layer = MarkerLayer::new(MarkerConfig::default());

        layer.sync(&mut map, &[listing("a", 43.65, -79.38)], false).unwrap();
        let serial_before = handles.state.lock().unwrap().live["a"].serial;

        layer
            .sync(&mut map, &[listing("a", 43.65, -79.38), listing("b", 43.66, -79.39)], false)
            .unwrap();
        let state = handles.state.lock().unwrap();
        assert_eq!(state.live["a"].serial, serial_before);
        assert_eq!(state.created_markers, 2);
    }

    #[test]
    fn test_invalid_entities_never_reach_the_widget() {
        let mut map = instance();
        let handles = map.handles();
        let mut layer = MarkerLayer::new(MarkerConfig::default());

        layer
            .sync(
                &mut map,
                &[
                    listing("a", 43.65, -79.38),
                    listing("bad", f64::NAN, -79.38),
                    listing("a", 44.0, -80.0),
                ],
                false,
            )
            .unwrap();

        assert_eq!(layer.ids(), vec!["a"]);
        assert_eq!(handles.state.lock().unwrap().created_markers, 1);
    }

    #[test]
    fn test_first_population_fits_once_with_zoom_clamp() {
        let mut map = instance();
        let handles = map.handles();
        let mut layer = MarkerLayer::new(MarkerConfig::default());

        // One tight entity would fit to an absurd zoom without the clamp
        layer.sync(&mut map, &[listing("a", 43.65, -79.38)], false).unwrap();
        {
            let state = handles.state.lock().unwrap();
            assert_eq!(state.fitted.len(), 1);
            assert!(state.zoom <= MarkerConfig::default().max_auto_zoom);
        }

        // Later updates never refit
        layer
            .sync(&mut map, &[listing("a", 43.65, -79.38), listing("b", 45.0, -81.0)], false)
            .unwrap();
        assert_eq!(handles.state.lock().unwrap().fitted.len(), 1);
    }

    #[test]
    fn test_fit_suppressed_after_user_interaction() {
        let mut map = instance();
        let handles = map.handles();
        let mut layer = MarkerLayer::new(MarkerConfig::default());

        layer.sync(&mut map, &[listing("a", 43.65, -79.38)], true).unwrap();
        assert!(handles.state.lock().unwrap().fitted.is_empty());

        // The fit opportunity is spent, not deferred
        layer.sync(&mut map, &[listing("a", 43.65, -79.38)], false).unwrap();
        assert!(handles.state.lock().unwrap().fitted.is_empty());
    }

    #[test]
    fn test_hover_swaps_icon_and_notifies() {
        let mut map = instance();
        let handles = map.handles();
        let hovered = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let hovered_sink = hovered.clone();

        let mut layer = MarkerLayer::new(MarkerConfig::default()).with_callbacks(MarkerCallbacks {
            on_click: None,
            on_hover: Some(Box::new(move |entity, phase| {
                hovered_sink.lock().unwrap().push((entity.id.clone(), phase));
            })),
        });
        layer.sync(&mut map, &[listing("a", 43.65, -79.38)], false).unwrap();

        layer.handle_hover(&mut map, "a", true).unwrap();
        assert_eq!(handles.state.lock().unwrap().live["a"].icon, MarkerIcon::PinEmphasis);

        layer.handle_hover(&mut map, "a", false).unwrap();
        assert_eq!(handles.state.lock().unwrap().live["a"].icon, MarkerIcon::Pin);

        let phases = hovered.lock().unwrap();
        assert_eq!(
            *phases,
            vec![("a".to_string(), HoverPhase::Enter), ("a".to_string(), HoverPhase::Leave)]
        );
    }

    #[test]
    fn test_listing_click_opens_single_popover() {
        let mut map = instance();
        let handles = map.handles();
        let mut layer = MarkerLayer::new(MarkerConfig::default());
        let navigator = UrlNavigator::default();
        let content = ListingSummary;

        layer
            .sync(&mut map, &[listing("a", 43.65, -79.38), listing("b", 43.66, -79.39)], false)
            .unwrap();

        layer.handle_click(&mut map, "a", &navigator, &content).unwrap();
        layer.handle_click(&mut map, "b", &navigator, &content).unwrap();

        let state = handles.state.lock().unwrap();
        // The widget holds a single shared panel; the second open replaced the first
        assert_eq!(state.info_opens, 2);
        assert_eq!(state.info_panel.as_ref().unwrap().0, "b");
    }

    #[test]
    fn test_removing_popover_entity_closes_panel() {
        let mut map = instance();
        let handles = map.handles();
        let mut layer = MarkerLayer::new(MarkerConfig::default());
        let navigator = UrlNavigator::default();
        let content = ListingSummary;

        layer.sync(&mut map, &[listing("a", 43.65, -79.38)], false).unwrap();
        layer.handle_click(&mut map, "a", &navigator, &content).unwrap();
        assert!(handles.state.lock().unwrap().info_panel.is_some());

        layer.sync(&mut map, &[], false).unwrap();
        assert!(handles.state.lock().unwrap().info_panel.is_none());
    }
}
