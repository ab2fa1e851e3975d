//! Inspectable in-memory widget used by tests, demos, and headless runs.
//!
//! Mirrors the contract of a real browser widget closely enough to
//! exercise every engine path: marker creation is counted (so marker
//! reuse is observable), fits are recorded, and the event stream can be
//! driven from the outside.

use crate::{
    core::geo::{LatLng, LatLngBounds},
    host::HostSurface,
    prelude::HashMap,
    sdk::{
        ClusterCapability, ClusterProvider, ContainerHandle, GridClusterer, MapEvent, MapInstance,
        MapOptions, MapSdk, MarkerIcon, MarkerObject, MarkerSpec, SdkProvider,
    },
    MapError, Result,
};
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One marker as the mock widget sees it
#[derive(Debug, Clone)]
pub struct MarkerRecord {
    pub position: LatLng,
    pub label: String,
    pub icon: MarkerIcon,
    /// Creation sequence number; stable across updates that reuse the marker
    pub serial: u64,
}

/// Shared observable state of one mock map instance
pub struct MockState {
    pub created_markers: u64,
    pub live: HashMap<String, MarkerRecord>,
    pub removed: Vec<String>,
    pub center: LatLng,
    pub zoom: f64,
    pub viewport: LatLngBounds,
    pub fitted: Vec<LatLngBounds>,
    pub info_panel: Option<(String, String)>,
    pub info_opens: u64,
    pub listeners_cleared: bool,
}

impl MockState {
    fn new(options: &MapOptions) -> Self {
        Self {
            created_markers: 0,
            live: HashMap::default(),
            removed: Vec::new(),
            center: options.center,
            zoom: options.zoom,
            viewport: viewport_for(options.center, options.zoom),
            fitted: Vec::new(),
            info_panel: None,
            info_opens: 0,
            listeners_cleared: false,
        }
    }

    /// Ids of currently live markers, sorted for stable assertions
    pub fn live_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.live.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn viewport_for(center: LatLng, zoom: f64) -> LatLngBounds {
    let lng_span = 360.0 / 2_f64.powf(zoom);
    let lat_span = 170.0 / 2_f64.powf(zoom);
    LatLngBounds::from_coords(
        center.lat - lat_span / 2.0,
        center.lng - lng_span / 2.0,
        center.lat + lat_span / 2.0,
        center.lng + lng_span / 2.0,
    )
}

fn zoom_for(bounds: &LatLngBounds) -> f64 {
    let span = bounds.lng_span().abs().max(bounds.lat_span().abs() * 2.0);
    (360.0 / span.max(1e-9)).log2().clamp(0.0, 22.0)
}

/// Cloneable handle pair the tests use to observe and drive an instance
#[derive(Clone)]
pub struct MockInstanceHandles {
    pub state: Arc<Mutex<MockState>>,
    pub events: Sender<MapEvent>,
}

pub struct MockInstance {
    state: Arc<Mutex<MockState>>,
    events_tx: Sender<MapEvent>,
    events_rx: Receiver<MapEvent>,
}

impl MockInstance {
    pub fn new(options: &MapOptions) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            state: Arc::new(Mutex::new(MockState::new(options))),
            events_tx,
            events_rx,
        }
    }

    pub fn handles(&self) -> MockInstanceHandles {
        MockInstanceHandles {
            state: self.state.clone(),
            events: self.events_tx.clone(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MapInstance for MockInstance {
    fn center(&self) -> LatLng {
        self.lock().center
    }

    fn zoom(&self) -> f64 {
        self.lock().zoom
    }

    fn set_center(&mut self, center: LatLng) {
        let mut state = self.lock();
        state.center = center;
        let zoom = state.zoom;
        state.viewport = viewport_for(center, zoom);
    }

    fn set_zoom(&mut self, zoom: f64) {
        let mut state = self.lock();
        state.zoom = zoom;
        let center = state.center;
        state.viewport = viewport_for(center, zoom);
    }

    fn bounds(&self) -> LatLngBounds {
        self.lock().viewport.clone()
    }

    fn fit_bounds(&mut self, bounds: &LatLngBounds) -> Result<()> {
        let mut state = self.lock();
        state.fitted.push(bounds.clone());
        state.center = bounds.center();
        state.zoom = zoom_for(bounds);
        state.viewport = bounds.clone();
        Ok(())
    }

    fn add_marker(&mut self, spec: MarkerSpec) -> Result<Box<dyn MarkerObject>> {
        let mut state = self.lock();
        state.created_markers += 1;
        let serial = state.created_markers;
        state.live.insert(
            spec.id.clone(),
            MarkerRecord {
                position: spec.position,
                label: spec.label,
                icon: spec.icon,
                serial,
            },
        );
        Ok(Box::new(MockMarker {
            id: spec.id,
            position: spec.position,
            state: self.state.clone(),
            removed: false,
        }))
    }

    fn open_info_panel(&mut self, anchor_id: &str, text: &str) -> Result<()> {
        let mut state = self.lock();
        state.info_panel = Some((anchor_id.to_string(), text.to_string()));
        state.info_opens += 1;
        Ok(())
    }

    fn close_info_panel(&mut self) {
        self.lock().info_panel = None;
    }

    fn events(&self) -> Receiver<MapEvent> {
        self.events_rx.clone()
    }

    fn clear_listeners(&mut self) {
        self.lock().listeners_cleared = true;
    }
}

pub struct MockMarker {
    id: String,
    position: LatLng,
    state: Arc<Mutex<MockState>>,
    removed: bool,
}

impl MockMarker {
    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MarkerObject for MockMarker {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> LatLng {
        self.position
    }

    fn set_icon(&mut self, icon: MarkerIcon) -> Result<()> {
        let mut state = self.lock();
        match state.live.get_mut(&self.id) {
            Some(record) => {
                record.icon = icon;
                Ok(())
            }
            None => Err(MapError::Marker(format!("marker {} is not on the map", self.id)).into()),
        }
    }

    fn set_label(&mut self, label: &str) -> Result<()> {
        let mut state = self.lock();
        match state.live.get_mut(&self.id) {
            Some(record) => {
                record.label = label.to_string();
                Ok(())
            }
            None => Err(MapError::Marker(format!("marker {} is not on the map", self.id)).into()),
        }
    }

    fn remove(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;
        let mut state = self.lock();
        state.live.remove(&self.id);
        state.removed.push(self.id.clone());
        Ok(())
    }
}

/// Mock SDK entry point; remembers every instance it creates
pub struct MockSdk {
    instances: Mutex<Vec<MockInstanceHandles>>,
}

impl MockSdk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            instances: Mutex::new(Vec::new()),
        })
    }

    pub fn last_instance(&self) -> Option<MockInstanceHandles> {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl MapSdk for MockSdk {
    fn create_map(&self, _container: ContainerHandle, options: &MapOptions) -> Result<Box<dyn MapInstance>> {
        let instance = MockInstance::new(options);
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(instance.handles());
        Ok(Box::new(instance))
    }
}

/// Provider that resolves to a [`MockSdk`], or fails on demand
pub struct MockSdkProvider {
    sdk: Arc<MockSdk>,
    fail: bool,
    loads: AtomicU64,
}

impl MockSdkProvider {
    pub fn new(sdk: Arc<MockSdk>) -> Self {
        Self {
            sdk,
            fail: false,
            loads: AtomicU64::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            sdk: MockSdk::new(),
            fail: true,
            loads: AtomicU64::new(0),
        }
    }

    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SdkProvider for MockSdkProvider {
    async fn load(&self) -> Result<Arc<dyn MapSdk>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail {
            return Err(MapError::SdkLoad("widget script failed to load".into()).into());
        }
        Ok(self.sdk.clone() as Arc<dyn MapSdk>)
    }
}

/// Provider that resolves to the in-crate grid clusterer, or fails on demand
pub struct MockClusterProvider {
    radius_px: f64,
    fail: bool,
    loads: AtomicU64,
}

impl MockClusterProvider {
    pub fn ok(radius_px: f64) -> Self {
        Self {
            radius_px,
            fail: false,
            loads: AtomicU64::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            radius_px: 0.0,
            fail: true,
            loads: AtomicU64::new(0),
        }
    }

    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterProvider for MockClusterProvider {
    async fn load(&self) -> Result<Arc<dyn ClusterCapability>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail {
            return Err(MapError::SdkLoad("clustering script failed to load".into()).into());
        }
        Ok(Arc::new(GridClusterer::new(self.radius_px)) as Arc<dyn ClusterCapability>)
    }
}

/// Host surface that counts containers in and out
pub struct MockSurface {
    created: AtomicU64,
    removed: Mutex<Vec<ContainerHandle>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self {
            created: AtomicU64::new(0),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn removed_count(&self) -> usize {
        self.removed.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSurface for MockSurface {
    fn create_container(&self) -> Result<ContainerHandle> {
        let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ContainerHandle { id })
    }

    fn remove_container(&self, container: ContainerHandle) {
        self.removed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(container);
    }
}
