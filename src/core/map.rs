//! The public composition root.
//!
//! [`ListingMap`] owns one mounted map: widget loading through the
//! process-wide shared loader, the host container, the cluster/marker
//! layers, the viewport fetch controller, and the fault boundary around
//! all of it. The embedding application drives it with
//! [`ListingMap::update`] once per frame and feeds entity updates in as
//! they arrive.

use crate::{
    core::{
        config::MapConfig,
        entity::{centroid, sanitize, MapEntity},
        geo::{LatLng, LatLngBounds},
    },
    fault::FaultBoundary,
    fetch::{FetchOutcome, FetchPlan, ViewportFetchController},
    host::{HostSurface, MapHost},
    layers::{
        cluster::ClusterLayer,
        marker::{MarkerCallbacks, MarkerLayer},
    },
    prelude::Instant,
    sdk::{
        loader::{self, SharedLoader},
        ClusterCapability, ClusterProvider, MapEvent, MapInstance, MapSdk, SdkProvider,
    },
    search::{
        DetailContent, EntitySearch, ListingSummary, Navigator, SearchFilters, SearchPage,
        UrlNavigator,
    },
    MapError, Result,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;

type FetchErrorCallback = Box<dyn FnMut(&(dyn std::error::Error + Send + Sync)) + Send>;

/// Outcome of mounting a map. Mount failures are fatal for this mount
/// only; they surface as a static unavailable panel, never a crash.
pub enum MountState {
    Ready(ListingMap),
    Unavailable { reason: String },
}

impl MountState {
    pub fn ready(self) -> Option<ListingMap> {
        match self {
            MountState::Ready(map) => Some(map),
            MountState::Unavailable { .. } => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            MountState::Ready(_) => None,
            MountState::Unavailable { reason } => Some(reason),
        }
    }
}

/// Fluent configuration for mounting a [`ListingMap`]
pub struct ListingMapBuilder {
    surface: Option<Arc<dyn HostSurface>>,
    sdk_provider: Option<Arc<dyn SdkProvider>>,
    cluster_provider: Option<Arc<dyn ClusterProvider>>,
    search: Option<Arc<dyn EntitySearch>>,
    navigator: Arc<dyn Navigator>,
    content: Arc<dyn DetailContent>,
    widget_loader: Option<Arc<SharedLoader<dyn MapSdk>>>,
    cluster_loader: Option<Arc<SharedLoader<dyn ClusterCapability>>>,
    config: MapConfig,
    filters: SearchFilters,
    center: Option<LatLng>,
    entities: Vec<MapEntity>,
    callbacks: MarkerCallbacks,
    on_fetch_error: Option<FetchErrorCallback>,
}

impl ListingMapBuilder {
    pub fn new() -> Self {
        Self {
            surface: None,
            sdk_provider: None,
            cluster_provider: None,
            search: None,
            navigator: Arc::new(UrlNavigator::default()),
            content: Arc::new(ListingSummary),
            widget_loader: None,
            cluster_loader: None,
            config: MapConfig::default(),
            filters: SearchFilters::default(),
            center: None,
            entities: Vec::new(),
            callbacks: MarkerCallbacks::default(),
            on_fetch_error: None,
        }
    }

    pub fn surface(mut self, surface: Arc<dyn HostSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn sdk_provider(mut self, provider: Arc<dyn SdkProvider>) -> Self {
        self.sdk_provider = Some(provider);
        self
    }

    /// Enables cluster grouping. Without a provider markers render
    /// ungrouped.
    pub fn cluster_provider(mut self, provider: Arc<dyn ClusterProvider>) -> Self {
        self.cluster_provider = Some(provider);
        self
    }

    pub fn search(mut self, search: Arc<dyn EntitySearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn content(mut self, content: Arc<dyn DetailContent>) -> Self {
        self.content = content;
        self
    }

    /// Overrides the process-wide widget loader; tests use this to keep
    /// loads isolated from each other.
    pub fn widget_loader(mut self, widget_loader: Arc<SharedLoader<dyn MapSdk>>) -> Self {
        self.widget_loader = Some(widget_loader);
        self
    }

    pub fn cluster_loader(mut self, cluster_loader: Arc<SharedLoader<dyn ClusterCapability>>) -> Self {
        self.cluster_loader = Some(cluster_loader);
        self
    }

    pub fn config(mut self, config: MapConfig) -> Self {
        self.config = config;
        self
    }

    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn center(mut self, center: LatLng) -> Self {
        self.center = Some(center);
        self
    }

    pub fn entities(mut self, entities: Vec<MapEntity>) -> Self {
        self.entities = entities;
        self
    }

    pub fn callbacks(mut self, callbacks: MarkerCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn on_fetch_error(mut self, callback: FetchErrorCallback) -> Self {
        self.on_fetch_error = Some(callback);
        self
    }

    /// Mounts the map, folding any failure into an unavailable state
    pub async fn mount(self) -> MountState {
        match self.try_mount().await {
            Ok(map) => MountState::Ready(map),
            Err(error) => {
                log::debug!("map mount unavailable: {error}");
                MountState::Unavailable {
                    reason: error.to_string(),
                }
            }
        }
    }

    async fn try_mount(self) -> Result<ListingMap> {
        let surface = self
            .surface
            .ok_or_else(|| MapError::Config("host surface is required".into()))?;
        let sdk_provider = self
            .sdk_provider
            .ok_or_else(|| MapError::Config("widget sdk provider is required".into()))?;

        let widget_loader = self.widget_loader.unwrap_or_else(loader::widget_loader);
        let sdk = widget_loader
            .get_or_load(|| sdk_provider.load())
            .await
            .map_err(|error| MapError::SdkUnavailable(error.to_string()))?;

        let mut host = MapHost::new(surface);
        let container = host.mount(|container| {
            log::debug!("map container ready: {:?}", container);
        })?;

        let initial = sanitize(&self.entities);
        let center = self
            .center
            .or_else(|| centroid(&initial))
            .unwrap_or_default();
        let instance = sdk.create_map(
            container,
            &crate::sdk::MapOptions {
                center,
                zoom: self.config.default_zoom,
                min_zoom: self.config.min_zoom,
                max_zoom: self.config.max_zoom,
            },
        )?;
        let events = instance.events();

        let marker_layer =
            MarkerLayer::new(self.config.marker.clone()).with_callbacks(self.callbacks);
        let mut layer = ClusterLayer::new(marker_layer, self.config.cluster.clone());
        if let Some(cluster_provider) = &self.cluster_provider {
            let cluster_loader = self.cluster_loader.unwrap_or_else(loader::cluster_loader);
            layer
                .ensure_capability(&cluster_loader, cluster_provider.as_ref())
                .await;
        }

        let (completions_tx, completions_rx) = unbounded();

        let mut map = ListingMap {
            instance,
            host,
            layer,
            fetcher: ViewportFetchController::new(self.config.fetch.clone()),
            boundary: FaultBoundary::new(),
            events,
            completions_tx,
            completions_rx,
            search: self.search,
            navigator: self.navigator,
            content: self.content,
            filters: self.filters,
            counts: None,
            has_user_interacted: false,
            on_fetch_error: self.on_fetch_error,
        };
        map.set_entities(&initial);
        Ok(map)
    }
}

impl Default for ListingMapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One mounted interactive listing map
pub struct ListingMap {
    instance: Box<dyn MapInstance>,
    host: MapHost,
    layer: ClusterLayer,
    fetcher: ViewportFetchController,
    boundary: FaultBoundary,
    events: Receiver<MapEvent>,
    completions_tx: Sender<(u64, Result<SearchPage>)>,
    completions_rx: Receiver<(u64, Result<SearchPage>)>,
    search: Option<Arc<dyn EntitySearch>>,
    navigator: Arc<dyn Navigator>,
    content: Arc<dyn DetailContent>,
    filters: SearchFilters,
    counts: Option<(usize, usize)>,
    has_user_interacted: bool,
    on_fetch_error: Option<FetchErrorCallback>,
}

impl ListingMap {
    pub fn builder() -> ListingMapBuilder {
        ListingMapBuilder::new()
    }

    /// One engine tick: drains widget events, evaluates the debounced
    /// fetch, and applies any completed responses.
    pub fn update(&mut self, now: Instant) {
        let drained: Vec<MapEvent> = self.events.try_iter().collect();
        for event in drained {
            match event {
                MapEvent::DragStart | MapEvent::ZoomStart => {
                    self.has_user_interacted = true;
                }
                MapEvent::Idle { bounds, .. } => {
                    self.fetcher.note_settle(bounds, now);
                    let suppress = self.has_user_interacted;
                    let Self {
                        boundary,
                        layer,
                        instance,
                        ..
                    } = self;
                    boundary.guard("regroup", || {
                        layer.regroup(instance.as_mut(), suppress).map(|_| ())
                    });
                }
                MapEvent::MarkerClicked { id } => {
                    let Self {
                        boundary,
                        layer,
                        instance,
                        navigator,
                        content,
                        ..
                    } = self;
                    boundary.guard("marker click", || {
                        layer.handle_click(
                            instance.as_mut(),
                            &id,
                            navigator.as_ref(),
                            content.as_ref(),
                        )
                    });
                }
                MapEvent::MarkerHover { id, entered } => {
                    let Self {
                        boundary,
                        layer,
                        instance,
                        ..
                    } = self;
                    boundary.guard("marker hover", || {
                        layer.handle_hover(instance.as_mut(), &id, entered)
                    });
                }
            }
        }

        if let Some(plan) = self.fetcher.poll(now) {
            self.spawn_fetch(plan);
        }

        let completed: Vec<(u64, Result<SearchPage>)> = self.completions_rx.try_iter().collect();
        for (epoch, result) in completed {
            match self.fetcher.complete(epoch, result) {
                FetchOutcome::Applied(page) => self.apply_page(&page),
                FetchOutcome::Stale => {}
                FetchOutcome::Failed(error) => {
                    log::debug!("viewport fetch failed, keeping current entities: {error}");
                    if let Some(on_fetch_error) = self.on_fetch_error.as_mut() {
                        on_fetch_error(error.as_ref());
                    }
                }
            }
        }
    }

    fn spawn_fetch(&mut self, plan: FetchPlan) {
        let Some(search) = self.search.clone() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let completions_tx = self.completions_tx.clone();
                let filters = self.filters.clone();
                let FetchPlan { epoch, bounds } = plan;
                handle.spawn(async move {
                    let result = search.search(&filters, Some(&bounds)).await;
                    let _ = completions_tx.send((epoch, result));
                });
            }
            Err(_) => log::debug!("viewport fetch skipped, no async runtime available"),
        }
    }

    /// Replaces the displayed entity set
    pub fn set_entities(&mut self, entities: &[MapEntity]) {
        let suppress = self.has_user_interacted;
        let Self {
            boundary,
            layer,
            instance,
            ..
        } = self;
        boundary.guard("marker sync", || {
            layer.sync(instance.as_mut(), entities, suppress).map(|_| ())
        });
    }

    /// Applies a full search page: entities plus the count indicator
    pub fn apply_page(&mut self, page: &SearchPage) {
        self.counts = Some((page.displayed_count, page.total_count));
        self.set_entities(&page.entities);
    }

    /// Indicator copy, e.g. "50 of 500", once a page has been applied
    pub fn count_caption(&self) -> Option<String> {
        self.counts
            .map(|(displayed, total)| format!("{} of {}", displayed, total))
    }

    pub fn instance(&self) -> &dyn MapInstance {
        self.instance.as_ref()
    }

    pub fn instance_mut(&mut self) -> &mut dyn MapInstance {
        self.instance.as_mut()
    }

    /// Ids of individually rendered markers, sorted
    pub fn marker_ids(&self) -> Vec<String> {
        self.layer.marker_ids()
    }

    /// Ids of aggregate cluster markers, sorted
    pub fn cluster_ids(&self) -> Vec<String> {
        self.layer.cluster_ids()
    }

    pub fn has_user_interacted(&self) -> bool {
        self.has_user_interacted
    }

    pub fn is_faulted(&self) -> bool {
        self.boundary.is_faulted()
    }

    pub fn fallback_message(&self) -> Option<String> {
        self.boundary.fallback_message()
    }

    /// Heals the fault boundary when the hosting view swaps the child
    /// subtree identity
    pub fn reset_fault(&mut self, child_key: u64) {
        self.boundary.reset_for_child(child_key);
    }

    /// Fits the viewport to every displayed entity
    pub fn fit_to_entities(&mut self) {
        if let Some(bounds) = self.layer.entity_bounds() {
            let Self {
                boundary, instance, ..
            } = self;
            boundary.guard("fit to entities", || instance.fit_bounds(&bounds));
        }
    }

    pub fn recenter(&mut self, center: LatLng) {
        self.instance.set_center(center);
    }

    pub fn viewport(&self) -> LatLngBounds {
        self.instance.bounds()
    }

    /// Tears the mount down: fences the fetch controller, destroys
    /// markers, and releases the host container on a deferred tick.
    pub fn teardown(&mut self) {
        self.fetcher.teardown();
        {
            let Self {
                boundary,
                layer,
                instance,
                ..
            } = self;
            boundary.guard("teardown", || layer.clear(instance.as_mut()));
        }
        self.host.unmount(Some(self.instance.as_mut()));
    }
}
