//! Prelude module for common estatemap types and traits
//!
//! Re-exports the most commonly used types, traits, and functions for
//! easy importing with `use estatemap::prelude::*;`

pub use crate::core::{
    config::{ClusterConfig, FetchConfig, MapConfig, MarkerConfig},
    entity::{centroid, format_price, marker_label, sanitize, EntityKind, MapEntity},
    geo::{project, significant_change, unproject, BoundsKey, LatLng, LatLngBounds, Point},
    map::{ListingMap, ListingMapBuilder, MountState},
};

pub use crate::fault::{classify, BoundaryState, FaultBoundary, FaultClass};

pub use crate::fetch::{FetchOutcome, FetchPlan, ViewportFetchController};

pub use crate::host::{HostSurface, MapHost};

pub use crate::layers::{
    cluster::{ClusterHandle, ClusterLayer},
    marker::{HoverPhase, MarkerCallbacks, MarkerHandle, MarkerLayer, SyncStats},
};

pub use crate::sdk::{
    loader::{cluster_loader, widget_loader, SharedLoader},
    mock::{
        MockClusterProvider, MockInstance, MockInstanceHandles, MockSdk, MockSdkProvider,
        MockSurface,
    },
    ClusterCapability, ClusterGroup, ClusterPoint, ClusterProvider, ClusterTier, ContainerHandle,
    GridClusterer, MapEvent, MapInstance, MapOptions, MapSdk, MarkerIcon, MarkerObject, MarkerSpec,
    SdkProvider,
};

pub use crate::search::{
    cache::CachedSearch, DetailContent, EntitySearch, ListingSummary, Navigator, PopoverContent,
    SearchFilters, SearchPage, UrlNavigator,
};

#[cfg(feature = "http-search")]
pub use crate::search::http::HttpEntitySearch;

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use futures::Future;
