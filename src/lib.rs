//! # estatemap
//!
//! An async-aware engine that keeps a set of visual markers on a
//! third-party map widget synchronized with a viewport-scoped stream of
//! real-estate entities (listings and buildings).
//!
//! The widget itself is consumed as a black-box capability behind the
//! object-safe traits in [`sdk`]; the engine owns the hard parts of the
//! integration: diff-based marker reconciliation, debounced
//! viewport-driven refetching with stale-response suppression, optional
//! cluster grouping with graceful degradation, and a fault boundary
//! that absorbs known widget/DOM interop noise.

pub mod core;
pub mod fault;
pub mod fetch;
pub mod host;
pub mod layers;
pub mod prelude;
pub mod sdk;
pub mod search;

// Re-export public API
pub use crate::core::{
    config::MapConfig,
    entity::{EntityKind, MapEntity},
    geo::{BoundsKey, LatLng, LatLngBounds, Point},
    map::{ListingMap, ListingMapBuilder, MountState},
};

pub use crate::fault::{BoundaryState, FaultBoundary};

pub use crate::fetch::{FetchOutcome, FetchPlan, ViewportFetchController};

pub use crate::host::{HostSurface, MapHost};

pub use crate::layers::{cluster::ClusterLayer, marker::MarkerLayer};

pub use crate::sdk::{MapEvent, MapInstance, MapSdk, MarkerObject};

pub use crate::search::{EntitySearch, SearchFilters, SearchPage};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("widget script load failed: {0}")]
    SdkLoad(String),

    #[error("widget unavailable: {0}")]
    SdkUnavailable(String),

    #[error("dom interop: {0}")]
    DomInterop(String),

    #[cfg(feature = "http-search")]
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("marker error: {0}")]
    Marker(String),

    #[error("layer error: {0}")]
    Layer(String),

    #[error("controller torn down")]
    TornDown,
}

/// Error type alias for convenience
pub type Error = MapError;
