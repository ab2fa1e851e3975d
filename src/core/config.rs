use crate::prelude::Duration;

/// Viewport refetch behaviour
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Quiet period after the last settle event before a fetch is considered
    pub debounce: Duration,
    /// Minimum per-axis viewport movement, as a fraction of the previous
    /// span, for a settle to qualify for a refetch
    pub significance_threshold: f64,
    /// Decimal places used when quantizing bounds into the dedupe key
    pub bounds_precision: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1200),
            significance_threshold: 0.30,
            bounds_precision: 4,
        }
    }
}

impl FetchConfig {
    pub fn for_testing() -> Self {
        Self {
            debounce: Duration::ZERO,
            ..Default::default()
        }
    }
}

/// Marker rendering behaviour
#[derive(Debug, Clone)]
pub struct MarkerConfig {
    /// Pin labels longer than this are truncated with an ellipsis
    pub label_max_len: usize,
    /// Ceiling applied after the first-population fit so a single nearby
    /// result does not zoom in absurdly tight
    pub max_auto_zoom: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            label_max_len: 24,
            max_auto_zoom: 17.0,
        }
    }
}

/// Cluster grouping behaviour
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Pixel radius within which markers collapse into one aggregate
    pub radius_px: f64,
    /// Zoom level at and above which grouping is disabled entirely
    pub disable_at_zoom: f64,
    /// Fixed zoom increment applied when expanding a cluster
    pub expand_zoom_step: f64,
    /// Hard zoom ceiling for cluster expansion
    pub max_zoom: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_px: 80.0,
            disable_at_zoom: 15.0,
            expand_zoom_step: 2.0,
            max_zoom: 18.0,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub default_zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub fetch: FetchConfig,
    pub marker: MarkerConfig,
    pub cluster: ClusterConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_zoom: 12.0,
            min_zoom: 0.0,
            max_zoom: 18.0,
            fetch: FetchConfig::default(),
            marker: MarkerConfig::default(),
            cluster: ClusterConfig::default(),
        }
    }
}

impl MapConfig {
    /// Zero debounce so tests drive the fetch controller deterministically
    pub fn for_testing() -> Self {
        Self {
            fetch: FetchConfig::for_testing(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MapConfig::default();
        assert_eq!(config.fetch.bounds_precision, 4);
        assert!(config.fetch.significance_threshold > 0.0);
        assert!(config.marker.max_auto_zoom < config.max_zoom);
        assert!(config.cluster.disable_at_zoom < config.cluster.max_zoom);
    }

    #[test]
    fn test_testing_preset_disables_debounce() {
        let config = MapConfig::for_testing();
        assert_eq!(config.fetch.debounce, Duration::ZERO);
    }
}
