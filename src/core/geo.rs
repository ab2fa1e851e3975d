use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Web Mercator projection constants
const EARTH_RADIUS: f64 = 6378137.0;
const MAX_LATITUDE: f64 = 85.0511287798;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// Clamps latitude to the Web Mercator range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Projects a LatLng to world pixel coordinates at the given zoom level
/// using the standard Web Mercator projection (EPSG:3857).
pub fn project(lat_lng: &LatLng, zoom: f64) -> Point {
    let scale = 256.0 * 2_f64.powf(zoom);

    let lat = LatLng::clamp_lat(lat_lng.lat);
    let x = lat_lng.lng.to_radians() * EARTH_RADIUS;
    let y = ((PI / 4.0 + lat.to_radians() / 2.0).tan().ln()) * EARTH_RADIUS;

    let pixel_x = (x + PI * EARTH_RADIUS) / (2.0 * PI * EARTH_RADIUS) * scale;
    let pixel_y = (-y + PI * EARTH_RADIUS) / (2.0 * PI * EARTH_RADIUS) * scale;

    Point::new(pixel_x, pixel_y)
}

/// Unprojects world pixel coordinates back to a LatLng at the given zoom level
pub fn unproject(pixel: &Point, zoom: f64) -> LatLng {
    let scale = 256.0 * 2_f64.powf(zoom);

    let x = (pixel.x / scale) * (2.0 * PI * EARTH_RADIUS) - PI * EARTH_RADIUS;
    let y = PI * EARTH_RADIUS - (pixel.y / scale) * (2.0 * PI * EARTH_RADIUS);

    let lng = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();

    LatLng::new(lat, lng)
}

/// Represents a bounding box of geographical coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    pub fn east(&self) -> f64 {
        self.north_east.lng
    }

    pub fn west(&self) -> f64 {
        self.south_west.lng
    }

    /// Computes the smallest bounds containing all of the given points.
    /// Returns None for an empty input.
    pub fn around<I: IntoIterator<Item = LatLng>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = LatLngBounds::new(first, first);
        for point in iter {
            bounds.extend(&point);
        }
        Some(bounds)
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// Extends the bounds to include a point
    pub fn extend(&mut self, point: &LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// Latitude extent in degrees
    pub fn lat_span(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    /// Longitude extent in degrees
    pub fn lng_span(&self) -> f64 {
        self.north_east.lng - self.south_west.lng
    }

    /// Returns the union of this bounds with another bounds
    pub fn union(&self, other: &LatLngBounds) -> LatLngBounds {
        let south = self.south_west.lat.min(other.south_west.lat);
        let west = self.south_west.lng.min(other.south_west.lng);
        let north = self.north_east.lat.max(other.north_east.lat);
        let east = self.north_east.lng.max(other.north_east.lng);

        LatLngBounds::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    pub fn is_valid(&self) -> bool {
        self.south_west.is_finite()
            && self.north_east.is_finite()
            && self.south_west.lat <= self.north_east.lat
            && self.south_west.lng <= self.north_east.lng
    }
}

/// Quantized bounds used as a fetch dedupe key.
///
/// Edges are rounded to a fixed decimal precision (4 places is roughly
/// 11 m) before comparison so sub-pixel jitter between settle events
/// does not read as a new viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundsKey {
    north: i64,
    south: i64,
    east: i64,
    west: i64,
}

impl BoundsKey {
    pub fn quantize(bounds: &LatLngBounds, precision: u32) -> Self {
        let factor = 10_f64.powi(precision as i32);
        let q = |value: f64| (value * factor).round() as i64;
        Self {
            north: q(bounds.north()),
            south: q(bounds.south()),
            east: q(bounds.east()),
            west: q(bounds.west()),
        }
    }
}

/// Decides whether a viewport change is large enough to justify a
/// refetch. Each axis measures how far its edges moved relative to the
/// previous span; either axis exceeding the threshold qualifies.
pub fn significant_change(prev: &LatLngBounds, next: &LatLngBounds, threshold: f64) -> bool {
    let lat_span = prev.lat_span().abs().max(f64::EPSILON);
    let lng_span = prev.lng_span().abs().max(f64::EPSILON);

    let lat_shift = (next.north() - prev.north())
        .abs()
        .max((next.south() - prev.south()).abs())
        / lat_span;
    let lng_shift = (next.east() - prev.east())
        .abs()
        .max((next.west() - prev.west()).abs())
        / lng_span;

    lat_shift > threshold || lng_shift > threshold
}
