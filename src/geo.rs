//! Geographic primitives.
//!
//! Great-circle (haversine) distance in statute miles, plus the static
//! registry of freight market regions with their centroid coordinates.
//! Region codes are the lowercase identifiers used throughout the rate,
//! forecast, and hotspot pipelines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius in statute miles.
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// A WGS-84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another point, in miles.
    pub fn distance_miles(&self, other: &GeoPoint) -> f64 {
        haversine_miles(*self, *other)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// Haversine great-circle distance between two points, in statute miles.
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

// ---------------------------------------------------------------------------
// Region registry
// ---------------------------------------------------------------------------

/// A freight market region: lowercase code, display name, and centroid.
#[derive(Debug, Clone, Copy)]
pub struct RegionInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub center: GeoPoint,
}

/// The major freight markets the engine prices and forecasts.
/// Centroids are metro-area approximations, sufficient for lane distance
/// defaults and hotspot centering.
pub const REGIONS: &[RegionInfo] = &[
    RegionInfo { code: "chicago", name: "Chicago, IL", center: GeoPoint { lat: 41.88, lon: -87.63 } },
    RegionInfo { code: "dallas", name: "Dallas, TX", center: GeoPoint { lat: 32.78, lon: -96.80 } },
    RegionInfo { code: "atlanta", name: "Atlanta, GA", center: GeoPoint { lat: 33.75, lon: -84.39 } },
    RegionInfo { code: "los_angeles", name: "Los Angeles, CA", center: GeoPoint { lat: 34.05, lon: -118.24 } },
    RegionInfo { code: "newark", name: "Newark, NJ", center: GeoPoint { lat: 40.74, lon: -74.17 } },
    RegionInfo { code: "memphis", name: "Memphis, TN", center: GeoPoint { lat: 35.15, lon: -90.05 } },
    RegionInfo { code: "kansas_city", name: "Kansas City, MO", center: GeoPoint { lat: 39.10, lon: -94.58 } },
    RegionInfo { code: "denver", name: "Denver, CO", center: GeoPoint { lat: 39.74, lon: -104.99 } },
    RegionInfo { code: "seattle", name: "Seattle, WA", center: GeoPoint { lat: 47.61, lon: -122.33 } },
    RegionInfo { code: "miami", name: "Miami, FL", center: GeoPoint { lat: 25.76, lon: -80.19 } },
    RegionInfo { code: "houston", name: "Houston, TX", center: GeoPoint { lat: 29.76, lon: -95.37 } },
    RegionInfo { code: "columbus", name: "Columbus, OH", center: GeoPoint { lat: 39.96, lon: -83.00 } },
    RegionInfo { code: "harrisburg", name: "Harrisburg, PA", center: GeoPoint { lat: 40.27, lon: -76.88 } },
    RegionInfo { code: "phoenix", name: "Phoenix, AZ", center: GeoPoint { lat: 33.45, lon: -112.07 } },
    RegionInfo { code: "st_louis", name: "St. Louis, MO", center: GeoPoint { lat: 38.63, lon: -90.20 } },
];

/// Look up a region's centroid by code (case-insensitive).
pub fn region_center(code: &str) -> Option<GeoPoint> {
    let code = code.to_lowercase();
    REGIONS.iter().find(|r| r.code == code).map(|r| r.center)
}

/// The region whose centroid is closest to the given point.
pub fn nearest_region(point: GeoPoint) -> Option<&'static RegionInfo> {
    REGIONS.iter().min_by(|a, b| {
        let da = haversine_miles(point, a.center);
        let db = haversine_miles(point, b.center);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Centroid-to-centroid distance between two regions, in miles.
/// Returns None if either code is unknown.
pub fn region_distance_miles(origin: &str, destination: &str) -> Option<f64> {
    let a = region_center(origin)?;
    let b = region_center(destination)?;
    Some(haversine_miles(a, b))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
