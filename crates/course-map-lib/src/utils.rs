//! Coordinate conversions, great-circle distance and centrality
//!
//! Screen-space math in this crate works in "world pixels": Web Mercator meters
//! divided by the meters covered by one pixel at the current zoom. Distances
//! between world pixels are exactly what the map widget draws on screen.

use crate::{GeoPoint, LatLng};
use geo::{Coord, Point};

/// Web Mercator bounds in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;
pub const EARTH_MERCATOR_MIN: f64 = -20037508.34;
pub const EARTH_SIZE_METERS: f64 = EARTH_MERCATOR_MAX - EARTH_MERCATOR_MIN;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6371000.0;

/// Side of a map tile in pixels; the whole world is one tile at zoom 0
pub const TILE_SIZE_PX: f64 = 256.0;

/// Precomputed constant: EARTH_MERCATOR_MAX / 180.0
const LON_TO_X_FACTOR: f64 = EARTH_MERCATOR_MAX / 180.0;

/// Precomputed constant: EARTH_MERCATOR_MAX / PI
const Y_FACTOR: f64 = EARTH_MERCATOR_MAX / std::f64::consts::PI;

/// Precomputed constant: 180.0 / EARTH_MERCATOR_MAX
const X_TO_LON_FACTOR: f64 = 180.0 / EARTH_MERCATOR_MAX;

/// Precomputed constant: PI / EARTH_MERCATOR_MAX
const Y_TO_LAT_FACTOR: f64 = std::f64::consts::PI / EARTH_MERCATOR_MAX;

/// Convert WGS84 (lat, lon) to Web Mercator (x, y) in meters
///
/// Latitude is clamped to the representable Web Mercator range.
#[inline(always)]
pub fn wgs84_to_mercator(lat: f64, lon: f64) -> Point<f64> {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);

    let x = lon * LON_TO_X_FACTOR;
    let lat_rad = lat.to_radians();
    let y = (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * Y_FACTOR;

    Point::new(x, y)
}

/// Convert Web Mercator (x, y) in meters to WGS84 (lat, lon)
#[inline(always)]
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x * X_TO_LON_FACTOR;
    let lat =
        (std::f64::consts::PI / 2.0 - 2.0 * ((-y * Y_TO_LAT_FACTOR).exp()).atan()).to_degrees();
    (lat, lon)
}

/// Meters of Web Mercator space covered by one screen pixel at `zoom`
#[inline]
pub fn meters_per_pixel(zoom: f64) -> f64 {
    EARTH_SIZE_METERS / (TILE_SIZE_PX * 2f64.powf(zoom))
}

/// Project a position to world pixels at `zoom` (north-up, origin at 0°/0°)
#[inline]
pub fn to_world_pixels(position: LatLng, zoom: f64) -> Coord<f64> {
    let mercator = wgs84_to_mercator(position.lat, position.lng);
    let scale = meters_per_pixel(zoom);
    Coord {
        x: mercator.x() / scale,
        y: mercator.y() / scale,
    }
}

/// Inverse of [`to_world_pixels`]
#[inline]
pub fn from_world_pixels(pixel: Coord<f64>, zoom: f64) -> LatLng {
    let scale = meters_per_pixel(zoom);
    let (lat, lng) = mercator_to_wgs84(pixel.x * scale, pixel.y * scale);
    LatLng::new(lat, lng)
}

/// On-screen distance in pixels between two positions at `zoom`
#[inline]
pub fn screen_distance(a: LatLng, b: LatLng, zoom: f64) -> f64 {
    let pa = to_world_pixels(a, zoom);
    let pb = to_world_pixels(b, zoom);
    (pa.x - pb.x).hypot(pa.y - pb.y)
}

/// Haversine great-circle distance between two positions in meters
#[inline]
pub fn haversine_distance(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1.0 for antipodal points
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());

    EARTH_RADIUS_M * c
}

/// Great-circle distance between two points in meters
#[inline]
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_distance(a.position, b.position)
}

/// Index of the discrete 1-median of `positions`
///
/// Returns the position minimizing the summed distance to all others. Ties
/// resolve to the earliest index. `None` only for an empty slice. O(n²).
pub fn most_central_index(positions: &[LatLng]) -> Option<usize> {
    #[cfg(feature = "profiling")]
    profiling::scope!("utils::most_central_index");

    match positions.len() {
        0 => return None,
        1 => return Some(0),
        _ => {}
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, &candidate) in positions.iter().enumerate() {
        let total: f64 = positions
            .iter()
            .map(|&other| haversine_distance(candidate, other))
            .sum();
        // Strict comparison keeps the first minimum
        if best.is_none_or(|(_, best_total)| total < best_total) {
            best = Some((i, total));
        }
    }
    best.map(|(i, _)| i)
}

/// The member of `points` with the smallest total distance to the rest
pub fn most_central(points: &[GeoPoint]) -> Option<&GeoPoint> {
    let positions: Vec<LatLng> = points.iter().map(|p| p.position).collect();
    most_central_index(&positions).map(|i| &points[i])
}
