use geo::{HaversineDistance, Point};

use crate::models::{BoundingBox, GeoPoint};

/// Mean Earth radius in kilometers, same value as `geo`
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Relative padding on the box so rounding never drops a point on the radius
const BOX_PADDING: f64 = 1e-6;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Great-circle distance in kilometers, using the mean Earth radius
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let a = Point::new(lon1, lat1);
    let b = Point::new(lon2, lat2);

    a.haversine_distance(&b) / 1000.0
}

/// Distance between two geolocations in kilometers
#[inline]
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Calculate a bounding box around a center point
///
/// Used as a cheap pre-filter before the exact haversine check. The
/// longitude half-width is the great-circle bound
/// `asin(sin(r / R) / cos(lat))`, which is wider than `r / (R * cos(lat))`
/// at high latitudes. When the radius reaches a pole or crosses the
/// antimeridian the longitude span is widened to the full range, so the box
/// never excludes a point inside the radius.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let angular = radius_km.max(0.0) / EARTH_RADIUS_KM * (1.0 + BOX_PADDING);
    let lat_delta = angular.to_degrees();
    let min_lat = (lat - lat_delta).max(-90.0);
    let max_lat = (lat + lat_delta).min(90.0);

    let ratio = angular.sin() / lat.to_radians().cos().abs();
    let full_width = min_lat <= -90.0 || max_lat >= 90.0 || ratio >= 1.0;

    let (min_lon, max_lon) = if full_width {
        (-180.0, 180.0)
    } else {
        let lon_delta = ratio.asin().to_degrees();
        if lon - lon_delta < -180.0 || lon + lon_delta > 180.0 {
            (-180.0, 180.0)
        } else {
            (lon - lon_delta, lon + lon_delta)
        }
    };

    BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(
    lat: f64,
    lon: f64,
    bbox: &BoundingBox,
) -> bool {
    lat >= bbox.min_lat
        && lat <= bbox.max_lat
        && lon >= bbox.min_lon
        && lon <= bbox.max_lon
}
