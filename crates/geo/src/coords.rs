/// Mean Earth radius (meters), spherical model used for haversine distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Clamps a latitude into [-90, 90].
pub fn clamp_latitude(v: f64) -> f64 {
    v.clamp(-90.0, 90.0)
}

/// Wraps a longitude into [-180, 180).
///
/// Uses euclidean remainder so negative inputs land in range directly,
/// without an off-by-360 correction pass.
pub fn normalize_longitude(v: f64) -> f64 {
    // In-range values pass through untouched: the add/rem/sub round trip
    // perturbs them (121.3 -> 121.30000000000001), and idempotence must
    // be exact.
    if (-180.0..180.0).contains(&v) {
        return v;
    }
    (v + 180.0).rem_euclid(360.0) - 180.0
}

/// Great-circle distance between two positions, in meters.
///
/// Standard haversine on a spherical Earth. Used for nearby-result ranking
/// only; bounding-box query correctness never depends on it.
pub fn haversine_distance_m(a: LatLng, b: LatLng) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}
