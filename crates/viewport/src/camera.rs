use geo::{clamp_latitude, normalize_longitude};
use serde::{Deserialize, Serialize};

/// Minimum camera zoom.
pub const ZOOM_MIN: f64 = 3.0;
/// Maximum camera zoom.
pub const ZOOM_MAX: f64 = 20.0;

/// The authoritative camera state: center plus zoom.
///
/// Construction goes through [`Camera::new`] so the invariants hold
/// everywhere: latitude in [-90, 90], longitude in [-180, 180), zoom in
/// [3, 20]. Serialized form is the persisted-camera JSON contract
/// (`latitude`/`longitude`/`zoom`).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
}

impl Camera {
    pub fn new(latitude: f64, longitude: f64, zoom: f64) -> Self {
        Self {
            latitude: clamp_latitude(latitude),
            longitude: normalize_longitude(longitude),
            zoom: zoom.clamp(ZOOM_MIN, ZOOM_MAX),
        }
    }

    /// Re-applies the invariants; used after deserializing persisted state.
    pub fn normalized(self) -> Self {
        Self::new(self.latitude, self.longitude, self.zoom)
    }
}
