use crate::coords::{clamp_latitude, normalize_longitude};

/// Longitude span at or above which a viewport is treated as showing the
/// whole world, making anti-meridian handling moot.
pub const WHOLE_WORLD_SPAN_DEG: f64 = 359.999;

/// Raw map edges as reported by the renderer on a move-end event.
///
/// West/east are whatever the renderer produced; they may be far outside
/// [-180, 180) after the user pans around the globe a few times.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MapEdges {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

/// The visible lat/lng region, normalized.
///
/// `wraps_antimeridian` is set when the box crosses ±180°, which shows up as
/// `min_lng > max_lng` after normalization. `whole_world` wins over wrapping:
/// a full-span viewport is one query, never two.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewportBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
    pub wraps_antimeridian: bool,
    pub whole_world: bool,
}

/// Derives normalized viewport bounds from raw renderer edges.
pub fn compute_bounds(edges: MapEdges) -> ViewportBounds {
    let mut min_lat = clamp_latitude(edges.south);
    let mut max_lat = clamp_latitude(edges.north);
    if min_lat > max_lat {
        std::mem::swap(&mut min_lat, &mut max_lat);
    }

    if (edges.east - edges.west).abs() >= WHOLE_WORLD_SPAN_DEG {
        return ViewportBounds {
            min_lat,
            max_lat,
            min_lng: -180.0,
            max_lng: 180.0,
            wraps_antimeridian: false,
            whole_world: true,
        };
    }

    let min_lng = normalize_longitude(edges.west);
    let max_lng = normalize_longitude(edges.east);
    ViewportBounds {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
        wraps_antimeridian: min_lng > max_lng,
        whole_world: false,
    }
}
