//! Client-side derived views over the fetched marker set.
//!
//! Filtering never re-queries the server: category toggles, the
//! all/mine/favorites switch and the nearby restriction are pure functions
//! of markers already in memory.

use std::collections::HashSet;

use geo::{LatLng, haversine_distance_m};

use crate::model::{Category, Marker, MarkerId};

/// Whose markers to show.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum OwnershipView {
    #[default]
    All,
    Mine,
    Favorites,
}

/// Restrict results to a radius around a point, ranked nearest-first.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NearbyFilter {
    pub center: LatLng,
    pub radius_m: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MarkerFilter {
    pub active_categories: Vec<Category>,
    pub view: OwnershipView,
    pub viewer_id: Option<u64>,
    pub favorites: HashSet<MarkerId>,
    pub nearby: Option<NearbyFilter>,
}

impl MarkerFilter {
    /// Applies the filter; inactive markers never show.
    pub fn apply<'a>(&self, markers: &'a [Marker]) -> Vec<&'a Marker> {
        let mut out: Vec<&Marker> = markers
            .iter()
            .filter(|m| m.is_active)
            .filter(|m| self.active_categories.contains(&m.category))
            .filter(|m| match self.view {
                OwnershipView::All => true,
                OwnershipView::Mine => {
                    m.owner_id.is_some() && m.owner_id == self.viewer_id
                }
                OwnershipView::Favorites => self.favorites.contains(&m.id),
            })
            .filter(|m| match self.nearby {
                Some(nearby) => {
                    haversine_distance_m(LatLng::new(m.lat, m.lng), nearby.center)
                        <= nearby.radius_m
                }
                None => true,
            })
            .collect();

        if let Some(nearby) = self.nearby {
            out.sort_by(|a, b| {
                let da = haversine_distance_m(LatLng::new(a.lat, a.lng), nearby.center);
                let db = haversine_distance_m(LatLng::new(b.lat, b.lng), nearby.center);
                da.total_cmp(&db)
            });
        }
        out
    }
}
