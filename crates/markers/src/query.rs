//! Viewport-driven marker loading with stale-response suppression.
//!
//! `begin` turns the current bounds and category set into zero, one or two
//! bounded queries and stamps them with a fresh sequence number; `complete`
//! applies a finished batch only if that sequence number is still current.
//! There is no transport-level cancellation: a superseded response simply
//! arrives, fails the sequence check, and is discarded.

use std::collections::BTreeMap;

use geo::ViewportBounds;
use tracing::{trace, warn};

use crate::api::ApiError;
use crate::model::{Category, Marker};

/// Identity of one load, monotonically increasing per coordinator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuerySeq(pub u64);

/// One bounded server query (`GET /markers/viewport` parameters).
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsQuery {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
    pub categories: Vec<Category>,
}

/// What `begin` asks the host to dispatch. Queries within one plan run
/// concurrently; their results come back together in one `complete` call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub seq: QuerySeq,
    pub queries: Vec<BoundsQuery>,
}

/// What happened when a finished load was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    /// The marker set now reflects this load.
    Updated,
    /// A newer load superseded this one; nothing changed.
    Discarded,
    /// The load failed. Previously loaded markers are retained unless this
    /// was the first load (there was nothing to retain).
    Failed { first_load: bool },
}

#[derive(Debug, Default)]
pub struct MarkerQueryCoordinator {
    seq: u64,
    markers: Vec<Marker>,
    loaded_once: bool,
    last_error: Option<String>,
}

impl MarkerQueryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently applied marker set.
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Mutable access for optimistic list updates after a draft submit or
    /// delete; viewport loads still replace the whole set.
    pub fn markers_mut(&mut self) -> &mut Vec<Marker> {
        &mut self.markers
    }

    /// Whether any load has finished (success or failure). Until then the
    /// caller shows "loading" rather than "empty".
    pub fn loaded_once(&self) -> bool {
        self.loaded_once
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Starts a new load for the given viewport and category set.
    ///
    /// An empty category set resolves immediately to the empty marker set
    /// with no queries — a fast path, not an error. A viewport that wraps
    /// the anti-meridian splits into two disjoint longitude slices.
    pub fn begin(&mut self, bounds: ViewportBounds, categories: &[Category]) -> QueryPlan {
        self.seq += 1;
        let seq = QuerySeq(self.seq);

        if categories.is_empty() {
            self.markers.clear();
            self.loaded_once = true;
            self.last_error = None;
            return QueryPlan {
                seq,
                queries: Vec::new(),
            };
        }

        QueryPlan {
            seq,
            queries: split_bounds(bounds, categories),
        }
    }

    /// Applies a finished load. Responses for anything but the newest
    /// sequence number are discarded silently.
    pub fn complete(
        &mut self,
        seq: QuerySeq,
        outcome: Result<Vec<Vec<Marker>>, ApiError>,
    ) -> LoadResult {
        if seq.0 != self.seq {
            trace!(seq = seq.0, current = self.seq, "discarding stale marker response");
            return LoadResult::Discarded;
        }

        match outcome {
            Ok(batches) => {
                // Union by id across slices; a later slice wins on overlap.
                let mut merged: BTreeMap<_, _> = BTreeMap::new();
                for marker in batches.into_iter().flatten() {
                    merged.insert(marker.id, marker);
                }
                self.markers = merged.into_values().collect();
                self.loaded_once = true;
                self.last_error = None;
                LoadResult::Updated
            }
            Err(err) => {
                let first_load = !self.loaded_once;
                warn!(error = %err, first_load, "marker viewport load failed");
                self.last_error = Some(err.to_string());
                // Stale-but-valid data beats a blank map, so existing markers
                // stay put. The load still counts as completed.
                self.loaded_once = true;
                LoadResult::Failed { first_load }
            }
        }
    }
}

fn split_bounds(bounds: ViewportBounds, categories: &[Category]) -> Vec<BoundsQuery> {
    let slice = |min_lng: f64, max_lng: f64| BoundsQuery {
        min_lat: bounds.min_lat,
        max_lat: bounds.max_lat,
        min_lng,
        max_lng,
        categories: categories.to_vec(),
    };

    if bounds.whole_world {
        vec![slice(-180.0, 180.0)]
    } else if bounds.wraps_antimeridian {
        vec![slice(bounds.min_lng, 180.0), slice(-180.0, bounds.max_lng)]
    } else {
        vec![slice(bounds.min_lng, bounds.max_lng)]
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadResult, MarkerQueryCoordinator};
    use crate::api::ApiError;
    use crate::model::{Category, Marker, MarkerId};
    use geo::{MapEdges, compute_bounds};
    use pretty_assertions::assert_eq;

    fn bounds(west: f64, east: f64) -> geo::ViewportBounds {
        compute_bounds(MapEdges {
            south: -10.0,
            north: 10.0,
            west,
            east,
        })
    }

    fn marker(id: u64) -> Marker {
        Marker {
            id: MarkerId(id),
            lat: 0.0,
            lng: 0.0,
            category: Category::FriendlyClinic,
            title: format!("m{id}"),
            description: None,
            is_public: true,
            is_active: true,
            open_time_start: None,
            open_time_end: None,
            image: None,
            owner_id: None,
        }
    }

    #[test]
    fn empty_categories_resolve_without_queries() {
        let mut coord = MarkerQueryCoordinator::new();
        let plan = coord.begin(bounds(0.0, 10.0), &[]);
        assert!(plan.queries.is_empty());
        assert!(coord.markers().is_empty());
        assert!(coord.loaded_once());
    }

    #[test]
    fn plain_viewport_is_one_query() {
        let mut coord = MarkerQueryCoordinator::new();
        let plan = coord.begin(bounds(121.0, 122.0), &[Category::AccessibleToilet]);
        assert_eq!(plan.queries.len(), 1);
        assert_eq!(plan.queries[0].min_lng, 121.0);
        assert_eq!(plan.queries[0].max_lng, 122.0);
    }

    #[test]
    fn antimeridian_viewport_splits_into_two_slices() {
        let mut coord = MarkerQueryCoordinator::new();
        let plan = coord.begin(bounds(170.0, -170.0), &[Category::SelfDefinition]);
        assert_eq!(plan.queries.len(), 2);
        assert_eq!(
            (plan.queries[0].min_lng, plan.queries[0].max_lng),
            (170.0, 180.0)
        );
        assert_eq!(
            (plan.queries[1].min_lng, plan.queries[1].max_lng),
            (-180.0, -170.0)
        );
    }

    #[test]
    fn whole_world_viewport_is_one_full_span_query() {
        let mut coord = MarkerQueryCoordinator::new();
        let plan = coord.begin(bounds(-180.0, 180.0), &[Category::FriendlyClinic]);
        assert_eq!(plan.queries.len(), 1);
        assert_eq!(
            (plan.queries[0].min_lng, plan.queries[0].max_lng),
            (-180.0, 180.0)
        );
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut coord = MarkerQueryCoordinator::new();
        let cats = [Category::FriendlyClinic];
        let old = coord.begin(bounds(0.0, 1.0), &cats);
        let new = coord.begin(bounds(2.0, 3.0), &cats);

        // Newer response applies first.
        assert_eq!(
            coord.complete(new.seq, Ok(vec![vec![marker(6)]])),
            LoadResult::Updated
        );
        // The older one straggles in afterwards and must not win.
        assert_eq!(
            coord.complete(old.seq, Ok(vec![vec![marker(5)]])),
            LoadResult::Discarded
        );
        assert_eq!(coord.markers(), &[marker(6)]);
    }

    #[test]
    fn slices_merge_by_id() {
        let mut coord = MarkerQueryCoordinator::new();
        let plan = coord.begin(bounds(170.0, -170.0), &[Category::FriendlyClinic]);
        let result = coord.complete(
            plan.seq,
            Ok(vec![vec![marker(1), marker(2)], vec![marker(2), marker(3)]]),
        );
        assert_eq!(result, LoadResult::Updated);
        let ids: Vec<u64> = coord.markers().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn failure_keeps_previous_markers() {
        let mut coord = MarkerQueryCoordinator::new();
        let cats = [Category::FriendlyClinic];

        let plan = coord.begin(bounds(0.0, 1.0), &cats);
        coord.complete(plan.seq, Ok(vec![vec![marker(9)]]));

        let plan = coord.begin(bounds(2.0, 3.0), &cats);
        let result = coord.complete(
            plan.seq,
            Err(ApiError::Network("connection reset".to_string())),
        );
        assert_eq!(result, LoadResult::Failed { first_load: false });
        assert_eq!(coord.markers(), &[marker(9)]);
        assert!(coord.last_error().unwrap().contains("connection reset"));
    }

    #[test]
    fn first_load_failure_is_flagged() {
        let mut coord = MarkerQueryCoordinator::new();
        let plan = coord.begin(bounds(0.0, 1.0), &[Category::FriendlyClinic]);
        let result = coord.complete(plan.seq, Err(ApiError::Status(502, "bad gateway".into())));
        assert_eq!(result, LoadResult::Failed { first_load: true });
        assert!(coord.loaded_once());
    }

    #[test]
    fn success_clears_previous_error() {
        let mut coord = MarkerQueryCoordinator::new();
        let cats = [Category::FriendlyClinic];
        let plan = coord.begin(bounds(0.0, 1.0), &cats);
        coord.complete(plan.seq, Err(ApiError::Network("down".into())));
        let plan = coord.begin(bounds(0.0, 1.0), &cats);
        coord.complete(plan.seq, Ok(vec![vec![marker(1)]]));
        assert_eq!(coord.last_error(), None);
    }
}
