//! One live map session: renderer bridge in, HTTP out.
//!
//! `MapSession` owns the four cores (viewport store, query coordinator,
//! location arbiter, draft workflow) and performs the IO they delegate:
//! dispatching bounded viewport queries, invoking the native positioner,
//! and pushing commands back over the renderer bridge. Everything runs on
//! one task; network calls are the only suspension points.

use std::collections::HashSet;

use bridge::{InboundEvent, MarkerDot, RendererBridge, decode_event};
use geo::{LatLng, MapEdges, Time};
use location::{ArbiterCommand, LocationArbiter, NativeFix, NativeLocationError};
use markers::{
    ApiError, BoundsQuery, Category, DraftWorkflow, LoadResult, Marker, MarkerApi, MarkerFilter,
    MarkerId, MarkerQueryCoordinator, NearbyFilter, OwnershipView, SubmitError, SubmitMethod,
    apply_optimistic,
};
use tracing::{error, info, warn};
use viewport::{Camera, PrefsStore, ViewportStore};

/// Named tile sources the renderer can be created with.
pub const TILE_SOURCES: &[(&str, &str)] = &[
    ("osm", "https://tile.openstreetmap.org/{z}/{x}/{y}.png"),
    ("carto_light", "https://basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png"),
];

pub const DEFAULT_TILE_SOURCE: &str = "osm";

/// Recentering never zooms the user out past street level.
pub const RECENTER_ZOOM_FLOOR: f64 = 15.0;

pub fn tile_source_url(key: &str) -> Option<&'static str> {
    TILE_SOURCES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, url)| *url)
}

/// The OS location adapter: one `getCurrentPosition` operation.
#[allow(async_fn_in_trait)]
pub trait NativePositioner {
    async fn get_current_position(
        &self,
        timeout_s: f64,
        max_age_s: f64,
    ) -> Result<NativeFix, NativeLocationError>;
}

/// Positioner for hosts without an OS location adapter.
#[derive(Debug, Default)]
pub struct UnavailablePositioner;

impl NativePositioner for UnavailablePositioner {
    async fn get_current_position(
        &self,
        _timeout_s: f64,
        _max_age_s: f64,
    ) -> Result<NativeFix, NativeLocationError> {
        Err(NativeLocationError::Unavailable)
    }
}

/// Why a draft submission did not land.
#[derive(Debug)]
pub enum SubmitFailure {
    Invalid(SubmitError),
    Api(ApiError),
}

impl std::fmt::Display for SubmitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitFailure::Invalid(err) => err.fmt(f),
            SubmitFailure::Api(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for SubmitFailure {}

pub struct MapSession<A, P, S: PrefsStore> {
    api: A,
    positioner: P,
    bridge: RendererBridge<Vec<String>>,
    store: ViewportStore<S>,
    coordinator: MarkerQueryCoordinator,
    arbiter: LocationArbiter,
    draft: DraftWorkflow,
    filter: MarkerFilter,
    add_mode: bool,
    selected: Option<MarkerId>,
    viewer_id: Option<u64>,
    image_error: Option<String>,
}

impl<A: MarkerApi, P: NativePositioner, S: PrefsStore> MapSession<A, P, S> {
    pub fn new(
        api: A,
        positioner: P,
        prefs: S,
        default_camera: Camera,
        location_permission: bool,
        viewer_id: Option<u64>,
        now: Time,
    ) -> Self {
        Self {
            api,
            positioner,
            bridge: RendererBridge::new(Vec::new()),
            store: ViewportStore::new(prefs, default_camera, DEFAULT_TILE_SOURCE, now),
            coordinator: MarkerQueryCoordinator::new(),
            arbiter: LocationArbiter::new(location_permission, now),
            draft: DraftWorkflow::new(),
            filter: MarkerFilter {
                active_categories: Category::ALL.to_vec(),
                view: OwnershipView::All,
                viewer_id,
                favorites: HashSet::new(),
                nearby: None,
            },
            add_mode: false,
            selected: None,
            viewer_id,
            image_error: None,
        }
    }

    /// Frames queued for the renderer since the last drain.
    pub fn take_outbound(&mut self) -> Vec<String> {
        std::mem::take(self.bridge.sink_mut())
    }

    pub fn markers(&self) -> &[Marker] {
        self.coordinator.markers()
    }

    pub fn selected(&self) -> Option<MarkerId> {
        self.selected
    }

    pub fn last_query_error(&self) -> Option<&str> {
        self.coordinator.last_error()
    }

    pub fn last_image_error(&self) -> Option<&str> {
        self.image_error.as_deref()
    }

    pub fn draft(&self) -> &DraftWorkflow {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut DraftWorkflow {
        &mut self.draft
    }

    /// One raw frame off the renderer channel. Malformed frames are dropped
    /// by the bridge.
    pub async fn handle_frame(&mut self, frame: &str, now: Time) {
        let Some(event) = decode_event(frame) else {
            return;
        };
        self.handle_event(event, now).await;
    }

    pub async fn handle_event(&mut self, event: InboundEvent, now: Time) {
        match event {
            InboundEvent::MapReady => {
                // Fresh renderer instance: re-seed camera, user location and
                // the full marker layer.
                let camera = self.store.camera();
                self.bridge.set_view(camera.latitude, camera.longitude, camera.zoom);
                match self.arbiter.location() {
                    Some(loc) => {
                        self.bridge.set_user_location(loc.latitude, loc.longitude, None)
                    }
                    None => self.bridge.clear_user_location(),
                }
                self.render();
            }
            InboundEvent::MoveEnd {
                lat,
                lng,
                zoom,
                south,
                north,
                west,
                east,
            } => {
                let camera = Camera::new(lat, lng, zoom);
                let edges = MapEdges {
                    south,
                    north,
                    west,
                    east,
                };
                self.store.on_move_end(camera, edges, now);
                self.reload_markers(now).await;
            }
            InboundEvent::MapPress { lat, lng } => {
                if self.add_mode {
                    self.add_mode = false;
                    self.draft.open_new(LatLng::new(lat, lng));
                }
            }
            InboundEvent::MarkerPress { id } => {
                let id = MarkerId(id);
                self.selected = self
                    .coordinator
                    .markers()
                    .iter()
                    .any(|m| m.id == id)
                    .then_some(id);
            }
            InboundEvent::UserLocation { lat, lng } => {
                let cmds = self.arbiter.on_renderer_fix(lat, lng, now);
                self.run_arbiter_commands(cmds, now).await;
            }
            InboundEvent::GeoError { message } => {
                let cmds = self.arbiter.on_renderer_error(&message, now);
                self.run_arbiter_commands(cmds, now).await;
            }
            InboundEvent::RendererLoadFailed { message } => {
                error!(%message, "embedded renderer failed to load");
            }
        }
    }

    /// Periodic driver for debounce, watchdog and probe deadlines.
    pub async fn tick(&mut self, now: Time) {
        if let Some(camera) = self.store.tick(now) {
            self.bridge
                .set_view(camera.latitude, camera.longitude, camera.zoom);
        }
        let cmds = self.arbiter.tick(now);
        self.run_arbiter_commands(cmds, now).await;
    }

    /// App returned to the foreground: re-check the location permission.
    pub fn on_app_foreground(&mut self, location_permission: bool) {
        self.arbiter.on_app_foreground(location_permission);
    }

    pub async fn request_recenter(&mut self, now: Time) {
        let cmds = self.arbiter.request_recenter(now);
        self.run_arbiter_commands(cmds, now).await;
    }

    /// Enters add mode; the next map press opens a creation draft. Returns
    /// hint text the first time per install.
    pub fn begin_add(&mut self) -> Option<&'static str> {
        self.add_mode = true;
        if !self.store.hint_shown() {
            self.store.mark_hint_shown();
            return Some("tap the map to place the new marker");
        }
        None
    }

    /// Direct add: a creation draft seeded at the current camera center.
    pub fn add_at_center(&mut self) {
        let camera = self.store.camera();
        self.draft
            .open_new(LatLng::new(camera.latitude, camera.longitude));
    }

    /// Opens an edit draft for the selected marker, if it still exists.
    pub fn open_edit_selected(&mut self) -> bool {
        let Some(id) = self.selected else {
            return false;
        };
        let Some(marker) = self.coordinator.markers().iter().find(|m| m.id == id).cloned()
        else {
            return false;
        };
        self.draft.open_edit(&marker);
        true
    }

    /// Validates and performs the draft submission. The image (if any) is
    /// uploaded strictly after the marker exists; an image failure does not
    /// roll the marker back.
    pub async fn submit_draft(&mut self) -> Result<(), SubmitFailure> {
        let action = self.draft.submit().map_err(SubmitFailure::Invalid)?;
        let result = match action.method {
            SubmitMethod::Create => self.api.create_marker(&action.payload).await,
            SubmitMethod::Update(id) => self.api.update_marker(id, &action.payload).await,
        };
        match result {
            Ok(marker) => {
                self.image_error = None;
                if let Some(image) = &action.image {
                    if let Err(err) = self.api.upload_marker_image(marker.id, image).await {
                        warn!(error = %err, "image upload failed; marker saved without image");
                        self.image_error = Some(err.to_string());
                    }
                }
                self.draft
                    .submit_succeeded(marker, self.coordinator.markers_mut());
                self.render();
                Ok(())
            }
            Err(err) => {
                self.draft.submit_failed();
                Err(SubmitFailure::Api(err))
            }
        }
    }

    pub fn request_delete(&mut self) -> Result<(), markers::DraftError> {
        self.draft.request_delete(self.viewer_id)
    }

    /// Performs a confirmed delete, then reloads the viewport and the
    /// favorites list (the deleted marker may have been favorited).
    pub async fn confirm_delete(&mut self, now: Time) -> Result<(), ApiError> {
        let Some(id) = self.draft.confirm_delete() else {
            return Ok(());
        };
        match self.api.delete_marker(id).await {
            Ok(()) => {
                self.draft.delete_succeeded(id, self.coordinator.markers_mut());
                self.render();
                self.reload_markers(now).await;
                self.reload_favorites().await;
                Ok(())
            }
            Err(err) => {
                self.draft.submit_failed();
                Err(err)
            }
        }
    }

    /// Category toggles re-query the server (they are part of the viewport
    /// query), unlike the purely client-side view filters.
    pub async fn set_categories(&mut self, categories: Vec<Category>, now: Time) {
        self.filter.active_categories = categories;
        self.reload_markers(now).await;
    }

    pub fn set_ownership_view(&mut self, view: OwnershipView) {
        self.filter.view = view;
        self.render();
    }

    pub fn set_nearby_filter(&mut self, nearby: Option<NearbyFilter>) {
        self.filter.nearby = nearby;
        self.render();
    }

    /// Server-side nearby search: fetches one category around a point,
    /// merges the results into the loaded set, and applies the nearby view
    /// so they render nearest-first. Returns how many the server found.
    pub async fn search_nearby(
        &mut self,
        center: LatLng,
        radius_m: f64,
        category: Category,
    ) -> Result<usize, ApiError> {
        let found = self.api.query_nearby(center, radius_m, category).await?;
        let count = found.len();
        let list = self.coordinator.markers_mut();
        for marker in found {
            apply_optimistic(list, marker);
        }
        self.filter.nearby = Some(NearbyFilter { center, radius_m });
        self.render();
        Ok(count)
    }

    pub async fn toggle_favorite(&mut self, id: MarkerId, favorite: bool) -> Result<(), ApiError> {
        self.api.set_favorite(id, favorite).await?;
        if favorite {
            self.filter.favorites.insert(id);
        } else {
            self.filter.favorites.remove(&id);
        }
        if self.filter.view == OwnershipView::Favorites {
            self.render();
        }
        Ok(())
    }

    pub async fn reload_favorites(&mut self) {
        match self.api.list_favorites().await {
            Ok(list) => {
                self.filter.favorites = list.iter().map(|m| m.id).collect();
                if self.filter.view == OwnershipView::Favorites {
                    self.render();
                }
            }
            Err(err) => warn!(error = %err, "favorites reload failed"),
        }
    }

    /// Selects a tile source. The caller must recreate the renderer; the
    /// returned camera re-seeds it (renderer-side state loss is expected).
    pub fn set_tile_source(&mut self, key: &str) -> Camera {
        self.store.set_tile_source(key);
        self.store.camera()
    }

    pub fn tile_source(&self) -> &str {
        self.store.tile_source()
    }

    /// Final flush of pending persistence on teardown.
    pub fn shutdown(&mut self) {
        self.store.flush();
    }

    async fn reload_markers(&mut self, _now: Time) {
        let Some(bounds) = self.store.bounds() else {
            return;
        };
        let plan = self
            .coordinator
            .begin(bounds, &self.filter.active_categories);
        let outcome = self.dispatch(&plan.queries).await;
        match self.coordinator.complete(plan.seq, outcome) {
            LoadResult::Updated => self.render(),
            LoadResult::Failed { first_load } => {
                // Previous markers stay on screen; a failed first load has
                // nothing to keep, so render the (empty) state.
                if first_load {
                    self.render();
                }
            }
            LoadResult::Discarded => {}
        }
    }

    async fn dispatch(&self, queries: &[BoundsQuery]) -> Result<Vec<Vec<Marker>>, ApiError> {
        match queries {
            [] => Ok(Vec::new()),
            [q] => Ok(vec![self.api.query_viewport(q).await?]),
            // Anti-meridian split: both slices run concurrently.
            [a, b] => {
                let (ra, rb) = tokio::join!(self.api.query_viewport(a), self.api.query_viewport(b));
                Ok(vec![ra?, rb?])
            }
            more => {
                let mut out = Vec::with_capacity(more.len());
                for q in more {
                    out.push(self.api.query_viewport(q).await?);
                }
                Ok(out)
            }
        }
    }

    async fn run_arbiter_commands(&mut self, cmds: Vec<ArbiterCommand>, now: Time) {
        for cmd in cmds {
            match cmd {
                ArbiterCommand::StartNativeRequest {
                    timeout_s,
                    max_age_s,
                } => {
                    let result = self
                        .positioner
                        .get_current_position(timeout_s, max_age_s)
                        .await;
                    let follow = self.arbiter.on_native_result(result, now);
                    for cmd in follow {
                        self.apply_command(cmd);
                    }
                }
                other => self.apply_command(other),
            }
        }
    }

    fn apply_command(&mut self, cmd: ArbiterCommand) {
        match cmd {
            ArbiterCommand::SetUserLocation(loc) => {
                // A fresh fix from either channel wins the startup camera.
                if let Some(camera) = self
                    .store
                    .startup_fix(LatLng::new(loc.latitude, loc.longitude))
                {
                    self.bridge
                        .set_view(camera.latitude, camera.longitude, camera.zoom);
                }
                self.bridge
                    .set_user_location(loc.latitude, loc.longitude, None);
            }
            ArbiterCommand::ClearUserLocation => self.bridge.clear_user_location(),
            ArbiterCommand::Recenter(pos) => {
                let zoom = self.store.camera().zoom.max(RECENTER_ZOOM_FLOOR);
                self.bridge.set_view(pos.lat, pos.lng, zoom);
            }
            ArbiterCommand::NotifyUnavailable { message } => {
                info!(%message, "location unavailable on every channel");
            }
            // Native requests are handled where awaiting is possible.
            ArbiterCommand::StartNativeRequest { .. } => {}
        }
    }

    fn render(&mut self) {
        let dots: Vec<MarkerDot> = self
            .filter
            .apply(self.coordinator.markers())
            .into_iter()
            .map(|m| MarkerDot {
                id: m.id.0,
                lat: m.lat,
                lng: m.lng,
                color: m.category.color().to_string(),
            })
            .collect();
        self.bridge.render_markers(dots);
    }
}
