//! Single source of truth for camera state and tile-source selection.
//!
//! The store never reads a clock: callers pass `Time` into `on_move_end` and
//! `tick`, which keeps debounce and watchdog behavior deterministic under
//! test. Persistence failures degrade to a warning; the live camera is
//! always valid regardless of storage health.

use geo::{LatLng, MapEdges, Time, ViewportBounds, compute_bounds};
use tracing::warn;

use crate::camera::Camera;
use crate::prefs::{KEY_CAMERA, KEY_HINT_SHOWN, KEY_TILE_SOURCE, PrefsStore};

/// Debounce window for camera persistence. Bursts of move events collapse
/// into one write per settle.
pub const PERSIST_DEBOUNCE_S: f64 = 0.45;

/// How long camera startup waits for a geolocation fix before falling back
/// to the restored (or default) camera.
pub const STARTUP_WATCHDOG_S: f64 = 1.8;

/// Zoom floor applied when the startup camera comes from a location fix.
pub const STARTUP_FIX_ZOOM: f64 = 15.0;

/// Startup camera resolution: first match of (fix, restored, default) wins,
/// and it wins exactly once per session.
#[derive(Debug)]
enum StartupCamera {
    Pending { deadline: Time },
    Applied,
}

#[derive(Debug)]
pub struct ViewportStore<P: PrefsStore> {
    prefs: P,
    camera: Camera,
    restored: Option<Camera>,
    bounds: Option<ViewportBounds>,
    tile_source: String,
    default_camera: Camera,
    pending_persist_at: Option<Time>,
    startup: StartupCamera,
}

impl<P: PrefsStore> ViewportStore<P> {
    /// Restores persisted state and arms the startup watchdog.
    pub fn new(prefs: P, default_camera: Camera, default_tile_source: &str, now: Time) -> Self {
        let restored = restore_camera(&prefs);
        let tile_source = match prefs.get(KEY_TILE_SOURCE) {
            Ok(Some(key)) if !key.trim().is_empty() => key,
            Ok(_) => default_tile_source.to_string(),
            Err(err) => {
                warn!(error = %err, "failed to read tile source preference");
                default_tile_source.to_string()
            }
        };
        Self {
            prefs,
            camera: restored.unwrap_or(default_camera),
            restored,
            bounds: None,
            tile_source,
            default_camera,
            pending_persist_at: None,
            startup: StartupCamera::Pending {
                deadline: now.plus(STARTUP_WATCHDOG_S),
            },
        }
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    /// The camera restored from storage, if any survived deserialization.
    pub fn restored_camera(&self) -> Option<Camera> {
        self.restored
    }

    pub fn bounds(&self) -> Option<ViewportBounds> {
        self.bounds
    }

    pub fn tile_source(&self) -> &str {
        &self.tile_source
    }

    /// Applies one settled renderer move: camera and bounds update together,
    /// and a debounced persist is (re)scheduled.
    pub fn on_move_end(&mut self, camera: Camera, edges: MapEdges, now: Time) -> ViewportBounds {
        let bounds = compute_bounds(edges);
        self.camera = camera;
        self.bounds = Some(bounds);
        self.pending_persist_at = Some(now.plus(PERSIST_DEBOUNCE_S));
        bounds
    }

    /// A fresh location fix during the startup window: the fix wins the
    /// startup camera. Returns the camera to apply, or `None` if startup
    /// already resolved.
    pub fn startup_fix(&mut self, pos: LatLng) -> Option<Camera> {
        if !matches!(self.startup, StartupCamera::Pending { .. }) {
            return None;
        }
        self.startup = StartupCamera::Applied;
        let zoom = self
            .restored
            .unwrap_or(self.default_camera)
            .zoom
            .max(STARTUP_FIX_ZOOM);
        let camera = Camera::new(pos.lat, pos.lng, zoom);
        self.camera = camera;
        Some(camera)
    }

    /// Drives time-based behavior: the startup watchdog and the debounced
    /// persist. Returns a startup camera to apply when the watchdog fires
    /// before any fix arrived.
    pub fn tick(&mut self, now: Time) -> Option<Camera> {
        if let Some(at) = self.pending_persist_at
            && now >= at
        {
            self.pending_persist_at = None;
            self.persist_camera();
        }

        match self.startup {
            StartupCamera::Pending { deadline } if now >= deadline => {
                self.startup = StartupCamera::Applied;
                let camera = self.restored.unwrap_or(self.default_camera);
                self.camera = camera;
                Some(camera)
            }
            _ => None,
        }
    }

    /// Teardown: write any pending camera state immediately.
    pub fn flush(&mut self) {
        if self.pending_persist_at.take().is_some() {
            self.persist_camera();
        }
    }

    /// Tile source changes rarely; it persists immediately, undebounced.
    pub fn set_tile_source(&mut self, key: &str) {
        self.tile_source = key.to_string();
        if let Err(err) = self.prefs.set(KEY_TILE_SOURCE, key) {
            warn!(error = %err, "failed to persist tile source");
        }
    }

    pub fn hint_shown(&self) -> bool {
        matches!(self.prefs.get(KEY_HINT_SHOWN), Ok(Some(v)) if v == "true")
    }

    pub fn mark_hint_shown(&mut self) {
        if let Err(err) = self.prefs.set(KEY_HINT_SHOWN, "true") {
            warn!(error = %err, "failed to persist hint flag");
        }
    }

    fn persist_camera(&mut self) {
        let json = match serde_json::to_string(&self.camera) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to serialize camera");
                return;
            }
        };
        if let Err(err) = self.prefs.set(KEY_CAMERA, &json) {
            warn!(error = %err, "failed to persist camera");
        }
    }
}

/// Loads the persisted camera; malformed payloads are treated as absent.
fn restore_camera<P: PrefsStore>(prefs: &P) -> Option<Camera> {
    let raw = match prefs.get(KEY_CAMERA) {
        Ok(raw) => raw?,
        Err(err) => {
            warn!(error = %err, "failed to read persisted camera");
            return None;
        }
    };
    match serde_json::from_str::<Camera>(&raw) {
        Ok(camera) => Some(camera.normalized()),
        Err(err) => {
            warn!(error = %err, "discarding malformed persisted camera");
            None
        }
    }
}
