//! Headless host binary: speaks the renderer wire protocol over stdio.
//!
//! Each stdin line is one JSON frame: renderer events carry a `type` field,
//! UI-shell commands carry a `cmd` field. Outbound renderer commands leave
//! one JSON frame per stdout line; logs go to stderr. Configuration comes
//! from `PINMAP_*` environment variables.

mod file_prefs;
mod http_api;
mod session;

use std::env;
use std::time::{Duration, Instant};

use geo::{LatLng, Time};
use markers::{Category, MarkerId, OwnershipView, TimeField};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use viewport::Camera;

use crate::file_prefs::FilePrefsStore;
use crate::http_api::HttpMarkerApi;
use crate::session::{MapSession, NativePositioner, UnavailablePositioner, tile_source_url};

const TICK_INTERVAL_MS: u64 = 100;

/// Commands from the UI shell, multiplexed onto the same stdin stream as
/// renderer frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum HostCommand {
    Recenter,
    Foreground { location_permission: bool },
    BeginAdd,
    AddAtCenter,
    EditSelected,
    SetDraftFields {
        title: Option<String>,
        description: Option<String>,
        category: Option<Category>,
        is_public: Option<bool>,
        start_hour: Option<String>,
        start_minute: Option<String>,
        end_hour: Option<String>,
        end_minute: Option<String>,
    },
    SubmitDraft,
    CloseDraft,
    RequestDelete,
    ConfirmDelete,
    CancelDelete,
    SetCategories { categories: Vec<Category> },
    SetOwnershipView { view: String },
    SearchNearby {
        lat: f64,
        lng: f64,
        radius_m: f64,
        category: Category,
    },
    ClearNearby,
    ToggleFavorite { id: u64, favorite: bool },
    ReloadFavorites,
    SetTileSource { key: String },
    Status,
}

async fn handle_command<A, P, S>(
    session: &mut MapSession<A, P, S>,
    cmd: HostCommand,
    now: Time,
) where
    A: markers::MarkerApi,
    P: NativePositioner,
    S: viewport::PrefsStore,
{
    match cmd {
        HostCommand::Recenter => session.request_recenter(now).await,
        HostCommand::Foreground {
            location_permission,
        } => session.on_app_foreground(location_permission),
        HostCommand::BeginAdd => {
            if let Some(hint) = session.begin_add() {
                info!(hint, "add mode");
            }
        }
        HostCommand::AddAtCenter => session.add_at_center(),
        HostCommand::EditSelected => {
            if !session.open_edit_selected() {
                warn!("no marker selected to edit");
            }
        }
        HostCommand::SetDraftFields {
            title,
            description,
            category,
            is_public,
            start_hour,
            start_minute,
            end_hour,
            end_minute,
        } => {
            let fields = session.draft_mut().fields_mut();
            if let Some(v) = title {
                fields.title = v;
            }
            if let Some(v) = description {
                fields.description = v;
            }
            if let Some(v) = category {
                fields.category = Some(v);
            }
            if let Some(v) = is_public {
                fields.is_public = v;
            }
            for (value, field) in [
                (start_hour, TimeField::StartHour),
                (start_minute, TimeField::StartMinute),
                (end_hour, TimeField::EndHour),
                (end_minute, TimeField::EndMinute),
            ] {
                if let Some(v) = value {
                    set_time_field(session, field, v);
                }
            }
        }
        HostCommand::SubmitDraft => {
            if let Err(err) = session.submit_draft().await {
                warn!(error = %err, "draft submit failed");
            }
        }
        HostCommand::CloseDraft => session.draft_mut().close(),
        HostCommand::RequestDelete => {
            if let Err(err) = session.request_delete() {
                warn!(error = %err, "delete not permitted");
            }
        }
        HostCommand::ConfirmDelete => {
            if let Err(err) = session.confirm_delete(now).await {
                warn!(error = %err, "delete failed");
            }
        }
        HostCommand::CancelDelete => session.draft_mut().cancel_delete(),
        HostCommand::SetCategories { categories } => {
            session.set_categories(categories, now).await
        }
        HostCommand::SetOwnershipView { view } => match view.as_str() {
            "all" => session.set_ownership_view(OwnershipView::All),
            "mine" => session.set_ownership_view(OwnershipView::Mine),
            "favorites" => session.set_ownership_view(OwnershipView::Favorites),
            other => warn!(view = other, "unknown ownership view"),
        },
        HostCommand::SearchNearby {
            lat,
            lng,
            radius_m,
            category,
        } => {
            match session
                .search_nearby(LatLng::new(lat, lng), radius_m, category)
                .await
            {
                Ok(count) => info!(count, "nearby search complete"),
                Err(err) => warn!(error = %err, "nearby search failed"),
            }
        }
        HostCommand::ClearNearby => session.set_nearby_filter(None),
        HostCommand::ToggleFavorite { id, favorite } => {
            if let Err(err) = session.toggle_favorite(MarkerId(id), favorite).await {
                warn!(error = %err, "favorite update failed");
            }
        }
        HostCommand::ReloadFavorites => session.reload_favorites().await,
        HostCommand::SetTileSource { key } => match tile_source_url(&key) {
            Some(url) => {
                let camera = session.set_tile_source(&key);
                // The UI shell recreates the renderer with the new tiles and
                // re-seeds it from this camera.
                info!(%key, url, latitude = camera.latitude, longitude = camera.longitude, "tile source changed");
            }
            None => warn!(%key, "unknown tile source"),
        },
        HostCommand::Status => {
            info!(
                markers = session.markers().len(),
                selected = ?session.selected(),
                tile_source = session.tile_source(),
                draft = ?session.draft().state(),
                query_error = ?session.last_query_error(),
                image_error = ?session.last_image_error(),
                "session status"
            );
        }
    }
}

fn set_time_field<A, P, S>(session: &mut MapSession<A, P, S>, field: TimeField, value: String)
where
    A: markers::MarkerApi,
    P: NativePositioner,
    S: viewport::PrefsStore,
{
    let slot = match field {
        TimeField::StartHour => &mut session.draft_mut().fields_mut().start_hour,
        TimeField::StartMinute => &mut session.draft_mut().fields_mut().start_minute,
        TimeField::EndHour => &mut session.draft_mut().fields_mut().end_hour,
        TimeField::EndMinute => &mut session.draft_mut().fields_mut().end_minute,
    };
    *slot = value;
    if let Some(hint) = session.draft_mut().blur_time_field(field) {
        info!(hint, "open time adjusted");
    }
}

/// `"lat,lng,zoom"`.
fn parse_camera(raw: &str) -> Option<Camera> {
    let mut parts = raw.split(',').map(str::trim);
    let lat = parts.next()?.parse().ok()?;
    let lng = parts.next()?.parse().ok()?;
    let zoom = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Camera::new(lat, lng, zoom))
}

fn default_camera() -> Camera {
    // Taipei city center.
    Camera::new(25.0330, 121.5654, 13.0)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let api_url = env::var("PINMAP_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let token = env::var("PINMAP_TOKEN").ok();
    let state_dir = env::var("PINMAP_STATE_DIR").unwrap_or_else(|_| ".pinmap-state".to_string());
    let camera = env::var("PINMAP_DEFAULT_CAMERA")
        .ok()
        .map(|raw| parse_camera(&raw).expect("invalid PINMAP_DEFAULT_CAMERA, want lat,lng,zoom"))
        .unwrap_or_else(default_camera);
    let viewer_id = env::var("PINMAP_VIEWER_ID").ok().and_then(|v| v.parse().ok());
    let location_permission = env::var("PINMAP_LOCATION_PERMISSION")
        .map(|v| v == "granted")
        .unwrap_or(false);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build http client");
    let api = HttpMarkerApi::new(&api_url, token, http);
    let prefs = FilePrefsStore::new(&state_dir);

    let started = Instant::now();
    let now = || Time(started.elapsed().as_secs_f64());

    let mut session = MapSession::new(
        api,
        UnavailablePositioner,
        prefs,
        camera,
        location_permission,
        viewer_id,
        now(),
    );

    info!(%api_url, %state_dir, "host ready, waiting for renderer frames");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(&mut session, &line, now()).await,
                Ok(None) => break,
                Err(err) => {
                    error!(error = %err, "stdin read failed");
                    break;
                }
            },
            _ = ticker.tick() => session.tick(now()).await,
        }

        for frame in session.take_outbound() {
            if let Err(err) = write_frame(&mut stdout, &frame).await {
                error!(error = %err, "stdout write failed");
                session.shutdown();
                return;
            }
        }
    }

    session.shutdown();
}

async fn handle_line<A, P, S>(session: &mut MapSession<A, P, S>, line: &str, now: Time)
where
    A: markers::MarkerApi,
    P: NativePositioner,
    S: viewport::PrefsStore,
{
    if line.trim().is_empty() {
        return;
    }
    match serde_json::from_str::<HostCommand>(line) {
        Ok(cmd) => handle_command(session, cmd, now).await,
        // Not a shell command; let the renderer decoder have it.
        Err(_) => session.handle_frame(line, now).await,
    }
}

async fn write_frame(
    stdout: &mut tokio::io::Stdout,
    frame: &str,
) -> std::io::Result<()> {
    stdout.write_all(frame.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
