//! Reconciles two competing geolocation sources into one user location.
//!
//! The renderer's geolocation watch is the primary channel; the native OS
//! request is the fallback, gated by a cooldown so a renderer that emits
//! errors in a tight loop cannot spam the OS. Both channels race freely and
//! the last accepted fix wins, tagged with its source — there is no
//! staleness or accuracy comparison between them.
//!
//! The arbiter performs no IO: every entry point returns the commands the
//! host must carry out.

use geo::{LatLng, Time, clamp_latitude, normalize_longitude};
use tracing::{debug, info};

use crate::provider::{NativeFix, NativeLocationError};

/// Cooldown between renderer-error-triggered native fallback attempts.
pub const FALLBACK_COOLDOWN_S: f64 = 1.8;

/// Delay before the opportunistic startup native probe. Covers renderers
/// that silently never prompt for geolocation.
pub const STARTUP_PROBE_DELAY_S: f64 = 1.8;

/// Default native request timeout, enforced by the arbiter's own watchdog.
pub const NATIVE_TIMEOUT_S: f64 = 8.0;

/// Default acceptable fix age passed to the native request.
pub const NATIVE_MAX_AGE_S: f64 = 30.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LocationSource {
    RendererGeolocation,
    NativeOs,
}

/// The reconciled user location. Ephemeral: overwritten on every accepted
/// fix, never persisted.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UserLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub source: LocationSource,
}

/// What the host must do on behalf of the arbiter.
#[derive(Debug, Clone, PartialEq)]
pub enum ArbiterCommand {
    /// Invoke the native `getCurrentPosition` bridge.
    StartNativeRequest { timeout_s: f64, max_age_s: f64 },
    /// Push the user-location marker to the renderer.
    SetUserLocation(UserLocation),
    /// Remove the user-location marker from the renderer.
    ClearUserLocation,
    /// Recenter the camera on the user (one-shot recenter request).
    Recenter(LatLng),
    /// Every channel is exhausted; tell the user.
    NotifyUnavailable { message: String },
}

#[derive(Debug)]
pub struct LocationArbiter {
    location: Option<UserLocation>,
    permission_granted: bool,
    native_in_flight: bool,
    native_deadline: Option<Time>,
    last_fallback_at: Option<Time>,
    startup_probe_at: Option<Time>,
    recenter_on_fix: bool,
    timeout_s: f64,
}

impl LocationArbiter {
    pub fn new(permission_granted: bool, now: Time) -> Self {
        Self::with_timeout(permission_granted, now, NATIVE_TIMEOUT_S)
    }

    pub fn with_timeout(permission_granted: bool, now: Time, timeout_s: f64) -> Self {
        Self {
            location: None,
            permission_granted,
            native_in_flight: false,
            native_deadline: None,
            last_fallback_at: None,
            startup_probe_at: Some(now.plus(STARTUP_PROBE_DELAY_S)),
            recenter_on_fix: false,
            timeout_s,
        }
    }

    pub fn location(&self) -> Option<UserLocation> {
        self.location
    }

    pub fn permission_granted(&self) -> bool {
        self.permission_granted
    }

    pub fn native_in_flight(&self) -> bool {
        self.native_in_flight
    }

    /// A fix from the renderer's geolocation watch (primary channel).
    pub fn on_renderer_fix(&mut self, lat: f64, lng: f64, _now: Time) -> Vec<ArbiterCommand> {
        self.accept_fix(lat, lng, LocationSource::RendererGeolocation)
    }

    /// The renderer's geolocation watch failed. Applies the cooldown-gated
    /// native fallback; inside the cooldown the error is ignored outright.
    pub fn on_renderer_error(&mut self, message: &str, now: Time) -> Vec<ArbiterCommand> {
        if let Some(last) = self.last_fallback_at
            && now.since(last) < FALLBACK_COOLDOWN_S
        {
            debug!(message, "renderer geolocation error inside cooldown, ignored");
            return Vec::new();
        }
        self.last_fallback_at = Some(now);

        if let Some(cmd) = self.start_native(now) {
            info!(message, "renderer geolocation failed, falling back to native");
            return vec![cmd];
        }
        if self.native_in_flight {
            // The outstanding request will answer for this error too.
            return Vec::new();
        }
        // No fallback channel left.
        if self.location.is_none() {
            return vec![ArbiterCommand::NotifyUnavailable {
                message: message.to_string(),
            }];
        }
        Vec::new()
    }

    /// Result of a native `getCurrentPosition` invocation.
    pub fn on_native_result(
        &mut self,
        result: Result<NativeFix, NativeLocationError>,
        _now: Time,
    ) -> Vec<ArbiterCommand> {
        self.native_in_flight = false;
        self.native_deadline = None;

        match result {
            Ok(fix) => self.accept_fix(fix.latitude, fix.longitude, LocationSource::NativeOs),
            Err(NativeLocationError::PermissionDenied) => {
                // Suppress further native attempts until the next foreground
                // permission re-check.
                self.permission_granted = false;
                self.recenter_on_fix = false;
                if self.location.is_none() {
                    vec![ArbiterCommand::NotifyUnavailable {
                        message: NativeLocationError::PermissionDenied.to_string(),
                    }]
                } else {
                    Vec::new()
                }
            }
            Err(err) => {
                debug!(error = %err, "native location request failed");
                self.recenter_on_fix = false;
                if self.location.is_none() {
                    vec![ArbiterCommand::NotifyUnavailable {
                        message: err.to_string(),
                    }]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Explicitly starts one native request, single-flight. Returns `None`
    /// when a request is already outstanding (busy) or permission is
    /// missing; no second OS-level request ever starts.
    pub fn request_native_fix(&mut self, now: Time) -> Option<ArbiterCommand> {
        self.start_native(now)
    }

    /// One-shot recenter: if a location is known the camera moves now;
    /// otherwise one native request runs with recenter-on-success semantics,
    /// sharing flight with the passive background arbiter.
    pub fn request_recenter(&mut self, now: Time) -> Vec<ArbiterCommand> {
        if let Some(loc) = self.location {
            return vec![ArbiterCommand::Recenter(LatLng::new(
                loc.latitude,
                loc.longitude,
            ))];
        }
        self.recenter_on_fix = true;
        match self.start_native(now) {
            Some(cmd) => vec![cmd],
            // Already in flight: piggyback on the outstanding request.
            None if self.native_in_flight => Vec::new(),
            None => {
                // The request is dead here; an unrelated fix arriving later
                // must not recenter for it.
                self.recenter_on_fix = false;
                vec![ArbiterCommand::NotifyUnavailable {
                    message: NativeLocationError::PermissionDenied.to_string(),
                }]
            }
        }
    }

    /// Permission is re-checked on every app-foreground transition.
    pub fn on_app_foreground(&mut self, permission_granted: bool) {
        self.permission_granted = permission_granted;
    }

    /// Drives the startup probe and the native-request watchdog.
    pub fn tick(&mut self, now: Time) -> Vec<ArbiterCommand> {
        let mut cmds = Vec::new();

        if let Some(at) = self.startup_probe_at
            && now >= at
        {
            self.startup_probe_at = None;
            if self.location.is_none()
                && let Some(cmd) = self.start_native(now)
            {
                info!("no fix at startup, probing native location");
                cmds.push(cmd);
            }
        }

        if self.native_in_flight
            && let Some(deadline) = self.native_deadline
            && now >= deadline
        {
            debug!("native location watchdog fired");
            cmds.extend(self.on_native_result(Err(NativeLocationError::Timeout), now));
        }

        cmds
    }

    fn accept_fix(&mut self, lat: f64, lng: f64, source: LocationSource) -> Vec<ArbiterCommand> {
        let loc = UserLocation {
            latitude: clamp_latitude(lat),
            longitude: normalize_longitude(lng),
            source,
        };
        self.location = Some(loc);
        // A fix from either channel satisfies the startup probe.
        self.startup_probe_at = None;

        let mut cmds = vec![ArbiterCommand::SetUserLocation(loc)];
        if self.recenter_on_fix {
            self.recenter_on_fix = false;
            cmds.push(ArbiterCommand::Recenter(LatLng::new(
                loc.latitude,
                loc.longitude,
            )));
        }
        cmds
    }

    fn start_native(&mut self, now: Time) -> Option<ArbiterCommand> {
        if self.native_in_flight || !self.permission_granted {
            return None;
        }
        self.native_in_flight = true;
        self.native_deadline = Some(now.plus(self.timeout_s));
        Some(ArbiterCommand::StartNativeRequest {
            timeout_s: self.timeout_s,
            max_age_s: NATIVE_MAX_AGE_S,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ArbiterCommand, FALLBACK_COOLDOWN_S, LocationArbiter, LocationSource,
        NATIVE_TIMEOUT_S, STARTUP_PROBE_DELAY_S, UserLocation,
    };
    use crate::provider::{NativeFix, NativeLocationError};
    use geo::{LatLng, Time};
    use pretty_assertions::assert_eq;

    fn fix(lat: f64, lng: f64) -> NativeFix {
        NativeFix {
            latitude: lat,
            longitude: lng,
            accuracy_m: Some(12.0),
            timestamp_s: None,
            provider: Some("fused".to_string()),
        }
    }

    fn is_native_start(cmd: &ArbiterCommand) -> bool {
        matches!(cmd, ArbiterCommand::StartNativeRequest { .. })
    }

    #[test]
    fn renderer_fix_becomes_user_location() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        let cmds = arb.on_renderer_fix(25.0, 121.5, Time(0.5));
        assert_eq!(
            cmds,
            vec![ArbiterCommand::SetUserLocation(UserLocation {
                latitude: 25.0,
                longitude: 121.5,
                source: LocationSource::RendererGeolocation,
            })]
        );
    }

    #[test]
    fn renderer_error_triggers_native_fallback_once_per_cooldown() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);

        let cmds = arb.on_renderer_error("watch failed", Time(0.0));
        assert_eq!(cmds.len(), 1);
        assert!(is_native_start(&cmds[0]));

        // Further errors inside the cooldown are ignored.
        assert!(arb.on_renderer_error("watch failed", Time(1.0)).is_empty());

        // After cooldown + the first request finishing, it may fall back again.
        arb.on_native_result(Err(NativeLocationError::Unavailable), Time(1.5));
        let cmds = arb.on_renderer_error("watch failed", Time(FALLBACK_COOLDOWN_S + 0.1));
        assert_eq!(cmds.iter().filter(|c| is_native_start(c)).count(), 1);
    }

    #[test]
    fn native_request_is_single_flight() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        assert!(arb.request_native_fix(Time(0.0)).is_some());
        // Second concurrent call is rejected as busy.
        assert_eq!(arb.request_native_fix(Time(0.1)), None);
        assert!(arb.native_in_flight());

        arb.on_native_result(Ok(fix(24.0, 120.0)), Time(1.0));
        assert!(!arb.native_in_flight());
        assert!(arb.request_native_fix(Time(1.1)).is_some());
    }

    #[test]
    fn last_fix_wins_across_sources() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        arb.request_native_fix(Time(0.0));
        arb.on_native_result(Ok(fix(24.0, 120.0)), Time(0.2));
        arb.on_renderer_fix(25.0, 121.5, Time(0.2));
        let loc = arb.location().unwrap();
        assert_eq!(loc.source, LocationSource::RendererGeolocation);
        assert_eq!(loc.latitude, 25.0);

        arb.request_native_fix(Time(0.3));
        arb.on_native_result(Ok(fix(24.0, 120.0)), Time(0.4));
        assert_eq!(arb.location().unwrap().source, LocationSource::NativeOs);
    }

    #[test]
    fn startup_probe_fires_after_delay_without_fix() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        assert!(arb.tick(Time(1.0)).is_empty(), "probe too early");
        let cmds = arb.tick(Time(STARTUP_PROBE_DELAY_S));
        assert_eq!(cmds.len(), 1);
        assert!(is_native_start(&cmds[0]));
        // One-shot.
        arb.on_native_result(Ok(fix(24.0, 120.0)), Time(2.5));
        assert!(arb.tick(Time(10.0)).is_empty());
    }

    #[test]
    fn startup_probe_skipped_when_fix_already_arrived() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        arb.on_renderer_fix(25.0, 121.5, Time(0.5));
        assert!(arb.tick(Time(STARTUP_PROBE_DELAY_S + 1.0)).is_empty());
    }

    #[test]
    fn startup_probe_respects_missing_permission() {
        let mut arb = LocationArbiter::new(false, Time::ZERO);
        assert!(arb.tick(Time(STARTUP_PROBE_DELAY_S)).is_empty());
    }

    #[test]
    fn permission_denied_downgrades_until_foreground_recheck() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        arb.request_native_fix(Time(0.0));
        arb.on_native_result(Err(NativeLocationError::PermissionDenied), Time(0.5));
        assert!(!arb.permission_granted());

        // Suppressed: renderer errors no longer reach the OS.
        let cmds = arb.on_renderer_error("watch failed", Time(5.0));
        assert!(cmds.iter().all(|c| !is_native_start(c)));

        arb.on_app_foreground(true);
        assert!(arb.permission_granted());
        assert!(arb.request_native_fix(Time(6.0)).is_some());
    }

    #[test]
    fn watchdog_times_out_stuck_native_request() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        arb.request_native_fix(Time(0.0));
        assert!(arb.tick(Time(NATIVE_TIMEOUT_S - 0.1)).is_empty());
        let cmds = arb.tick(Time(NATIVE_TIMEOUT_S));
        assert!(!arb.native_in_flight());
        assert_eq!(
            cmds,
            vec![ArbiterCommand::NotifyUnavailable {
                message: NativeLocationError::Timeout.to_string(),
            }]
        );
    }

    #[test]
    fn recenter_with_known_location_is_immediate() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        arb.on_renderer_fix(25.0, 121.5, Time(0.1));
        let cmds = arb.request_recenter(Time(0.2));
        assert_eq!(cmds, vec![ArbiterCommand::Recenter(LatLng::new(25.0, 121.5))]);
    }

    #[test]
    fn recenter_without_location_requests_fix_then_recenters() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        let cmds = arb.request_recenter(Time(0.0));
        assert!(is_native_start(&cmds[0]));

        let cmds = arb.on_native_result(Ok(fix(24.0, 120.0)), Time(0.5));
        assert_eq!(cmds.len(), 2);
        assert!(matches!(cmds[0], ArbiterCommand::SetUserLocation(_)));
        assert_eq!(cmds[1], ArbiterCommand::Recenter(LatLng::new(24.0, 120.0)));
    }

    #[test]
    fn denied_recenter_does_not_latch_onto_later_fixes() {
        let mut arb = LocationArbiter::new(false, Time::ZERO);
        let cmds = arb.request_recenter(Time(0.0));
        assert_eq!(
            cmds,
            vec![ArbiterCommand::NotifyUnavailable {
                message: NativeLocationError::PermissionDenied.to_string(),
            }]
        );

        // The user was already told the recenter failed; a fix arriving
        // later must not move the camera for it.
        let cmds = arb.on_renderer_fix(25.0, 121.5, Time(5.0));
        assert!(
            cmds.iter()
                .all(|c| !matches!(c, ArbiterCommand::Recenter(_))),
            "{cmds:?}"
        );
    }

    #[test]
    fn recenter_piggybacks_on_outstanding_request() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        arb.request_native_fix(Time(0.0));
        let cmds = arb.request_recenter(Time(0.1));
        assert!(cmds.is_empty(), "no second OS-level request");

        let cmds = arb.on_native_result(Ok(fix(24.0, 120.0)), Time(0.5));
        assert!(cmds.contains(&ArbiterCommand::Recenter(LatLng::new(24.0, 120.0))));
    }

    #[test]
    fn errors_surface_only_when_channels_are_exhausted() {
        let mut arb = LocationArbiter::new(true, Time::ZERO);
        arb.on_renderer_fix(25.0, 121.5, Time(0.0));

        // A later native failure with a known location stays quiet.
        arb.request_native_fix(Time(1.0));
        let cmds = arb.on_native_result(Err(NativeLocationError::Unavailable), Time(1.5));
        assert!(cmds.is_empty());
    }
}
