//! Native OS location vocabulary.
//!
//! The host bridges one operation — `getCurrentPosition(timeout, maxAge)` —
//! to the OS location subsystem and reports back either a fix or one of a
//! fixed set of error codes the arbiter pattern-matches on.

/// One native geolocation reading.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
    pub timestamp_s: Option<f64>,
    pub provider: Option<String>,
}

/// The fixed native error codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeLocationError {
    /// Runtime permission denied: suppresses further native attempts until
    /// permission is re-checked on app foreground.
    PermissionDenied,
    ProviderDisabled,
    Timeout,
    Unavailable,
    /// A request was already in flight.
    Busy,
    Internal(String),
}

impl std::fmt::Display for NativeLocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeLocationError::PermissionDenied => write!(f, "location permission denied"),
            NativeLocationError::ProviderDisabled => write!(f, "location provider disabled"),
            NativeLocationError::Timeout => write!(f, "location request timed out"),
            NativeLocationError::Unavailable => write!(f, "location unavailable"),
            NativeLocationError::Busy => write!(f, "location request already in flight"),
            NativeLocationError::Internal(msg) => write!(f, "location service error: {msg}"),
        }
    }
}

impl std::error::Error for NativeLocationError {}
