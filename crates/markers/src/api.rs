//! The server contract, as a trait seam.
//!
//! The core never talks HTTP directly; hosts implement [`MarkerApi`] against
//! the real endpoints and tests implement it in memory.

use geo::LatLng;
use serde::{Deserialize, Serialize};

use crate::draft::ImageAttachment;
use crate::model::{Category, Marker, MarkerId};
use crate::query::BoundsQuery;

/// Marker fields the client submits on create/edit. Ids and ownership are
/// server-assigned and never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerPayload {
    pub lat: f64,
    pub lng: f64,
    pub category: Category,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_time_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_time_end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Transport-level failure (connect, timeout, TLS, ...).
    Network(String),
    /// Server answered with a non-success status.
    Status(u16, String),
    /// Response body did not parse as the expected shape.
    Decode(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "network error: {msg}"),
            ApiError::Status(code, msg) => write!(f, "server returned {code}: {msg}"),
            ApiError::Decode(msg) => write!(f, "malformed server response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// The marker endpoints consumed by this client:
///
/// - `GET  /markers/viewport?minLat&maxLat&minLng&maxLng&categories`
/// - `GET  /markers/nearby?lat&lng&radius&category`
/// - `POST /markers`, `PATCH /markers/{id}`, `DELETE /markers/{id}`
/// - `POST /markers/{id}/image` (multipart)
/// - `POST`/`DELETE /markers/{id}/favorite`, `GET /markers/me/favorites`
#[allow(async_fn_in_trait)]
pub trait MarkerApi {
    async fn query_viewport(&self, query: &BoundsQuery) -> Result<Vec<Marker>, ApiError>;

    async fn query_nearby(
        &self,
        center: LatLng,
        radius_m: f64,
        category: Category,
    ) -> Result<Vec<Marker>, ApiError>;

    async fn create_marker(&self, payload: &MarkerPayload) -> Result<Marker, ApiError>;

    async fn update_marker(
        &self,
        id: MarkerId,
        payload: &MarkerPayload,
    ) -> Result<Marker, ApiError>;

    async fn delete_marker(&self, id: MarkerId) -> Result<(), ApiError>;

    async fn upload_marker_image(
        &self,
        id: MarkerId,
        image: &ImageAttachment,
    ) -> Result<(), ApiError>;

    async fn set_favorite(&self, id: MarkerId, favorite: bool) -> Result<(), ApiError>;

    async fn list_favorites(&self) -> Result<Vec<Marker>, ApiError>;
}
