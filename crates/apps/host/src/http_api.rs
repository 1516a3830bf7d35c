//! `MarkerApi` over HTTP, implementing the server endpoint contract:
//!
//! - `GET  {base}/markers/viewport?minLat&maxLat&minLng&maxLng&categories`
//! - `GET  {base}/markers/nearby?lat&lng&radius&category`
//! - `POST {base}/markers`, `PATCH {base}/markers/{id}`, `DELETE {base}/markers/{id}`
//! - `POST {base}/markers/{id}/image` (multipart field `image`)
//! - `POST`/`DELETE {base}/markers/{id}/favorite`
//! - `GET  {base}/markers/me/favorites`
//!
//! Retry/timeout policy lives in the configured `reqwest::Client`, outside
//! this module.

use geo::LatLng;
use markers::{
    ApiError, BoundsQuery, Category, ImageAttachment, Marker, MarkerApi, MarkerId, MarkerPayload,
};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct HttpMarkerApi {
    base: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpMarkerApi {
    pub fn new(base: impl Into<String>, token: Option<String>, http: reqwest::Client) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base, token, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn expect_json<T: DeserializeOwned>(
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, ApiError> {
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

async fn check_status(
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<reqwest::Response, ApiError> {
    let response = response.map_err(|e| ApiError::Network(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail: String = body.trim().chars().take(200).collect();
    Err(ApiError::Status(status.as_u16(), detail))
}

/// Query-string pairs for a viewport query; categories are comma-joined
/// snake_case names.
pub fn viewport_query_params(query: &BoundsQuery) -> Vec<(&'static str, String)> {
    let categories = query
        .categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(",");
    vec![
        ("minLat", query.min_lat.to_string()),
        ("maxLat", query.max_lat.to_string()),
        ("minLng", query.min_lng.to_string()),
        ("maxLng", query.max_lng.to_string()),
        ("categories", categories),
    ]
}

impl MarkerApi for HttpMarkerApi {
    async fn query_viewport(&self, query: &BoundsQuery) -> Result<Vec<Marker>, ApiError> {
        let request = self
            .authed(self.http.get(self.url("/markers/viewport")))
            .query(&viewport_query_params(query));
        Self::expect_json(request.send().await).await
    }

    async fn query_nearby(
        &self,
        center: LatLng,
        radius_m: f64,
        category: Category,
    ) -> Result<Vec<Marker>, ApiError> {
        let request = self
            .authed(self.http.get(self.url("/markers/nearby")))
            .query(&[
                ("lat", center.lat.to_string()),
                ("lng", center.lng.to_string()),
                ("radius", radius_m.to_string()),
                ("category", category.as_str().to_string()),
            ]);
        Self::expect_json(request.send().await).await
    }

    async fn create_marker(&self, payload: &MarkerPayload) -> Result<Marker, ApiError> {
        let request = self.authed(self.http.post(self.url("/markers"))).json(payload);
        Self::expect_json(request.send().await).await
    }

    async fn update_marker(
        &self,
        id: MarkerId,
        payload: &MarkerPayload,
    ) -> Result<Marker, ApiError> {
        let request = self
            .authed(self.http.patch(self.url(&format!("/markers/{}", id.0))))
            .json(payload);
        Self::expect_json(request.send().await).await
    }

    async fn delete_marker(&self, id: MarkerId) -> Result<(), ApiError> {
        let request = self.authed(self.http.delete(self.url(&format!("/markers/{}", id.0))));
        check_status(request.send().await).await.map(|_| ())
    }

    async fn upload_marker_image(
        &self,
        id: MarkerId,
        image: &ImageAttachment,
    ) -> Result<(), ApiError> {
        let part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime)
            .map_err(|e| ApiError::Network(format!("invalid image mime type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("image", part);
        let request = self
            .authed(self.http.post(self.url(&format!("/markers/{}/image", id.0))))
            .multipart(form);
        check_status(request.send().await).await.map(|_| ())
    }

    async fn set_favorite(&self, id: MarkerId, favorite: bool) -> Result<(), ApiError> {
        let url = self.url(&format!("/markers/{}/favorite", id.0));
        let request = if favorite {
            self.http.post(url)
        } else {
            self.http.delete(url)
        };
        check_status(self.authed(request).send().await).await.map(|_| ())
    }

    async fn list_favorites(&self) -> Result<Vec<Marker>, ApiError> {
        let request = self.authed(self.http.get(self.url("/markers/me/favorites")));
        Self::expect_json(request.send().await).await
    }
}
