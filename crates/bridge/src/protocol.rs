//! Message protocol between the native process and the embedded map renderer.
//!
//! Both directions travel over a single JSON text channel. The wire format
//! here is a compatibility contract with an unmodified embedded renderer:
//! message and field names are camelCase and must not drift.
//!
//! Outbound commands are idempotent and replay-safe; the renderer applies
//! whatever arrives last. Inbound events are independent of each other and
//! processed in arrival order.

use serde::{Deserialize, Serialize};

/// A marker as the renderer draws it: position plus a category color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDot {
    pub id: u64,
    pub lat: f64,
    pub lng: f64,
    pub color: String,
}

/// Command from the native process to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundCommand {
    /// Recenter the camera.
    SetView { lat: f64, lng: f64, zoom: f64 },

    /// Replace the full marker layer.
    RenderMarkers { markers: Vec<MarkerDot> },

    /// Upsert the user-location indicator.
    SetUserLocation {
        lat: f64,
        lng: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        avatar_data_uri: Option<String>,
    },

    /// Remove the user-location indicator.
    ClearUserLocation,
}

/// Event from the renderer to the native process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundEvent {
    /// Renderer finished loading; it carries no state from a previous load,
    /// so the full marker layer must be re-sent.
    MapReady,

    /// User tapped the map background.
    MapPress { lat: f64, lng: f64 },

    /// User tapped a marker.
    MarkerPress { id: u64 },

    /// Camera settled after a pan/zoom; carries the new center and edges.
    #[serde(rename = "moveend")]
    MoveEnd {
        lat: f64,
        lng: f64,
        zoom: f64,
        south: f64,
        north: f64,
        west: f64,
        east: f64,
    },

    /// A geolocation fix from the renderer's own geolocation watch.
    UserLocation { lat: f64, lng: f64 },

    /// The renderer's geolocation watch failed.
    GeoError { message: String },

    /// The renderer itself failed to load.
    RendererLoadFailed { message: String },
}

#[cfg(test)]
mod tests {
    use super::{InboundEvent, MarkerDot, OutboundCommand};
    use pretty_assertions::assert_eq;

    #[test]
    fn set_view_wire_format() {
        let cmd = OutboundCommand::SetView {
            lat: 25.03,
            lng: 121.56,
            zoom: 13.0,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(
            json,
            r#"{"type":"setView","lat":25.03,"lng":121.56,"zoom":13.0}"#
        );
    }

    #[test]
    fn render_markers_wire_format() {
        let cmd = OutboundCommand::RenderMarkers {
            markers: vec![MarkerDot {
                id: 7,
                lat: 1.0,
                lng: 2.0,
                color: "#e91e63".to_string(),
            }],
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(
            json,
            r##"{"type":"renderMarkers","markers":[{"id":7,"lat":1.0,"lng":2.0,"color":"#e91e63"}]}"##
        );
    }

    #[test]
    fn user_location_omits_absent_avatar() {
        let cmd = OutboundCommand::SetUserLocation {
            lat: 1.0,
            lng: 2.0,
            avatar_data_uri: None,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(!json.contains("avatarDataUri"), "got {json}");

        let cmd = OutboundCommand::SetUserLocation {
            lat: 1.0,
            lng: 2.0,
            avatar_data_uri: Some("data:image/png;base64,AA==".to_string()),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""avatarDataUri":"data:image/png;base64,AA==""#));
    }

    #[test]
    fn clear_user_location_is_type_only() {
        let json = serde_json::to_string(&OutboundCommand::ClearUserLocation).unwrap();
        assert_eq!(json, r#"{"type":"clearUserLocation"}"#);
    }

    #[test]
    fn moveend_parses() {
        let ev: InboundEvent = serde_json::from_str(
            r#"{"type":"moveend","lat":25.0,"lng":121.5,"zoom":12.5,
                "south":24.9,"north":25.1,"west":121.3,"east":121.7}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            InboundEvent::MoveEnd {
                lat: 25.0,
                lng: 121.5,
                zoom: 12.5,
                south: 24.9,
                north: 25.1,
                west: 121.3,
                east: 121.7,
            }
        );
    }

    #[test]
    fn inbound_event_names_parse() {
        for (raw, want) in [
            (r#"{"type":"mapReady"}"#, InboundEvent::MapReady),
            (
                r#"{"type":"markerPress","id":42}"#,
                InboundEvent::MarkerPress { id: 42 },
            ),
            (
                r#"{"type":"geoError","message":"denied"}"#,
                InboundEvent::GeoError {
                    message: "denied".to_string(),
                },
            ),
            (
                r#"{"type":"rendererLoadFailed","message":"tile source down"}"#,
                InboundEvent::RendererLoadFailed {
                    message: "tile source down".to_string(),
                },
            ),
        ] {
            let ev: InboundEvent = serde_json::from_str(raw).unwrap();
            assert_eq!(ev, want);
        }
    }
}
