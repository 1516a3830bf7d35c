//! Encode/decode layer over the renderer text channel.
//!
//! The bridge never fails on inbound traffic: a frame that does not parse as
//! an `InboundEvent` is logged at debug level and dropped, because the
//! renderer has no way to retransmit.

use tracing::debug;

use crate::protocol::{InboundEvent, MarkerDot, OutboundCommand};

/// Where serialized outbound frames go (the renderer's message port).
pub trait CommandSink {
    fn post(&mut self, frame: &str);
}

impl CommandSink for Vec<String> {
    fn post(&mut self, frame: &str) {
        self.push(frame.to_string());
    }
}

/// Serializes outbound commands and parses inbound frames.
#[derive(Debug)]
pub struct RendererBridge<S: CommandSink> {
    sink: S,
}

impl<S: CommandSink> RendererBridge<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn send(&mut self, cmd: &OutboundCommand) {
        match serde_json::to_string(cmd) {
            Ok(frame) => self.sink.post(&frame),
            // Commands are plain data; serialization cannot realistically
            // fail, but the bridge must never panic either way.
            Err(err) => debug!(error = %err, "dropping unserializable command"),
        }
    }

    pub fn set_view(&mut self, lat: f64, lng: f64, zoom: f64) {
        self.send(&OutboundCommand::SetView { lat, lng, zoom });
    }

    pub fn render_markers(&mut self, markers: Vec<MarkerDot>) {
        self.send(&OutboundCommand::RenderMarkers { markers });
    }

    pub fn set_user_location(&mut self, lat: f64, lng: f64, avatar_data_uri: Option<String>) {
        self.send(&OutboundCommand::SetUserLocation {
            lat,
            lng,
            avatar_data_uri,
        });
    }

    pub fn clear_user_location(&mut self) {
        self.send(&OutboundCommand::ClearUserLocation);
    }

    /// Parses one inbound frame. Malformed frames yield `None`.
    pub fn decode(&self, frame: &str) -> Option<InboundEvent> {
        decode_event(frame)
    }
}

/// Parses an inbound renderer frame, dropping anything malformed.
pub fn decode_event(frame: &str) -> Option<InboundEvent> {
    match serde_json::from_str::<InboundEvent>(frame) {
        Ok(ev) => Some(ev),
        Err(err) => {
            debug!(error = %err, "dropping malformed renderer frame");
            None
        }
    }
}
