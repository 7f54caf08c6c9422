//! Wire format of the gesture service channel.
//!
//! The service is a Socket.IO server; [`packet`] handles the Engine.IO and
//! Socket.IO framing, this module the event payloads. Wire structs stay loose
//! (strings for modes and kinds) so that protocol violations surface during
//! reconciliation instead of as opaque JSON errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{error::ProtocolViolation, types::GestureSummary};

pub mod packet;

pub const FRAME_EVENT: &str = "frame";
pub const PROCESSED_FRAME_EVENT: &str = "processed_frame";
pub const STATE_UPDATE_EVENT: &str = "state_update";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMessage {
    pub image: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProcessedFrame {
    pub image: String,
    pub gesture_data: GestureSummary,
    pub state: WireAppState,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WireAppState {
    pub mode: String,
    #[serde(default)]
    pub selected_device: Option<WireDeviceId>,
    pub devices: BTreeMap<String, WireDevice>,
}

/// Device ids arrive as strings, or as integers from services that key their
/// devices numerically (JSON object keys are stringified either way).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireDeviceId {
    Text(String),
    Number(i64),
}

impl WireDeviceId {
    pub fn into_key(self) -> String {
        match self {
            WireDeviceId::Text(id) => id,
            WireDeviceId::Number(id) => id.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WireDevice {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub power: bool,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub channel: Option<f64>,
    #[serde(default)]
    pub brightness: Option<f64>,
}

#[derive(Clone, Debug)]
pub enum ServerEvent {
    ProcessedFrame(ProcessedFrame),
    StateUpdate(WireAppState),
    Other(String),
}

/// An inbound event whose payload could not be decoded.
///
/// The event name is kept when the framing was readable, so a broken
/// `processed_frame` still counts as the answer to the frame in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct MalformedEvent {
    pub event: Option<String>,
    pub violation: ProtocolViolation,
}

impl MalformedEvent {
    fn unnamed(violation: impl Into<ProtocolViolation>) -> Self {
        Self {
            event: None,
            violation: violation.into(),
        }
    }

    pub fn answers_frame(&self) -> bool {
        self.event.as_deref() == Some(PROCESSED_FRAME_EVENT)
    }
}

impl std::fmt::Display for MalformedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.event {
            Some(event) => write!(f, "`{event}`: {}", self.violation),
            None => self.violation.fmt(f),
        }
    }
}

/// Decodes the JSON array of a Socket.IO event packet, `["name", payload]`.
pub fn decode_server_event(args: &str) -> Result<ServerEvent, MalformedEvent> {
    let mut args: Vec<serde_json::Value> =
        serde_json::from_str(args).map_err(MalformedEvent::unnamed)?;
    if args.is_empty() {
        return Err(MalformedEvent::unnamed(ProtocolViolation::Malformed(
            "event packet without a name".into(),
        )));
    }
    let serde_json::Value::String(name) = args.remove(0) else {
        return Err(MalformedEvent::unnamed(ProtocolViolation::Malformed(
            "event name is not a string".into(),
        )));
    };
    let data = args.into_iter().next().unwrap_or_default();

    let decoded = match name.as_str() {
        PROCESSED_FRAME_EVENT => serde_json::from_value(data).map(ServerEvent::ProcessedFrame),
        STATE_UPDATE_EVENT => serde_json::from_value(data).map(ServerEvent::StateUpdate),
        _ => return Ok(ServerEvent::Other(name)),
    };
    decoded.map_err(|err| MalformedEvent {
        event: Some(name),
        violation: err.into(),
    })
}

/// Encodes the arguments of a `frame` event, `["frame", {"image": ..}]`.
pub fn encode_frame(message: &FrameMessage) -> serde_json::Result<String> {
    serde_json::to_string(&(FRAME_EVENT, message))
}
