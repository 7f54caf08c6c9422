//! Engine.IO v4 / Socket.IO v5 text framing, as spoken by the service over
//! its WebSocket transport.
//!
//! Only the default namespace is used. Acks, binary attachments and other
//! namespaces are recognised and ignored.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ProtocolViolation;

pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// Socket.IO `CONNECT` to the default namespace.
pub const CONNECT: &str = "40";
/// Socket.IO `DISCONNECT` from the default namespace.
pub const DISCONNECT: &str = "41";
pub const PONG: &str = "3";

/// Payload of the Engine.IO `open` packet.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

impl OpenHandshake {
    /// How long the server may stay silent before the session is lost.
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Open(OpenHandshake),
    Close,
    Ping,
    Noop,
    Connected,
    ConnectError(String),
    Disconnected,
    /// JSON arguments of an event, `["name", payload]`.
    Event(String),
    Ignored,
}

/// Maps the configured server address onto the WebSocket transport URL.
///
/// `http://host:5000` becomes `ws://host:5000/socket.io/?EIO=4&transport=websocket`.
pub fn endpoint_url(server: &str) -> String {
    let server = server.trim_end_matches('/');
    let server = match server.split_once("://") {
        Some(("http", rest)) => format!("ws://{rest}"),
        Some(("https", rest)) => format!("wss://{rest}"),
        Some(_) => server.to_string(),
        None => format!("ws://{server}"),
    };
    let base = server.strip_suffix("/socket.io").unwrap_or(&server);
    format!("{base}{SOCKET_IO_PATH}?EIO=4&transport=websocket")
}

/// Wraps the JSON arguments of an event into an Engine.IO message.
pub fn event_packet(args: &str) -> String {
    format!("42{args}")
}

pub fn decode_packet(text: &str) -> Result<Packet, ProtocolViolation> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ProtocolViolation::Malformed("empty engine.io packet".into()))?;
    let body = chars.as_str();

    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(body)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '4' => decode_message(body),
        '6' => Ok(Packet::Noop),
        '3' | '5' => Ok(Packet::Ignored),
        other => Err(ProtocolViolation::Malformed(format!(
            "unknown engine.io packet type `{other}`"
        ))),
    }
}

fn decode_message(body: &str) -> Result<Packet, ProtocolViolation> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ProtocolViolation::Malformed("empty socket.io packet".into()))?;
    let rest = chars.as_str();

    let (namespace, rest) = match rest.strip_prefix('/') {
        Some(named) => named.split_once(',').unwrap_or((named, "")),
        None => ("", rest),
    };
    if !namespace.is_empty() {
        return Ok(Packet::Ignored);
    }

    match kind {
        '0' => Ok(Packet::Connected),
        '1' => Ok(Packet::Disconnected),
        // An ack id, when present, sits between the type and the arguments.
        '2' => Ok(Packet::Event(
            rest.trim_start_matches(|c: char| c.is_ascii_digit()).to_string(),
        )),
        '4' => Ok(Packet::ConnectError(connect_error_message(rest))),
        '3' | '5' | '6' => Ok(Packet::Ignored),
        other => Err(ProtocolViolation::Malformed(format!(
            "unknown socket.io packet type `{other}`"
        ))),
    }
}

fn connect_error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(fields)) => match fields.get("message") {
            Some(serde_json::Value::String(message)) => message.clone(),
            _ => body.to_string(),
        },
        Ok(serde_json::Value::String(message)) => message,
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_addresses_map_to_websocket_transport() {
        assert_eq!(
            endpoint_url("http://localhost:5000"),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            endpoint_url("ws://10.0.0.2:5000/socket.io/"),
            "ws://10.0.0.2:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            endpoint_url("gesture.local:8080"),
            "ws://gesture.local:8080/socket.io/?EIO=4&transport=websocket"
        );
        assert!(endpoint_url("https://gesture.example").starts_with("wss://"));
    }

    #[test]
    fn decodes_open_handshake() {
        let packet = decode_packet(
            r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        let Packet::Open(open) = packet else {
            panic!("expected open packet");
        };
        assert_eq!(open.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(open.liveness_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn decodes_namespace_packets() {
        assert_eq!(
            decode_packet(r#"40{"sid":"abc"}"#).unwrap(),
            Packet::Connected
        );
        assert_eq!(decode_packet("41").unwrap(), Packet::Disconnected);
        assert_eq!(
            decode_packet(r#"44{"message":"Not authorized"}"#).unwrap(),
            Packet::ConnectError("Not authorized".into())
        );
        assert_eq!(decode_packet("2").unwrap(), Packet::Ping);
        assert_eq!(decode_packet("6").unwrap(), Packet::Noop);
    }

    #[test]
    fn event_arguments_are_extracted() {
        assert_eq!(
            decode_packet(r#"42["state_update",{"mode":"SELECT_DEVICE"}]"#).unwrap(),
            Packet::Event(r#"["state_update",{"mode":"SELECT_DEVICE"}]"#.into())
        );
        assert_eq!(
            decode_packet(r#"4213["processed_frame",{}]"#).unwrap(),
            Packet::Event(r#"["processed_frame",{}]"#.into())
        );
        assert_eq!(
            decode_packet(r#"42/admin,["state_update",{}]"#).unwrap(),
            Packet::Ignored
        );
        assert_eq!(event_packet(r#"["frame",{}]"#), r#"42["frame",{}]"#);
    }

    #[test]
    fn unknown_packet_types_are_malformed() {
        assert!(matches!(
            decode_packet("9"),
            Err(ProtocolViolation::Malformed(_))
        ));
        assert!(matches!(
            decode_packet(""),
            Err(ProtocolViolation::Malformed(_))
        ));
        assert!(matches!(
            decode_packet("0not-json"),
            Err(ProtocolViolation::Malformed(_))
        ));
    }
}
