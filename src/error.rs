use thiserror::Error;

/// A snapshot or message from the service that does not match the protocol.
///
/// Reconciliation rejects the whole update when one of these is raised; the
/// last valid render stays on screen.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ProtocolViolation {
    #[error("device `{id}` has unknown kind `{kind}`")]
    UnknownDeviceKind { id: String, kind: String },

    #[error("device `{id}` of kind `{kind}` is missing `{field}`")]
    MissingField {
        id: String,
        kind: &'static str,
        field: &'static str,
    },

    #[error("unknown mode `{0}`")]
    UnknownMode(String),

    #[error("selected device `{0}` is not part of the snapshot")]
    UnknownSelectedDevice(String),

    #[error("malformed message: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ProtocolViolation {
    fn from(err: serde_json::Error) -> Self {
        ProtocolViolation::Malformed(err.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CameraAccessError {
    #[error("no camera available")]
    NoCamera,

    #[error("failed to enumerate cameras: {0}")]
    Query(String),

    #[error("failed to open camera: {0}")]
    Open(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("failed to serialize outbound message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("channel closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame buffer size mismatch: got {actual}, expected {expected}")]
    BufferMismatch { actual: usize, expected: usize },

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("jpeg encode failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("jpeg decode failed: {0}")]
    Decode(String),

    #[error("not a base64 jpeg data url")]
    NotDataUrl,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}
