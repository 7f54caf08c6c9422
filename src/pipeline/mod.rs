pub mod camera;
pub mod capture_loop;
pub mod encoder;
pub mod mailbox;
pub mod rgba_converter;
pub mod socket;
pub mod transport;

// Re-exports for convenience
pub use camera::{CameraDevice, CameraStream, available_cameras, start_camera_stream};
pub use capture_loop::{CaptureLoop, ViewEvent, start_capture_loop};
pub use encoder::FrameEncoder;
pub use mailbox::{FrameMailbox, Mailbox};
pub use socket::{SocketConnection, connect};
