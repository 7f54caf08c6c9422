use std::time::Duration;

use clap::Parser;

use crate::pipeline::encoder::{DEFAULT_CAPTURE_SIZE, DEFAULT_JPEG_QUALITY};

#[derive(Parser, Clone, Debug)]
#[command(
    name = "gesture-home",
    about = "Control smart-home devices with hand gestures",
    version
)]
pub struct Config {
    #[arg(
        long,
        env = "GESTURE_HOME_SERVER",
        default_value = "http://localhost:5000",
        help = "Address of the gesture service (Socket.IO over WebSocket)"
    )]
    pub server: String,

    #[arg(
        long = "interval-ms",
        env = "GESTURE_HOME_INTERVAL_MS",
        default_value_t = 100,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Milliseconds between capture ticks"
    )]
    pub interval_ms: u64,

    #[arg(long, default_value_t = DEFAULT_CAPTURE_SIZE.0, help = "Capture width in pixels")]
    pub width: u32,

    #[arg(long, default_value_t = DEFAULT_CAPTURE_SIZE.1, help = "Capture height in pixels")]
    pub height: u32,

    #[arg(
        long = "jpeg-quality",
        default_value_t = DEFAULT_JPEG_QUALITY,
        value_parser = clap::value_parser!(u8).range(1..=100),
        help = "JPEG quality of streamed frames"
    )]
    pub jpeg_quality: u8,

    #[arg(
        long,
        env = "GESTURE_HOME_CAMERA",
        help = "Camera to use, by position in the detected list"
    )]
    pub camera: Option<usize>,
}

impl Config {
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_client() {
        let config = Config::try_parse_from(["gesture-home"]).unwrap();
        assert_eq!(config.server, "http://localhost:5000");
        assert_eq!(config.capture_interval(), Duration::from_millis(100));
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.jpeg_quality, 80);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::try_parse_from([
            "gesture-home",
            "--server",
            "http://10.0.0.2:5000",
            "--interval-ms",
            "250",
            "--jpeg-quality",
            "60",
            "--camera",
            "1",
        ])
        .unwrap();
        assert_eq!(config.server, "http://10.0.0.2:5000");
        assert_eq!(config.capture_interval(), Duration::from_millis(250));
        assert_eq!(config.jpeg_quality, 60);
        assert_eq!(config.camera, Some(1));
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        assert!(Config::try_parse_from(["gesture-home", "--jpeg-quality", "0"]).is_err());
        assert!(Config::try_parse_from(["gesture-home", "--interval-ms", "0"]).is_err());
    }
}
