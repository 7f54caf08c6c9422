use std::time::Instant;

use serde::Deserialize;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }
}

/// What the service recognized in the frame it just processed.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct GestureSummary {
    pub finger_count: u32,
    #[serde(default)]
    pub gesture: Option<String>,
    #[serde(default)]
    pub hand_detected: Option<bool>,
}

impl GestureSummary {
    pub fn gesture_label(&self) -> &str {
        self.gesture.as_deref().unwrap_or("-")
    }
}
