//! Thresholds and pacing for recognition

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::geometry::SearchOffset;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Maximum color spread for a color-sampling match (0-255, smaller is stricter)
    pub color_threshold: i32,
    /// Vertical search distance used when a caller asks for "the default offset"
    pub default_offset: i32,
    /// Correlation threshold for RGB matching (0.0 to 1.0)
    pub similarity: f32,
    /// Correlation threshold for binary and luma matching
    pub gray_similarity: f32,
    /// Pause between a positional match and the click that acts on it
    pub settle_delay: Duration,
    /// Minimum time between two captures
    pub capture_interval: Duration,
    /// Similarity a region must keep while `wait_until_stable` watches it
    pub stable_similarity: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            color_threshold: 10,
            default_offset: 30,
            similarity: 0.75,
            gray_similarity: 0.85,
            settle_delay: Duration::from_secs(1),
            capture_interval: Duration::from_millis(100),
            stable_similarity: 0.75,
        }
    }
}

impl MatchConfig {
    pub fn default_search(&self) -> SearchOffset {
        SearchOffset::Vertical(self.default_offset)
    }
}

/// Configuration preset for emulators, which render slower and need more pacing
pub fn create_emulator_config() -> MatchConfig {
    MatchConfig {
        capture_interval: Duration::from_millis(300),
        settle_delay: Duration::from_millis(1500),
        ..MatchConfig::default()
    }
}

/// Configuration preset for screens with compression noise (scrcpy, JPEG streams)
pub fn create_lossy_capture_config() -> MatchConfig {
    MatchConfig {
        color_threshold: 20,
        similarity: 0.7,
        gray_similarity: 0.8,
        ..MatchConfig::default()
    }
}
