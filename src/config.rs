//! Configuration management for detection and export parameters
//!
//! This module provides runtime configuration loading from JSON files,
//! so detection color, thresholds and tempo can be tuned per video without
//! recompilation. Missing fields fall back to defaults, and a missing or
//! invalid file yields the default configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Config file looked up by [`AppConfig::load`].
pub const DEFAULT_CONFIG_PATH: &str = "keyscan.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub midi: MidiConfig,
    pub layout: LayoutConfig,
}

/// Key sampling and debounce parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Target color of a pressed key as `#rrggbb`
    pub color: String,
    /// Match when the channel-averaged difference is below this (0-255 scale)
    pub threshold: f32,
    /// Width of the median window in pixels (odd)
    pub median_kernel: usize,
    /// Consecutive matching frames required before a press counts
    pub detection_frames: u32,
    /// Frame rate used to turn run lengths into note durations
    pub assumed_fps: f64,
    /// Sampling row as a percentage of frame height (0-100)
    pub detection_height_percent: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            threshold: 65.0,
            median_kernel: 7,
            detection_frames: 5,
            assumed_fps: 24.0,
            detection_height_percent: 50.0,
        }
    }
}

/// MIDI export parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    pub bpm: f64,
    pub ticks_per_quarter: u16,
    pub velocity: u8,
    /// Base name of the exported file
    pub song_name: String,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            ticks_per_quarter: 480,
            velocity: 100,
            song_name: "transcription".to_string(),
        }
    }
}

impl MidiConfig {
    pub fn output_file_name(&self) -> String {
        format!("{}.mid", self.song_name)
    }
}

/// Keyboard placement inside the video frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width the 88-key layout is generated at before scaling
    pub reference_width: f32,
    /// Left edge of the keyboard in video pixels
    pub keyboard_left: f32,
    /// Keyboard width in video pixels; the full frame width when absent
    pub keyboard_width: Option<f32>,
    /// Pitch classes to sample (e.g. "C", "F#"); empty samples every key
    pub pitch_classes: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            reference_width: 767.0,
            keyboard_left: 0.0,
            keyboard_width: None,
            pitch_classes: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file doesn't exist or
    /// the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the working directory
    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.color, "#000000");
        assert_eq!(config.detection.threshold, 65.0);
        assert_eq!(config.detection.median_kernel, 7);
        assert_eq!(config.detection.detection_frames, 5);
        assert_eq!(config.detection.assumed_fps, 24.0);
        assert_eq!(config.midi.bpm, 120.0);
        assert_eq!(config.midi.ticks_per_quarter, 480);
        assert_eq!(config.midi.output_file_name(), "transcription.mid");
        assert_eq!(config.layout.reference_width, 767.0);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.detection.threshold, config.detection.threshold);
        assert_eq!(parsed.midi.song_name, config.midi.song_name);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r##"{ "detection": { "color": "#ff0000" } }"##).unwrap();
        assert_eq!(parsed.detection.color, "#ff0000");
        assert_eq!(parsed.detection.median_kernel, 7);
        assert_eq!(parsed.midi.ticks_per_quarter, 480);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/keyscan.json");
        assert_eq!(config.detection.detection_frames, 5);
    }
}
