//! Detection options shared between the host and the frame driver.
//!
//! The host (CLI, UI layer, test) owns a [`SharedOptions`] handle and may
//! mutate it between frames; the driver takes a snapshot at the start of
//! every frame and never writes to it.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::analysis::{ColorMatcher, DebounceSettings, KeySampler, Rgb};
use crate::config::DetectionConfig;
use crate::error::DetectionError;

/// Options handle shared by the host and the driver.
pub type SharedOptions = Arc<RwLock<DetectionOptions>>;

/// Pixel row the sampler reads, computed on demand from the height of the
/// frame being processed.
///
/// Always a function so callers can derive the row from live state (a
/// slider, the current frame height) without the driver knowing about it.
#[derive(Clone)]
pub struct DetectionRow(Arc<dyn Fn(u32) -> u32 + Send + Sync>);

impl DetectionRow {
    pub fn fixed(row: u32) -> Self {
        Self(Arc::new(move |_| row))
    }

    /// Row from live state that does not depend on the frame height.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> u32 + Send + Sync + 'static,
    {
        Self(Arc::new(move |_| f()))
    }

    /// Row computed from the current frame height.
    pub fn from_height_fn<F>(f: F) -> Self
    where
        F: Fn(u32) -> u32 + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// `floor(percent / 100 * frame_height)`, with percent clamped to 0..=100.
    pub fn at_percent(percent: f32) -> Self {
        let percent = if percent.is_finite() {
            percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self::from_height_fn(move |height| {
            (percent as f64 / 100.0 * height as f64).floor() as u32
        })
    }

    pub fn resolve(&self, frame_height: u32) -> u32 {
        (self.0)(frame_height)
    }
}

impl fmt::Debug for DetectionRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DetectionRow(..)")
    }
}

/// Runtime view of the detection parameters.
#[derive(Debug, Clone)]
pub struct DetectionOptions {
    pub target_color: Rgb,
    pub threshold: f32,
    pub median_kernel: usize,
    pub detection_frames: u32,
    pub assumed_fps: f64,
    pub detection_row: DetectionRow,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        let config = DetectionConfig::default();
        Self {
            target_color: Rgb::from_hex(&config.color),
            threshold: config.threshold,
            median_kernel: config.median_kernel,
            detection_frames: config.detection_frames,
            assumed_fps: config.assumed_fps,
            detection_row: DetectionRow::at_percent(config.detection_height_percent),
        }
    }
}

impl DetectionOptions {
    /// Build options from config.
    ///
    /// The detection row follows the height of each processed frame. A
    /// malformed color falls back to black with a warning.
    pub fn from_config(config: &DetectionConfig) -> Self {
        let target_color = Rgb::parse_hex(&config.color).unwrap_or_else(|| {
            log::warn!(
                "[DetectionOptions] Malformed detection color {:?}, using black",
                config.color
            );
            Rgb::BLACK
        });
        if config.median_kernel % 2 == 0 {
            log::warn!(
                "[DetectionOptions] Even median kernel {} samples {} pixels",
                config.median_kernel,
                config.median_kernel.saturating_add(1)
            );
        }
        Self {
            target_color,
            threshold: config.threshold,
            median_kernel: config.median_kernel,
            detection_frames: config.detection_frames,
            assumed_fps: config.assumed_fps,
            detection_row: DetectionRow::at_percent(config.detection_height_percent),
        }
    }

    pub fn shared(self) -> SharedOptions {
        Arc::new(RwLock::new(self))
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(DetectionError::InvalidOption {
                field: "threshold",
                reason: format!("must be a non-negative number (got {})", self.threshold),
            });
        }
        if self.median_kernel == 0 {
            return Err(DetectionError::InvalidOption {
                field: "median_kernel",
                reason: "must cover at least one pixel".to_string(),
            });
        }
        if self.detection_frames == 0 {
            return Err(DetectionError::InvalidOption {
                field: "detection_frames",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.assumed_fps.is_finite() || self.assumed_fps <= 0.0 {
            return Err(DetectionError::InvalidOption {
                field: "assumed_fps",
                reason: format!("must be greater than 0 (got {})", self.assumed_fps),
            });
        }
        Ok(())
    }

    pub fn matcher(&self) -> ColorMatcher {
        ColorMatcher::new(self.target_color, self.threshold)
    }

    pub fn sampler(&self) -> KeySampler {
        KeySampler::new(self.median_kernel, self.matcher())
    }

    pub fn debounce_settings(&self) -> DebounceSettings {
        DebounceSettings {
            min_frames: self.detection_frames,
            assumed_fps: self.assumed_fps,
        }
    }
}

/// Partial update applied by the host while a session runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsPatch {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub median_kernel: Option<usize>,
    #[serde(default)]
    pub detection_frames: Option<u32>,
    #[serde(default)]
    pub assumed_fps: Option<f64>,
}

impl OptionsPatch {
    pub fn apply(&self, options: &mut DetectionOptions) {
        if let Some(color) = &self.color {
            options.target_color = Rgb::from_hex(color);
        }
        if let Some(threshold) = self.threshold {
            options.threshold = threshold;
        }
        if let Some(kernel) = self.median_kernel {
            options.median_kernel = kernel;
        }
        if let Some(frames) = self.detection_frames {
            options.detection_frames = frames;
        }
        if let Some(fps) = self.assumed_fps {
            options.assumed_fps = fps;
        }
    }

    /// Apply through a shared handle.
    pub fn apply_shared(&self, options: &SharedOptions) -> Result<(), DetectionError> {
        let mut guard = options.write().map_err(|_| DetectionError::LockPoisoned {
            component: "detection options".to_string(),
        })?;
        self.apply(&mut guard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_defaults_validate() {
        assert!(DetectionOptions::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut options = DetectionOptions {
            assumed_fps: 0.0,
            ..DetectionOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(DetectionError::InvalidOption {
                field: "assumed_fps",
                ..
            })
        ));

        options.assumed_fps = 30.0;
        options.detection_frames = 0;
        assert!(options.validate().is_err());

        options.detection_frames = 3;
        options.threshold = f32::NAN;
        assert!(options.validate().is_err());

        options.threshold = 40.0;
        options.median_kernel = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_row_at_percent() {
        assert_eq!(DetectionRow::at_percent(50.0).resolve(720), 360);
        assert_eq!(DetectionRow::at_percent(33.0).resolve(99), 32);
        assert_eq!(DetectionRow::at_percent(250.0).resolve(100), 100);
        assert_eq!(DetectionRow::at_percent(-1.0).resolve(100), 0);
        assert_eq!(DetectionRow::at_percent(f32::NAN).resolve(100), 0);
    }

    #[test]
    fn test_row_at_percent_follows_frame_height() {
        let row = DetectionRow::at_percent(50.0);
        assert_eq!(row.resolve(4), 2);
        assert_eq!(row.resolve(10), 5);
        assert_eq!(row.resolve(1080), 540);
        assert_eq!(DetectionRow::fixed(7).resolve(1080), 7);
    }

    #[test]
    fn test_row_is_computed_on_each_resolve() {
        let slider = Arc::new(AtomicU32::new(10));
        let handle = Arc::clone(&slider);
        let row = DetectionRow::from_fn(move || handle.load(Ordering::Relaxed));
        assert_eq!(row.resolve(100), 10);
        slider.store(42, Ordering::Relaxed);
        assert_eq!(row.resolve(100), 42);
    }

    #[test]
    fn test_from_config_falls_back_to_black() {
        let config = DetectionConfig {
            color: "not-a-color".to_string(),
            ..DetectionConfig::default()
        };
        let options = DetectionOptions::from_config(&config);
        assert_eq!(options.target_color, Rgb::BLACK);
        assert_eq!(options.detection_row.resolve(100), 50);
        assert_eq!(options.detection_row.resolve(300), 150);
    }

    #[test]
    fn test_patch_updates_shared_options() {
        let shared = DetectionOptions::default().shared();
        let patch = OptionsPatch {
            color: Some("#00ff00".to_string()),
            threshold: Some(12.5),
            ..OptionsPatch::default()
        };
        patch.apply_shared(&shared).unwrap();

        let options = shared.read().unwrap();
        assert_eq!(options.target_color, Rgb::new(0, 255, 0));
        assert_eq!(options.threshold, 12.5);
        assert_eq!(options.detection_frames, 5);
    }
}
