//! Fixture utilities for the deterministic CLI harness.
//!
//! A fixture is a JSON description of a short synthetic video: frame size,
//! frame rate, a background color and a list of segments, each lighting
//! some pixel columns for a number of frames. The processor renders those
//! frames, runs a detection session over them and returns the notes it
//! found, which can then be checked against an optional expectation file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::{keyboard_for_frame, KeyDescriptor, Rgb, RGBA_STRIDE};
use crate::config::{AppConfig, DetectionConfig, LayoutConfig, MidiConfig};
use crate::engine::{DetectionOptions, FrameDriver, SessionSummary, VecFrameSource, VideoFrame};
use crate::midi::NoteEvent;
use crate::telemetry::SessionEvent;

/// Default location for fixture JSON assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

const FRAMES_SUFFIX: &str = ".frames.json";
const EXPECT_SUFFIX: &str = ".expect.json";

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub frames_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Synthetic video description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureVideo {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_background")]
    pub background: String,
    /// Explicit keys; generated from `layout` when absent
    #[serde(default)]
    pub keys: Option<Vec<KeyDescriptor>>,
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Detection parameters, defaults filled per field
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub midi: MidiConfig,
    pub segments: Vec<FixtureSegment>,
}

fn default_fps() -> f64 {
    24.0
}

fn default_background() -> String {
    "#404040".to_string()
}

/// A run of identical frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSegment {
    pub frames: u32,
    #[serde(default)]
    pub lit: Vec<LitColumn>,
    /// Deliver these frames before the video reports its size
    #[serde(default)]
    pub not_ready: bool,
}

/// Vertical band of color centred on `x`, spanning the full frame height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LitColumn {
    pub x: u32,
    pub color: String,
    #[serde(default = "default_radius")]
    pub radius: u32,
}

fn default_radius() -> u32 {
    3
}

impl FixtureVideo {
    pub fn frame_count(&self) -> u32 {
        self.segments.iter().map(|segment| segment.frames).sum()
    }

    /// Render every frame of the fixture in playback order.
    pub fn render(&self) -> Vec<VideoFrame> {
        let background = Rgb::from_hex(&self.background);
        let mut frames = Vec::with_capacity(self.frame_count() as usize);
        let mut index = 0u32;

        for segment in &self.segments {
            let row = self.render_row(background, &segment.lit);
            for _ in 0..segment.frames {
                let timestamp = index as f64 / self.fps;
                if segment.not_ready {
                    frames.push(VideoFrame::not_ready(timestamp));
                } else {
                    let pixels = row.repeat(self.height as usize);
                    frames.push(VideoFrame::new(timestamp, self.width, self.height, pixels));
                }
                index += 1;
            }
        }
        frames
    }

    fn render_row(&self, background: Rgb, lit: &[LitColumn]) -> Vec<u8> {
        let mut colors = vec![background; self.width as usize];
        for column in lit {
            let color = Rgb::from_hex(&column.color);
            let start = column.x.saturating_sub(column.radius) as usize;
            let end = (column.x.saturating_add(column.radius) as usize)
                .min(colors.len().saturating_sub(1));
            for slot in colors.iter_mut().take(end + 1).skip(start) {
                *slot = color;
            }
        }

        let mut row = Vec::with_capacity(colors.len() * RGBA_STRIDE);
        for color in colors {
            row.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        row
    }

    /// Keys the session samples.
    pub fn keys(&self) -> Vec<KeyDescriptor> {
        match &self.keys {
            Some(keys) => keys.clone(),
            None => keyboard_for_frame(&self.layout, self.width),
        }
    }
}

/// Loaded fixture data.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub video: FixtureVideo,
    pub expectations: Option<FixtureExpectations>,
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureExpectations {
    pub fixture: String,
    #[serde(default)]
    pub description: Option<String>,
    pub notes: Vec<ExpectedNote>,
}

impl FixtureExpectations {
    /// Compare emitted notes, in order, against the expected list.
    pub fn verify(&self, actual: &[NoteEvent]) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for (idx, expected) in self.notes.iter().enumerate() {
            match actual.get(idx) {
                Some(note) => {
                    let start_delta = (note.start_seconds - expected.start_seconds).abs();
                    let duration_delta = (note.duration_seconds - expected.duration_seconds).abs();
                    let delta = start_delta.max(duration_delta);
                    if note.midi_number != expected.midi_number
                        || delta > expected.tolerance_seconds
                    {
                        failures.push(ExpectationFailure {
                            index: idx,
                            expected: Some(expected.clone()),
                            actual: Some(*note),
                            delta_seconds: Some(delta),
                        });
                    }
                }
                None => failures.push(ExpectationFailure {
                    index: idx,
                    expected: Some(expected.clone()),
                    actual: None,
                    delta_seconds: None,
                }),
            }
        }

        for (idx, note) in actual.iter().enumerate().skip(self.notes.len()) {
            failures.push(ExpectationFailure {
                index: idx,
                expected: None,
                actual: Some(*note),
                delta_seconds: None,
            });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Expected note definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedNote {
    pub midi_number: u8,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance_seconds: f64,
}

fn default_tolerance() -> f64 {
    0.05
}

/// Outcome of comparing actual results with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual": failure.actual,
                    "delta_seconds": failure.delta_seconds,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure. `expected` is `None` for
/// notes the fixture did not ask for.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub index: usize,
    pub expected: Option<ExpectedNote>,
    pub actual: Option<NoteEvent>,
    pub delta_seconds: Option<f64>,
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if fixture_name(&path).is_some() {
                    fixtures.push(self.metadata_for_path(&path)?);
                }
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load fixture frames + expectations for provided name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let frames_path = self.resolve_fixture_path(fixture)?;
        let metadata = self.metadata_for_path(&frames_path)?;

        let json = fs::read_to_string(&frames_path)
            .with_context(|| format!("reading fixture {}", frames_path.display()))?;
        let video: FixtureVideo = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", frames_path.display()))?;
        if video.width == 0 || video.height == 0 {
            return Err(anyhow!(
                "Fixture {} has empty geometry {}x{}",
                frames_path.display(),
                video.width,
                video.height
            ));
        }

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(FixtureData {
            metadata,
            video,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}{FRAMES_SUFFIX}"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, frames_path: &Path) -> Result<FixtureMetadata> {
        let name = fixture_name(frames_path)
            .ok_or_else(|| anyhow!("Invalid fixture name for {}", frames_path.display()))?;
        let expect_path = frames_path.with_file_name(format!("{name}{EXPECT_SUFFIX}"));
        Ok(FixtureMetadata {
            name,
            frames_path: frames_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

fn fixture_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(FRAMES_SUFFIX))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Result of running one fixture.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureRun {
    pub notes: Vec<NoteEvent>,
    pub summary: SessionSummary,
    pub events: Vec<SessionEvent>,
    /// Size of the exported MIDI file in bytes
    pub midi_bytes: usize,
}

/// Executes fixtures by rendering their frames through a detection session.
///
/// Detection and MIDI settings come from the fixture unless replaced with
/// [`FixtureProcessor::with_overrides`].
pub struct FixtureProcessor {
    overrides: Option<AppConfig>,
}

impl FixtureProcessor {
    pub fn new() -> Self {
        Self { overrides: None }
    }

    /// Use `config` instead of the fixture's own detection and MIDI settings.
    pub fn with_overrides(mut self, config: AppConfig) -> Self {
        self.overrides = Some(config);
        self
    }

    pub fn run(&self, data: &FixtureData) -> Result<FixtureRun> {
        let video = &data.video;
        let (detection, midi) = match &self.overrides {
            Some(config) => (&config.detection, &config.midi),
            None => (&video.detection, &video.midi),
        };

        let keys = video.keys();
        let options = DetectionOptions::from_config(detection).shared();
        let mut driver = FrameDriver::new(options, keys)
            .with_context(|| format!("starting session for {}", data.metadata.name))?
            .with_midi_config(midi);

        let mut source = VecFrameSource::new(video.render()).with_frame_rate(video.fps);
        let summary = driver
            .run(&mut source)
            .with_context(|| format!("running fixture {}", data.metadata.name))?;

        let mut notes = driver.notes().to_vec();
        notes.sort_by(|a, b| {
            a.start_seconds
                .total_cmp(&b.start_seconds)
                .then(a.midi_number.cmp(&b.midi_number))
        });

        Ok(FixtureRun {
            notes,
            summary,
            events: driver.recorder().events().cloned().collect(),
            midi_bytes: driver.export().len(),
        })
    }
}

impl Default for FixtureProcessor {
    fn default() -> Self {
        Self::new()
    }
}
