//! FrameDriver: the per-frame detection loop.
//!
//! For every delivered frame the driver snapshots the shared options,
//! copies the detection row out of the frame, samples every key, feeds the
//! results to the debouncer and appends finished notes to the MIDI builder.
//! Frames are processed strictly one at a time and each runs to completion
//! before the next is requested from the [`FrameSource`].
//!
//! A session ends when the source runs dry or the host calls
//! [`FrameDriver::stop`]; stopping flushes runs that already reached the
//! detection threshold.

use serde::{Deserialize, Serialize};

use crate::analysis::{KeyDescriptor, KeySampler, NoteDebouncer, RGBA_STRIDE};
use crate::config::MidiConfig;
use crate::engine::options::SharedOptions;
use crate::engine::source::{FrameSource, VideoFrame};
use crate::error::DetectionError;
use crate::midi::{MidiFileBuilder, NoteEvent};
use crate::telemetry::{
    SessionEvent, SessionRecorder, SessionStats, SkipReason, TelemetrySnapshot,
};

/// Lifecycle of a detection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// What happened to a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    Processed {
        matched_keys: usize,
        notes: Vec<NoteEvent>,
    },
}

/// End-of-session report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub state: SessionState,
    pub key_count: usize,
    pub note_count: usize,
    pub last_timestamp_seconds: f64,
    pub stats: SessionStats,
}

/// Drives key sampling and debouncing over a stream of frames.
pub struct FrameDriver {
    options: SharedOptions,
    keys: Vec<KeyDescriptor>,
    sampler: KeySampler,
    debouncer: NoteDebouncer,
    builder: MidiFileBuilder,
    row: Vec<u8>,
    geometry: Option<(u32, u32)>,
    last_timestamp: f64,
    state: SessionState,
    recorder: SessionRecorder,
}

impl FrameDriver {
    /// Create a driver for `keys`, reading detection parameters from `options`.
    ///
    /// Fails when there are no keys or the current options are invalid.
    pub fn new(options: SharedOptions, keys: Vec<KeyDescriptor>) -> Result<Self, DetectionError> {
        if keys.is_empty() {
            return Err(DetectionError::NoKeys);
        }
        let (sampler, settings) = {
            let snapshot = options.read().map_err(|_| DetectionError::LockPoisoned {
                component: "detection options".to_string(),
            })?;
            snapshot.validate()?;
            (snapshot.sampler(), snapshot.debounce_settings())
        };

        Ok(Self {
            options,
            keys,
            sampler,
            debouncer: NoteDebouncer::new(settings),
            builder: MidiFileBuilder::default(),
            row: Vec::new(),
            geometry: None,
            last_timestamp: 0.0,
            state: SessionState::Idle,
            recorder: SessionRecorder::default(),
        })
    }

    /// Use tempo and velocity from `config` for the exported file.
    pub fn with_midi_config(mut self, config: &MidiConfig) -> Self {
        self.builder = MidiFileBuilder::from_config(config);
        self.debouncer = self.debouncer.with_velocity(config.velocity);
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.recorder = SessionRecorder::new(capacity);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn keys(&self) -> &[KeyDescriptor] {
        &self.keys
    }

    pub fn notes(&self) -> &[NoteEvent] {
        self.builder.notes()
    }

    pub fn builder(&self) -> &MidiFileBuilder {
        &self.builder
    }

    pub fn into_builder(self) -> MidiFileBuilder {
        self.builder
    }

    pub fn debouncer(&self) -> &NoteDebouncer {
        &self.debouncer
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.recorder.snapshot()
    }

    /// Serialize the notes collected so far. Safe to call at any point.
    pub fn export(&self) -> Vec<u8> {
        self.builder.build_file()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            state: self.state,
            key_count: self.keys.len(),
            note_count: self.builder.len(),
            last_timestamp_seconds: self.last_timestamp,
            stats: self.recorder.stats().clone(),
        }
    }

    /// Process a single frame.
    pub fn process_frame(&mut self, frame: &VideoFrame) -> Result<FrameOutcome, DetectionError> {
        match self.state {
            SessionState::Stopped => return Err(DetectionError::SessionStopped),
            SessionState::Idle => {
                self.state = SessionState::Running;
                log::info!("[FrameDriver] Session started with {} keys", self.keys.len());
                self.recorder.publish(SessionEvent::SessionStarted {
                    key_count: self.keys.len(),
                });
            }
            SessionState::Running => {}
        }

        let timestamp = if frame.timestamp_seconds.is_finite() {
            frame.timestamp_seconds
        } else {
            self.last_timestamp
        };

        if !frame.is_ready() {
            tracing::trace!("[FrameDriver] Frame at {:.3}s not ready, skipping", timestamp);
            self.recorder.publish(SessionEvent::FrameSkipped {
                timestamp_seconds: timestamp,
                reason: SkipReason::NotReady,
            });
            return Ok(FrameOutcome::Skipped(SkipReason::NotReady));
        }
        frame.check_len()?;

        let row_index = self.refresh_settings(frame.height)?.min(frame.height - 1);
        self.resize_row(frame.width, frame.height);

        if let Some(row) = frame.row(row_index) {
            self.row.copy_from_slice(row);
        }

        let mut matched_keys = 0;
        let mut notes = Vec::new();
        for key in &self.keys {
            let reading = self.sampler.read_key(&self.row, key);
            if reading.matched {
                matched_keys += 1;
            }
            if let Some(note) =
                self.debouncer
                    .observe(&key.note, key.midi_number, reading.matched, timestamp)
            {
                tracing::debug!(
                    "[FrameDriver] {} released at {:.3}s after {:.3}s",
                    key.note,
                    timestamp,
                    note.duration_seconds
                );
                self.recorder.publish(SessionEvent::NoteEmitted {
                    note: key.note.clone(),
                    midi_number: note.midi_number,
                    start_seconds: note.start_seconds,
                    duration_seconds: note.duration_seconds,
                });
                self.builder.push(note);
                notes.push(note);
            }
        }

        self.last_timestamp = timestamp;
        self.recorder.frame_processed(matched_keys);
        Ok(FrameOutcome::Processed {
            matched_keys,
            notes,
        })
    }

    /// Pull frames from `source` until it ends, then stop the session.
    ///
    /// A truncated trailing frame ends the stream and a frame whose buffer
    /// does not match its dimensions is skipped. Any other error stops the
    /// session before it is returned, so the notes collected so far stay
    /// exportable.
    pub fn run<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<SessionSummary, DetectionError> {
        if let Some(fps) = source.frame_rate() {
            log::info!("[FrameDriver] Source reports {:.3} fps", fps);
        }
        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(DetectionError::TruncatedFrame { expected, actual }) => {
                    log::warn!(
                        "[FrameDriver] Dropping truncated trailing frame ({} of {} bytes)",
                        actual,
                        expected
                    );
                    break;
                }
                Err(err) => {
                    self.stop();
                    return Err(err);
                }
            };

            match self.process_frame(&frame) {
                Ok(_) => {}
                Err(err @ DetectionError::FrameSizeMismatch { .. }) => {
                    tracing::warn!("[FrameDriver] Skipping malformed frame: {}", err);
                    self.recorder.publish(SessionEvent::FrameSkipped {
                        timestamp_seconds: self.last_timestamp,
                        reason: SkipReason::SizeMismatch,
                    });
                }
                Err(err) => {
                    self.stop();
                    return Err(err);
                }
            }
        }
        self.stop();
        Ok(self.summary())
    }

    /// End the session, flushing runs that already reached the threshold
    /// at the last seen timestamp. Further frames are rejected. Calling
    /// `stop` again is a no-op.
    pub fn stop(&mut self) -> Vec<NoteEvent> {
        if self.state == SessionState::Stopped {
            return Vec::new();
        }

        let flushed = self.debouncer.flush(self.last_timestamp);
        if !flushed.is_empty() {
            self.recorder.publish(SessionEvent::NotesFlushed {
                count: flushed.len(),
                timestamp_seconds: self.last_timestamp,
            });
        }
        self.builder.extend(flushed.iter().copied());
        self.state = SessionState::Stopped;

        log::info!(
            "[FrameDriver] Session stopped: {} frames, {} notes ({} flushed)",
            self.recorder.stats().frames_processed,
            self.builder.len(),
            flushed.len()
        );
        self.recorder.publish(SessionEvent::SessionStopped {
            frames_processed: self.recorder.stats().frames_processed,
            note_count: self.builder.len(),
        });
        flushed
    }

    /// Pick up option changes made by the host since the last frame and
    /// return the detection row for a frame of `frame_height` rows. Invalid
    /// changes are ignored and the previous settings stay active.
    fn refresh_settings(&mut self, frame_height: u32) -> Result<u32, DetectionError> {
        let options = self.options.read().map_err(|_| DetectionError::LockPoisoned {
            component: "detection options".to_string(),
        })?;
        match options.validate() {
            Ok(()) => {
                self.sampler = options.sampler();
                self.debouncer.set_settings(options.debounce_settings());
            }
            Err(err) => {
                tracing::warn!("[FrameDriver] Keeping previous options: {}", err);
                self.recorder.publish(SessionEvent::OptionsRejected {
                    reason: err.to_string(),
                });
            }
        }
        Ok(options.detection_row.resolve(frame_height))
    }

    fn resize_row(&mut self, width: u32, height: u32) {
        if self.geometry == Some((width, height)) {
            return;
        }
        log::info!("[FrameDriver] Frame geometry now {}x{}", width, height);
        self.geometry = Some((width, height));
        self.row.clear();
        self.row.resize(width as usize * RGBA_STRIDE, 0);
        self.recorder
            .publish(SessionEvent::GeometryChanged { width, height });
    }
}

#[cfg(test)]
mod tests;
