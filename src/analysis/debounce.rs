// NoteDebouncer - turns per-frame match flags into note events
//
// Each key owns a run counter. A matching frame extends the run; the first
// non-matching frame closes it. Runs of at least `min_frames` frames become
// a note whose duration is reconstructed from the run length and the assumed
// frame rate (not from wall-clock timestamps), ending at the current video
// time. Shorter runs are discarded as flicker. Either way the counter resets.

use std::collections::HashMap;

use crate::midi::{NoteEvent, DEFAULT_VELOCITY};

/// Parameters read by the debouncer on every observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebounceSettings {
    /// Minimum run length in frames
    pub min_frames: u32,
    /// Frame rate assumed when converting run length to seconds
    pub assumed_fps: f64,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            min_frames: 5,
            assumed_fps: 24.0,
        }
    }
}

impl DebounceSettings {
    fn run_seconds(&self, frames: u32) -> f64 {
        frames as f64 / self.assumed_fps
    }

    fn accepts(&self, frames: u32) -> bool {
        frames > 0 && frames >= self.min_frames
    }
}

/// Debounce state of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Accumulating { frames: u32 },
}

#[derive(Debug, Clone, Copy)]
struct RunState {
    midi_number: u8,
    frames: u32,
}

/// Per-key consecutive-match tracking, keyed by note name.
#[derive(Debug, Clone)]
pub struct NoteDebouncer {
    settings: DebounceSettings,
    velocity: u8,
    runs: HashMap<String, RunState>,
}

impl NoteDebouncer {
    pub fn new(settings: DebounceSettings) -> Self {
        Self {
            settings,
            velocity: DEFAULT_VELOCITY,
            runs: HashMap::new(),
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn settings(&self) -> DebounceSettings {
        self.settings
    }

    /// Replace the settings; running counters are kept.
    pub fn set_settings(&mut self, settings: DebounceSettings) {
        self.settings = settings;
    }

    pub fn phase(&self, note: &str) -> RunPhase {
        match self.runs.get(note) {
            Some(run) if run.frames > 0 => RunPhase::Accumulating { frames: run.frames },
            _ => RunPhase::Idle,
        }
    }

    /// Number of keys currently inside a run.
    pub fn active_runs(&self) -> usize {
        self.runs.values().filter(|run| run.frames > 0).count()
    }

    /// Feed one frame's decision for a key.
    ///
    /// Returns a note when a sufficiently long run ends on this frame.
    pub fn observe(
        &mut self,
        note: &str,
        midi_number: u8,
        matched: bool,
        now_seconds: f64,
    ) -> Option<NoteEvent> {
        if matched {
            let run = self.runs.entry(note.to_string()).or_insert(RunState {
                midi_number,
                frames: 0,
            });
            run.midi_number = midi_number;
            run.frames = run.frames.saturating_add(1);
            return None;
        }

        let run = self.runs.get_mut(note)?;
        let frames = std::mem::take(&mut run.frames);
        let midi_number = run.midi_number;
        if !self.settings.accepts(frames) {
            return None;
        }
        Some(self.note_for_run(midi_number, frames, now_seconds))
    }

    /// Close every open run as if the key had just been released.
    ///
    /// Runs shorter than the threshold are dropped. Notes come back ordered
    /// by MIDI number.
    pub fn flush(&mut self, now_seconds: f64) -> Vec<NoteEvent> {
        let settings = self.settings;
        let mut closed: Vec<(u8, u32)> = self
            .runs
            .values_mut()
            .filter_map(|run| {
                let frames = std::mem::take(&mut run.frames);
                settings.accepts(frames).then_some((run.midi_number, frames))
            })
            .collect();
        closed.sort_unstable();

        closed
            .into_iter()
            .map(|(midi_number, frames)| self.note_for_run(midi_number, frames, now_seconds))
            .collect()
    }

    pub fn reset(&mut self) {
        self.runs.clear();
    }

    fn note_for_run(&self, midi_number: u8, frames: u32, now_seconds: f64) -> NoteEvent {
        let duration_seconds = self.settings.run_seconds(frames);
        NoteEvent {
            midi_number,
            start_seconds: (now_seconds - duration_seconds).max(0.0),
            duration_seconds,
            velocity: self.velocity,
        }
    }
}
