//! MIDI track builder.
//!
//! Collects timed notes (in seconds) and serializes them on demand into a
//! complete format 0 Standard MIDI File. Every call to [`MidiFileBuilder::build_file`]
//! is a full rebuild from the stored notes; nothing is cached between calls.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::MidiConfig;
use crate::error::ExportError;
use crate::midi::track::{self, TrackWriter};

/// Velocity applied to detected notes.
pub const DEFAULT_VELOCITY: u8 = 100;

/// Release velocity written on every note-off.
pub const NOTE_OFF_VELOCITY: u8 = 64;

pub const DEFAULT_TICKS_PER_QUARTER: u16 = 480;
pub const DEFAULT_BPM: f64 = 120.0;

const CHANNEL: u8 = 0;

/// A single detected note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub midi_number: u8,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EdgeKind {
    On,
    Off,
}

#[derive(Debug, Clone, Copy)]
struct NoteEdge {
    seconds: f64,
    kind: EdgeKind,
    note: u8,
    velocity: u8,
}

/// Accumulates notes and builds MIDI files from them.
#[derive(Debug, Clone)]
pub struct MidiFileBuilder {
    bpm: f64,
    ticks_per_quarter: u16,
    notes: Vec<NoteEvent>,
}

impl Default for MidiFileBuilder {
    fn default() -> Self {
        Self::with_tempo(DEFAULT_BPM, DEFAULT_TICKS_PER_QUARTER)
    }
}

impl MidiFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with explicit tempo settings.
    ///
    /// Non-finite or sub-1 bpm values are clamped to 1 when the file is
    /// built; the division is clamped into `1..=0x7FFF`.
    pub fn with_tempo(bpm: f64, ticks_per_quarter: u16) -> Self {
        Self {
            bpm,
            ticks_per_quarter: ticks_per_quarter.clamp(1, track::MAX_TICKS_PER_QUARTER),
            notes: Vec::new(),
        }
    }

    pub fn from_config(config: &MidiConfig) -> Self {
        Self::with_tempo(config.bpm, config.ticks_per_quarter)
    }

    pub fn bpm(&self) -> f64 {
        self.bpm.max(1.0)
    }

    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    /// Add a note with the default velocity.
    pub fn add_note(&mut self, midi_number: u8, start_seconds: f64, duration_seconds: f64) {
        self.add_note_with_velocity(midi_number, start_seconds, duration_seconds, DEFAULT_VELOCITY);
    }

    /// Add a note. Overlapping notes of the same pitch are kept as-is.
    pub fn add_note_with_velocity(
        &mut self,
        midi_number: u8,
        start_seconds: f64,
        duration_seconds: f64,
        velocity: u8,
    ) {
        self.push(NoteEvent {
            midi_number,
            start_seconds,
            duration_seconds,
            velocity,
        });
    }

    /// Store a note, clamping negative or non-finite times to zero.
    pub fn push(&mut self, note: NoteEvent) {
        let start_seconds = finite_or_zero(note.start_seconds).max(0.0);
        let duration_seconds = finite_or_zero(note.duration_seconds).max(0.0);
        self.notes.push(NoteEvent {
            start_seconds,
            duration_seconds,
            ..note
        });
    }

    pub fn extend<I: IntoIterator<Item = NoteEvent>>(&mut self, notes: I) {
        for note in notes {
            self.push(note);
        }
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn micros_per_quarter(&self) -> u32 {
        track::micros_per_quarter(self.bpm)
    }

    /// Absolute tick for a time in seconds:
    /// `round(seconds * ticks_per_quarter * bpm / 60)`.
    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        let ticks_per_second = self.ticks_per_quarter as f64 * self.bpm() / 60.0;
        (finite_or_zero(seconds).max(0.0) * ticks_per_second).round() as u64
    }

    /// Serialize all stored notes into a complete MIDI file.
    pub fn build_file(&self) -> Vec<u8> {
        let mut writer = TrackWriter::new(self.ticks_per_quarter);
        writer.set_tempo(0, self.micros_per_quarter());
        writer.program_change(0, CHANNEL, track::ACOUSTIC_GRAND_PIANO);

        for edge in self.sorted_edges() {
            let tick = self.seconds_to_ticks(edge.seconds);
            match edge.kind {
                EdgeKind::On => writer.note_on(tick, CHANNEL, edge.note, edge.velocity),
                EdgeKind::Off => writer.note_off(tick, CHANNEL, edge.note, edge.velocity),
            }
        }

        let bytes = writer.finish();
        log::debug!(
            "[MidiFileBuilder] Built {} bytes from {} notes",
            bytes.len(),
            self.notes.len()
        );
        bytes
    }

    /// Build the file and write it to `path`, returning the byte count.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<usize, ExportError> {
        let bytes = self.build_file();
        fs::write(&path, &bytes).map_err(|err| ExportError::WriteFailed {
            details: format!("{}: {}", path.as_ref().display(), err),
        })?;
        log::info!(
            "[MidiFileBuilder] Wrote {} notes to {:?}",
            self.notes.len(),
            path.as_ref()
        );
        Ok(bytes.len())
    }

    /// Note-on/note-off edges ordered by time, note-on first on ties.
    fn sorted_edges(&self) -> Vec<NoteEdge> {
        let mut edges = Vec::with_capacity(self.notes.len() * 2);
        for note in &self.notes {
            edges.push(NoteEdge {
                seconds: note.start_seconds,
                kind: EdgeKind::On,
                note: note.midi_number,
                velocity: note.velocity,
            });
            edges.push(NoteEdge {
                seconds: note.end_seconds(),
                kind: EdgeKind::Off,
                note: note.midi_number,
                velocity: NOTE_OFF_VELOCITY,
            });
        }

        // sort_by is stable: equal edges keep insertion order
        edges.sort_by(|a, b| match a.seconds.total_cmp(&b.seconds) {
            Ordering::Equal => a.kind.cmp(&b.kind),
            other => other,
        });
        edges
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests;
