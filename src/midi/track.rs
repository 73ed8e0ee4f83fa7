// Low-level Standard MIDI File writer
//
// Emits a format 0 file: an `MThd` header chunk followed by exactly one
// `MTrk` chunk. Events are appended with absolute tick positions and the
// writer turns them into delta-times, so callers never handle deltas.

use crate::midi::vlq;

pub const HEADER_TAG: &[u8; 4] = b"MThd";
pub const TRACK_TAG: &[u8; 4] = b"MTrk";
pub const HEADER_LENGTH: u32 = 6;
pub const FORMAT_SINGLE_TRACK: u16 = 0;

pub const META_PREFIX: u8 = 0xFF;
pub const META_SET_TEMPO: u8 = 0x51;
pub const META_END_OF_TRACK: u8 = 0x2F;

pub const STATUS_NOTE_OFF: u8 = 0x80;
pub const STATUS_NOTE_ON: u8 = 0x90;
pub const STATUS_PROGRAM_CHANGE: u8 = 0xC0;

/// General MIDI program 0.
pub const ACOUSTIC_GRAND_PIANO: u8 = 0;

/// Largest tempo value the 24-bit Set-Tempo field can carry.
pub const MAX_MICROS_PER_QUARTER: u32 = 0x00FF_FFFF;

/// Bit 15 of the division field selects SMPTE timing, so PPQ stays below it.
pub const MAX_TICKS_PER_QUARTER: u16 = 0x7FFF;

const DATA_MASK: u8 = 0x7F;
const CHANNEL_MASK: u8 = 0x0F;

/// Accumulates the body of a single track chunk.
#[derive(Debug, Clone)]
pub struct TrackWriter {
    ticks_per_quarter: u16,
    body: Vec<u8>,
    last_tick: u64,
}

impl TrackWriter {
    pub fn new(ticks_per_quarter: u16) -> Self {
        Self {
            ticks_per_quarter: ticks_per_quarter.clamp(1, MAX_TICKS_PER_QUARTER),
            body: Vec::new(),
            last_tick: 0,
        }
    }

    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    /// Current track body length in bytes.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Write the delta from the previous event. Ticks that run backwards
    /// (rounding collisions) produce a zero delta.
    fn delta(&mut self, tick: u64) {
        let delta = tick.saturating_sub(self.last_tick);
        vlq::write(&mut self.body, delta.min(vlq::VLQ_MAX as u64) as u32);
        self.last_tick = tick;
    }

    pub fn set_tempo(&mut self, tick: u64, micros_per_quarter: u32) {
        let mpqn = micros_per_quarter.clamp(1, MAX_MICROS_PER_QUARTER);
        self.delta(tick);
        self.body.extend_from_slice(&[
            META_PREFIX,
            META_SET_TEMPO,
            0x03,
            (mpqn >> 16) as u8,
            (mpqn >> 8) as u8,
            mpqn as u8,
        ]);
    }

    pub fn program_change(&mut self, tick: u64, channel: u8, program: u8) {
        self.delta(tick);
        self.body.extend_from_slice(&[
            STATUS_PROGRAM_CHANGE | (channel & CHANNEL_MASK),
            program & DATA_MASK,
        ]);
    }

    pub fn note_on(&mut self, tick: u64, channel: u8, note: u8, velocity: u8) {
        self.channel_event(tick, STATUS_NOTE_ON | (channel & CHANNEL_MASK), note, velocity);
    }

    pub fn note_off(&mut self, tick: u64, channel: u8, note: u8, velocity: u8) {
        self.channel_event(tick, STATUS_NOTE_OFF | (channel & CHANNEL_MASK), note, velocity);
    }

    fn channel_event(&mut self, tick: u64, status: u8, note: u8, velocity: u8) {
        self.delta(tick);
        self.body
            .extend_from_slice(&[status, note & DATA_MASK, velocity & DATA_MASK]);
    }

    /// Terminate the track and return the complete file bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let end_tick = self.last_tick;
        self.delta(end_tick);
        self.body
            .extend_from_slice(&[META_PREFIX, META_END_OF_TRACK, 0x00]);

        let mut file = Vec::with_capacity(14 + 8 + self.body.len());
        file.extend_from_slice(HEADER_TAG);
        file.extend_from_slice(&HEADER_LENGTH.to_be_bytes());
        file.extend_from_slice(&FORMAT_SINGLE_TRACK.to_be_bytes());
        file.extend_from_slice(&1u16.to_be_bytes());
        file.extend_from_slice(&self.ticks_per_quarter.to_be_bytes());

        file.extend_from_slice(TRACK_TAG);
        file.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        file.extend_from_slice(&self.body);
        file
    }
}

/// Microseconds per quarter note for `bpm`, with bpm clamped to at least 1.
pub fn micros_per_quarter(bpm: f64) -> u32 {
    let bpm = bpm.max(1.0);
    let micros = (60_000_000.0 / bpm).round();
    (micros as u32).clamp(1, MAX_MICROS_PER_QUARTER)
}
