//! Read-back of single-track MIDI files.
//!
//! Used by the CLI `inspect` command and by tests to check what the builder
//! produced without relying on an external MIDI library.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::error::ExportError;
use crate::midi::track::{
    HEADER_LENGTH, HEADER_TAG, META_END_OF_TRACK, META_PREFIX, META_SET_TEMPO, TRACK_TAG,
};
use crate::midi::vlq;

/// One paired note-on/note-off found in a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectedNote {
    pub midi_number: u8,
    pub velocity: u8,
    pub start_tick: u64,
    pub end_tick: u64,
}

/// Decoded overview of a MIDI file.
#[derive(Debug, Clone, Serialize)]
pub struct MidiSummary {
    pub format: u16,
    pub track_count: u16,
    pub ticks_per_quarter: u16,
    pub track_length: u32,
    pub micros_per_quarter: Option<u32>,
    pub bpm: Option<f64>,
    pub program: Option<u8>,
    pub notes: Vec<InspectedNote>,
    pub unmatched_note_ons: usize,
    pub end_of_track: bool,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn malformed(&self, reason: impl Into<String>) -> ExportError {
        ExportError::MalformedFile {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ExportError> {
        if self.pos + len > self.bytes.len() {
            return Err(self.malformed(format!("expected {} more bytes", len)));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ExportError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ExportError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ExportError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn vlq(&mut self) -> Result<u32, ExportError> {
        match vlq::decode(&self.bytes[self.pos.min(self.bytes.len())..]) {
            Some((value, used)) => {
                self.pos += used;
                Ok(value)
            }
            None => Err(self.malformed("unterminated variable-length quantity")),
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }
}

/// Parse a format 0 file produced by [`crate::midi::MidiFileBuilder`] or any
/// other single-track writer.
pub fn inspect(bytes: &[u8]) -> Result<MidiSummary, ExportError> {
    let mut cursor = Cursor::new(bytes);

    if cursor.take(4)? != HEADER_TAG {
        return Err(ExportError::MalformedFile {
            offset: 0,
            reason: "missing MThd tag".to_string(),
        });
    }
    let header_len = cursor.u32()?;
    if header_len != HEADER_LENGTH {
        return Err(cursor.malformed(format!("header length {} (expected 6)", header_len)));
    }
    let format = cursor.u16()?;
    let track_count = cursor.u16()?;
    let ticks_per_quarter = cursor.u16()?;

    if cursor.take(4)? != TRACK_TAG {
        return Err(cursor.malformed("missing MTrk tag"));
    }
    let track_length = cursor.u32()?;
    if track_length as usize != cursor.remaining() {
        return Err(cursor.malformed(format!(
            "track length {} but {} bytes follow",
            track_length,
            cursor.remaining()
        )));
    }

    let mut summary = MidiSummary {
        format,
        track_count,
        ticks_per_quarter,
        track_length,
        micros_per_quarter: None,
        bpm: None,
        program: None,
        notes: Vec::new(),
        unmatched_note_ons: 0,
        end_of_track: false,
    };

    let mut open: HashMap<u8, VecDeque<(u64, u8)>> = HashMap::new();
    let mut tick: u64 = 0;
    let mut running_status: Option<u8> = None;

    while cursor.remaining() > 0 {
        tick += cursor.vlq()? as u64;
        let mut status = cursor.u8()?;

        if status == META_PREFIX {
            let kind = cursor.u8()?;
            let len = cursor.vlq()? as usize;
            let data = cursor.take(len)?;
            if kind == META_SET_TEMPO && len == 3 {
                let mpqn = (data[0] as u32) << 16 | (data[1] as u32) << 8 | data[2] as u32;
                summary.micros_per_quarter = Some(mpqn);
                summary.bpm = Some(60_000_000.0 / mpqn.max(1) as f64);
            } else if kind == META_END_OF_TRACK {
                summary.end_of_track = true;
                break;
            }
            continue;
        }
        if status == 0xF0 || status == 0xF7 {
            let len = cursor.vlq()? as usize;
            cursor.take(len)?;
            continue;
        }

        let first_data = if status < 0x80 {
            let data = status;
            status = running_status.ok_or_else(|| cursor.malformed("data byte without status"))?;
            data
        } else {
            running_status = Some(status);
            cursor.u8()?
        };

        match status & 0xF0 {
            0x80 | 0x90 => {
                let velocity = cursor.u8()?;
                let note = first_data;
                if status & 0xF0 == 0x90 && velocity > 0 {
                    open.entry(note).or_default().push_back((tick, velocity));
                } else if let Some((start_tick, on_velocity)) =
                    open.get_mut(&note).and_then(|queue| queue.pop_front())
                {
                    summary.notes.push(InspectedNote {
                        midi_number: note,
                        velocity: on_velocity,
                        start_tick,
                        end_tick: tick,
                    });
                }
            }
            0xC0 => summary.program = Some(first_data),
            0xD0 => {}
            0xA0 | 0xB0 | 0xE0 => {
                cursor.u8()?;
            }
            _ => return Err(cursor.malformed(format!("unsupported status 0x{:02X}", status))),
        }
    }

    summary.unmatched_note_ons = open.values().map(VecDeque::len).sum();
    summary
        .notes
        .sort_by(|a, b| (a.start_tick, a.midi_number).cmp(&(b.start_tick, b.midi_number)));
    Ok(summary)
}

/// Lowercase, space separated hex dump.
pub fn hex_preview(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
