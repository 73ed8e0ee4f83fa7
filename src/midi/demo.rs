//! C-major scale demo file.
//!
//! Handy for checking that a MIDI player accepts the files this crate
//! writes: eight quarter-length notes from C4 to C5, back to back.

use crate::midi::track::{self, TrackWriter};

pub const SCALE_NOTES: [u8; 8] = [60, 62, 64, 65, 67, 69, 71, 72];
pub const SCALE_VELOCITY: u8 = 72;

/// Build the scale with each note lasting `note_length_quarters` quarter notes
/// (at least one tick).
pub fn build_scale_demo(bpm: f64, ticks_per_quarter: u16, note_length_quarters: f64) -> Vec<u8> {
    let mut writer = TrackWriter::new(ticks_per_quarter);
    let length = if note_length_quarters.is_finite() {
        note_length_quarters
    } else {
        1.0
    };
    let note_ticks = ((writer.ticks_per_quarter() as f64 * length).round() as u64).max(1);

    writer.set_tempo(0, track::micros_per_quarter(bpm));
    writer.program_change(0, 0, track::ACOUSTIC_GRAND_PIANO);

    let mut tick = 0;
    for note in SCALE_NOTES {
        writer.note_on(tick, 0, note, SCALE_VELOCITY);
        tick += note_ticks;
        writer.note_off(tick, 0, note, crate::midi::NOTE_OFF_VELOCITY);
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::inspect::inspect;

    #[test]
    fn test_scale_demo_contains_eight_sequential_notes() {
        let bytes = build_scale_demo(120.0, 480, 1.0);
        let summary = inspect(&bytes).expect("valid file");

        assert_eq!(summary.notes.len(), 8);
        for (idx, note) in summary.notes.iter().enumerate() {
            assert_eq!(note.midi_number, SCALE_NOTES[idx]);
            assert_eq!(note.velocity, SCALE_VELOCITY);
            assert_eq!(note.start_tick, idx as u64 * 480);
            assert_eq!(note.end_tick, (idx as u64 + 1) * 480);
        }
    }

    #[test]
    fn test_zero_length_still_advances_one_tick() {
        let summary = inspect(&build_scale_demo(90.0, 96, 0.0)).expect("valid file");
        assert_eq!(summary.notes[7].end_tick, 8);
    }
}
