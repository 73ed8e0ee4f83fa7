//! Piano key layout.
//!
//! Generates x-positions for the 88 keys of a standard piano, maps them onto
//! the keyboard's placement inside a video frame and optionally narrows the
//! set to a list of pitch classes.

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;

/// A0
pub const LOWEST_KEY: u8 = 21;
/// C8
pub const HIGHEST_KEY: u8 = 108;
pub const WHITE_KEY_COUNT: usize = 52;

const PITCH_CLASSES: [(&str, bool); 12] = [
    ("C", false),
    ("C#", true),
    ("D", false),
    ("D#", true),
    ("E", false),
    ("F", false),
    ("F#", true),
    ("G", false),
    ("G#", true),
    ("A", false),
    ("A#", true),
    ("B", false),
];

/// One key of the keyboard, positioned in pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    /// Scientific pitch name, e.g. `C4`
    pub note: String,
    pub midi_number: u8,
    pub x: f32,
    #[serde(default)]
    pub is_black: bool,
}

impl KeyDescriptor {
    pub fn new(note: impl Into<String>, midi_number: u8, x: f32) -> Self {
        Self {
            note: note.into(),
            midi_number,
            x,
            is_black: is_black_key(midi_number),
        }
    }

    /// Note name without the octave (`C#4` -> `C#`).
    pub fn pitch_class(&self) -> &str {
        self.note
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .trim_end_matches('-')
    }
}

/// Scientific pitch notation, MIDI 60 = `C4`.
pub fn note_name(midi_number: u8) -> String {
    let (name, _) = PITCH_CLASSES[(midi_number % 12) as usize];
    let octave = midi_number as i32 / 12 - 1;
    format!("{}{}", name, octave)
}

pub fn is_black_key(midi_number: u8) -> bool {
    PITCH_CLASSES[(midi_number % 12) as usize].1
}

/// Layout of A0..C8 across `total_width` pixels.
///
/// White keys sit at the centre of their slot; black keys sit on the
/// boundary between the neighbouring white keys.
pub fn generate_piano_layout(total_width: f32) -> Vec<KeyDescriptor> {
    let white_width = total_width / WHITE_KEY_COUNT as f32;
    let mut white_index = 0usize;

    (LOWEST_KEY..=HIGHEST_KEY)
        .map(|midi_number| {
            let is_black = is_black_key(midi_number);
            let x = if is_black {
                white_index as f32 * white_width
            } else {
                let x = white_index as f32 * white_width + white_width / 2.0;
                white_index += 1;
                x
            };
            KeyDescriptor {
                note: note_name(midi_number),
                midi_number,
                x,
                is_black,
            }
        })
        .collect()
}

/// Scale a layout generated at `reference_width` onto a keyboard spanning
/// `width` pixels from `left`, snapping to whole pixel columns.
pub fn place_layout(
    keys: &[KeyDescriptor],
    left: f32,
    width: f32,
    reference_width: f32,
) -> Vec<KeyDescriptor> {
    let scale = if reference_width > 0.0 {
        width / reference_width
    } else {
        1.0
    };
    keys.iter()
        .map(|key| KeyDescriptor {
            x: (left + key.x * scale).floor(),
            ..key.clone()
        })
        .collect()
}

/// Keep only keys whose pitch class is listed. An empty list keeps all keys.
pub fn filter_pitch_classes(keys: Vec<KeyDescriptor>, classes: &[String]) -> Vec<KeyDescriptor> {
    if classes.is_empty() {
        return keys;
    }
    let wanted: Vec<String> = classes.iter().map(|c| c.trim().to_uppercase()).collect();
    keys.into_iter()
        .filter(|key| wanted.iter().any(|class| class == key.pitch_class()))
        .collect()
}

/// Keys to sample for a frame `frame_width` pixels wide, as described by
/// `config`: generated, placed over the keyboard area, then filtered.
pub fn keyboard_for_frame(config: &LayoutConfig, frame_width: u32) -> Vec<KeyDescriptor> {
    let width = config.keyboard_width.unwrap_or(frame_width as f32);
    let layout = generate_piano_layout(config.reference_width);
    let placed = place_layout(&layout, config.keyboard_left, width, config.reference_width);
    filter_pitch_classes(placed, &config.pitch_classes)
}
