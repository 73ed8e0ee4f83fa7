//! Colors and the color-match decision.

use serde::{Deserialize, Serialize};

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the `#` is optional, digits are case-insensitive).
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Lenient variant of [`Rgb::parse_hex`]: malformed input yields black.
    pub fn from_hex(hex: &str) -> Self {
        Self::parse_hex(hex).unwrap_or(Self::BLACK)
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Mean absolute per-channel difference, on a 0-255 scale.
    pub fn match_score(&self, other: &Rgb) -> f32 {
        let diff = |a: u8, b: u8| (a as i16 - b as i16).unsigned_abs() as f32;
        (diff(self.r, other.r) + diff(self.g, other.g) + diff(self.b, other.b)) / 3.0
    }
}

/// Decides whether a sampled color counts as the detection color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatcher {
    pub target: Rgb,
    pub threshold: f32,
}

impl ColorMatcher {
    pub fn new(target: Rgb, threshold: f32) -> Self {
        Self { target, threshold }
    }

    pub fn score(&self, sample: &Rgb) -> f32 {
        sample.match_score(&self.target)
    }

    /// Strictly below the threshold counts as a match.
    pub fn matches(&self, sample: &Rgb) -> bool {
        self.score(sample) < self.threshold
    }
}
