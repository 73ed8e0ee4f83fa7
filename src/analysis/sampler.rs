// KeySampler - median-filtered color sampling along the detection row
//
// A frame contributes a single RGBA pixel row. For every key the sampler
// takes a small horizontal window centred on the key's x-position and
// computes the per-channel median, which rejects isolated noisy pixels and
// compression artifacts at key edges better than a mean would.
//
// Window pixels that fall outside the row are skipped. A key whose whole
// window lies outside the row has no color and never matches.

use crate::analysis::color::{ColorMatcher, Rgb};
use crate::analysis::layout::KeyDescriptor;

/// Bytes per RGBA pixel.
pub const RGBA_STRIDE: usize = 4;

/// Result of sampling one key on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyReading {
    /// Median color, `None` when the window lies outside the frame
    pub color: Option<Rgb>,
    /// Channel-averaged distance to the detection color
    pub score: Option<f32>,
    pub matched: bool,
}

/// Per-channel median over `kernel` pixels centred on `center_x`.
///
/// `row` is RGBA, one pixel tall. Even kernels behave like the next odd
/// size (`kernel / 2` pixels on each side). For an even number of surviving
/// samples the upper median is used.
pub fn median_color(row: &[u8], center_x: i64, kernel: usize) -> Option<Rgb> {
    let width = (row.len() / RGBA_STRIDE) as i64;
    let half = i64::try_from(kernel / 2).unwrap_or(i64::MAX);

    // clip the window to the row before sizing buffers
    let start = center_x.saturating_sub(half).max(0);
    let end = center_x.saturating_add(half).min(width - 1);
    if width == 0 || start > end {
        return None;
    }

    let count = (end - start + 1) as usize;
    let mut reds = Vec::with_capacity(count);
    let mut greens = Vec::with_capacity(count);
    let mut blues = Vec::with_capacity(count);

    for x in start..=end {
        let idx = x as usize * RGBA_STRIDE;
        reds.push(row[idx]);
        greens.push(row[idx + 1]);
        blues.push(row[idx + 2]);
    }

    if reds.is_empty() {
        return None;
    }

    Some(Rgb::new(
        median(&mut reds),
        median(&mut greens),
        median(&mut blues),
    ))
}

fn median(values: &mut [u8]) -> u8 {
    values.sort_unstable();
    values[values.len() / 2]
}

/// Samples keys against a detection color.
#[derive(Debug, Clone, Copy)]
pub struct KeySampler {
    kernel: usize,
    matcher: ColorMatcher,
}

impl KeySampler {
    pub fn new(kernel: usize, matcher: ColorMatcher) -> Self {
        Self { kernel, matcher }
    }

    /// Number of pixels actually covered by the window.
    pub fn window_size(&self) -> usize {
        (self.kernel / 2).saturating_mul(2).saturating_add(1)
    }

    pub fn matcher(&self) -> &ColorMatcher {
        &self.matcher
    }

    /// Median color around pixel column `x` (fractional positions floor).
    pub fn sample(&self, row: &[u8], x: f32) -> Option<Rgb> {
        if !x.is_finite() {
            return None;
        }
        median_color(row, x.floor() as i64, self.kernel)
    }

    pub fn read_key(&self, row: &[u8], key: &KeyDescriptor) -> KeyReading {
        match self.sample(row, key.x) {
            Some(color) => {
                let score = self.matcher.score(&color);
                KeyReading {
                    color: Some(color),
                    score: Some(score),
                    matched: score < self.matcher.threshold,
                }
            }
            None => KeyReading {
                color: None,
                score: None,
                matched: false,
            },
        }
    }
}
