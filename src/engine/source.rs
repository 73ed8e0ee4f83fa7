//! Frame delivery abstractions for the frame driver.

use std::collections::VecDeque;

use crate::analysis::RGBA_STRIDE;
use crate::error::DetectionError;

/// One decoded video frame in RGBA layout.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Presentation time in seconds
    pub timestamp_seconds: f64,
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA bytes, `width * height * 4` long
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    pub fn new(timestamp_seconds: f64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            timestamp_seconds,
            width,
            height,
            pixels,
        }
    }

    /// A frame whose dimensions are not known yet.
    pub fn not_ready(timestamp_seconds: f64) -> Self {
        Self::new(timestamp_seconds, 0, 0, Vec::new())
    }

    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * RGBA_STRIDE
    }

    pub fn check_len(&self) -> Result<(), DetectionError> {
        let expected = self.expected_len();
        if self.pixels.len() != expected {
            return Err(DetectionError::FrameSizeMismatch {
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }

    /// RGBA bytes of pixel row `y`, if it exists.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.width as usize * RGBA_STRIDE;
        let start = y as usize * stride;
        self.pixels.get(start..start + stride)
    }
}

/// Anything that hands out frames one at a time.
///
/// `next_frame` is the "request the next frame" step of the drive loop:
/// `Ok(None)` means playback ended and no further frames will arrive.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, DetectionError>;

    /// Native frame rate, when the source knows it.
    fn frame_rate(&self) -> Option<f64> {
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, DetectionError> {
        (**self).next_frame()
    }

    fn frame_rate(&self) -> Option<f64> {
        (**self).frame_rate()
    }
}

/// In-memory frame queue, used by fixtures and tests.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: VecDeque<VideoFrame>,
    frame_rate: Option<f64>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        Self {
            frames: frames.into(),
            frame_rate: None,
        }
    }

    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FromIterator<VideoFrame> for VecFrameSource {
    fn from_iter<I: IntoIterator<Item = VideoFrame>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, DetectionError> {
        Ok(self.frames.pop_front())
    }

    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_slicing() {
        let pixels: Vec<u8> = (0..2 * 3 * 4).map(|v| v as u8).collect();
        let frame = VideoFrame::new(0.0, 2, 3, pixels);
        assert!(frame.check_len().is_ok());
        assert_eq!(frame.row(1), Some(&[8, 9, 10, 11, 12, 13, 14, 15][..]));
        assert_eq!(frame.row(3), None);
    }

    #[test]
    fn test_size_mismatch() {
        let frame = VideoFrame::new(0.0, 2, 2, vec![0; 15]);
        assert_eq!(
            frame.check_len(),
            Err(DetectionError::FrameSizeMismatch {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn test_vec_source_drains_in_order() {
        let mut source: VecFrameSource = (0..3)
            .map(|i| VideoFrame::not_ready(i as f64))
            .collect();
        assert_eq!(source.remaining(), 3);
        assert_eq!(source.next_frame().unwrap().unwrap().timestamp_seconds, 0.0);
        assert_eq!(source.next_frame().unwrap().unwrap().timestamp_seconds, 1.0);
        assert_eq!(source.next_frame().unwrap().unwrap().timestamp_seconds, 2.0);
        assert!(source.next_frame().unwrap().is_none());
    }
}
