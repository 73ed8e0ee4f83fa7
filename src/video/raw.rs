// RawVideoSource - frames from an uncompressed RGBA/RGB24 byte stream
//
// Frames are packed back to back with no header, so geometry and frame rate
// come from the caller. Timestamps are derived from the frame index.

use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::RGBA_STRIDE;
use crate::engine::{FrameSource, VideoFrame};
use crate::error::DetectionError;

/// Pixel layout of the incoming stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Rgba,
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Rgb24 => 3,
        }
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgba" => Ok(PixelFormat::Rgba),
            "rgb24" | "rgb" => Ok(PixelFormat::Rgb24),
            other => Err(format!("unknown pixel format '{other}' (expected rgba or rgb24)")),
        }
    }
}

/// Reads fixed-size frames from any byte stream.
pub struct RawVideoSource<R: Read> {
    reader: R,
    width: u32,
    height: u32,
    fps: f64,
    format: PixelFormat,
    buffer: Vec<u8>,
    frame_index: u64,
}

impl<R: Read> RawVideoSource<R> {
    pub fn new(
        reader: R,
        width: u32,
        height: u32,
        fps: f64,
        format: PixelFormat,
    ) -> Result<Self, DetectionError> {
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidGeometry { width, height });
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(DetectionError::InvalidOption {
                field: "fps",
                reason: format!("must be greater than 0 (got {fps})"),
            });
        }
        let frame_len = width as usize * height as usize * format.bytes_per_pixel();
        Ok(Self {
            reader,
            width,
            height,
            fps,
            format,
            buffer: vec![0; frame_len],
            frame_index: 0,
        })
    }

    pub fn frames_read(&self) -> u64 {
        self.frame_index
    }

    /// Fill the frame buffer. Returns the number of bytes read, which is
    /// short only at end of stream.
    fn fill_buffer(&mut self) -> Result<usize, DetectionError> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(filled)
    }

    fn to_rgba(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba => self.buffer.clone(),
            PixelFormat::Rgb24 => {
                let mut rgba = Vec::with_capacity(self.buffer.len() / 3 * RGBA_STRIDE);
                for px in self.buffer.chunks_exact(3) {
                    rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
                rgba
            }
        }
    }
}

impl RawVideoSource<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        fps: f64,
        format: PixelFormat,
    ) -> Result<Self, DetectionError> {
        let file = File::open(path.as_ref())?;
        log::info!(
            "[RawVideoSource] Reading {}x{} {:?} frames at {} fps from {}",
            width,
            height,
            format,
            fps,
            path.as_ref().display()
        );
        Self::new(BufReader::new(file), width, height, fps, format)
    }
}

impl RawVideoSource<io::StdinLock<'static>> {
    pub fn from_stdin(
        width: u32,
        height: u32,
        fps: f64,
        format: PixelFormat,
    ) -> Result<Self, DetectionError> {
        Self::new(io::stdin().lock(), width, height, fps, format)
    }
}

impl<R: Read> FrameSource for RawVideoSource<R> {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, DetectionError> {
        let filled = self.fill_buffer()?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < self.buffer.len() {
            return Err(DetectionError::TruncatedFrame {
                expected: self.buffer.len(),
                actual: filled,
            });
        }

        let timestamp = self.frame_index as f64 / self.fps;
        self.frame_index += 1;
        Ok(Some(VideoFrame::new(
            timestamp,
            self.width,
            self.height,
            self.to_rgba(),
        )))
    }

    fn frame_rate(&self) -> Option<f64> {
        Some(self.fps)
    }
}
