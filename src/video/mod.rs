//! Frame sources backed by real video data.
//!
//! Only uncompressed frame streams are read here. Compressed containers are
//! expected to be decoded upstream, e.g.
//! `ffmpeg -i take.mp4 -f rawvideo -pix_fmt rgba -`.

pub mod raw;

pub use raw::{PixelFormat, RawVideoSource};
