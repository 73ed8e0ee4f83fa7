use super::*;
use crate::analysis::{Rgb, RunPhase};
use crate::engine::options::{DetectionOptions, DetectionRow, OptionsPatch};
use crate::engine::source::VecFrameSource;
use crate::midi::inspect;
use crate::video::{PixelFormat, RawVideoSource};
use std::io::Cursor;

const WIDTH: u32 = 20;
const HEIGHT: u32 = 4;
const FPS: f64 = 24.0;
const RED: Rgb = Rgb::new(255, 0, 0);
const GREY: Rgb = Rgb::new(90, 90, 90);

fn keys() -> Vec<KeyDescriptor> {
    vec![KeyDescriptor::new("C4", 60, 5.0), KeyDescriptor::new("E4", 64, 15.0)]
}

fn options() -> DetectionOptions {
    DetectionOptions {
        target_color: RED,
        threshold: 30.0,
        median_kernel: 7,
        detection_frames: 5,
        assumed_fps: FPS,
        detection_row: DetectionRow::fixed(2),
    }
}

/// Grey frame, with the area around the first key painted red when `lit`.
fn frame(index: u32, lit: bool) -> VideoFrame {
    frame_sized(index, WIDTH, HEIGHT, lit)
}

fn frame_sized(index: u32, width: u32, height: u32, lit: bool) -> VideoFrame {
    let mut pixels = Vec::with_capacity((width * height) as usize * RGBA_STRIDE);
    for _ in 0..height {
        for x in 0..width {
            let color = if lit && (2..=8).contains(&x) { RED } else { GREY };
            pixels.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
    }
    VideoFrame::new(index as f64 / FPS, width, height, pixels)
}

/// Grey frame with only `lit_row` painted red around the first key.
fn frame_with_lit_row(index: u32, height: u32, lit_row: u32) -> VideoFrame {
    let mut pixels = Vec::with_capacity((WIDTH * height) as usize * RGBA_STRIDE);
    for y in 0..height {
        for x in 0..WIDTH {
            let color = if y == lit_row && (2..=8).contains(&x) { RED } else { GREY };
            pixels.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
    }
    VideoFrame::new(index as f64 / FPS, WIDTH, height, pixels)
}

/// Yields its frames, then fails with `error`.
struct FailingSource {
    frames: std::vec::IntoIter<VideoFrame>,
    error: Option<DetectionError>,
}

impl FrameSource for FailingSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, DetectionError> {
        if let Some(frame) = self.frames.next() {
            return Ok(Some(frame));
        }
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

fn driver() -> FrameDriver {
    FrameDriver::new(options().shared(), keys()).unwrap()
}

#[test]
fn test_six_lit_frames_produce_one_note() {
    let mut driver = driver();
    let frames: VecFrameSource = (0..8).map(|i| frame(i, i < 6)).collect();
    let mut source = frames.with_frame_rate(FPS);

    let summary = driver.run(&mut source).unwrap();

    assert_eq!(summary.state, SessionState::Stopped);
    assert_eq!(summary.note_count, 1);
    let note = driver.notes()[0];
    assert_eq!(note.midi_number, 60);
    assert!((note.duration_seconds - 0.25).abs() < 1e-9);
    assert!(note.start_seconds.abs() < 1e-9);

    let parsed = inspect(&driver.export()).unwrap();
    assert_eq!(parsed.notes.len(), 1);
    assert_eq!(parsed.notes[0].midi_number, 60);
    assert_eq!(parsed.unmatched_note_ons, 0);
}

#[test]
fn test_note_reported_on_release_frame() {
    let mut driver = driver();
    for i in 0..6 {
        let outcome = driver.process_frame(&frame(i, true)).unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::Processed {
                matched_keys: 1,
                notes: vec![]
            }
        );
    }
    match driver.process_frame(&frame(6, false)).unwrap() {
        FrameOutcome::Processed {
            matched_keys,
            notes,
        } => {
            assert_eq!(matched_keys, 0);
            assert_eq!(notes.len(), 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_short_run_is_discarded() {
    let mut driver = driver();
    for i in 0..4 {
        driver.process_frame(&frame(i, true)).unwrap();
    }
    driver.process_frame(&frame(4, false)).unwrap();
    assert!(driver.notes().is_empty());
    assert_eq!(driver.debouncer().active_runs(), 0);
}

#[test]
fn test_not_ready_frames_are_skipped() {
    let mut driver = driver();
    let outcome = driver.process_frame(&VideoFrame::not_ready(0.0)).unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::NotReady));
    assert_eq!(driver.state(), SessionState::Running);

    let stats = driver.telemetry().stats;
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(stats.frames_processed, 0);
}

#[test]
fn test_short_pixel_buffer_is_rejected() {
    let mut driver = driver();
    let mut bad = frame(0, true);
    bad.pixels.truncate(10);
    assert_eq!(
        driver.process_frame(&bad),
        Err(DetectionError::FrameSizeMismatch {
            expected: (WIDTH * HEIGHT) as usize * RGBA_STRIDE,
            actual: 10,
        })
    );
}

#[test]
fn test_geometry_change_resizes_row() {
    let mut driver = driver();
    driver.process_frame(&frame(0, true)).unwrap();
    driver
        .process_frame(&frame_sized(1, WIDTH * 2, HEIGHT, true))
        .unwrap();
    driver
        .process_frame(&frame_sized(2, WIDTH * 2, HEIGHT, true))
        .unwrap();

    assert_eq!(driver.telemetry().stats.geometry_changes, 2);
    // the lit area sits at the same x in both sizes, so the run continues
    assert_eq!(
        driver.debouncer().phase("C4"),
        RunPhase::Accumulating { frames: 3 }
    );
}

#[test]
fn test_detection_row_is_clamped_to_frame() {
    let mut opts = options();
    opts.detection_row = DetectionRow::fixed(500);
    let mut driver = FrameDriver::new(opts.shared(), keys()).unwrap();

    let outcome = driver.process_frame(&frame(0, true)).unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::Processed {
            matched_keys: 1,
            notes: vec![]
        }
    );
}

#[test]
fn test_stop_flushes_runs_over_threshold() {
    let mut driver = driver();
    for i in 2..7 {
        driver.process_frame(&frame(i, true)).unwrap();
    }

    let flushed = driver.stop();
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].midi_number, 60);
    let last = 6.0 / FPS;
    assert!((flushed[0].end_seconds() - last).abs() < 1e-9);
    assert_eq!(driver.notes().len(), 1);
    assert_eq!(driver.telemetry().stats.notes_flushed, 1);
}

#[test]
fn test_stop_drops_runs_under_threshold() {
    let mut driver = driver();
    for i in 0..3 {
        driver.process_frame(&frame(i, true)).unwrap();
    }
    assert!(driver.stop().is_empty());
    assert!(driver.notes().is_empty());
}

#[test]
fn test_stopped_session_rejects_frames() {
    let mut driver = driver();
    driver.stop();
    assert!(driver.stop().is_empty());
    assert_eq!(
        driver.process_frame(&frame(0, true)),
        Err(DetectionError::SessionStopped)
    );
    // export still works after stop
    assert_eq!(&driver.export()[0..4], b"MThd");
}

#[test]
fn test_option_changes_apply_on_next_frame() {
    let shared = options().shared();
    let mut driver = FrameDriver::new(shared.clone(), keys()).unwrap();

    OptionsPatch {
        detection_frames: Some(10),
        ..OptionsPatch::default()
    }
    .apply_shared(&shared)
    .unwrap();

    for i in 0..6 {
        driver.process_frame(&frame(i, true)).unwrap();
    }
    driver.process_frame(&frame(6, false)).unwrap();
    assert!(driver.notes().is_empty());
}

#[test]
fn test_invalid_option_change_keeps_previous_settings() {
    let shared = options().shared();
    let mut driver = FrameDriver::new(shared.clone(), keys()).unwrap();
    driver.process_frame(&frame(0, true)).unwrap();

    OptionsPatch {
        assumed_fps: Some(0.0),
        ..OptionsPatch::default()
    }
    .apply_shared(&shared)
    .unwrap();

    for i in 1..6 {
        driver.process_frame(&frame(i, true)).unwrap();
    }
    driver.process_frame(&frame(6, false)).unwrap();

    assert_eq!(driver.notes().len(), 1);
    assert!((driver.notes()[0].duration_seconds - 0.25).abs() < 1e-9);
    assert_eq!(driver.telemetry().stats.options_rejected, 6);
}

#[test]
fn test_constructor_validation() {
    assert_eq!(
        FrameDriver::new(options().shared(), Vec::new()).err(),
        Some(DetectionError::NoKeys)
    );

    let mut bad = options();
    bad.median_kernel = 0;
    assert!(matches!(
        FrameDriver::new(bad.shared(), keys()),
        Err(DetectionError::InvalidOption {
            field: "median_kernel",
            ..
        })
    ));
}

#[test]
fn test_midi_config_sets_velocity() {
    let config = MidiConfig {
        velocity: 90,
        ..MidiConfig::default()
    };
    let mut driver = FrameDriver::new(options().shared(), keys())
        .unwrap()
        .with_midi_config(&config);
    for i in 0..5 {
        driver.process_frame(&frame(i, true)).unwrap();
    }
    driver.process_frame(&frame(5, false)).unwrap();
    assert_eq!(driver.notes()[0].velocity, 90);
}

#[test]
fn test_truncated_trailing_frame_ends_run() {
    let mut bytes = Vec::new();
    for i in 0..9 {
        bytes.extend_from_slice(&frame(i, i < 8).pixels);
    }
    bytes.extend_from_slice(&[1, 2, 3]);
    let mut source =
        RawVideoSource::new(Cursor::new(bytes), WIDTH, HEIGHT, FPS, PixelFormat::Rgba).unwrap();

    let mut driver = driver();
    let summary = driver.run(&mut source).unwrap();

    assert_eq!(summary.state, SessionState::Stopped);
    assert_eq!(summary.note_count, 1);
    assert!((driver.notes()[0].duration_seconds - 8.0 / FPS).abs() < 1e-9);
    let parsed = inspect(&driver.export()).unwrap();
    assert_eq!(parsed.notes.len(), 1);
    assert_eq!(parsed.notes[0].midi_number, 60);
}

#[test]
fn test_truncated_frame_during_press_flushes_note() {
    let mut bytes = Vec::new();
    for i in 0..6 {
        bytes.extend_from_slice(&frame(i, true).pixels);
    }
    bytes.extend_from_slice(&frame(6, true).pixels[..40]);
    let mut source =
        RawVideoSource::new(Cursor::new(bytes), WIDTH, HEIGHT, FPS, PixelFormat::Rgba).unwrap();

    let mut driver = driver();
    let summary = driver.run(&mut source).unwrap();

    assert_eq!(summary.note_count, 1);
    assert_eq!(driver.telemetry().stats.notes_flushed, 1);
    assert_eq!(inspect(&driver.export()).unwrap().notes.len(), 1);
}

#[test]
fn test_source_failure_stops_session_and_keeps_notes() {
    let frames: Vec<VideoFrame> = (0..6).map(|i| frame(i, true)).collect();
    let mut source = FailingSource {
        frames: frames.into_iter(),
        error: Some(DetectionError::SourceReadFailed {
            details: "pipe closed".to_string(),
        }),
    };

    let mut driver = driver();
    let result = driver.run(&mut source);

    assert!(matches!(result, Err(DetectionError::SourceReadFailed { .. })));
    assert_eq!(driver.state(), SessionState::Stopped);
    assert_eq!(driver.notes().len(), 1);
    assert_eq!(inspect(&driver.export()).unwrap().notes.len(), 1);
}

#[test]
fn test_run_skips_malformed_frame() {
    let mut bad = frame(3, true);
    bad.pixels.truncate(10);
    let mut frames: Vec<VideoFrame> = (0..3).map(|i| frame(i, true)).collect();
    frames.push(bad);
    frames.extend((4..7).map(|i| frame(i, true)));
    frames.push(frame(7, false));
    let mut source: VecFrameSource = frames.into_iter().collect();

    let mut driver = driver();
    let summary = driver.run(&mut source).unwrap();

    assert_eq!(summary.stats.frames_skipped, 1);
    assert_eq!(summary.note_count, 1);
}

#[test]
fn test_percent_row_follows_frame_height() {
    let mut opts = options();
    opts.detection_row = DetectionRow::at_percent(50.0);
    let mut driver = FrameDriver::new(opts.shared(), keys()).unwrap();

    let lit = FrameOutcome::Processed {
        matched_keys: 1,
        notes: vec![],
    };
    assert_eq!(driver.process_frame(&frame_with_lit_row(0, 4, 2)).unwrap(), lit);
    // taller frame: the middle row moves from 2 to 5
    assert_eq!(driver.process_frame(&frame_with_lit_row(1, 10, 5)).unwrap(), lit);
    match driver.process_frame(&frame_with_lit_row(2, 10, 2)).unwrap() {
        FrameOutcome::Processed { matched_keys, .. } => assert_eq!(matched_keys, 0),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_kernel_wider_than_frame_does_not_panic() {
    let mut opts = options();
    opts.median_kernel = usize::MAX;
    let mut driver = FrameDriver::new(opts.shared(), keys()).unwrap();

    // both windows clamp to the whole 4 pixel row, even for E4 centered past it
    let red = VideoFrame::new(0.0, 4, 1, [255, 0, 0, 255].repeat(4));
    let outcome = driver.process_frame(&red).unwrap();
    assert_eq!(
        outcome,
        FrameOutcome::Processed {
            matched_keys: 2,
            notes: vec![]
        }
    );
}
