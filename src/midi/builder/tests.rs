use super::*;

fn be32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Track body of a built file (after the 14 byte header and 8 byte chunk prefix).
fn track_body(bytes: &[u8]) -> &[u8] {
    &bytes[22..]
}

#[test]
fn test_header_chunk() {
    let bytes = MidiFileBuilder::new().build_file();
    assert_eq!(&bytes[0..4], b"MThd");
    assert_eq!(be32(&bytes[4..8]), 6);
    assert_eq!(&bytes[8..10], &[0, 0], "format 0");
    assert_eq!(&bytes[10..12], &[0, 1], "one track");
    assert_eq!(&bytes[12..14], &480u16.to_be_bytes());
    assert_eq!(&bytes[14..18], b"MTrk");
}

#[test]
fn test_empty_session_has_tempo_program_and_end() {
    let bytes = MidiFileBuilder::new().build_file();
    assert_eq!(
        track_body(&bytes),
        &[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // tempo 500000
            0x00, 0xC0, 0x00, // program change piano
            0x00, 0xFF, 0x2F, 0x00, // end of track
        ]
    );
}

#[test]
fn test_tempo_conversion_at_120_bpm() {
    let builder = MidiFileBuilder::with_tempo(120.0, 480);
    assert_eq!(builder.micros_per_quarter(), 500_000);
    let bytes = builder.build_file();
    let body = track_body(&bytes);
    assert_eq!(&body[1..7], &[0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
}

#[test]
fn test_single_note_bytes() {
    let mut builder = MidiFileBuilder::with_tempo(120.0, 480);
    builder.add_note(60, 0.5, 0.25);
    let bytes = builder.build_file();
    let body = track_body(&bytes);

    assert_eq!(
        &body[10..],
        &[
            0x83, 0x60, 0x90, 60, 100, // on at tick 480
            0x81, 0x70, 0x80, 60, 64, // off 240 ticks later
            0x00, 0xFF, 0x2F, 0x00,
        ]
    );
}

#[test]
fn test_track_length_matches_body() {
    let mut builder = MidiFileBuilder::with_tempo(97.0, 960);
    builder.add_note(60, 0.0, 1.0);
    builder.add_note(64, 0.333, 2.75);
    builder.add_note(67, 12.5, 0.01);
    let bytes = builder.build_file();

    assert_eq!(be32(&bytes[18..22]) as usize, bytes.len() - 22);
}

#[test]
fn test_build_is_deterministic() {
    let mut builder = MidiFileBuilder::new();
    builder.add_note(72, 1.0, 0.5);
    builder.add_note(60, 1.0, 0.5);
    builder.add_note(65, 0.2, 3.0);

    assert_eq!(builder.build_file(), builder.build_file());
}

#[test]
fn test_note_on_precedes_note_off_at_same_instant() {
    let mut builder = MidiFileBuilder::with_tempo(60.0, 100);
    builder.add_note(60, 0.0, 1.0);
    builder.add_note(62, 1.0, 1.0);
    let bytes = builder.build_file();
    let body = track_body(&bytes);

    // on 60 @0, on 62 @100, off 60 @100, off 62 @200
    assert_eq!(
        &body[10..],
        &[
            0x00, 0x90, 60, 100, //
            0x64, 0x90, 62, 100, //
            0x00, 0x80, 60, 64, //
            0x64, 0x80, 62, 64, //
            0x00, 0xFF, 0x2F, 0x00,
        ]
    );
}

#[test]
fn test_events_sorted_by_time_regardless_of_insertion() {
    let mut builder = MidiFileBuilder::with_tempo(60.0, 100);
    builder.add_note(64, 2.0, 0.5);
    builder.add_note(60, 0.0, 0.5);
    let bytes = builder.build_file();
    let body = track_body(&bytes);

    assert_eq!(&body[10..14], &[0x00, 0x90, 60, 100]);
    assert_eq!(&body[14..18], &[0x32, 0x80, 60, 64]);
    assert_eq!(&body[18..22], &[0x81, 0x16, 0x90, 64]);
}

#[test]
fn test_overlapping_same_pitch_notes_are_both_emitted() {
    let mut builder = MidiFileBuilder::new();
    builder.add_note(60, 0.0, 1.0);
    builder.add_note(60, 0.5, 1.0);
    let bytes = builder.build_file();
    let body = track_body(&bytes);

    let note_ons = body.windows(2).filter(|w| w == &[0x90, 60]).count();
    let note_offs = body.windows(2).filter(|w| w == &[0x80, 60]).count();
    assert_eq!(note_ons, 2);
    assert_eq!(note_offs, 2);
}

#[test]
fn test_negative_times_are_clamped() {
    let mut builder = MidiFileBuilder::new();
    builder.add_note(60, -2.0, -1.0);
    builder.add_note(61, f64::NAN, 0.5);

    assert_eq!(builder.notes()[0].start_seconds, 0.0);
    assert_eq!(builder.notes()[0].duration_seconds, 0.0);
    assert_eq!(builder.notes()[1].start_seconds, 0.0);

    let bytes = builder.build_file();
    let body = track_body(&bytes);
    assert_eq!(&body[10..14], &[0x00, 0x90, 60, 100]);
}

#[test]
fn test_zero_bpm_is_clamped() {
    let builder = MidiFileBuilder::with_tempo(0.0, 480);
    assert_eq!(builder.bpm(), 1.0);
    assert_eq!(builder.seconds_to_ticks(60.0), 480);
}

#[test]
fn test_seconds_to_ticks_rounds() {
    let builder = MidiFileBuilder::with_tempo(120.0, 480);
    assert_eq!(builder.seconds_to_ticks(0.0), 0);
    assert_eq!(builder.seconds_to_ticks(1.0), 960);
    assert_eq!(builder.seconds_to_ticks(5.0 / 24.0), 200);
    assert_eq!(builder.seconds_to_ticks(0.0005), 0);
    assert_eq!(builder.seconds_to_ticks(0.0006), 1);
}

#[test]
fn test_midi_number_is_masked_on_output() {
    let mut builder = MidiFileBuilder::new();
    builder.add_note(0x80 | 60, 0.0, 0.1);
    let bytes = builder.build_file();
    let body = track_body(&bytes);
    assert_eq!(&body[10..14], &[0x00, 0x90, 60, 100]);
}

#[test]
fn test_write_to_reports_missing_directory() {
    let builder = MidiFileBuilder::new();
    let path = std::env::temp_dir()
        .join("keyscan-missing-dir-for-test")
        .join("nested")
        .join("out.mid");
    match builder.write_to(&path) {
        Err(ExportError::WriteFailed { details }) => assert!(details.contains("out.mid")),
        other => panic!("expected WriteFailed, got {other:?}"),
    }
}
