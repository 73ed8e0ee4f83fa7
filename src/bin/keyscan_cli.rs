use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use keyscan::analysis::{filter_pitch_classes, generate_piano_layout, keyboard_for_frame, Rgb};
use keyscan::config::{AppConfig, DEFAULT_CONFIG_PATH};
use keyscan::engine::{DetectionOptions, FrameDriver, FrameSource, SessionSummary};
use keyscan::error::{log_detection_error, log_export_error, ErrorCode};
use keyscan::fixtures::{ExpectationDiff, FixtureCatalog, FixtureProcessor, FixtureRun};
use keyscan::midi::{build_scale_demo, hex_preview, inspect, NoteEvent};
use keyscan::video::{PixelFormat, RawVideoSource};

#[derive(Parser, Debug)]
#[command(
    name = "keyscan_cli",
    about = "Detect piano key presses in video frames and export them as MIDI"
)]
struct Cli {
    /// Override directory containing fixture assets (defaults to ./fixtures)
    #[arg(long, global = true)]
    fixtures_dir: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Transcribe a raw RGBA/RGB24 frame stream into a MIDI file
    Transcribe(TranscribeArgs),
    /// Run a synthetic fixture and optionally compare against expectations
    RunFixture {
        #[arg(long)]
        fixture: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List available fixtures on disk
    DumpFixtures,
    /// Print the 88-key layout as JSON
    Layout(LayoutArgs),
    /// Write a C-major scale test file
    ScaleDemo {
        #[arg(long, default_value = "scale_demo.mid")]
        output: PathBuf,
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
        #[arg(long, default_value_t = 480)]
        ppq: u16,
        /// Length of each note in quarter notes
        #[arg(long, default_value_t = 1.0)]
        note_length: f64,
    },
    /// Summarize an existing MIDI file
    Inspect {
        #[arg(long)]
        input: PathBuf,
        /// Include a hex dump of the file
        #[arg(long)]
        hex: bool,
    },
}

#[derive(Args, Debug)]
struct TranscribeArgs {
    /// Raw frame stream, or `-` for stdin
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    width: u32,
    #[arg(long)]
    height: u32,
    /// Stream frame rate (defaults to the configured assumed fps)
    #[arg(long)]
    fps: Option<f64>,
    #[arg(long, value_enum, default_value_t = PixelFormatArg::Rgba)]
    pixel_format: PixelFormatArg,
    /// JSON config file (defaults to ./keyscan.json when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output MIDI path (defaults to `<song name>.mid`)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Print session events as JSON lines
    #[arg(long)]
    events: bool,
    #[command(flatten)]
    detection: DetectionArgs,
    #[command(flatten)]
    keyboard: KeyboardArgs,
    #[arg(long)]
    bpm: Option<f64>,
    #[arg(long)]
    ppq: Option<u16>,
    #[arg(long)]
    velocity: Option<u8>,
}

#[derive(Args, Debug, Clone)]
struct DetectionArgs {
    /// Detection color as #rrggbb
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    threshold: Option<f32>,
    /// Median window width in pixels
    #[arg(long)]
    kernel: Option<usize>,
    /// Consecutive frames before a press counts
    #[arg(long)]
    detection_frames: Option<u32>,
    #[arg(long)]
    assumed_fps: Option<f64>,
    /// Sampling row as a percentage of frame height
    #[arg(long)]
    detection_height: Option<f32>,
}

#[derive(Args, Debug, Clone)]
struct KeyboardArgs {
    /// Left edge of the keyboard in video pixels
    #[arg(long)]
    keyboard_left: Option<f32>,
    /// Keyboard width in video pixels
    #[arg(long)]
    keyboard_width: Option<f32>,
    #[arg(long)]
    reference_width: Option<f32>,
    /// Comma separated pitch classes to sample, e.g. `C,E,G`
    #[arg(long, value_delimiter = ',')]
    keys: Vec<String>,
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Width the layout is generated at
    #[arg(long, default_value_t = 767.0)]
    width: f32,
    #[command(flatten)]
    keyboard: KeyboardArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PixelFormatArg {
    Rgba,
    Rgb24,
}

impl From<PixelFormatArg> for PixelFormat {
    fn from(arg: PixelFormatArg) -> Self {
        match arg {
            PixelFormatArg::Rgba => PixelFormat::Rgba,
            PixelFormatArg::Rgb24 => PixelFormat::Rgb24,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();

    match cli.command {
        Commands::Transcribe(args) => run_transcribe(args),
        Commands::RunFixture {
            fixture,
            expect,
            output,
        } => run_fixture(&catalog, &fixture, expect, output),
        Commands::DumpFixtures => run_dump(&catalog),
        Commands::Layout(args) => run_layout(args),
        Commands::ScaleDemo {
            output,
            bpm,
            ppq,
            note_length,
        } => run_scale_demo(&output, bpm, ppq, note_length),
        Commands::Inspect { input, hex } => run_inspect(&input, hex),
    }
}

fn load_config(path: Option<&Path>) -> AppConfig {
    match path {
        Some(path) => AppConfig::load_from_file(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => AppConfig::load(),
        None => AppConfig::default(),
    }
}

fn apply_detection_args(config: &mut AppConfig, args: &DetectionArgs) {
    let detection = &mut config.detection;
    if let Some(color) = &args.color {
        detection.color = color.clone();
    }
    if let Some(threshold) = args.threshold {
        detection.threshold = threshold;
    }
    if let Some(kernel) = args.kernel {
        detection.median_kernel = kernel;
    }
    if let Some(frames) = args.detection_frames {
        detection.detection_frames = frames;
    }
    if let Some(fps) = args.assumed_fps {
        detection.assumed_fps = fps;
    }
    if let Some(percent) = args.detection_height {
        detection.detection_height_percent = percent;
    }
}

fn apply_keyboard_args(config: &mut AppConfig, args: &KeyboardArgs) {
    let layout = &mut config.layout;
    if let Some(left) = args.keyboard_left {
        layout.keyboard_left = left;
    }
    if let Some(width) = args.keyboard_width {
        layout.keyboard_width = Some(width);
    }
    if let Some(reference) = args.reference_width {
        layout.reference_width = reference;
    }
    if !args.keys.is_empty() {
        layout.pitch_classes = args.keys.clone();
    }
}

fn run_transcribe(args: TranscribeArgs) -> Result<ExitCode> {
    let mut config = load_config(args.config.as_deref());
    apply_detection_args(&mut config, &args.detection);
    apply_keyboard_args(&mut config, &args.keyboard);
    if let Some(bpm) = args.bpm {
        config.midi.bpm = bpm;
    }
    if let Some(ppq) = args.ppq {
        config.midi.ticks_per_quarter = ppq;
    }
    if let Some(velocity) = args.velocity {
        config.midi.velocity = velocity;
    }
    if Rgb::parse_hex(&config.detection.color).is_none() {
        eprintln!(
            "Warning: detection color {:?} is not #rrggbb, using black",
            config.detection.color
        );
    }

    let keys = keyboard_for_frame(&config.layout, args.width);
    if keys.is_empty() {
        bail!("no keys selected by pitch classes {:?}", config.layout.pitch_classes);
    }

    let fps = args.fps.unwrap_or(config.detection.assumed_fps);
    let format = PixelFormat::from(args.pixel_format);
    let mut source: Box<dyn FrameSource> = if args.input.as_os_str() == "-" {
        Box::new(RawVideoSource::from_stdin(args.width, args.height, fps, format)?)
    } else {
        Box::new(
            RawVideoSource::from_path(&args.input, args.width, args.height, fps, format)
                .with_context(|| format!("opening {}", args.input.display()))?,
        )
    };

    let options = DetectionOptions::from_config(&config.detection).shared();
    let mut driver = FrameDriver::new(options, keys)
        .context("configuring detection session")?
        .with_midi_config(&config.midi);
    // The driver is stopped even when the run fails, so the notes collected
    // before the failure are still written out.
    let outcome = driver.run(&mut source);

    if args.events {
        for event in driver.recorder().events() {
            println!("{}", serde_json::to_string(event)?);
        }
    }

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(config.midi.output_file_name()));
    let written = driver.builder().write_to(&output).map_err(|err| {
        log_export_error(&err, "transcribe");
        anyhow::anyhow!("{} (code {})", err.message(), err.code())
    })?;

    let summary = outcome.map_err(|err| {
        log_detection_error(&err, "transcribe");
        anyhow::anyhow!(
            "transcribing {}: {} (partial MIDI with {} notes written to {})",
            args.input.display(),
            err,
            driver.notes().len(),
            output.display()
        )
    })?;

    let report = TranscribeReport {
        output: output.display().to_string(),
        midi_bytes: written,
        summary: &summary,
        notes: driver.notes(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_fixture(
    catalog: &FixtureCatalog,
    fixture: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let data = catalog.load(fixture, override_expect)?;
    let actual = FixtureProcessor::new()
        .run(&data)
        .with_context(|| format!("processing fixture {}", fixture))?;

    emit_report(&data.metadata.name, data.video.fps, &actual, output_path)?;

    if let Some(expectations) = data.expectations {
        match expectations.verify(&actual.notes) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn run_layout(args: LayoutArgs) -> Result<ExitCode> {
    if !(args.width.is_finite() && args.width > 0.0) {
        bail!("layout width must be positive (got {})", args.width);
    }
    let mut config = AppConfig::default();
    config.layout.reference_width = args.width;
    apply_keyboard_args(&mut config, &args.keyboard);

    let layout = &config.layout;
    let placed = layout.keyboard_width.is_some() || layout.keyboard_left != 0.0;
    let keys = if placed {
        keyboard_for_frame(layout, args.width.ceil() as u32)
    } else {
        filter_pitch_classes(
            generate_piano_layout(layout.reference_width),
            &layout.pitch_classes,
        )
    };

    println!("{}", serde_json::to_string_pretty(&keys)?);
    Ok(ExitCode::from(0))
}

fn run_scale_demo(output: &Path, bpm: f64, ppq: u16, note_length: f64) -> Result<ExitCode> {
    let bytes = build_scale_demo(bpm, ppq, note_length);
    fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "output": output.display().to_string(),
            "midi_bytes": bytes.len(),
            "hex": hex_preview(&bytes),
        }))?
    );
    Ok(ExitCode::from(0))
}

fn run_inspect(input: &Path, hex: bool) -> Result<ExitCode> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let summary = inspect(&bytes).map_err(|err| {
        log_export_error(&err, "inspect");
        anyhow::anyhow!("{} is not a valid MIDI file: {}", input.display(), err)
    })?;

    let mut json = serde_json::to_value(&summary)?;
    if hex {
        json["hex"] = serde_json::Value::String(hex_preview(&bytes));
    }
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(ExitCode::from(0))
}

fn emit_report(
    fixture: &str,
    fps: f64,
    run: &FixtureRun,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let report = FixtureReportPayload {
        fixture,
        fps,
        note_count: run.notes.len(),
        notes: &run.notes,
        summary: &run.summary,
        midi_bytes: run.midi_bytes,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct FixtureReportPayload<'a> {
    fixture: &'a str,
    fps: f64,
    note_count: usize,
    #[serde(skip_serializing_if = "slice_empty")]
    notes: &'a [NoteEvent],
    summary: &'a SessionSummary,
    midi_bytes: usize,
}

#[derive(Serialize)]
struct TranscribeReport<'a> {
    output: String,
    midi_bytes: usize,
    summary: &'a SessionSummary,
    notes: &'a [NoteEvent],
}

fn slice_empty(notes: &&[NoteEvent]) -> bool {
    notes.is_empty()
}
