mod settings;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use movie_writer_core::graphics::domain::flush_mode::FlushContext;
use movie_writer_core::graphics::domain::frame_source::FrameSource;
use movie_writer_core::graphics::infrastructure::image_sequence_source::ImageSequenceSource;
use movie_writer_core::graphics::infrastructure::test_pattern_source::TestPatternSource;
use movie_writer_core::movie::domain::movie_writer_registry::MovieWriterRegistry;
use movie_writer_core::movie::infrastructure::encoder_factory::FfmpegEncoderFactory;
use movie_writer_core::pipeline::record_movie_use_case::{ProgressFn, RecordMovieUseCase};
use movie_writer_core::shared::movie_params::MovieParams;

use settings::Settings;

/// Record test patterns and image sequences into movie files.
#[derive(Parser)]
#[command(name = "movie-writer")]
struct Cli {
    /// Settings file (default: the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a moving-bar test pattern.
    Pattern {
        #[command(flatten)]
        movie: MovieArgs,

        #[arg(long, default_value = "640")]
        width: u32,

        #[arg(long, default_value = "480")]
        height: u32,

        /// Number of frames to record.
        #[arg(long, default_value = "90")]
        frames: usize,

        /// Render rows bottom-up, as GL readback does.
        #[arg(long)]
        bottom_up: bool,
    },
    /// Record image files, or every image in a directory sorted by name.
    Images {
        /// Image files or a single directory.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        movie: MovieArgs,

        /// Movie width (default: width of the first image).
        #[arg(long)]
        width: Option<u32>,

        /// Movie height (default: height of the first image).
        #[arg(long)]
        height: Option<u32>,

        /// Stop after this many frames.
        #[arg(long)]
        max_frames: Option<usize>,
    },
    /// Print the effective settings as JSON.
    Config,
}

#[derive(Args)]
struct MovieArgs {
    /// Output movie file; repeat to record several movies at once.
    #[arg(short, long = "output", required = true)]
    outputs: Vec<PathBuf>,

    /// Playback frame rate.
    #[arg(long)]
    fps: Option<f64>,

    /// Encoder options, e.g. ":CodecType=libx264 Bitrate=4000 Keyframe=30".
    #[arg(long)]
    options: Option<String>,

    /// Duration of every frame, in frame intervals.
    #[arg(long)]
    frame_duration: Option<u32>,

    /// Wait for drawing to complete before each frame is added.
    /// `--sync-flush` alone means true; `--sync-flush=false` overrides the settings file.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    sync_flush: Option<bool>,

    /// Maximum number of simultaneously open movies.
    #[arg(long)]
    max_writers: Option<usize>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Pattern {
            movie,
            width,
            height,
            frames,
            bottom_up,
        } => {
            let source = TestPatternSource::new(frames).with_bottom_up(bottom_up);
            record(&settings, &movie, Box::new(source), (width, height), None)
        }
        Command::Images {
            inputs,
            movie,
            width,
            height,
            max_frames,
        } => {
            let source = open_image_source(&inputs)?;
            let (first_width, first_height) = source.first_image_size()?;
            let size = (
                width.unwrap_or(first_width),
                height.unwrap_or(first_height),
            );
            record(&settings, &movie, Box::new(source), size, max_frames)
        }
        Command::Config => {
            println!("{}", settings.to_json()?);
            Ok(())
        }
    }
}

fn record(
    settings: &Settings,
    movie: &MovieArgs,
    source: Box<dyn FrameSource>,
    (width, height): (u32, u32),
    max_frames: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let effective = effective_settings(settings, movie);
    validate(&effective)?;

    let mut registry = MovieWriterRegistry::with_capacity(
        Box::new(FfmpegEncoderFactory::new()),
        effective.max_writers,
    );
    let mut flush = FlushContext::default();
    let synchronous = flush.set_gl_synchronous(Some(effective.synchronous_flush));
    log::info!(
        "Recording {width}x{height} @ {} fps into {} movie(s), {} flush",
        effective.framerate,
        movie.outputs.len(),
        if synchronous { "synchronous" } else { "asynchronous" }
    );

    let params =
        MovieParams::new(width, height, effective.framerate).with_options(effective.options);
    let progress: ProgressFn = Box::new(|current, total| {
        if total > 0 {
            eprint!("\rRecording frame {current}/{total}");
        } else {
            eprint!("\rRecording frame {current}");
        }
        true
    });

    let result = RecordMovieUseCase::new(
        &mut registry,
        source,
        flush,
        effective.frame_duration,
        max_frames,
        Some(progress),
    )
    .execute(&movie.outputs, &params);
    eprintln!();
    registry.shutdown();

    let summary = result?;
    for (path, frames) in &summary.movies {
        log::info!("Wrote {frames} frames to {}", path.display());
    }
    Ok(())
}

/// Command-line flags override the settings file.
fn effective_settings(settings: &Settings, movie: &MovieArgs) -> Settings {
    Settings {
        max_writers: movie.max_writers.unwrap_or(settings.max_writers),
        framerate: movie.fps.unwrap_or(settings.framerate),
        options: movie
            .options
            .clone()
            .unwrap_or_else(|| settings.options.clone()),
        frame_duration: movie.frame_duration.unwrap_or(settings.frame_duration),
        synchronous_flush: movie.sync_flush.unwrap_or(settings.synchronous_flush),
    }
}

fn validate(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if !(settings.framerate.is_finite() && settings.framerate > 0.0) {
        return Err(format!("Frame rate must be positive, got {}", settings.framerate).into());
    }
    if settings.frame_duration == 0 {
        return Err("Frame duration must be at least 1".into());
    }
    if settings.max_writers == 0 {
        return Err("Max writers must be at least 1".into());
    }
    Ok(())
}

fn open_image_source(inputs: &[PathBuf]) -> Result<ImageSequenceSource, Box<dyn std::error::Error>> {
    match inputs {
        [dir] if dir.is_dir() => Ok(ImageSequenceSource::from_dir(dir)?),
        _ => {
            if let Some(missing) = inputs.iter().find(|p| !p.exists()) {
                return Err(format!("Input file not found: {}", missing.display()).into());
            }
            Ok(ImageSequenceSource::new(inputs.to_vec()))
        }
    }
}
