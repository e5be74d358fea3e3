use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use facemark_core::annotation::infrastructure::corner_mark_annotator::CornerMarkAnnotator;
use facemark_core::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceFactory;
use facemark_core::pipeline::pipeline_config::{PipelineConfig, RetentionPolicy};
use facemark_core::pipeline::pipeline_logger::LogPipelineLogger;
use facemark_core::pipeline::process_video_use_case::{JobOutcome, ProcessVideoUseCase};
use facemark_core::pipeline::video_job::{DeliveryMode, VideoJob};
use facemark_core::shared::constants::{BLAZEFACE_MODEL_NAME, MAX_FPS, VIDEO_EXTENSIONS};
use facemark_core::shared::job_id::JobId;
use facemark_core::shared::model_resolver::ModelSource;
use facemark_core::video::infrastructure::ffmpeg_frame_extractor::FfmpegFrameExtractor;
use facemark_core::video::infrastructure::ffmpeg_frame_remuxer::FfmpegFrameRemuxer;

/// Detect faces in a video and mark each one with yellow corner brackets.
#[derive(Parser)]
#[command(name = "facemark")]
struct Cli {
    /// Input video file.
    input: PathBuf,

    /// Output MP4 file.
    output: PathBuf,

    /// Frames per second to sample from the input.
    #[arg(long, default_value = "24")]
    fps: u32,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f32,

    /// Which frames to keep: all or detected.
    #[arg(long, default_value = "all")]
    retention: RetentionPolicy,

    /// Local BlazeFace ONNX model (skips the cache and download).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Where to download the model from on a cache miss.
    #[arg(long)]
    model_url: Option<String>,

    /// JPEG quality of extracted and annotated frames (1-100).
    #[arg(long, default_value = "90")]
    jpeg_quality: u8,

    /// Abort a stage that runs longer than this many seconds.
    #[arg(long)]
    stage_timeout: Option<u64>,

    /// Directory for intermediate frames (defaults to the system temp dir).
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Keep intermediate frames when the job fails.
    #[arg(long)]
    keep_workdir: bool,
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
    validate(&cli)?;

    log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
    let model_path = ModelSource::named(BLAZEFACE_MODEL_NAME)
        .with_path(cli.model.clone())
        .with_url(cli.model_url.clone())
        .resolve()?;

    let config = pipeline_config(&cli);
    let id = JobId::new();
    let working_dir = cli
        .workdir
        .clone()
        .unwrap_or_else(std::env::temp_dir)
        .join(format!("facemark-{id}"));
    let mut job = VideoJob::new(
        id,
        cli.input.clone(),
        working_dir,
        config.fps,
        DeliveryMode::Batch,
    );

    let detectors = Arc::new(OnnxBlazefaceFactory::new(model_path, config.confidence));
    let mut use_case = ProcessVideoUseCase::new(
        Box::new(FfmpegFrameExtractor::new(config.jpeg_quality)),
        detectors,
        Box::new(CornerMarkAnnotator::new(config.jpeg_quality)),
        Box::new(FfmpegFrameRemuxer),
        config,
    )
    .with_logger(Box::new(LogPipelineLogger::default()));

    let outcome = use_case.execute(&mut job)?;
    let result = match outcome {
        JobOutcome::Video(video) => deliver(&video, &cli.output),
        JobOutcome::Streamed { .. } => Err("batch job finished without a video".into()),
    };
    job.cleanup();
    result
}

fn pipeline_config(cli: &Cli) -> PipelineConfig {
    PipelineConfig {
        fps: cli.fps,
        confidence: cli.confidence,
        retention: cli.retention,
        jpeg_quality: cli.jpeg_quality,
        stage_timeout: cli.stage_timeout.map(Duration::from_secs),
        keep_workdir: cli.keep_workdir,
        ..PipelineConfig::default()
    }
}

fn deliver(video: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(video, output)?;
    log::info!("Output written to {}", output.display());
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.is_file() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !is_video(&cli.input) {
        log::warn!(
            "{} does not have a known video extension; trying anyway",
            cli.input.display()
        );
    }
    if !(1..=MAX_FPS).contains(&cli.fps) {
        return Err(format!("FPS must be between 1 and {MAX_FPS}, got {}", cli.fps).into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if !(1..=100).contains(&cli.jpeg_quality) {
        return Err(format!(
            "JPEG quality must be between 1 and 100, got {}",
            cli.jpeg_quality
        )
        .into());
    }
    if cli.stage_timeout == Some(0) {
        return Err("Stage timeout must be at least 1 second".into());
    }
    if let Some(model) = &cli.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    Ok(())
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("facemark").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_map_to_pipeline_config() {
        let cli = parse(&["in.mp4", "out.mp4"]);
        let config = pipeline_config(&cli);
        assert_eq!(config.fps, 24);
        assert_eq!(config.retention, RetentionPolicy::AllFrames);
        assert_eq!(config.jpeg_quality, 90);
        assert!(config.stage_timeout.is_none());
        assert!(!config.keep_workdir);
    }

    #[test]
    fn test_options_are_parsed() {
        let cli = parse(&[
            "in.mp4",
            "out.mp4",
            "--fps",
            "12",
            "--retention",
            "detected",
            "--stage-timeout",
            "30",
            "--keep-workdir",
        ]);
        let config = pipeline_config(&cli);
        assert_eq!(config.fps, 12);
        assert_eq!(config.retention, RetentionPolicy::DetectedOnly);
        assert_eq!(config.stage_timeout, Some(Duration::from_secs(30)));
        assert!(config.keep_workdir);
    }

    #[test]
    fn test_unknown_retention_is_rejected() {
        let result =
            Cli::try_parse_from(["facemark", "in.mp4", "out.mp4", "--retention", "some"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_input_fails_validation() {
        let cli = parse(&["/nonexistent/in.mp4", "out.mp4"]);
        let err = validate(&cli).unwrap_err();
        assert!(err.to_string().contains("Input file not found"));
    }

    #[test]
    fn test_fps_above_limit_fails_validation() {
        let input = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
        let err = validate(&parse(&[input, "out.mp4", "--fps", "500"])).unwrap_err();
        assert!(err.to_string().contains("between 1 and 120"));
        assert!(validate(&parse(&[input, "out.mp4", "--fps", "120"])).is_ok());
    }

    #[test]
    fn test_is_video() {
        assert!(is_video(Path::new("clip.MP4")));
        assert!(is_video(Path::new("clip.webm")));
        assert!(!is_video(Path::new("notes.txt")));
        assert!(!is_video(Path::new("noext")));
    }
}
