use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use facemark_core::pipeline::pipeline_config::{PipelineConfig, RetentionPolicy};
use facemark_core::shared::constants::{BLAZEFACE_MODEL_NAME, MAX_FPS};
use facemark_core::shared::model_resolver::ModelSource;

/// HTTP front end for the facemark pipeline.
///
/// Every option can also be set through the environment variable shown in
/// `--help`.
#[derive(Parser, Debug, Clone)]
#[command(name = "facemark-server")]
pub struct ServerConfig {
    #[arg(long, env = "FACEMARK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "FACEMARK_PORT", default_value = "3000")]
    pub port: u16,

    /// Where uploaded videos are stored until their job ends.
    #[arg(long, env = "FACEMARK_UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Parent of the per-job working directories.
    #[arg(long, env = "FACEMARK_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Largest accepted upload, in megabytes.
    #[arg(long, env = "FACEMARK_MAX_UPLOAD_MB", default_value = "512")]
    pub max_upload_mb: usize,

    /// Frame rate used when a request does not name one.
    #[arg(long, env = "FACEMARK_FPS", default_value = "24")]
    pub fps: u32,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, env = "FACEMARK_CONFIDENCE", default_value = "0.5")]
    pub confidence: f32,

    /// Which frames to keep: all or detected.
    #[arg(long, env = "FACEMARK_RETENTION", default_value = "all")]
    pub retention: RetentionPolicy,

    /// Whether live jobs also write annotated frames to disk.
    #[arg(long, env = "FACEMARK_LIVE_PERSIST", default_value_t = true, action = ArgAction::Set)]
    pub live_persist: bool,

    /// JPEG quality of extracted and annotated frames (1-100).
    #[arg(long, env = "FACEMARK_JPEG_QUALITY", default_value = "90")]
    pub jpeg_quality: u8,

    /// Abort a stage that runs longer than this many seconds.
    #[arg(long, env = "FACEMARK_STAGE_TIMEOUT")]
    pub stage_timeout: Option<u64>,

    /// Seconds a live job waits for its WebSocket before the first frame.
    #[arg(long, env = "FACEMARK_LIVE_ATTACH_TIMEOUT", default_value = "5")]
    pub live_attach_timeout: u64,

    /// Seconds a finished job stays queryable (and joinable for its final
    /// live message) before it is forgotten.
    #[arg(long, env = "FACEMARK_FINISHED_JOB_TTL", default_value = "300")]
    pub finished_job_ttl: u64,

    /// Local BlazeFace ONNX model (skips the cache and download).
    #[arg(long, env = "FACEMARK_MODEL")]
    pub model: Option<PathBuf>,

    /// Where to download the model from on a cache miss.
    #[arg(long)]
    pub model_url: Option<String>,

    /// Keep the working directory of failed jobs for inspection.
    #[arg(long, env = "FACEMARK_KEEP_WORKDIR")]
    pub keep_workdir: bool,
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn finished_job_ttl(&self) -> Duration {
        Duration::from_secs(self.finished_job_ttl)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            fps: self.fps.max(1),
            confidence: self.confidence,
            retention: self.retention,
            live_persist: self.live_persist,
            jpeg_quality: self.jpeg_quality,
            stage_timeout: self.stage_timeout.map(Duration::from_secs),
            live_attach_timeout: Duration::from_secs(self.live_attach_timeout),
            keep_workdir: self.keep_workdir,
        }
    }

    /// The model source, with `FACEMARK_MODEL_URL` as the fallback URL.
    pub fn model_source(&self) -> ModelSource {
        ModelSource::named(BLAZEFACE_MODEL_NAME)
            .with_path(self.model.clone())
            .with_url(self.model_url.clone())
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_FPS).contains(&self.fps) {
            return Err(format!("FPS must be between 1 and {MAX_FPS}, got {}", self.fps));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "Confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        if self.stage_timeout == Some(0) {
            return Err("Stage timeout must be at least 1 second".into());
        }
        Ok(())
    }
}
