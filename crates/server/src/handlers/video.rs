//! `POST /process-video`: accept an upload and run it as a batch or live job.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use facemark_core::pipeline::job_state::JobState;
use facemark_core::pipeline::video_job::{DeliveryMode, VideoJob};
use facemark_core::shared::constants::{MAX_FPS, OUTPUT_VIDEO_NAME, VIDEO_EXTENSIONS};
use facemark_core::shared::error::PipelineError;
use facemark_core::shared::job_id::JobId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const UPLOAD_FIELD: &str = "video";
const DEFAULT_UPLOAD_EXTENSION: &str = "mp4";

/// Options that may be given as query parameters instead of form fields.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessParams {
    pub fps: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LiveAccepted {
    pub message: &'static str,
    pub job_id: String,
    pub live_url: String,
}

struct Upload {
    file_name: Option<String>,
    data: Vec<u8>,
    fps: Option<String>,
    mode: Option<String>,
}

pub async fn process_video(
    State(state): State<AppState>,
    Query(params): Query<ProcessParams>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    let multipart = multipart.map_err(|e| {
        log::debug!("Rejected upload: {e}");
        PipelineError::UploadMissing
    })?;
    let upload = read_upload(multipart, params).await?;
    let fps = parse_fps(upload.fps.as_deref(), state.pipeline.fps)?;
    let mode = parse_mode(upload.mode.as_deref())?;

    let id = JobId::new();
    let source = state
        .config
        .uploads_dir
        .join(format!("{id}.{}", upload_extension(upload.file_name.as_deref())));
    log::info!(
        "Accepted job {id}: {} bytes, {} mode at {fps} fps",
        upload.data.len(),
        mode.as_str()
    );

    let job = VideoJob::new(
        id,
        source,
        state.config.output_dir.join(id.to_string()),
        fps,
        mode,
    )
    .with_owned_source(true);
    state.jobs.insert(id, mode);

    match mode {
        DeliveryMode::Batch => run_batch(state, job, upload.data).await,
        DeliveryMode::Live => Ok(start_live(state, job, upload.data).into_response()),
    }
}

/// Collects the upload and any form options. Form fields win over the query.
async fn read_upload(mut multipart: Multipart, params: ProcessParams) -> AppResult<Upload> {
    let mut upload = Upload {
        file_name: None,
        data: Vec::new(),
        fps: params.fps,
        mode: params.mode,
    };
    let mut found = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            UPLOAD_FIELD => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?
                    .to_vec();
                found = true;
            }
            "fps" | "mode" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if name == "fps" {
                    upload.fps = Some(text);
                } else {
                    upload.mode = Some(text);
                }
            }
            _ => {}
        }
    }

    if !found || upload.data.is_empty() {
        return Err(PipelineError::UploadMissing.into());
    }
    Ok(upload)
}

fn parse_fps(raw: Option<&str>, default: u32) -> AppResult<u32> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => match s.parse::<u32>() {
            Ok(fps) if (1..=MAX_FPS).contains(&fps) => Ok(fps),
            _ => Err(AppError::BadRequest(format!(
                "fps must be an integer between 1 and {MAX_FPS}, got '{s}'"
            ))),
        },
    }
}

fn parse_mode(raw: Option<&str>) -> AppResult<DeliveryMode> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DeliveryMode::default()),
        Some(s) => s.parse().map_err(AppError::BadRequest),
    }
}

/// Keeps the client's extension when it is a known video type so the
/// decoder can use it as a hint.
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .filter(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| DEFAULT_UPLOAD_EXTENSION.to_string())
}

/// Cancels the job when the request is dropped before the job finished,
/// e.g. because the client disconnected.
struct CancelOnDrop {
    id: JobId,
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl CancelOnDrop {
    fn new(id: JobId) -> Self {
        Self {
            id,
            flag: Arc::new(AtomicBool::new(false)),
            armed: true,
        }
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            log::info!("Request for job {} went away, cancelling it", self.id);
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Runs the job on the blocking pool and answers with the video.
async fn run_batch(state: AppState, job: VideoJob, upload: Vec<u8>) -> AppResult<Response> {
    let id = job.id();
    let guard = CancelOnDrop::new(id);
    let joined = state.spawn_job(job, upload, None, guard.flag()).await;
    guard.disarm();

    let video = joined
        .map_err(|e| AppError::Internal(format!("worker for job {id} stopped: {e}")))??
        .ok_or_else(|| AppError::Internal(format!("batch job {id} finished without a video")))?;

    let disposition = format!("attachment; filename=\"{OUTPUT_VIDEO_NAME}\"");
    Ok((
        [(CONTENT_TYPE, "video/mp4".to_string()), (CONTENT_DISPOSITION, disposition)],
        video,
    )
        .into_response())
}

/// Registers the live channel and runs the job in the background. The job
/// does not depend on the request and is never cancelled by it.
fn start_live(state: AppState, job: VideoJob, upload: Vec<u8>) -> (StatusCode, Json<LiveAccepted>) {
    let id = job.id();
    let channel = state.live.register(id);
    let worker = state.spawn_job(job, upload, Some(Arc::clone(&channel)), Arc::default());

    tokio::spawn(async move {
        // Failures inside the job were already reported to the subscriber.
        if let Err(e) = worker.await {
            log::error!("Worker for live job {id} stopped: {e}");
            state.jobs.set_state(id, JobState::Failed);
            state.jobs.set_error(id, e.to_string());
            channel.fail(e.to_string());
            state.forget_later(id);
        }
    });

    let accepted = LiveAccepted {
        message: "Processing started",
        job_id: id.to_string(),
        live_url: format!("/live/{id}"),
    };
    (StatusCode::ACCEPTED, Json(accepted))
}
