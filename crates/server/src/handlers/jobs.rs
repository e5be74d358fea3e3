use axum::extract::{Path, State};
use axum::Json;

use facemark_core::shared::job_id::JobId;

use crate::error::{AppError, AppResult};
use crate::job_registry::JobStatus;
use crate::state::AppState;

/// `GET /jobs/{job_id}`: lifecycle state and progress of a known job.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobStatus>> {
    job_id
        .parse::<JobId>()
        .ok()
        .and_then(|id| state.jobs.status(id))
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("unknown job {job_id}")))
}
