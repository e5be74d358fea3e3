use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::Response;

use facemark_core::delivery::live_channel::LiveChannel;
use facemark_core::shared::job_id::JobId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ws_subscriber::stream_job;

/// `GET /live/{job_id}`: upgrades to a WebSocket bound to that job's
/// live channel.
///
/// A client that connects after the job has finished receives only the
/// final `done` or `error` message.
pub async fn live(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let channel = channel_for(&state, &job_id)?;
    Ok(ws.on_upgrade(move |socket| stream_job(socket, channel, job_id)))
}

fn channel_for(state: &AppState, job_id: &str) -> AppResult<Arc<LiveChannel>> {
    job_id
        .parse::<JobId>()
        .ok()
        .and_then(|id| state.live.get(&id))
        .ok_or_else(|| AppError::NotFound(format!("no live stream for job {job_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[test]
    fn test_registered_job_resolves_to_its_channel() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let id = JobId::new();
        let registered = state.live.register(id);

        let found = channel_for(&state, &id.to_string()).unwrap();
        assert!(Arc::ptr_eq(&registered, &found));
    }

    #[test]
    fn test_unknown_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        state.live.register(JobId::new());

        let err = channel_for(&state, &JobId::new().to_string()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(
            channel_for(&state, "../etc").unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
