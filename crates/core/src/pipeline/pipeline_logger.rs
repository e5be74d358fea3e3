use std::collections::BTreeMap;
use std::time::Instant;

use crate::shared::job_id::JobId;

use super::job_state::JobState;

/// Observer for pipeline orchestration events.
///
/// Lets the CLI and the server watch a job (progress, stage timings,
/// state changes) without the orchestrator knowing where the output goes.
pub trait PipelineLogger: Send {
    /// Frames handled so far out of `total`.
    fn progress(&mut self, current: usize, total: usize);

    /// How long a named stage took, per frame or per job stage.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A point-in-time measurement, e.g. regions found in a frame.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// A job moved between lifecycle states.
    fn state(&mut self, job: JobId, from: JobState, to: JobState) {
        self.info(&format!("Job {job}: {from} -> {to}"));
    }

    /// End-of-job report. Default: nothing.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _: usize, _: usize) {}
    fn timing(&mut self, _: &str, _: f64) {}
    fn metric(&mut self, _: &str, _: f64) {}
    fn info(&mut self, _: &str) {}
    fn state(&mut self, _: JobId, _: JobState, _: JobState) {}
}

/// Running count, sum and extremes of one series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesStats {
    fn first(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

fn record(series: &mut BTreeMap<String, SeriesStats>, name: &str, value: f64) {
    match series.get_mut(name) {
        Some(stats) => stats.add(value),
        None => {
            series.insert(name.to_string(), SeriesStats::first(value));
        }
    }
}

/// Sends events to the `log` facade and keeps per-stage statistics for the
/// end-of-job summary.
///
/// Progress lines are emitted every `every` frames and on the last frame.
pub struct LogPipelineLogger {
    every: usize,
    started: Instant,
    frames: usize,
    timings: BTreeMap<String, SeriesStats>,
    metrics: BTreeMap<String, SeriesStats>,
}

impl LogPipelineLogger {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            started: Instant::now(),
            frames: 0,
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn timing_stats(&self, stage: &str) -> Option<SeriesStats> {
        self.timings.get(stage).copied()
    }

    pub fn metric_stats(&self, name: &str) -> Option<SeriesStats> {
        self.metrics.get(name).copied()
    }

    /// The summary text, or `None` before anything was recorded.
    pub fn summary_text(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let wall_s = self.started.elapsed().as_secs_f64();
        let mut out = format!("Job summary ({} frames in {wall_s:.1}s)", self.frames);
        for (stage, s) in &self.timings {
            let share = if wall_s > 0.0 {
                s.sum / (wall_s * 10.0)
            } else {
                0.0
            };
            out.push_str(&format!(
                "\n  {stage:<10} n={:<5} mean {:7.2}ms  max {:7.2}ms  {share:5.1}% of wall",
                s.count,
                s.mean(),
                s.max
            ));
        }
        for (name, s) in &self.metrics {
            out.push_str(&format!(
                "\n  {name:<10} mean {:.2}  range {}..{}",
                s.mean(),
                s.min,
                s.max
            ));
        }
        if self.frames > 0 && wall_s > 0.0 {
            out.push_str(&format!("\n  {:.1} frames/s", self.frames as f64 / wall_s));
        }
        Some(out)
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(24)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames = total;
        if total == 0 || (current % self.every != 0 && current != total) {
            return;
        }
        log::info!(
            "Frame {current}/{total} ({:.0}%)",
            current as f64 * 100.0 / total as f64
        );
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_text() {
            log::info!("{text}");
        }
    }
}
