use std::path::{Path, PathBuf};

use crate::shared::constants::DEFAULT_JPEG_QUALITY;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::frame_name::frame_path;
use crate::shared::jpeg;
use crate::shared::stage_control::StageControl;
use crate::video::domain::fps_sampler::FpsSampler;
use crate::video::domain::frame_extractor::FrameExtractor;

use super::rgb_planes::packed_rgb_from;

const STAGE: &str = "extraction";

/// Decodes the source with ffmpeg-next and writes JPEG stills at a fixed
/// rate, duplicating or dropping source frames like ffmpeg's `fps` filter.
pub struct FfmpegFrameExtractor {
    jpeg_quality: u8,
}

impl FfmpegFrameExtractor {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }
}

impl Default for FfmpegFrameExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameExtractor for FfmpegFrameExtractor {
    fn extract(
        &self,
        source: &Path,
        frames_dir: &Path,
        fps: u32,
        control: &StageControl,
    ) -> Result<PathBuf, PipelineError> {
        std::fs::create_dir_all(frames_dir).map_err(|e| {
            PipelineError::Extraction(format!("cannot create {}: {e}", frames_dir.display()))
        })?;

        let written = self.decode_into(source, frames_dir, fps, control)?;
        if written == 0 {
            return Err(PipelineError::Extraction(format!(
                "no frames decoded from {}",
                source.display()
            )));
        }
        log::debug!("Extracted {written} frames at {fps} fps from {}", source.display());
        Ok(frames_dir.to_path_buf())
    }
}

impl FfmpegFrameExtractor {
    fn decode_into(
        &self,
        source: &Path,
        frames_dir: &Path,
        fps: u32,
        control: &StageControl,
    ) -> Result<u32, PipelineError> {
        ffmpeg_next::init().map_err(extraction)?;
        let mut ictx = ffmpeg_next::format::input(source).map_err(extraction)?;

        let (stream_index, time_base, frame_duration, mut decoder) = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or_else(|| {
                    PipelineError::Extraction(format!("no video stream in {}", source.display()))
                })?;
            let codec_ctx =
                ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                    .map_err(extraction)?;
            let decoder = codec_ctx.decoder().video().map_err(extraction)?;
            (
                stream.index(),
                f64::from(stream.time_base()),
                source_frame_duration(stream.avg_frame_rate(), fps),
                decoder,
            )
        };

        let (width, height) = (decoder.width(), decoder.height());
        if width == 0 || height == 0 {
            return Err(PipelineError::Extraction(format!(
                "video stream in {} has no dimensions",
                source.display()
            )));
        }
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(extraction)?;

        let mut sink = StillSink {
            sampler: FpsSampler::new(fps),
            scaler,
            width,
            height,
            time_base,
            frame_duration,
            origin: None,
            last_time: None,
            frames_dir,
            jpeg_quality: self.jpeg_quality,
            control,
            written: 0,
        };

        for (stream, packet) in ictx.packets() {
            control.check(STAGE)?;
            if stream.index() != stream_index {
                continue;
            }
            decoder.send_packet(&packet).map_err(|e| {
                PipelineError::Extraction(format!("cannot decode {}: {e}", source.display()))
            })?;
            sink.drain(&mut decoder)?;
        }

        control.check(STAGE)?;
        decoder.send_eof().map_err(extraction)?;
        sink.drain(&mut decoder)?;
        sink.finish()
    }
}

/// Receives decoded frames, resamples them and writes the stills.
struct StillSink<'a> {
    sampler: FpsSampler<Frame>,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    time_base: f64,
    frame_duration: f64,
    origin: Option<f64>,
    last_time: Option<f64>,
    frames_dir: &'a Path,
    jpeg_quality: u8,
    control: &'a StageControl,
    written: u32,
}

impl StillSink<'_> {
    fn drain(&mut self, decoder: &mut ffmpeg_next::decoder::Video) -> Result<(), PipelineError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let time = self.presentation_time(decoded.timestamp().or(decoded.pts()));

            let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
            self.scaler.run(&decoded, &mut rgb).map_err(extraction)?;
            let frame = Frame::new(
                packed_rgb_from(&rgb, self.width, self.height),
                self.width,
                self.height,
                0,
            );

            if let Some((prev, copies)) = self.sampler.push(time, frame) {
                self.write(&prev, copies)?;
            }
        }
        Ok(())
    }

    /// Seconds since the first decoded frame. Frames without a timestamp
    /// are placed one source frame after their predecessor.
    fn presentation_time(&mut self, ts: Option<i64>) -> f64 {
        let absolute = match (ts, self.last_time) {
            (Some(ts), _) => ts as f64 * self.time_base,
            (None, Some(last)) => self.origin.unwrap_or(0.0) + last + self.frame_duration,
            (None, None) => 0.0,
        };
        let origin = *self.origin.get_or_insert(absolute);
        let time = (absolute - origin).max(0.0);
        self.last_time = Some(time);
        time
    }

    fn write(&mut self, frame: &Frame, copies: u64) -> Result<(), PipelineError> {
        if copies == 0 {
            return Ok(());
        }
        let bytes = jpeg::encode(frame, self.jpeg_quality).map_err(extraction)?;
        write_copies(self.frames_dir, &mut self.written, &bytes, copies, self.control)
    }

    fn finish(mut self) -> Result<u32, PipelineError> {
        let end = self.last_time.unwrap_or(0.0) + self.frame_duration;
        if let Some((last, copies)) = self.sampler.finish(end) {
            self.write(&last, copies)?;
        }
        Ok(self.written)
    }
}

/// Writes `copies` stills of `bytes`, numbering on from `*written`.
/// Checks the stage control before each file.
fn write_copies(
    frames_dir: &Path,
    written: &mut u32,
    bytes: &[u8],
    copies: u64,
    control: &StageControl,
) -> Result<(), PipelineError> {
    for _ in 0..copies {
        control.check(STAGE)?;
        *written += 1;
        let path = frame_path(frames_dir, *written);
        std::fs::write(&path, bytes).map_err(|e| {
            PipelineError::Extraction(format!("cannot write {}: {e}", path.display()))
        })?;
    }
    Ok(())
}

/// Duration of one source frame, falling back to one output frame when the
/// container does not report a usable average rate.
fn source_frame_duration(rate: ffmpeg_next::Rational, target_fps: u32) -> f64 {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        f64::from(rate.denominator()) / f64::from(rate.numerator())
    } else {
        1.0 / f64::from(target_fps.max(1))
    }
}

fn extraction(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Extraction(e.to_string())
}
