use std::path::{Path, PathBuf};

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::frame_name::list_frames;
use crate::shared::jpeg;
use crate::shared::stage_control::StageControl;
use crate::video::domain::frame_remuxer::FrameRemuxer;

use super::rgb_planes::rgb_video_from;

const STAGE: &str = "remux";

/// Encodes numbered JPEG stills into an MPEG-4 Part 2 / YUV420P MP4 with
/// ffmpeg-next.
///
/// Output dimensions come from the first still, rounded down to even values
/// as 4:2:0 chroma subsampling requires. Stills of any other size are
/// resized to match.
#[derive(Default)]
pub struct FfmpegFrameRemuxer;

impl FrameRemuxer for FfmpegFrameRemuxer {
    fn remux(
        &self,
        frames_dir: &Path,
        output_path: &Path,
        fps: u32,
        control: &StageControl,
    ) -> Result<PathBuf, PipelineError> {
        let frames = match list_frames(frames_dir) {
            Ok(frames) => frames,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(PipelineError::io(frames_dir, e)),
        };
        if frames.is_empty() {
            return Err(PipelineError::NoFrames(frames_dir.to_path_buf()));
        }

        if let Err(e) = encode_stills(&frames, output_path, fps.max(1), control) {
            if output_path.exists() {
                if let Err(rm) = std::fs::remove_file(output_path) {
                    log::warn!("Failed to remove partial {}: {rm}", output_path.display());
                }
            }
            return Err(e);
        }
        log::debug!(
            "Remuxed {} frames at {fps} fps into {}",
            frames.len(),
            output_path.display()
        );
        Ok(output_path.to_path_buf())
    }
}

fn encode_stills(
    frames: &[(u32, PathBuf)],
    output_path: &Path,
    fps: u32,
    control: &StageControl,
) -> Result<(), PipelineError> {
    let mut encoder: Option<Mp4Encoder> = None;

    for (index, path) in frames {
        control.check(STAGE)?;
        let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        let frame = jpeg::decode(&bytes, *index)
            .map_err(|e| PipelineError::Remux(format!("cannot decode {}: {e}", path.display())))?;

        let encoder = match encoder.as_mut() {
            Some(encoder) => encoder,
            None => encoder.insert(Mp4Encoder::open(
                output_path,
                frame.width() & !1,
                frame.height() & !1,
                fps,
            )?),
        };
        encoder.write(&fit(frame, encoder.width, encoder.height))?;
    }

    match encoder {
        Some(encoder) => encoder.finish(),
        None => Ok(()),
    }
}

/// Resizes `frame` to `width`×`height` when it differs.
fn fit(frame: Frame, width: u32, height: u32) -> Frame {
    if frame.width() == width && frame.height() == height {
        return frame;
    }
    let index = frame.index();
    let (src_w, src_h) = (frame.width(), frame.height());
    match frame.into_image() {
        Some(img) => Frame::from_image(
            image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle),
            index,
        ),
        None => {
            log::warn!("Frame {index} buffer does not match {src_w}x{src_h}; writing black");
            Frame::new(vec![0; width as usize * height as usize * 3], width, height, index)
        }
    }
}

struct Mp4Encoder {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    time_base: ffmpeg_next::Rational,
    next_pts: i64,
}

impl Mp4Encoder {
    fn open(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::Remux(format!(
                "frame size {width}x{height} cannot be encoded"
            )));
        }
        ffmpeg_next::init().map_err(remux)?;

        let mut octx = ffmpeg_next::format::output(path).map_err(remux)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or_else(|| PipelineError::Remux("MPEG4 encoder not found".into()))?;
        let mut ost = octx.add_stream(Some(codec)).map_err(remux)?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(remux)?;

        let rate = i32::try_from(fps)
            .map_err(|_| PipelineError::Remux(format!("frame rate {fps} is out of range")))?;
        let time_base = ffmpeg_next::Rational(1, rate);
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(rate, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .map_err(remux)?;
        ost.set_parameters(&encoder);
        octx.write_header().map_err(remux)?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(remux)?;

        Ok(Self {
            octx,
            encoder,
            scaler,
            width,
            height,
            time_base,
            next_pts: 0,
        })
    }

    fn write(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        let rgb = rgb_video_from(frame);
        let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&rgb, &mut yuv).map_err(remux)?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder.send_frame(&yuv).map_err(remux)?;
        self.write_packets()
    }

    fn finish(mut self) -> Result<(), PipelineError> {
        self.encoder.send_eof().map_err(remux)?;
        self.write_packets()?;
        self.octx.write_trailer().map_err(remux)
    }

    fn write_packets(&mut self) -> Result<(), PipelineError> {
        let ost_time_base = self
            .octx
            .stream(0)
            .ok_or_else(|| PipelineError::Remux("output stream missing".into()))?
            .time_base();
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(self.time_base, ost_time_base);
            encoded.write_interleaved(&mut self.octx).map_err(remux)?;
        }
        Ok(())
    }
}

fn remux(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Remux(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame_name::frame_path;

    fn write_still(dir: &Path, index: u32, w: u32, h: u32) {
        let shade = ((index * 7) % 256) as u8;
        let frame = Frame::new(vec![shade; (w * h * 3) as usize], w, h, index);
        std::fs::write(frame_path(dir, index), jpeg::encode(&frame, 90).unwrap()).unwrap();
    }

    fn probe(path: &Path) -> (f64, ffmpeg_next::format::Pixel, u32, u32) {
        ffmpeg_next::init().unwrap();
        let ictx = ffmpeg_next::format::input(path).unwrap();
        let stream = ictx.streams().best(ffmpeg_next::media::Type::Video).unwrap();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .unwrap()
            .decoder()
            .video()
            .unwrap();
        let duration = ictx.duration() as f64 / 1_000_000.0;
        (duration, decoder.format(), decoder.width(), decoder.height())
    }

    #[test]
    fn test_48_frames_at_24_fps_is_two_seconds_yuv420p() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("processed_frames");
        std::fs::create_dir(&frames).unwrap();
        for i in 1..=48 {
            write_still(&frames, i, 64, 48);
        }
        let out = dir.path().join("processed_video.mp4");

        let written = FfmpegFrameRemuxer
            .remux(&frames, &out, 24, &StageControl::new())
            .unwrap();
        assert_eq!(written, out);

        let (duration, format, w, h) = probe(&out);
        assert!((duration - 2.0).abs() < 0.1, "duration {duration}");
        assert_eq!(format, ffmpeg_next::format::Pixel::YUV420P);
        assert_eq!((w, h), (64, 48));
    }

    #[test]
    fn test_empty_directory_is_no_frames_and_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("processed_frames");
        std::fs::create_dir(&frames).unwrap();
        std::fs::write(frames.join("notes.txt"), b"not a frame").unwrap();
        let out = dir.path().join("processed_video.mp4");

        let err = FfmpegFrameRemuxer
            .remux(&frames, &out, 24, &StageControl::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoFrames(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_directory_is_no_frames() {
        let dir = tempfile::tempdir().unwrap();
        let err = FfmpegFrameRemuxer
            .remux(
                &dir.path().join("absent"),
                &dir.path().join("out.mp4"),
                24,
                &StageControl::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoFrames(_)));
    }

    #[test]
    fn test_index_gaps_and_odd_sizes_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("processed_frames");
        std::fs::create_dir(&frames).unwrap();
        write_still(&frames, 2, 65, 49);
        write_still(&frames, 5, 80, 60);
        write_still(&frames, 11, 65, 49);
        let out = dir.path().join("out.mp4");

        FfmpegFrameRemuxer
            .remux(&frames, &out, 24, &StageControl::new())
            .unwrap();
        let (_, _, w, h) = probe(&out);
        assert_eq!((w, h), (64, 48));
    }

    #[test]
    fn test_undecodable_still_is_remux_error_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("processed_frames");
        std::fs::create_dir(&frames).unwrap();
        write_still(&frames, 1, 64, 48);
        std::fs::write(frame_path(&frames, 2), b"garbage").unwrap();
        let out = dir.path().join("out.mp4");

        let err = FfmpegFrameRemuxer
            .remux(&frames, &out, 24, &StageControl::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Remux(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_cancelled_remux_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("processed_frames");
        std::fs::create_dir(&frames).unwrap();
        write_still(&frames, 1, 64, 48);
        let out = dir.path().join("out.mp4");
        let control = StageControl::new();
        control.cancel();

        let err = FfmpegFrameRemuxer.remux(&frames, &out, 24, &control).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { stage: "remux" }));
        assert!(!out.exists());
    }

    #[test]
    fn test_fit_resizes_only_when_needed() {
        let frame = Frame::new(vec![9; 10 * 10 * 3], 10, 10, 4);
        let same = fit(frame.clone(), 10, 10);
        assert_eq!(same.data(), frame.data());

        let resized = fit(frame, 6, 4);
        assert_eq!((resized.width(), resized.height(), resized.index()), (6, 4, 4));
    }
}
