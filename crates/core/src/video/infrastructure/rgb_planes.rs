//! Copies between tightly packed RGB24 buffers and strided ffmpeg frames.
use crate::shared::frame::{Frame, CHANNELS};

/// ffmpeg frames may pad each row (stride > width * 3); the padding is
/// stripped here.
pub fn packed_rgb_from(video: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = video.stride(0);
    let data = video.data(0);
    let row_len = width as usize * CHANNELS;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}

/// Allocates an RGB24 ffmpeg frame and copies `frame` into it row by row.
pub fn rgb_video_from(frame: &Frame) -> ffmpeg_next::util::frame::video::Video {
    let mut video = ffmpeg_next::util::frame::video::Video::new(
        ffmpeg_next::format::Pixel::RGB24,
        frame.width(),
        frame.height(),
    );
    let stride = video.stride(0);
    let row_len = frame.width() as usize * CHANNELS;
    let dst = video.data_mut(0);
    for (row, src) in frame.data().chunks_exact(row_len).enumerate() {
        let start = row * stride;
        dst[start..start + row_len].copy_from_slice(src);
    }
    video
}
