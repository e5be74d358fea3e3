pub mod ffmpeg_frame_extractor;
pub mod ffmpeg_frame_remuxer;
mod rgb_planes;
