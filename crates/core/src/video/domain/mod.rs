pub mod fps_sampler;
pub mod frame_extractor;
pub mod frame_remuxer;
