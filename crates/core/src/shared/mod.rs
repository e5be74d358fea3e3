pub mod annotated_frame;
pub mod constants;
pub mod error;
pub mod face_region;
pub mod frame;
pub mod frame_name;
pub mod job_id;
pub mod jpeg;
pub mod model_resolver;
pub mod stage_control;
