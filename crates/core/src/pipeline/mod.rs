pub mod frame_loop;
pub mod job_state;
pub mod pipeline_config;
pub mod pipeline_logger;
pub mod process_video_use_case;
pub mod video_job;
