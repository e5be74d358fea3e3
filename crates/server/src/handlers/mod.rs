pub mod health;
pub mod jobs;
pub mod live;
pub mod video;
