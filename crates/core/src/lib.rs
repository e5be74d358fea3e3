pub mod annotation;
pub mod delivery;
pub mod detection;
pub mod pipeline;
pub mod shared;
pub mod video;
