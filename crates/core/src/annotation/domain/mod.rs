pub mod corner_mark;
pub mod frame_annotator;
