pub mod corner_mark_annotator;
