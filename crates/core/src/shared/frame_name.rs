use std::path::{Path, PathBuf};

use crate::shared::constants::{FRAME_EXTENSION, FRAME_INDEX_WIDTH, FRAME_PREFIX};

/// `frame-0007.jpg` for index 7.
pub fn frame_file_name(index: u32) -> String {
    format!(
        "{FRAME_PREFIX}{index:0width$}.{FRAME_EXTENSION}",
        width = FRAME_INDEX_WIDTH
    )
}

pub fn frame_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(frame_file_name(index))
}

/// Parses the sequence index out of a frame file name.
///
/// Accepts wider numbers than the padding (`frame-12345.jpg`) so long
/// videos keep sorting correctly. Anything else is not a frame file.
pub fn parse_frame_index(name: &str) -> Option<u32> {
    let digits = name
        .strip_prefix(FRAME_PREFIX)?
        .strip_suffix(FRAME_EXTENSION)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Lists frame files in `dir` ordered by numeric index.
pub fn list_frames(dir: &Path) -> std::io::Result<Vec<(u32, PathBuf)>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if let Some(index) = name.to_str().and_then(parse_frame_index) {
            frames.push((index, entry.path()));
        }
    }
    frames.sort_by_key(|(index, _)| *index);
    Ok(frames)
}
