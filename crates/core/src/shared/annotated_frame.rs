/// A frame after corner marks have been drawn, re-encoded as JPEG.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    pub index: u32,
    pub encoded: Vec<u8>,
    pub region_count: usize,
}

impl AnnotatedFrame {
    pub fn new(index: u32, encoded: Vec<u8>, region_count: usize) -> Self {
        Self {
            index,
            encoded,
            region_count,
        }
    }
}
