use crate::shared::frame::Frame;

/// Encodes an RGB frame as a baseline JPEG.
pub fn encode(frame: &Frame, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode(
        frame.data(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}

/// Decodes JPEG bytes into an RGB frame carrying `index`.
pub fn decode(bytes: &[u8], index: u32) -> Result<Frame, image::ImageError> {
    let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)?;
    Ok(Frame::from_image(img.into_rgb8(), index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_decode_keeps_dimensions_and_index() {
        let frame = Frame::new(vec![120u8; 33 * 17 * 3], 33, 17, 9);
        let bytes = encode(&frame, 90).unwrap();
        let back = decode(&bytes, 9).unwrap();
        assert_eq!((back.width(), back.height(), back.index()), (33, 17, 9));
        // Flat colour survives lossy coding within a small tolerance.
        assert!(back.data().iter().all(|&v| v.abs_diff(120) <= 3));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"definitely not a jpeg", 1).is_err());
    }
}
