use base64::Engine;
use image::ImageFormat;

/// An uploaded image that decoded successfully.
///
/// The encoded bytes are kept as uploaded so the predictor receives the
/// original file rather than a re-encoded copy.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Decode a `data:image/...;base64,` URI (or bare base64) into an image.
pub fn decode_data_uri(data: &str) -> Result<DecodedImage, ImageError> {
    let payload = match data.split_once(',') {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        Some(_) => return Err(ImageError::MalformedDataUri),
        None => data,
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ImageError::Empty);
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(ImageError::Base64)?;

    let format = image::guess_format(&bytes).map_err(ImageError::Decode)?;
    let decoded = image::load_from_memory_with_format(&bytes, format).map_err(ImageError::Decode)?;

    Ok(DecodedImage {
        width: decoded.width(),
        height: decoded.height(),
        format,
        bytes,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image payload is empty")]
    Empty,

    #[error("Malformed data URI")]
    MalformedDataUri,

    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unsupported or corrupt image: {0}")]
    Decode(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_base64(width: u32, height: u32) -> String {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        base64::engine::general_purpose::STANDARD.encode(buffer.into_inner())
    }

    #[test]
    fn test_decode_data_uri() {
        let uri = format!("data:image/png;base64,{}", png_base64(4, 3));
        let decoded = decode_data_uri(&uri).unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!((decoded.width, decoded.height), (4, 3));
        assert_eq!(decoded.mime_type(), "image/png");
    }

    #[test]
    fn test_decode_bare_base64() {
        let decoded = decode_data_uri(&png_base64(2, 2)).unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 2));
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(matches!(decode_data_uri("data:image/png;base64,"), Err(ImageError::Empty)));
        assert!(matches!(decode_data_uri("image/png,AAAA"), Err(ImageError::MalformedDataUri)));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@not-base64@@"),
            Err(ImageError::Base64(_))
        ));
        let text = base64::engine::general_purpose::STANDARD.encode(b"definitely not an image");
        assert!(matches!(
            decode_data_uri(&format!("data:image/png;base64,{text}")),
            Err(ImageError::Decode(_))
        ));
    }
}
