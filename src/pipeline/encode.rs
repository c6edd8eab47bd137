//! Image encoding: `DynamicImage` → base64 PNG data URI.
//!
//! Used when `embed_images` is requested: the image travels inside the
//! Markdown (and therefore inside the rendered HTML) instead of as a file
//! in the `images/` directory. PNG keeps the bytes lossless.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as `data:image/png;base64,...`.
pub fn data_uri(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded embedded image → {} bytes base64", b64.len());

    Ok(format!("data:image/png;base64,{b64}"))
}

/// Strip an optional `data:...;base64,` prefix from a payload.
///
/// Everything up to and including the first comma is dropped.
pub fn strip_data_uri_prefix(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    }
}

/// Decode a base64 payload, tolerating a data-URI prefix and embedded whitespace.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let raw: String = strip_data_uri_prefix(payload)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD.decode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let uri = data_uri(&img).expect("encode should succeed");
        let payload = uri.strip_prefix("data:image/png;base64,").expect("png data uri");
        let decoded = STANDARD.decode(payload).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn decode_plain_and_prefixed() {
        assert_eq!(decode_base64("JVBERi0=").unwrap(), b"%PDF-");
        assert_eq!(
            decode_base64("data:application/pdf;base64,JVBERi0=").unwrap(),
            b"%PDF-"
        );
        assert_eq!(decode_base64("JVBE\nRi0=").unwrap(), b"%PDF-");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_base64("not base64 at all!").is_err());
    }
}
