//! JPEG primitive adapter — the engine's only gateway to the imaging stack.
//!
//! Narrow byte-in/byte-out contract over the `image` crate: read dimensions,
//! produce an aspect-preserving scaled JPEG.  No other imaging calls are
//! permitted from the engine; keeping the surface this small pins the
//! library behind two functions that are trivial to swap or mock.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader};

use crate::error::{ImgfsError, Result};

/// JPEG quality used when re-encoding derived variants.
const JPEG_QUALITY: u8 = 85;

/// Extract `(width, height)` from a JPEG without decoding the pixel data.
pub fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    ImageReader::with_format(Cursor::new(bytes), ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|e| ImgfsError::ImgLib(e.to_string()))
}

/// Scale a JPEG so that it fits within `max_w` × `max_h`, preserving the
/// aspect ratio, and re-encode it as JPEG.
pub fn thumbnail(bytes: &[u8], max_w: u16, max_h: u16) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| ImgfsError::ImgLib(e.to_string()))?;

    let scaled = img.thumbnail(u32::from(max_w), u32::from(max_h)).to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&scaled)
        .map_err(|e| ImgfsError::ImgLib(e.to_string()))?;
    Ok(out)
}
