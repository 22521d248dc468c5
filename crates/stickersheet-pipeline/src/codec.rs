//! The decode/encode boundary between encoded image bytes and
//! [`RasterImage`] buffers.
//!
//! The grid operations never see encoded data. Callers decode a sheet
//! once on the way in and encode stickers or sheets on the way out, via
//! a [`SheetCodec`]. [`PngCodec`] reads anything the `image` crate can
//! decode (PNG, JPEG, BMP, WebP) and always writes lossless RGBA PNG.

use image::ImageEncoder;

use crate::types::{PipelineError, RasterImage};

/// Converts between encoded image bytes and raster buffers.
pub trait SheetCodec {
    /// Decode `bytes` into an RGBA raster.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] or
    /// [`PipelineError::ImageDecode`] when no raster can be produced.
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, PipelineError>;

    /// Encode `image` into bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageEncode`] if encoding fails.
    fn encode(&self, image: &RasterImage) -> Result<Vec<u8>, PipelineError>;
}

/// Decodes any supported format, encodes PNG.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PngCodec;

impl SheetCodec for PngCodec {
    fn decode(&self, bytes: &[u8]) -> Result<RasterImage, PipelineError> {
        decode(bytes)
    }

    fn encode(&self, image: &RasterImage) -> Result<Vec<u8>, PipelineError> {
        encode_png(image)
    }
}

/// Decode raw image bytes into an RGBA raster.
///
/// Images without an alpha channel come back fully opaque.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RasterImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA raster as PNG bytes.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the PNG encoder rejects the
/// image (for example, a zero-sized buffer).
pub fn encode_png(image: &RasterImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| PipelineError::ImageEncode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
        assert!(result.unwrap_err().is_decode());
    }

    #[test]
    fn png_round_trip_preserves_alpha() {
        let img = RasterImage::from_fn(3, 2, |x, y| {
            image::Rgba([10, 20, 30, if (x + y) % 2 == 0 { 0 } else { 200 }])
        });
        let bytes = encode_png(&img).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn rgb_input_decodes_opaque() {
        let rgb = image::RgbImage::from_pixel(2, 2, image::Rgb([0, 255, 0]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        encoder
            .write_image(rgb.as_raw(), 2, 2, image::ExtendedColorType::Rgb8)
            .unwrap();

        let decoded = decode(&buf).unwrap();
        for pixel in decoded.pixels() {
            assert_eq!(pixel.0, [0, 255, 0, 255]);
        }
    }

    #[test]
    fn codec_trait_delegates() {
        let codec = PngCodec;
        let img = RasterImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 4]));
        let bytes = codec.encode(&img).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), img);
    }
}
