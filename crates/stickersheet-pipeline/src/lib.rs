//! stickersheet-pipeline: Pure sticker sheet processing (sans-IO).
//!
//! Turns one generated sheet (N poses on a flat chroma-key background)
//! into N transparent stickers, and lays any ordered set of stickers
//! back out as one sheet:
//!
//! decode -> chroma-key extraction -> grid slicing -> stickers
//!
//! stickers -> grid composition -> sheet -> encode
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and [`RasterImage`] buffers. All filesystem interaction
//! lives in `stickersheet-cli`.

pub mod chroma;
pub mod codec;
pub mod compose;
pub mod diagnostics;
pub mod pipeline;
pub mod slice;
pub mod types;

pub use chroma::{AlphaCoverage, ChromaKeyConfig, KeyThresholds, extract, extract_with};
pub use codec::{PngCodec, SheetCodec};
pub use compose::{compose, compose_slots};
pub use pipeline::Pipeline;
pub use slice::{ensure_complete, slice};
pub use types::{
    Dimensions, GridLayout, PipelineConfig, PipelineError, RasterImage, ShapeMismatch,
    StagedResult, StickerSlot,
};

/// Split an encoded sheet into transparent stickers.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration and
/// returns `config.layout.cell_count()` stickers in row-major order.
///
/// # Pipeline steps
///
/// 1. Validate the configuration
/// 2. Decode the sheet to RGBA
/// 3. Chroma-key extraction (aggressive or conservative thresholds)
/// 4. Grid slicing
/// 5. Completeness check against the layout's cell count
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for inconsistent thresholds.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Returns [`PipelineError::Dimension`] if the sheet does not divide evenly.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<Vec<StickerSlot>, PipelineError> {
    Ok(process_staged(image_bytes, config)?.into_slots())
}

/// Like [`process`], but keeps the decoded and keyed sheets as well.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .extract()
        .slice()?
        .into_result())
}
