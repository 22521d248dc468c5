//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use stickersheet_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .extract()
//!     .slice()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for fallible stages), carrying all earlier intermediates.

use crate::chroma::{self, AlphaCoverage};
use crate::types::{
    Dimensions, GridLayout, PipelineConfig, PipelineError, RasterImage, StagedResult, StickerSlot,
};

/// Entry point for the staged pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline over encoded sheet bytes.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(source: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending { config, source }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "advance the pipeline with .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the configuration, decode the sheet, and advance to
    /// [`Decoded`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for inconsistent key
    /// thresholds, [`PipelineError::EmptyInput`] for empty bytes, and
    /// [`PipelineError::ImageDecode`] for undecodable data.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let source_len = self.source.len();
        let original = crate::codec::decode(&self.source)?;
        log::debug!(
            "decoded {source_len} bytes into a {} sheet",
            Dimensions::of(&original)
        );
        Ok(Decoded {
            config: self.config,
            original,
            source_len,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the sheet.
#[must_use = "advance the pipeline with .extract() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    original: RasterImage,
    source_len: usize,
}

impl Decoded {
    /// The decoded sheet.
    #[must_use]
    pub const fn original(&self) -> &RasterImage {
        &self.original
    }

    /// Size of the encoded input in bytes.
    #[must_use]
    pub const fn source_len(&self) -> usize {
        self.source_len
    }

    /// Remove the key background and advance to [`Extracted`].
    pub fn extract(self) -> Extracted {
        let keyed = chroma::extract_with(&self.original, &self.config.chroma, self.config.aggressive);
        let coverage = chroma::alpha_coverage(&keyed);
        let key_found = keyed != self.original;
        if !key_found {
            log::warn!("no key-colored pixels found; sheet left unchanged");
        }
        Extracted {
            config: self.config,
            original: self.original,
            keyed,
            coverage,
            key_found,
        }
    }
}

// ───────────────────────── Stage 2: Extracted ────────────────────────

/// Pipeline state after chroma-key extraction.
#[must_use = "advance the pipeline with .slice() to continue"]
pub struct Extracted {
    config: PipelineConfig,
    original: RasterImage,
    keyed: RasterImage,
    coverage: AlphaCoverage,
    key_found: bool,
}

impl Extracted {
    /// The keyed sheet.
    #[must_use]
    pub const fn keyed(&self) -> &RasterImage {
        &self.keyed
    }

    /// Alpha class counts of the keyed sheet.
    #[must_use]
    pub const fn coverage(&self) -> AlphaCoverage {
        self.coverage
    }

    /// Whether extraction changed any pixel of the sheet.
    #[must_use]
    pub const fn key_found(&self) -> bool {
        self.key_found
    }

    /// Cut the keyed sheet into stickers and advance to [`Sliced`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Dimension`] if the sheet does not divide
    /// evenly by the configured layout, and
    /// [`PipelineError::IncompleteSheet`] if fewer stickers than cells
    /// were produced.
    pub fn slice(self) -> Result<Sliced, PipelineError> {
        let layout = self.config.layout;
        let slots = crate::slice::slice(&self.keyed, layout)?;
        crate::slice::ensure_complete(&slots, layout.cell_count())?;
        Ok(Sliced {
            layout,
            original: self.original,
            keyed: self.keyed,
            slots,
        })
    }
}

// ───────────────────────── Stage 3: Sliced ───────────────────────────

/// Final pipeline state: the sheet has been cut into stickers.
#[must_use = "call .into_result() or .into_slots() to take the stickers"]
pub struct Sliced {
    layout: GridLayout,
    original: RasterImage,
    keyed: RasterImage,
    slots: Vec<StickerSlot>,
}

impl Sliced {
    /// The stickers in row-major order.
    #[must_use]
    pub fn slots(&self) -> &[StickerSlot] {
        &self.slots
    }

    /// Consume the pipeline, keeping only the stickers.
    #[must_use]
    pub fn into_slots(self) -> Vec<StickerSlot> {
        self.slots
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = Dimensions::of(&self.original);
        StagedResult {
            original: self.original,
            keyed: self.keyed,
            slots: self.slots,
            layout: self.layout,
            dimensions,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::chroma::KeyThresholds;

    fn green_sheet_png(width: u32, height: u32) -> Vec<u8> {
        let img = RasterImage::from_fn(width, height, |x, y| {
            if x % 4 == 1 && y % 4 == 1 {
                image::Rgba([220, 40, 40, 255])
            } else {
                image::Rgba([0, 255, 0, 255])
            }
        });
        crate::codec::encode_png(&img).unwrap()
    }

    #[test]
    fn stages_advance_to_sliced() {
        let png = green_sheet_png(16, 16);
        let decoded = Pipeline::new(png.clone(), PipelineConfig::default())
            .decode()
            .unwrap();
        assert_eq!(decoded.source_len(), png.len());
        assert_eq!(decoded.original().dimensions(), (16, 16));

        let extracted = decoded.extract();
        assert_eq!(extracted.coverage().transparent, 16 * 16 - 16);
        assert_eq!(extracted.coverage().opaque, 16);

        let sliced = extracted.slice().unwrap();
        assert_eq!(sliced.slots().len(), 16);
        for slot in sliced.slots() {
            assert_eq!(slot.image.get_pixel(1, 1).0, [220, 40, 40, 255]);
            assert_eq!(slot.image.get_pixel(0, 0).0, [0, 0, 0, 0]);
        }
    }

    #[test]
    fn into_result_keeps_intermediates() {
        let staged = Pipeline::new(green_sheet_png(8, 8), PipelineConfig::default())
            .decode()
            .unwrap()
            .extract()
            .slice()
            .unwrap()
            .into_result();
        assert_eq!(staged.dimensions, Dimensions::new(8, 8));
        assert_eq!(staged.original.get_pixel(0, 0).0, [0, 255, 0, 255]);
        assert_eq!(staged.keyed.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(staged.layout, GridLayout::REFERENCE);
        assert_eq!(staged.into_slots().len(), 16);
    }

    #[test]
    fn key_found_on_green_sheet() {
        let extracted = Pipeline::new(green_sheet_png(8, 8), PipelineConfig::default())
            .decode()
            .unwrap()
            .extract();
        assert!(extracted.key_found());
    }

    #[test]
    fn key_not_found_on_soft_edged_sheet_without_key() {
        let img = RasterImage::from_fn(8, 8, |x, y| {
            image::Rgba([250, 200, 40, [0, 90, 180, 255][((x + y) % 4) as usize]])
        });
        let png = crate::codec::encode_png(&img).unwrap();
        let extracted = Pipeline::new(png, PipelineConfig::default())
            .decode()
            .unwrap()
            .extract();
        assert!(extracted.coverage().partial > 0);
        assert!(!extracted.key_found());
        assert_eq!(extracted.keyed(), &img);
    }

    #[test]
    fn invalid_config_fails_before_decode() {
        let config = PipelineConfig {
            chroma: crate::chroma::ChromaKeyConfig {
                aggressive: KeyThresholds {
                    inner: 10.0,
                    outer: 5.0,
                },
                ..crate::chroma::ChromaKeyConfig::default()
            },
            ..PipelineConfig::default()
        };
        // Empty source would fail decode; config is checked first.
        let result = Pipeline::new(Vec::new(), config).decode();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn indivisible_sheet_fails_at_slice() {
        let result = Pipeline::new(green_sheet_png(10, 8), PipelineConfig::default())
            .decode()
            .unwrap()
            .extract()
            .slice();
        assert!(matches!(result, Err(PipelineError::Dimension { .. })));
    }
}
