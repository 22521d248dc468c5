//! Shared types for the sticker sheet pipeline.

use serde::{Deserialize, Serialize};

use crate::chroma::ChromaKeyConfig;

/// Re-export `RgbaImage` so downstream crates can reference raster
/// data without depending on `image` directly.
pub use image::RgbaImage;

/// An owned RGBA8 pixel buffer.
///
/// The buffer length is always `width * height * 4`; `image` enforces
/// this at construction (`RgbaImage::from_raw` returns `None` otherwise).
pub type RasterImage = RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new dimensions pair.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an existing image.
    #[must_use]
    pub fn of(image: &RasterImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Logical grid of a sticker sheet: how many cells across and down.
///
/// Both counts are positive. Construct with [`GridLayout::new`]; serde
/// deserialization goes through the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGridLayout")]
pub struct GridLayout {
    columns: u32,
    rows: u32,
}

/// Unvalidated wire form of [`GridLayout`].
#[derive(Deserialize)]
struct RawGridLayout {
    columns: u32,
    rows: u32,
}

impl TryFrom<RawGridLayout> for GridLayout {
    type Error = PipelineError;

    fn try_from(raw: RawGridLayout) -> Result<Self, Self::Error> {
        Self::new(raw.columns, raw.rows)
    }
}

impl GridLayout {
    /// The 4×4 sixteen-sticker layout used by default.
    pub const REFERENCE: Self = Self {
        columns: 4,
        rows: 4,
    };

    /// Create a layout of `columns` × `rows` cells.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidLayout`] if either count is zero.
    pub const fn new(columns: u32, rows: u32) -> Result<Self, PipelineError> {
        if columns == 0 || rows == 0 {
            return Err(PipelineError::InvalidLayout { columns, rows });
        }
        Ok(Self { columns, rows })
    }

    /// Number of cells across.
    #[must_use]
    pub const fn columns(self) -> u32 {
        self.columns
    }

    /// Number of cells down.
    #[must_use]
    pub const fn rows(self) -> u32 {
        self.rows
    }

    /// Total number of cells (`columns * rows`).
    #[must_use]
    pub const fn cell_count(self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Row-major `(column, row)` of the cell at `index`, or `None` if
    /// `index` is outside the grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn cell_position(self, index: usize) -> Option<(u32, u32)> {
        if index >= self.cell_count() {
            return None;
        }
        let columns = self.columns as usize;
        // Both quotients are bounded by `columns`/`rows`, which are u32.
        Some(((index % columns) as u32, (index / columns) as u32))
    }

    /// Row-major index of the cell at `(column, row)`, or `None` if the
    /// position is outside the grid.
    #[must_use]
    pub const fn cell_index(self, column: u32, row: u32) -> Option<usize> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        Some(row as usize * self.columns as usize + column as usize)
    }

    /// Size of one cell when a sheet of `sheet` pixels is divided by
    /// this layout, or `None` if the sheet is empty or does not divide
    /// evenly.
    #[must_use]
    pub const fn cell_dimensions(self, sheet: Dimensions) -> Option<Dimensions> {
        if sheet.is_empty() || sheet.width % self.columns != 0 || sheet.height % self.rows != 0 {
            return None;
        }
        Some(Dimensions {
            width: sheet.width / self.columns,
            height: sheet.height / self.rows,
        })
    }
}

impl Default for GridLayout {
    fn default() -> Self {
        Self::REFERENCE
    }
}

impl std::fmt::Display for GridLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.columns, self.rows)
    }
}

/// One sticker cut out of a sheet.
///
/// `index` is the cell's row-major position in the source sheet,
/// counting from zero at the top-left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StickerSlot {
    /// The sticker's own pixel buffer (never shared with the sheet).
    pub image: RasterImage,
    /// Row-major cell index in the source sheet.
    pub index: usize,
}

impl StickerSlot {
    /// Create a slot from an image and its cell index.
    #[must_use]
    pub const fn new(image: RasterImage, index: usize) -> Self {
        Self { image, index }
    }

    /// The sticker image.
    #[must_use]
    pub const fn image(&self) -> &RasterImage {
        &self.image
    }

    /// Row-major cell index in the source sheet.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Consumes the slot and returns its image.
    #[must_use]
    pub fn into_image(self) -> RasterImage {
        self.image
    }
}

/// Serde-compatible proxy for a raster image.
///
/// `image::ImageBuffer` does not implement serde traits, so images are
/// carried as `(width, height, raw_pixels)` tuples.
type RasterProxy = (u32, u32, Vec<u8>);

fn raster_to_proxy(image: &RasterImage) -> RasterProxy {
    (image.width(), image.height(), image.as_raw().clone())
}

fn raster_from_proxy<E: serde::de::Error>(proxy: RasterProxy, what: &str) -> Result<RasterImage, E> {
    RasterImage::from_raw(proxy.0, proxy.1, proxy.2)
        .ok_or_else(|| E::custom(format!("invalid {what} image dimensions")))
}

#[derive(Serialize, Deserialize)]
struct StickerSlotProxy {
    image: RasterProxy,
    index: usize,
}

impl Serialize for StickerSlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StickerSlotProxy {
            image: raster_to_proxy(&self.image),
            index: self.index,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StickerSlot {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = StickerSlotProxy::deserialize(deserializer)?;
        Ok(Self {
            image: raster_from_proxy(proxy.image, "sticker")?,
            index: proxy.index,
        })
    }
}

/// Configuration for the sheet-splitting pipeline.
///
/// Missing fields fall back to their defaults when deserialized, so a
/// partial JSON object such as `{"aggressive": false}` is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Grid the sheet is divided into.
    pub layout: GridLayout,

    /// Use the wide (post-generation) key thresholds instead of the
    /// conservative preview thresholds.
    pub aggressive: bool,

    /// Key color and threshold settings.
    pub chroma: ChromaKeyConfig,
}

impl PipelineConfig {
    /// Default for [`aggressive`](Self::aggressive): the final pass
    /// always uses the wide thresholds.
    pub const DEFAULT_AGGRESSIVE: bool = true;

    /// Check the configuration's invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the chroma settings
    /// are inconsistent (see [`ChromaKeyConfig::validate`]).
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.chroma.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: GridLayout::REFERENCE,
            aggressive: Self::DEFAULT_AGGRESSIVE,
            chroma: ChromaKeyConfig::default(),
        }
    }
}

/// Result of running the splitting pipeline with intermediates kept.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Decoded source sheet, before keying.
    pub original: RasterImage,
    /// Sheet after chroma-key extraction.
    pub keyed: RasterImage,
    /// Stickers in row-major order.
    pub slots: Vec<StickerSlot>,
    /// Layout used for slicing.
    pub layout: GridLayout,
    /// Source sheet dimensions in pixels.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Consumes the result and returns only the stickers.
    #[must_use]
    pub fn into_slots(self) -> Vec<StickerSlot> {
        self.slots
    }
}

#[derive(Serialize, Deserialize)]
struct StagedResultProxy {
    original: RasterProxy,
    keyed: RasterProxy,
    slots: Vec<StickerSlot>,
    layout: GridLayout,
    dimensions: Dimensions,
}

impl Serialize for StagedResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StagedResultProxy {
            original: raster_to_proxy(&self.original),
            keyed: raster_to_proxy(&self.keyed),
            slots: self.slots.clone(),
            layout: self.layout,
            dimensions: self.dimensions,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StagedResult {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = StagedResultProxy::deserialize(deserializer)?;
        Ok(Self {
            original: raster_from_proxy(proxy.original, "original")?,
            keyed: raster_from_proxy(proxy.keyed, "keyed")?,
            slots: proxy.slots,
            layout: proxy.layout,
            dimensions: proxy.dimensions,
        })
    }
}

/// Why a composition request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ShapeMismatch {
    /// The number of slots differs from the number of grid cells.
    #[error("expected {expected} slots, got {actual}")]
    SlotCount {
        /// Cells in the layout.
        expected: usize,
        /// Slots supplied.
        actual: usize,
    },
    /// A slot's size differs from the first slot's size.
    #[error("slot {index} is {actual}, expected {expected}")]
    SlotSize {
        /// Index of the first offending slot.
        index: usize,
        /// Size of slot 0.
        expected: Dimensions,
        /// Size of the offending slot.
        actual: Dimensions,
    },
    /// The composed sheet would exceed `u32::MAX` pixels on a side.
    #[error("{columns}x{rows} cells of {cell} exceed the maximum sheet size")]
    SheetTooLarge {
        /// Size shared by every slot.
        cell: Dimensions,
        /// Columns in the layout.
        columns: u32,
        /// Rows in the layout.
        rows: u32,
    },
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Failed to encode an output image.
    #[error("failed to encode image: {0}")]
    ImageEncode(String),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A grid layout had a zero column or row count.
    #[error("invalid grid layout {columns}x{rows}: columns and rows must be positive")]
    InvalidLayout {
        /// Requested column count.
        columns: u32,
        /// Requested row count.
        rows: u32,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The sheet cannot be divided evenly by the requested grid.
    #[error(
        "sheet of {width}x{height} pixels cannot be divided evenly into {columns} columns and {rows} rows"
    )]
    Dimension {
        /// Sheet width in pixels.
        width: u32,
        /// Sheet height in pixels.
        height: u32,
        /// Requested column count.
        columns: u32,
        /// Requested row count.
        rows: u32,
    },

    /// Composition input is inconsistent with the grid.
    #[error("composition input does not match the grid: {0}")]
    ShapeMismatch(#[from] ShapeMismatch),

    /// Fewer stickers were produced than the caller asked for.
    #[error("sheet produced {actual} stickers, expected {expected}")]
    IncompleteSheet {
        /// Stickers the caller requested.
        expected: usize,
        /// Stickers actually produced.
        actual: usize,
    },
}

impl PipelineError {
    /// Whether the error came from the decode boundary rather than the
    /// grid operations.
    ///
    /// Callers use this to choose between retrying the upstream
    /// generation (bad image data) and reporting an invalid result.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::ImageDecode(_) | Self::EmptyInput)
    }

    /// Whether the error means the sheet or slot set has the wrong
    /// shape for the grid.
    #[must_use]
    pub const fn is_grid_mismatch(&self) -> bool {
        matches!(
            self,
            Self::Dimension { .. } | Self::ShapeMismatch(_) | Self::IncompleteSheet { .. }
        )
    }
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    ImageEncode(String),
    EmptyInput,
    InvalidLayout {
        columns: u32,
        rows: u32,
    },
    InvalidConfig(String),
    Dimension {
        width: u32,
        height: u32,
        columns: u32,
        rows: u32,
    },
    ShapeMismatch(ShapeMismatch),
    IncompleteSheet {
        expected: usize,
        actual: usize,
    },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::ImageEncode(s) => PipelineErrorProxy::ImageEncode(s.clone()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidLayout { columns, rows } => PipelineErrorProxy::InvalidLayout {
                columns: *columns,
                rows: *rows,
            },
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
            Self::Dimension {
                width,
                height,
                columns,
                rows,
            } => PipelineErrorProxy::Dimension {
                width: *width,
                height: *height,
                columns: *columns,
                rows: *rows,
            },
            Self::ShapeMismatch(m) => PipelineErrorProxy::ShapeMismatch(*m),
            Self::IncompleteSheet { expected, actual } => PipelineErrorProxy::IncompleteSheet {
                expected: *expected,
                actual: *actual,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageDecode(msg) => {
                // The typed error cannot be rebuilt; keep the message and
                // the variant so `is_decode` still holds.
                Self::ImageDecode(image::ImageError::Decoding(
                    image::error::DecodingError::new(image::error::ImageFormatHint::Unknown, msg),
                ))
            }
            PipelineErrorProxy::ImageEncode(s) => Self::ImageEncode(s),
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidLayout { columns, rows } => {
                Self::InvalidLayout { columns, rows }
            }
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            PipelineErrorProxy::Dimension {
                width,
                height,
                columns,
                rows,
            } => Self::Dimension {
                width,
                height,
                columns,
                rows,
            },
            PipelineErrorProxy::ShapeMismatch(m) => Self::ShapeMismatch(m),
            PipelineErrorProxy::IncompleteSheet { expected, actual } => {
                Self::IncompleteSheet { expected, actual }
            }
        })
    }
}
