//! Grid slicing: cut a sheet into equal-sized stickers.
//!
//! Cells are numbered row-major from the top-left, matching the order a
//! person reads "sticker #1" through "#N". Each cell is copied into its
//! own buffer; no slot shares memory with the sheet.

use rayon::prelude::*;

use crate::types::{Dimensions, GridLayout, PipelineError, RasterImage, StickerSlot};

/// Cut `image` into `layout.cell_count()` stickers in row-major order.
///
/// # Errors
///
/// Returns [`PipelineError::Dimension`] if the sheet is empty or its
/// width is not a multiple of `layout.columns()` or its height is not a
/// multiple of `layout.rows()`. Partial cells are never produced.
pub fn slice(image: &RasterImage, layout: GridLayout) -> Result<Vec<StickerSlot>, PipelineError> {
    let sheet = Dimensions::of(image);
    let Some(cell) = layout.cell_dimensions(sheet) else {
        log::warn!("rejecting {sheet} sheet: not divisible into a {layout} grid");
        return Err(PipelineError::Dimension {
            width: sheet.width,
            height: sheet.height,
            columns: layout.columns(),
            rows: layout.rows(),
        });
    };

    let slots: Vec<StickerSlot> = (0..layout.cell_count())
        .into_par_iter()
        .filter_map(|index| {
            let (column, row) = layout.cell_position(index)?;
            let cropped = image::imageops::crop_imm(
                image,
                column * cell.width,
                row * cell.height,
                cell.width,
                cell.height,
            )
            .to_image();
            Some(StickerSlot::new(cropped, index))
        })
        .collect();

    log::debug!(
        "sliced {sheet} sheet into {} cells of {cell}",
        slots.len()
    );
    Ok(slots)
}

/// Accept a slice result only if it holds at least `expected` stickers.
///
/// Slicing never pads or invents missing cells; a short result means the
/// layout under-specifies the grid the caller asked for.
///
/// # Errors
///
/// Returns [`PipelineError::IncompleteSheet`] if `slots.len() < expected`.
pub fn ensure_complete(slots: &[StickerSlot], expected: usize) -> Result<(), PipelineError> {
    if slots.len() < expected {
        log::warn!(
            "incomplete sheet: {} stickers, expected {expected}",
            slots.len()
        );
        return Err(PipelineError::IncompleteSheet {
            expected,
            actual: slots.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A sheet where every pixel encodes its own coordinates.
    #[allow(clippy::cast_possible_truncation)]
    fn coordinate_sheet(width: u32, height: u32) -> RasterImage {
        RasterImage::from_fn(width, height, |x, y| {
            image::Rgba([x as u8, y as u8, (x + y) as u8, 255])
        })
    }

    #[test]
    fn slot_count_matches_layout() {
        let layout = GridLayout::new(3, 2).unwrap();
        let slots = slice(&coordinate_sheet(30, 20), layout).unwrap();
        assert_eq!(slots.len(), 6);
    }

    #[test]
    fn slots_have_cell_dimensions() {
        let layout = GridLayout::new(3, 2).unwrap();
        let slots = slice(&coordinate_sheet(30, 20), layout).unwrap();
        for slot in &slots {
            assert_eq!(slot.image.dimensions(), (10, 10));
        }
    }

    #[test]
    fn indices_are_sequential() {
        let slots = slice(&coordinate_sheet(8, 8), GridLayout::REFERENCE).unwrap();
        let indices: Vec<usize> = slots.iter().map(StickerSlot::index).collect();
        assert_eq!(indices, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn slot_pixels_come_from_their_cell() {
        let layout = GridLayout::new(3, 2).unwrap();
        let slots = slice(&coordinate_sheet(30, 20), layout).unwrap();
        // Slot 4 is column 1, row 1: origin (10, 10).
        let slot = &slots[4];
        assert_eq!(slot.image.get_pixel(0, 0).0, [10, 10, 20, 255]);
        assert_eq!(slot.image.get_pixel(9, 9).0, [19, 19, 38, 255]);
    }

    #[test]
    fn single_cell_layout_copies_whole_sheet() {
        let sheet = coordinate_sheet(7, 5);
        let slots = slice(&sheet, GridLayout::new(1, 1).unwrap()).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].image, sheet);
    }

    #[test]
    fn uneven_width_is_rejected() {
        let result = slice(&coordinate_sheet(101, 100), GridLayout::REFERENCE);
        assert!(matches!(
            result,
            Err(PipelineError::Dimension {
                width: 101,
                height: 100,
                columns: 4,
                rows: 4,
            })
        ));
    }

    #[test]
    fn uneven_height_is_rejected() {
        let result = slice(&coordinate_sheet(100, 99), GridLayout::REFERENCE);
        assert!(matches!(result, Err(PipelineError::Dimension { .. })));
    }

    #[test]
    fn empty_sheet_is_rejected() {
        let result = slice(&RasterImage::new(0, 0), GridLayout::REFERENCE);
        assert!(matches!(result, Err(PipelineError::Dimension { .. })));
    }

    #[test]
    fn ensure_complete_accepts_full_result() {
        let slots = slice(&coordinate_sheet(8, 8), GridLayout::REFERENCE).unwrap();
        assert!(ensure_complete(&slots, 16).is_ok());
    }

    #[test]
    fn ensure_complete_rejects_short_result() {
        let slots = slice(&coordinate_sheet(8, 8), GridLayout::new(2, 2).unwrap()).unwrap();
        assert!(matches!(
            ensure_complete(&slots, 16),
            Err(PipelineError::IncompleteSheet {
                expected: 16,
                actual: 4,
            })
        ));
    }
}
