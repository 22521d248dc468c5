//! Grid composition: lay out equal-sized stickers on one sheet.
//!
//! The exact inverse of [`slice`](crate::slice::slice): slot `i` lands in
//! the cell at `(i % columns, i / columns)`. Pixels are copied verbatim,
//! alpha included, so composing the output of `slice` reproduces the
//! source sheet byte for byte.
//!
//! Which slot goes in which cell is entirely up to the caller. Mixing
//! freshly sliced stickers with ones kept from an earlier pass is just a
//! matter of building the slot list before calling [`compose`].

use rayon::prelude::*;

use crate::types::{
    Dimensions, GridLayout, PipelineError, RasterImage, ShapeMismatch, StickerSlot,
};

/// Compose `slots` into a single sheet laid out by `layout`.
///
/// # Errors
///
/// Returns [`PipelineError::ShapeMismatch`] if `slots.len()` differs
/// from `layout.cell_count()`, if any slot's size differs from slot 0,
/// or if the sheet would exceed `u32::MAX` pixels on a side.
pub fn compose(slots: &[RasterImage], layout: GridLayout) -> Result<RasterImage, PipelineError> {
    let refs: Vec<&RasterImage> = slots.iter().collect();
    compose_refs(&refs, layout)
}

/// Compose the images of `slots`, in the order given, into one sheet.
///
/// The slots' own `index` fields are not consulted; position in the
/// slice decides the cell.
///
/// # Errors
///
/// Same as [`compose`].
pub fn compose_slots(slots: &[StickerSlot], layout: GridLayout) -> Result<RasterImage, PipelineError> {
    let refs: Vec<&RasterImage> = slots.iter().map(StickerSlot::image).collect();
    compose_refs(&refs, layout)
}

fn compose_refs(slots: &[&RasterImage], layout: GridLayout) -> Result<RasterImage, PipelineError> {
    let cell = validate_shape(slots, layout)?;

    let sheet_width = cell.width.checked_mul(layout.columns());
    let sheet_height = cell.height.checked_mul(layout.rows());
    let (Some(sheet_width), Some(sheet_height)) = (sheet_width, sheet_height) else {
        return Err(ShapeMismatch::SheetTooLarge {
            cell,
            columns: layout.columns(),
            rows: layout.rows(),
        }
        .into());
    };

    // `RasterImage::new` zero-fills, so the sheet starts fully transparent.
    let mut sheet = RasterImage::new(sheet_width, sheet_height);
    let sheet_row_len = sheet_width as usize * 4;
    let cell_row_len = cell.width as usize * 4;
    let cell_height = cell.height as usize;
    let columns = layout.columns() as usize;

    if sheet_row_len > 0 {
        sheet
            .par_chunks_exact_mut(sheet_row_len)
            .enumerate()
            .for_each(|(y, sheet_row)| {
                let grid_row = y / cell_height;
                let cell_y = y % cell_height;
                let source = cell_y * cell_row_len..(cell_y + 1) * cell_row_len;
                for (column, target) in sheet_row.chunks_exact_mut(cell_row_len).enumerate() {
                    let slot = slots[grid_row * columns + column];
                    target.copy_from_slice(&slot.as_raw()[source.clone()]);
                }
            });
    }

    log::debug!("composed {} slots into a {layout} sheet of {}", slots.len(), Dimensions::of(&sheet));
    Ok(sheet)
}

/// Check slot count and uniform size; return the common cell size.
fn validate_shape(slots: &[&RasterImage], layout: GridLayout) -> Result<Dimensions, PipelineError> {
    let expected = layout.cell_count();
    let Some(first) = slots.first().filter(|_| slots.len() == expected) else {
        return Err(ShapeMismatch::SlotCount {
            expected,
            actual: slots.len(),
        }
        .into());
    };

    let cell = Dimensions::of(first);
    if let Some((index, slot)) = slots
        .iter()
        .enumerate()
        .find(|(_, slot)| Dimensions::of(slot) != cell)
    {
        return Err(ShapeMismatch::SlotSize {
            index,
            expected: cell,
            actual: Dimensions::of(slot),
        }
        .into());
    }
    Ok(cell)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RasterImage {
        RasterImage::from_pixel(width, height, image::Rgba(rgba))
    }

    #[test]
    fn sheet_size_is_cell_times_grid() {
        let layout = GridLayout::new(3, 2).unwrap();
        let slots = vec![solid(5, 7, [1, 2, 3, 4]); 6];
        let sheet = compose(&slots, layout).unwrap();
        assert_eq!(sheet.dimensions(), (15, 14));
    }

    #[test]
    fn slots_land_in_row_major_cells() {
        let layout = GridLayout::new(2, 2).unwrap();
        let slots = vec![
            solid(3, 3, [255, 0, 0, 255]),
            solid(3, 3, [0, 0, 255, 255]),
            solid(3, 3, [0, 255, 0, 128]),
            solid(3, 3, [9, 9, 9, 0]),
        ];
        let sheet = compose(&slots, layout).unwrap();
        assert_eq!(sheet.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(sheet.get_pixel(3, 0).0, [0, 0, 255, 255]);
        assert_eq!(sheet.get_pixel(2, 5).0, [0, 255, 0, 128]);
        assert_eq!(sheet.get_pixel(5, 5).0, [9, 9, 9, 0]);
    }

    #[test]
    fn alpha_is_copied_not_blended() {
        let layout = GridLayout::new(1, 1).unwrap();
        let slot = solid(2, 2, [200, 100, 50, 7]);
        let sheet = compose(std::slice::from_ref(&slot), layout).unwrap();
        assert_eq!(sheet, slot);
    }

    #[test]
    fn too_few_slots_is_rejected() {
        let slots = vec![solid(4, 4, [0, 0, 0, 255]); 15];
        let result = compose(&slots, GridLayout::REFERENCE);
        assert!(matches!(
            result,
            Err(PipelineError::ShapeMismatch(ShapeMismatch::SlotCount {
                expected: 16,
                actual: 15,
            }))
        ));
    }

    #[test]
    fn too_many_slots_is_rejected() {
        let slots = vec![solid(4, 4, [0, 0, 0, 255]); 17];
        assert!(compose(&slots, GridLayout::REFERENCE).is_err());
    }

    #[test]
    fn no_slots_is_rejected() {
        let result = compose(&[], GridLayout::new(1, 1).unwrap());
        assert!(matches!(
            result,
            Err(PipelineError::ShapeMismatch(ShapeMismatch::SlotCount {
                expected: 1,
                actual: 0,
            }))
        ));
    }

    #[test]
    fn mixed_sizes_are_rejected() {
        let layout = GridLayout::new(2, 1).unwrap();
        let slots = vec![solid(4, 4, [0; 4]), solid(4, 5, [0; 4])];
        let result = compose(&slots, layout);
        assert!(matches!(
            result,
            Err(PipelineError::ShapeMismatch(ShapeMismatch::SlotSize {
                index: 1,
                ..
            }))
        ));
    }

    #[test]
    fn oversized_sheet_is_a_shape_mismatch() {
        // Zero-height cells keep the buffers empty while the width overflows.
        let layout = GridLayout::new(2, 1).unwrap();
        let slots = vec![RasterImage::new(1 << 31, 0); 2];
        let err = compose(&slots, layout).unwrap_err();
        assert!(err.is_grid_mismatch());
        assert!(matches!(
            err,
            PipelineError::ShapeMismatch(ShapeMismatch::SheetTooLarge {
                columns: 2,
                rows: 1,
                ..
            })
        ));
    }

    #[test]
    fn zero_sized_slots_compose_to_empty_sheet() {
        let layout = GridLayout::new(2, 2).unwrap();
        let slots = vec![RasterImage::new(0, 0); 4];
        let sheet = compose(&slots, layout).unwrap();
        assert_eq!(sheet.dimensions(), (0, 0));
    }

    #[test]
    fn compose_slots_uses_given_order() {
        let layout = GridLayout::new(2, 1).unwrap();
        let slots = vec![
            StickerSlot::new(solid(1, 1, [0, 0, 255, 255]), 1),
            StickerSlot::new(solid(1, 1, [255, 0, 0, 255]), 0),
        ];
        let sheet = compose_slots(&slots, layout).unwrap();
        assert_eq!(sheet.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(sheet.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }
}
