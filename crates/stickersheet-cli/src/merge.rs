//! Locked-slot merging.
//!
//! When a user regenerates a sheet but keeps some stickers from the
//! previous pass, the caller decides per cell which image to place.
//! The pipeline itself has no notion of locked cells; this module builds
//! the ordered slot list that is then handed to `compose`.

use std::path::PathBuf;

/// A `--keep INDEX=PATH` argument: place the image at `path` in cell
/// `index`, overriding whatever the fresh slot list has there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepSpec {
    /// Zero-based row-major cell index.
    pub index: usize,
    /// Retained sticker image file.
    pub path: PathBuf,
}

impl std::str::FromStr for KeepSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index_str, path_str) = s
            .split_once('=')
            .ok_or_else(|| format!("expected INDEX=PATH, got: '{s}'"))?;
        let index = index_str
            .trim()
            .parse()
            .map_err(|e| format!("invalid cell index '{index_str}': {e}"))?;
        if path_str.is_empty() {
            return Err(format!("missing path after '=' in '{s}'"));
        }
        Ok(Self {
            index,
            path: PathBuf::from(path_str),
        })
    }
}

/// Build the per-cell list: `fresh` fills cells in order, then every
/// `(index, item)` in `kept` replaces the item at `index`.
///
/// Returns an error if a kept index is outside `0..cell_count`, if the
/// same index is kept twice, or if the result does not have exactly
/// `cell_count` items.
pub fn merge_slots<T>(
    fresh: Vec<T>,
    kept: Vec<(usize, T)>,
    cell_count: usize,
) -> Result<Vec<T>, String> {
    let mut cells: Vec<Option<T>> = fresh.into_iter().map(Some).collect();
    if cells.len() < cell_count {
        cells.resize_with(cell_count, || None);
    }

    let mut seen = vec![false; cell_count];
    for (index, item) in kept {
        let Some(flag) = seen.get_mut(index) else {
            return Err(format!(
                "kept cell {index} is outside the grid (0..{cell_count})"
            ));
        };
        if *flag {
            return Err(format!("cell {index} is kept more than once"));
        }
        *flag = true;
        cells[index] = Some(item);
    }

    if cells.len() != cell_count {
        return Err(format!(
            "{} slots supplied for {cell_count} cells",
            cells.len()
        ));
    }

    cells
        .into_iter()
        .enumerate()
        .map(|(index, cell)| cell.ok_or_else(|| format!("cell {index} has no sticker")))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn keep_spec_parses() {
        let spec: KeepSpec = "3=old/sticker-04.png".parse().unwrap();
        assert_eq!(
            spec,
            KeepSpec {
                index: 3,
                path: PathBuf::from("old/sticker-04.png"),
            }
        );
    }

    #[test]
    fn keep_spec_rejects_missing_separator() {
        assert!("3".parse::<KeepSpec>().is_err());
    }

    #[test]
    fn keep_spec_rejects_bad_index() {
        assert!("x=a.png".parse::<KeepSpec>().is_err());
        assert!("-1=a.png".parse::<KeepSpec>().is_err());
    }

    #[test]
    fn keep_spec_rejects_empty_path() {
        assert!("2=".parse::<KeepSpec>().is_err());
    }

    #[test]
    fn fresh_only() {
        let merged = merge_slots(vec!['a', 'b', 'c', 'd'], vec![], 4).unwrap();
        assert_eq!(merged, vec!['a', 'b', 'c', 'd']);
    }

    #[test]
    fn kept_cells_override_fresh() {
        let merged = merge_slots(vec!['a', 'b', 'c', 'd'], vec![(0, 'X'), (3, 'Y')], 4).unwrap();
        assert_eq!(merged, vec!['X', 'b', 'c', 'Y']);
    }

    #[test]
    fn kept_cells_fill_gaps_after_fresh() {
        let merged = merge_slots(vec!['a', 'b'], vec![(2, 'C'), (3, 'D')], 4).unwrap();
        assert_eq!(merged, vec!['a', 'b', 'C', 'D']);
    }

    #[test]
    fn missing_cell_is_an_error() {
        let result = merge_slots(vec!['a', 'b'], vec![(3, 'D')], 4);
        assert_eq!(result, Err("cell 2 has no sticker".to_string()));
    }

    #[test]
    fn out_of_range_keep_is_an_error() {
        assert!(merge_slots(vec!['a'; 4], vec![(4, 'X')], 4).is_err());
    }

    #[test]
    fn duplicate_keep_is_an_error() {
        assert!(merge_slots(vec!['a'; 4], vec![(1, 'X'), (1, 'Y')], 4).is_err());
    }

    #[test]
    fn too_many_fresh_slots_is_an_error() {
        assert!(merge_slots(vec!['a'; 5], vec![], 4).is_err());
    }
}
