use gif_support::{ColorTable, RGB};
use gif_support::common::MAX_COLORS;

use crate::error::ColorSwapError;

/// Finds the index of the only entry of `table` equal to `target`.
///
/// Only the first 256 entries are considered, the rest can not be addressed by a GIF image.
pub fn locate(table: &ColorTable, target: RGB) -> Result<usize, ColorSwapError> {
    let mut found: Option<usize> = None;

    for (index, color) in table.colors.iter().take(MAX_COLORS).enumerate() {
        if *color != target {
            continue;
        }

        match found {
            None => found = Some(index),
            Some(first) => return Err(ColorSwapError::DuplicateColor {
                color: target,
                first,
                second: index,
            }),
        }
    }

    found.ok_or(ColorSwapError::ColorNotFound { color: target })
}

/// Copy of `table` with entries 0 and `index` exchanged.
///
/// Panics if `index` is out of bounds.
pub fn swap(table: &ColorTable, index: usize) -> ColorTable {
    let mut colors = table.colors.clone();
    colors.swap(0, index);
    ColorTable::new(colors)
}

pub fn remap_index(index: u8, swap_index: u8) -> u8 {
    if index == swap_index {
        0
    } else if index == 0 {
        swap_index
    } else {
        index
    }
}

pub fn remap_line(line: &mut [u8], swap_index: u8) {
    if swap_index == 0 {
        return;
    }

    for index in line.iter_mut() {
        *index = remap_index(*index, swap_index);
    }
}
