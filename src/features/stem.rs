//! Stem probing
//!
//! A projection peak is only trusted when the narrow vertical band it covers holds a
//! tall enough, continuous enough sequence of black rows: the stem of a flat, or one of
//! the two stems of a sharp.

use crate::io::PixelSource;
use crate::sheet::Rect;

/// Report whether `area` contains a vertical portion of `core_length` rows with at
/// least `ceil(core_length * min_black_ratio)` black rows.
///
/// A row is black if it holds at least one foreground pixel within the area width.
/// This tolerates a few broken rows (touching glyphs, thin strokes) while rejecting
/// shallow peaks. When the area is shorter than `core_length`, the whole area is used
/// as the single window.
///
/// # Arguments
///
/// * `area` - The narrow vertical rectangle of interest
/// * `source` - Binary pixel source
/// * `core_length` - Minimum "stem" length, in rows
/// * `min_black_ratio` - Minimum ratio of black rows within `core_length`
///
/// # Example
///
/// ```
/// use image::{GrayImage, Luma};
/// use stave_keysig::features::stem::has_stem;
/// use stave_keysig::sheet::Rect;
///
/// let mut img = GrayImage::from_pixel(5, 50, Luma([255]));
/// for y in 5..45 {
///     img.put_pixel(2, y, Luma([0]));
/// }
/// assert!(has_stem(&Rect::new(1, 0, 3, 50), &img, 30, 0.75));
/// assert!(!has_stem(&Rect::new(1, 0, 3, 50), &img, 48, 0.9));
/// ```
pub fn has_stem(
    area: &Rect,
    source: &dyn PixelSource,
    core_length: i32,
    min_black_ratio: f64,
) -> bool {
    if area.is_empty() || core_length <= 0 {
        return false;
    }

    let blacks: Vec<bool> = (area.y..=area.bottom())
        .map(|y| (area.x..=area.right()).any(|x| source.is_foreground(x, y)))
        .collect();

    let window = (core_length as usize).min(blacks.len());
    let quorum = (core_length as f64 * min_black_ratio).ceil() as usize;

    // Initial window
    let mut count = blacks[..window].iter().filter(|&&b| b).count();

    if count >= quorum {
        return true;
    }

    // Move the window downward
    for y in 1..=(blacks.len() - window) {
        if blacks[y - 1] {
            count -= 1;
        }

        if blacks[y + window - 1] {
            count += 1;
        }

        if count >= quorum {
            return true;
        }
    }

    false
}
