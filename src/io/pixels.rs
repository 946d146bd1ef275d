//! Binary pixel sources and buffers

use crate::sheet::Rect;
use image::{GrayImage, Luma};

/// Foreground (black) pixel value
pub const FOREGROUND: u8 = 0;

/// Background (white) pixel value
pub const BACKGROUND: u8 = 255;

/// Read-only access to a binary image, foreground pixels having value 0
///
/// Reads outside the image must report background.
pub trait PixelSource: Send + Sync {
    /// Image width in pixels
    fn width(&self) -> i32;

    /// Image height in pixels
    fn height(&self) -> i32;

    /// Pixel value at (x, y)
    fn get(&self, x: i32, y: i32) -> u8;

    /// True if the pixel at (x, y) is foreground
    fn is_foreground(&self, x: i32, y: i32) -> bool {
        self.get(x, y) == FOREGROUND
    }
}

impl PixelSource for GrayImage {
    fn width(&self) -> i32 {
        self.dimensions().0 as i32
    }

    fn height(&self) -> i32 {
        self.dimensions().1 as i32
    }

    fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= PixelSource::width(self) || y >= PixelSource::height(self) {
            return BACKGROUND;
        }

        self.get_pixel(x as u32, y as u32).0[0]
    }
}

/// Copy the pixels of `rect` from `source` into a new buffer whose origin is the
/// rectangle top-left corner. Pixels outside the source become background.
pub fn copy_region(source: &dyn PixelSource, rect: &Rect) -> GrayImage {
    let width = rect.width.max(0) as u32;
    let height = rect.height.max(0) as u32;

    GrayImage::from_fn(width, height, |x, y| {
        Luma([source.get(rect.x + x as i32, rect.y + y as i32)])
    })
}
