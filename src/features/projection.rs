//! Vertical projection of foreground pixels onto the x-axis
//!
//! For each abscissa of a region of interest, the projection counts the foreground
//! pixels found in the column. Key signature items show up as narrow peaks (the
//! "stems" of sharps and flats) separated by very low valleys.

use crate::io::PixelSource;
use crate::sheet::Rect;
use serde::{Deserialize, Serialize};

/// Per-column foreground counts, addressable over `[start, stop]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    start: i32,
    values: Vec<u32>,
}

impl Projection {
    /// Create an all-zero projection over `[start, stop]`
    pub fn new(start: i32, stop: i32) -> Self {
        let len = (stop - start + 1).max(0) as usize;
        Self {
            start,
            values: vec![0; len],
        }
    }

    /// Build a projection from precomputed values, the first one at abscissa `start`
    pub fn from_values(start: i32, values: Vec<u32>) -> Self {
        Self { start, values }
    }

    /// Cumulate the foreground pixels of each column of `rect`
    ///
    /// # Arguments
    ///
    /// * `source` - Binary pixel source (foreground = 0)
    /// * `rect` - Region of interest
    ///
    /// # Example
    ///
    /// ```
    /// use image::{GrayImage, Luma};
    /// use stave_keysig::features::projection::Projection;
    /// use stave_keysig::sheet::Rect;
    ///
    /// let mut img = GrayImage::from_pixel(10, 10, Luma([255]));
    /// for y in 2..7 {
    ///     img.put_pixel(4, y, Luma([0]));
    /// }
    /// let projection = Projection::build(&img, &Rect::new(0, 0, 10, 10));
    /// assert_eq!(projection.value(4), 5);
    /// assert_eq!(projection.value(5), 0);
    /// ```
    pub fn build(source: &dyn PixelSource, rect: &Rect) -> Self {
        let mut projection = Self::new(rect.x, rect.right());

        for x in rect.x..=rect.right() {
            let mut cumul = 0u32;

            for y in rect.y..=rect.bottom() {
                if source.is_foreground(x, y) {
                    cumul += 1;
                }
            }

            projection.values[(x - rect.x) as usize] = cumul;
        }

        log::debug!(
            "Projection over x=[{}..{}] y=[{}..{}]",
            rect.x,
            rect.right(),
            rect.y,
            rect.bottom()
        );

        projection
    }

    /// First abscissa
    pub fn start(&self) -> i32 {
        self.start
    }

    /// Last abscissa
    pub fn stop(&self) -> i32 {
        self.start + self.values.len() as i32 - 1
    }

    /// Count at abscissa `x`, 0 outside the projection range
    pub fn value(&self, x: i32) -> u32 {
        if x < self.start {
            return 0;
        }

        self.values.get((x - self.start) as usize).copied().unwrap_or(0)
    }

    /// Raw values, the first one being at [`Projection::start`]
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// True if the range `[start, stop]` carries no significant content: the mean of
    /// its non-zero counts does not exceed `max_mean`.
    pub fn is_range_void(&self, start: i32, stop: i32, max_mean: i32) -> bool {
        let mut sum = 0u64;
        let mut count = 0u64;

        for x in start..=stop {
            let cumul = self.value(x);

            if cumul > 0 {
                count += 1;
                sum += cumul as u64;
            }
        }

        let mean_height = if count > 0 {
            (sum as f64 / count as f64).round() as i32
        } else {
            0
        };

        log::debug!(
            "Range [{}..{}] mean height {} (max {})",
            start,
            stop,
            mean_height,
            max_mean
        );

        mean_height <= max_mean
    }
}
