//! Glyphs: connected foreground pixel sets, and the injected capabilities working on them
//!
//! - [`ShapeClassifier`]: black-box shape scoring
//! - [`ComponentBuilder`]: connected components out of a binary buffer
//! - [`cluster::decompose`]: combination search over nearby components

pub mod classifier;
pub mod cluster;
pub mod components;

pub use classifier::{Evaluation, ShapeClassifier};
pub use cluster::{decompose, ClusterAdapter};
pub use components::{ComponentBuilder, RunComponentBuilder};

use crate::sheet::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A set of foreground pixels, in absolute sheet coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glyph {
    pixels: Vec<Point>,
    bounds: Rect,
}

impl Glyph {
    /// Create a glyph from its pixels (duplicates removed, sorted by x then y)
    ///
    /// Returns `None` for an empty pixel set.
    pub fn from_pixels(mut pixels: Vec<Point>) -> Option<Self> {
        if pixels.is_empty() {
            return None;
        }

        pixels.sort_by_key(|p| (p.x, p.y));
        pixels.dedup();

        let x_min = pixels.iter().map(|p| p.x).min()?;
        let x_max = pixels.iter().map(|p| p.x).max()?;
        let y_min = pixels.iter().map(|p| p.y).min()?;
        let y_max = pixels.iter().map(|p| p.y).max()?;

        Some(Self {
            pixels,
            bounds: Rect::from_bounds(x_min, y_min, x_max, y_max),
        })
    }

    /// Compound glyph made of all pixels of `parts`
    pub fn merge<'a, I>(parts: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Glyph>,
    {
        let pixels: Vec<Point> = parts
            .into_iter()
            .flat_map(|g| g.pixels.iter().copied())
            .collect();
        Self::from_pixels(pixels)
    }

    /// Pixels, sorted by x then y
    pub fn pixels(&self) -> &[Point] {
        &self.pixels
    }

    /// Bounding box
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Number of pixels
    pub fn weight(&self) -> usize {
        self.pixels.len()
    }

    /// Mass center, as precise values
    pub fn centroid_f64(&self) -> (f64, f64) {
        let n = self.pixels.len() as f64;
        let (sx, sy) = self
            .pixels
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
        (sx / n, sy / n)
    }

    /// Mass center, rounded to the nearest pixel
    pub fn centroid(&self) -> Point {
        let (x, y) = self.centroid_f64();
        Point::new(x.round() as i32, y.round() as i32)
    }

    /// Number of pixels in column `x`
    pub fn column_count(&self, x: i32) -> usize {
        self.pixels.iter().filter(|p| p.x == x).count()
    }
}
