//! Sheet-level geometry consumed by key retrieval
//!
//! Staff lines, bar lines and interline scale are produced by earlier stages; this
//! module only models what key retrieval reads from them, plus the per-staff header
//! where results are recorded.

pub mod scale;
pub mod staff;

pub use scale::Scale;
pub use staff::{Barline, StaffGeometry, StaffHeader, StaffInfo, StaffLine, SystemInfo};

use serde::{Deserialize, Serialize};

/// Integer pixel location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Abscissa
    pub x: i32,
    /// Ordinate
    pub y: i32,
}

impl Point {
    /// Create a new point
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, in pixels, with inclusive-exclusive extent semantics
/// (`x..x + width`, `y..y + height`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left abscissa
    pub x: i32,
    /// Top ordinate
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering `[x_min, x_max] x [y_min, y_max]` (bounds inclusive)
    pub fn from_bounds(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self::new(x_min, y_min, x_max - x_min + 1, y_max - y_min + 1)
    }

    /// Last abscissa inside the rectangle
    pub fn right(&self) -> i32 {
        self.x + self.width - 1
    }

    /// Last ordinate inside the rectangle
    pub fn bottom(&self) -> i32 {
        self.y + self.height - 1
    }

    /// True when the rectangle has no pixel
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True if abscissa `x` lies within the rectangle horizontal extent
    pub fn x_embraces(&self, x: i32) -> bool {
        x >= self.x && x <= self.right()
    }

    /// True if the point lies within the rectangle
    pub fn contains(&self, p: Point) -> bool {
        self.x_embraces(p.x) && p.y >= self.y && p.y <= self.bottom()
    }

    /// True if both rectangles share at least one pixel
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Smallest rectangle containing both rectangles
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_bounds(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Grow the rectangle by `dx` on left and right, `dy` on top and bottom
    pub fn grow(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + 2 * dx,
            self.height + 2 * dy,
        )
    }

    /// Horizontal and vertical gap to another rectangle (0 when overlapping on that axis)
    pub fn gap_to(&self, other: &Rect) -> (i32, i32) {
        let dx = (other.x - self.right() - 1).max(self.x - other.right() - 1).max(0);
        let dy = (other.y - self.bottom() - 1)
            .max(self.y - other.bottom() - 1)
            .max(0);
        (dx, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_bounds() {
        let r = Rect::from_bounds(10, 20, 19, 24);
        assert_eq!(r.width, 10);
        assert_eq!(r.height, 5);
        assert_eq!(r.right(), 19);
        assert_eq!(r.bottom(), 24);
        assert!(r.x_embraces(10) && r.x_embraces(19));
        assert!(!r.x_embraces(20));
    }

    #[test]
    fn test_rect_union_and_intersection() {
        let a = Rect::new(0, 0, 5, 5);
        let b = Rect::new(4, 4, 3, 3);
        let c = Rect::new(10, 0, 2, 2);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.union(&c), Rect::from_bounds(0, 0, 11, 4));
    }

    #[test]
    fn test_rect_gap() {
        let a = Rect::new(0, 0, 5, 5);
        let b = Rect::new(8, 2, 2, 2);
        assert_eq!(a.gap_to(&b), (3, 0));
        assert_eq!(b.gap_to(&a), (3, 0));
        assert_eq!(a.gap_to(&a), (0, 0));
    }
}
