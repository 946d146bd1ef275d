//! Key retrieval result types

use crate::features::glyph::Glyph;
use crate::sheet::Rect;
use serde::{Deserialize, Serialize};

/// Alteration shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// Flat sign
    Flat,
    /// Sharp sign
    Sharp,
    /// Natural sign (never part of a key signature, may be reported by a classifier)
    Natural,
}

impl Shape {
    /// Shapes a key signature can be made of
    pub const KEY_SHAPES: [Shape; 2] = [Shape::Flat, Shape::Sharp];

    /// Get shape name (e.g., "sharp")
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Flat => "flat",
            Shape::Sharp => "sharp",
            Shape::Natural => "natural",
        }
    }
}

/// Clef kind, as far as key signature layout is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClefKind {
    /// G clef on second line
    Treble,
    /// F clef on fourth line
    Bass,
    /// C clef on third line
    Alto,
    /// C clef on fourth line
    Tenor,
}

impl ClefKind {
    /// All kinds, in tie-break order
    pub const ALL: [ClefKind; 4] = [
        ClefKind::Treble,
        ClefKind::Bass,
        ClefKind::Alto,
        ClefKind::Tenor,
    ];
}

/// One alteration item of a key signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterItem {
    /// Inter id in the result graph, once registered
    pub id: Option<usize>,
    /// Sharp or flat
    pub shape: Shape,
    /// Intrinsic grade (0.0-1.0)
    pub grade: f64,
    /// Glyph bounds
    pub bounds: Rect,
    /// Pitch position measured on the glyph
    pub measured_pitch: f64,
    /// Integer pitch position, possibly snapped to the canonical clef pattern
    pub pitch: i32,
    /// Underlying glyph
    pub glyph: Glyph,
}

impl AlterItem {
    /// Increase the grade by `ratio` of the remaining room to 1.0
    ///
    /// # Example
    ///
    /// ```
    /// use stave_keysig::analysis::result::{AlterItem, Shape};
    /// use stave_keysig::features::glyph::Glyph;
    /// use stave_keysig::sheet::Point;
    ///
    /// let glyph = Glyph::from_pixels(vec![Point::new(0, 0)]).unwrap();
    /// let mut item = AlterItem {
    ///     id: None,
    ///     shape: Shape::Sharp,
    ///     grade: 0.6,
    ///     bounds: glyph.bounds(),
    ///     measured_pitch: -4.2,
    ///     pitch: -4,
    ///     glyph,
    /// };
    /// item.increase(0.25);
    /// assert!((item.grade - 0.7).abs() < 1e-9);
    /// ```
    pub fn increase(&mut self, ratio: f64) {
        self.grade += ratio * (1.0 - self.grade);
    }
}

/// Key signature retrieved for a staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyResult {
    /// Inter id in the result graph
    pub id: Option<usize>,
    /// Staff the key belongs to
    pub staff_id: usize,
    /// Sharp or flat
    pub shape: Shape,
    /// Signed count of alterations: positive for sharps, negative for flats
    pub fifths: i32,
    /// Union of the item bounds
    pub bounds: Rect,
    /// Mean contextual grade of the items
    pub grade: f64,
    /// Clef kind that best fits the item pitches
    pub guessed_clef: ClefKind,
    /// Accepted items, left to right
    pub alters: Vec<AlterItem>,
}

impl KeyResult {
    /// Abscissa of the right end of the last item
    pub fn stop(&self) -> Option<i32> {
        self.alters.last().map(|a| a.bounds.right())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Point;

    fn item(x: i32) -> AlterItem {
        let glyph = Glyph::from_pixels(vec![Point::new(x, 0), Point::new(x + 9, 10)]).unwrap();
        AlterItem {
            id: None,
            shape: Shape::Flat,
            grade: 0.5,
            bounds: glyph.bounds(),
            measured_pitch: 0.0,
            pitch: 0,
            glyph,
        }
    }

    #[test]
    fn test_increase_never_exceeds_one() {
        let mut a = item(0);
        for _ in 0..20 {
            a.increase(0.25);
        }
        assert!(a.grade < 1.0);
        assert!(a.grade > 0.99);
    }

    #[test]
    fn test_key_stop() {
        let key = KeyResult {
            id: None,
            staff_id: 1,
            shape: Shape::Flat,
            fifths: -2,
            bounds: Rect::from_bounds(0, 0, 29, 10),
            grade: 0.5,
            guessed_clef: ClefKind::Treble,
            alters: vec![item(0), item(20)],
        };
        assert_eq!(key.stop(), Some(29));
    }

    #[test]
    fn test_shape_names() {
        assert_eq!(Shape::Sharp.name(), "sharp");
        assert_eq!(Shape::KEY_SHAPES.len(), 2);
    }
}
