//! Canonical key signature layouts
//!
//! For each clef kind, the staff pitch position of every sharp and every flat of a key
//! signature, in order of appearance. Pitch positions are counted in half interlines,
//! 0 on the middle line, positive downward.

use crate::analysis::result::{ClefKind, Shape};

/// Pitch positions of the 7 sharps and 7 flats, for every clef kind
#[derive(Debug, Clone)]
pub struct ClefTemplates {
    /// Sharp positions, indexed like [`ClefKind::ALL`]
    pub sharps: [[i32; 7]; 4],

    /// Flat positions, indexed like [`ClefKind::ALL`]
    pub flats: [[i32; 7]; 4],
}

impl ClefTemplates {
    /// Create the standard templates
    pub fn new() -> Self {
        Self {
            sharps: [
                [-4, -1, -5, -2, 1, -3, 0], // Treble: F C G D A E B
                [-2, 1, -3, 0, 3, -1, 2],   // Bass
                [-3, 0, -4, -1, 2, -2, 1],  // Alto
                [2, -2, 1, -3, 0, -4, -1],  // Tenor
            ],
            flats: [
                [0, -3, 1, -2, 2, -1, 3], // Treble: B E A D G C F
                [2, -1, 3, 0, 4, 1, 5],   // Bass
                [1, -2, 2, -1, 3, 0, 4],  // Alto
                [-1, -4, 0, -3, 1, -2, 2], // Tenor
            ],
        }
    }

    /// Pitch positions for a clef kind and a key shape
    ///
    /// Only sharps and flats make key signatures; any other shape reads as flats.
    ///
    /// # Example
    ///
    /// ```
    /// use stave_keysig::analysis::result::{ClefKind, Shape};
    /// use stave_keysig::features::key::templates::ClefTemplates;
    ///
    /// let templates = ClefTemplates::new();
    /// assert_eq!(templates.pitches(ClefKind::Treble, Shape::Sharp)[0], -4);
    /// assert_eq!(templates.pitches(ClefKind::Bass, Shape::Flat)[0], 2);
    /// ```
    pub fn pitches(&self, clef: ClefKind, shape: Shape) -> &[i32; 7] {
        let idx = clef_index(clef);

        match shape {
            Shape::Sharp => &self.sharps[idx],
            _ => &self.flats[idx],
        }
    }
}

impl Default for ClefTemplates {
    fn default() -> Self {
        Self::new()
    }
}

fn clef_index(clef: ClefKind) -> usize {
    match clef {
        ClefKind::Treble => 0,
        ClefKind::Bass => 1,
        ClefKind::Alto => 2,
        ClefKind::Tenor => 3,
    }
}
