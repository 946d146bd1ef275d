//! Shape classifier capability
//!
//! The trained classifier lives outside this crate. Key retrieval only needs a scoring
//! oracle that grades a glyph against a fixed set of shapes.

use super::Glyph;
use crate::analysis::result::Shape;
use serde::{Deserialize, Serialize};

/// Classifier grade for one shape hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Shape hypothesis
    pub shape: Shape,
    /// Raw classifier grade (0.0-1.0)
    pub grade: f64,
}

impl Evaluation {
    /// Create a new evaluation
    pub fn new(shape: Shape, grade: f64) -> Self {
        Self { shape, grade }
    }
}

/// Shape scoring oracle
///
/// Implementations must be thread-safe: staves of a system may be processed in
/// parallel, all sharing the same classifier.
pub trait ShapeClassifier: Send + Sync {
    /// Grade `glyph` against every supported shape
    ///
    /// # Arguments
    ///
    /// * `glyph` - Candidate glyph, in absolute coordinates
    /// * `interline` - Interline of the sheet, in pixels
    ///
    /// # Returns
    ///
    /// One evaluation per supported shape, in any order
    fn evaluate(&self, glyph: &Glyph, interline: f64) -> Vec<Evaluation>;
}

/// Pick the evaluation of `shape` out of a classifier answer
pub fn evaluation_for(evaluations: &[Evaluation], shape: Shape) -> Option<Evaluation> {
    evaluations.iter().copied().find(|e| e.shape == shape)
}
