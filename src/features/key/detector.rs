//! Clef guess from key signature pitches
//!
//! Matches the pitches measured on the alteration items of a staff against the
//! canonical layout of each clef kind. The clef kind whose layout is closest (lowest
//! mean absolute pitch difference) is the guess.

use super::templates::ClefTemplates;
use crate::analysis::result::{ClefKind, Shape};

/// Clef guess, with the fit of every clef kind
#[derive(Debug, Clone)]
pub struct ClefGuess {
    /// Best fitting clef kind
    pub clef: ClefKind,

    /// Mean absolute pitch difference of every clef kind (ranked, best first)
    pub all_scores: Vec<(ClefKind, f64)>,
}

impl ClefGuess {
    /// Mean absolute difference reported for a clef kind
    pub fn score_of(&self, clef: ClefKind) -> Option<f64> {
        self.all_scores
            .iter()
            .find(|(k, _)| *k == clef)
            .map(|(_, s)| *s)
    }
}

/// Guess the clef kind out of the measured pitches of a key signature
///
/// # Arguments
///
/// * `shape` - Key shape (sharp or flat)
/// * `measured` - Measured pitch per slice, `None` for a slice without item
/// * `templates` - Canonical layouts
///
/// # Returns
///
/// The best fitting clef kind. Slices beyond the 7th and empty slices are ignored.
/// Without any measured pitch, all scores are 0 and the treble clef is returned.
///
/// # Example
///
/// ```
/// use stave_keysig::analysis::result::{ClefKind, Shape};
/// use stave_keysig::features::key::detector::guess_clef_kind;
/// use stave_keysig::features::key::templates::ClefTemplates;
///
/// let measured = [Some(-1.8), Some(1.2), None];
/// let guess = guess_clef_kind(Shape::Sharp, &measured, &ClefTemplates::new());
/// assert_eq!(guess.clef, ClefKind::Bass);
/// ```
pub fn guess_clef_kind(shape: Shape, measured: &[Option<f64>], templates: &ClefTemplates) -> ClefGuess {
    let mut scores: Vec<(ClefKind, f64)> = ClefKind::ALL
        .iter()
        .map(|&clef| {
            let canonical = templates.pitches(clef, shape);
            let (sum, count) = measured
                .iter()
                .zip(canonical.iter())
                .filter_map(|(m, &c)| m.map(|m| (m - c as f64).abs()))
                .fold((0.0, 0usize), |(s, n), d| (s + d, n + 1));
            let score = if count > 0 { sum / count as f64 } else { 0.0 };
            (clef, score)
        })
        .collect();

    // Stable sort keeps ClefKind::ALL order among ties
    scores.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let clef = scores.first().map(|(k, _)| *k).unwrap_or(ClefKind::Treble);

    log::debug!("Clef guess for {:?}: {:?} scores: {:?}", shape, clef, scores);

    ClefGuess {
        clef,
        all_scores: scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_treble_flats() {
        let measured: Vec<Option<f64>> = [0, -3, 1].iter().map(|&p| Some(p as f64)).collect();
        let guess = guess_clef_kind(Shape::Flat, &measured, &ClefTemplates::new());
        assert_eq!(guess.clef, ClefKind::Treble);
        assert_eq!(guess.score_of(ClefKind::Treble), Some(0.0));
        assert_eq!(guess.score_of(ClefKind::Bass), Some(2.0));
    }

    #[test]
    fn test_noisy_tenor_sharps() {
        let measured = [Some(2.3), Some(-1.6), Some(0.8), Some(-3.2)];
        let guess = guess_clef_kind(Shape::Sharp, &measured, &ClefTemplates::new());
        assert_eq!(guess.clef, ClefKind::Tenor);
        assert_eq!(guess.all_scores[0].0, ClefKind::Tenor);
    }

    #[test]
    fn test_empty_slices_ignored() {
        let measured = [None, Some(-1.0)];
        let guess = guess_clef_kind(Shape::Sharp, &measured, &ClefTemplates::new());
        // Only the second sharp counts: treble -1, bass 1, alto 0, tenor -2
        assert_eq!(guess.clef, ClefKind::Treble);
    }

    #[test]
    fn test_no_pitch_defaults_to_treble() {
        let guess = guess_clef_kind(Shape::Flat, &[None, None], &ClefTemplates::new());
        assert_eq!(guess.clef, ClefKind::Treble);
        assert_eq!(guess.all_scores.len(), 4);
    }
}
