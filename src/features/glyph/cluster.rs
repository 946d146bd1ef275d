//! Combination search over glyph parts
//!
//! A symbol is often broken into several connected components (thin strokes, touching
//! staff line removal). This search enumerates every connected subset of parts, two
//! parts being neighbors when their bounding boxes are within a maximum gap, and hands
//! each acceptable compound to a scoring callback.
//!
//! Subsets are enumerated exactly once each (each subset is grown from its smallest
//! part index, extending only with parts of higher index). A subset whose bounds are not
//! acceptable is neither evaluated nor extended, since adding parts can only grow the
//! bounds.

use super::Glyph;
use crate::sheet::Rect;

/// Caller-supplied policy for a combination search
pub trait ClusterAdapter {
    /// Maximum distance between two parts of the same symbol
    fn max_gap(&self) -> f64;

    /// True if a compound of these bounds may be a valid symbol
    fn is_size_acceptable(&self, bounds: &Rect) -> bool;

    /// True if a compound of this weight may be a valid symbol
    fn is_weight_acceptable(&self, weight: usize) -> bool;

    /// Evaluate one candidate compound
    fn evaluate_glyph(&mut self, glyph: &Glyph);
}

/// Enumerate and evaluate connected combinations of `parts`
///
/// # Returns
///
/// The number of compounds handed to [`ClusterAdapter::evaluate_glyph`]
pub fn decompose<A>(parts: &[Glyph], adapter: &mut A) -> usize
where
    A: ClusterAdapter + ?Sized,
{
    let neighbors = neighborhood(parts, adapter.max_gap());
    let mut trials = 0;

    for seed in 0..parts.len() {
        let extension: Vec<usize> = neighbors[seed].iter().copied().filter(|&u| u > seed).collect();
        let mut subset = vec![seed];
        extend(
            parts,
            &neighbors,
            &mut subset,
            parts[seed].bounds(),
            extension,
            seed,
            adapter,
            &mut trials,
        );
    }

    log::debug!("Combination search over {} parts: {} trials", parts.len(), trials);

    trials
}

fn neighborhood(parts: &[Glyph], max_gap: f64) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); parts.len()];

    for i in 0..parts.len() {
        for j in (i + 1)..parts.len() {
            let (dx, dy) = parts[i].bounds().gap_to(&parts[j].bounds());
            let gap = ((dx * dx + dy * dy) as f64).sqrt();

            if gap <= max_gap {
                neighbors[i].push(j);
                neighbors[j].push(i);
            }
        }
    }

    neighbors
}

#[allow(clippy::too_many_arguments)]
fn extend<A>(
    parts: &[Glyph],
    neighbors: &[Vec<usize>],
    subset: &mut Vec<usize>,
    bounds: Rect,
    mut extension: Vec<usize>,
    seed: usize,
    adapter: &mut A,
    trials: &mut usize,
) where
    A: ClusterAdapter + ?Sized,
{
    if !adapter.is_size_acceptable(&bounds) {
        return;
    }

    let weight: usize = subset.iter().map(|&i| parts[i].weight()).sum();

    if adapter.is_weight_acceptable(weight) {
        if let Some(glyph) = Glyph::merge(subset.iter().map(|&i| &parts[i])) {
            *trials += 1;
            adapter.evaluate_glyph(&glyph);
        }
    }

    while let Some(w) = extension.pop() {
        // Exclusive neighbors of w: not in subset, not adjacent to subset
        let mut next_extension = extension.clone();

        for &u in &neighbors[w] {
            if u > seed
                && !subset.contains(&u)
                && !next_extension.contains(&u)
                && !subset.iter().any(|&s| neighbors[s].contains(&u))
            {
                next_extension.push(u);
            }
        }

        subset.push(w);
        let grown = bounds.union(&parts[w].bounds());
        extend(
            parts,
            neighbors,
            subset,
            grown,
            next_extension,
            seed,
            adapter,
            trials,
        );
        subset.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Point;
    use std::collections::BTreeSet;

    fn square(x: i32, y: i32, size: i32) -> Glyph {
        let mut pixels = vec![];
        for dx in 0..size {
            for dy in 0..size {
                pixels.push(Point::new(x + dx, y + dy));
            }
        }
        Glyph::from_pixels(pixels).unwrap()
    }

    struct Recorder {
        max_gap: f64,
        max_width: i32,
        min_weight: usize,
        /// Bounds and weight of every evaluated glyph
        seen: Vec<(Rect, usize)>,
    }

    impl ClusterAdapter for Recorder {
        fn max_gap(&self) -> f64 {
            self.max_gap
        }

        fn is_size_acceptable(&self, bounds: &Rect) -> bool {
            bounds.width <= self.max_width
        }

        fn is_weight_acceptable(&self, weight: usize) -> bool {
            weight >= self.min_weight
        }

        fn evaluate_glyph(&mut self, glyph: &Glyph) {
            self.seen.push((glyph.bounds(), glyph.weight()));
        }
    }

    fn recorder(max_gap: f64, max_width: i32, min_weight: usize) -> Recorder {
        Recorder {
            max_gap,
            max_width,
            min_weight,
            seen: vec![],
        }
    }

    #[test]
    fn test_chain_enumeration() {
        // Chain a - b - c: subsets {a},{b},{c},{ab},{bc},{abc}; {ac} is not connected
        let parts = vec![square(0, 0, 2), square(4, 0, 2), square(8, 0, 2)];
        let mut adapter = recorder(2.5, 100, 0);
        let trials = decompose(&parts, &mut adapter);
        assert_eq!(trials, 6);

        let unique: BTreeSet<(i32, i32, usize)> = adapter
            .seen
            .iter()
            .map(|(r, weight)| (r.x, r.width, *weight))
            .collect();
        assert_eq!(unique.len(), 6);
        // {a, b, c} spans the three squares
        assert!(unique.contains(&(0, 10, 12)));
        // {a, c} would share those bounds with two squares only
        assert!(!unique.contains(&(0, 10, 8)));
        assert!(unique.contains(&(4, 6, 8)));
    }

    #[test]
    fn test_triangle_enumerated_once() {
        // All three parts neighbors of each other: 7 subsets
        let parts = vec![square(0, 0, 2), square(3, 0, 2), square(0, 3, 2)];
        let mut adapter = recorder(5.0, 100, 0);
        assert_eq!(decompose(&parts, &mut adapter), 7);
    }

    #[test]
    fn test_size_pruning() {
        let parts = vec![square(0, 0, 2), square(4, 0, 2), square(8, 0, 2)];
        let mut adapter = recorder(2.5, 6, 0);
        // Only singles and pairs fit within 6 columns
        assert_eq!(decompose(&parts, &mut adapter), 5);
    }

    #[test]
    fn test_weight_filter() {
        let parts = vec![square(0, 0, 2), square(4, 0, 2)];
        let mut adapter = recorder(2.5, 100, 5);
        // Singles weigh 4, only the pair is evaluated
        assert_eq!(decompose(&parts, &mut adapter), 1);
        assert_eq!(adapter.seen[0].0.width, 6);
    }

    #[test]
    fn test_far_parts_not_combined() {
        let parts = vec![square(0, 0, 2), square(40, 0, 2)];
        let mut adapter = recorder(2.5, 100, 0);
        assert_eq!(decompose(&parts, &mut adapter), 2);
    }
}
