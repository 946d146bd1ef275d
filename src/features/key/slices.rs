//! Key area partitioning into slices
//!
//! Once the signature is known, the key area is cut into one vertical slice per
//! alteration item. Slice starts come from the projection peaks: for sharps, the middle
//! of the gap between two consecutive sharps; for flats, the stem of each flat (a flat
//! stem is its leftmost part).

use crate::analysis::result::{AlterItem, Shape};
use crate::config::KeyParameters;
use crate::features::glyph::{Evaluation, Glyph};
use crate::features::peak_picking::Peak;
use crate::features::projection::Projection;
use crate::features::signature::{last_good_peak, Signature};
use crate::sheet::staff::KeyRange;
use crate::sheet::Rect;

/// Vertical extent of the region of interest of a staff header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    /// Top ordinate
    pub y: i32,
    /// Height in pixels
    pub height: i32,
}

impl Roi {
    /// Region covering `[y_min, y_max]`
    pub fn new(y_min: i32, y_max: i32) -> Self {
        Self {
            y: y_min,
            height: (y_max - y_min + 1).max(0),
        }
    }

    /// Last ordinate
    pub fn bottom(&self) -> i32 {
        self.y + self.height - 1
    }

    /// Rectangle of abscissa range `[start, stop]` over the whole region height
    pub fn rect(&self, start: i32, stop: i32) -> Rect {
        Rect::new(start, self.y, stop - start + 1, self.height)
    }
}

/// Best glyph found so far for a slice
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Candidate glyph
    pub glyph: Glyph,
    /// Its best evaluation among the target shapes
    pub evaluation: Evaluation,
}

/// Vertical slice of the key area, likely to contain one alteration item
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    /// Slice rectangle
    pub rect: Rect,
    /// Best candidate, if any
    pub candidate: Option<Candidate>,
    /// Accepted item, if any
    pub alter: Option<AlterItem>,
}

impl Slice {
    /// Create an empty slice
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            candidate: None,
            alter: None,
        }
    }

    /// Keep `glyph` as candidate if its evaluation beats the current one
    pub fn offer(&mut self, glyph: &Glyph, evaluation: Evaluation) {
        let better = match &self.candidate {
            Some(current) => current.evaluation.grade < evaluation.grade,
            None => true,
        };

        if better {
            self.candidate = Some(Candidate {
                glyph: glyph.clone(),
                evaluation,
            });
        }
    }

    /// True if an item was accepted in this slice
    pub fn has_alter(&self) -> bool {
        self.alter.is_some()
    }
}

/// Compute the starting abscissa of each key item
///
/// Also refines the key area stop, right after the last good peak. When the checked
/// signature holds fewer items than starts found, the trailing starts are dropped and
/// the area stops before the first dropped one.
///
/// # Returns
///
/// The item starts, empty if no consistent layout could be found
pub fn compute_starts(
    signature: Signature,
    peaks: &[Peak],
    range: &mut KeyRange,
    projection: &Projection,
    params: &KeyParameters,
) -> Vec<i32> {
    let area_start = match range.start {
        Some(start) => start,
        None => return vec![],
    };
    let good = match last_good_peak(peaks) {
        Some(peak) => *peak,
        None => return vec![],
    };

    let mut starts = vec![area_start];

    match signature.shape {
        Some(Shape::Sharp) => {
            for i in (2..peaks.len()).step_by(2) {
                if peaks[i].invalid {
                    break;
                }

                let mid = (peaks[i].start + peaks[i - 1].stop) as f64 / 2.0;
                starts.push(mid.ceil() as i32);
            }

            refine_stop(&good, params.sharp_trail, params.max_sharp_trail, projection, range);
        }
        Some(Shape::Flat) => {
            let first = &peaks[0];
            let heading = (first.start + first.stop) / 2 - area_start;

            if heading > params.max_flat_heading {
                log::debug!("Too large heading {} before first flat peak", heading);
                return vec![];
            }

            for peak in &peaks[1..] {
                if peak.invalid {
                    break;
                }

                starts.push(peak.start);
            }

            refine_stop(&good, params.flat_trail, params.max_flat_trail, projection, range);
        }
        _ => return vec![],
    }

    let count = signature.value.unsigned_abs() as usize;

    if count < starts.len() {
        log::debug!("Signature {} drops {} trailing starts", signature.value, starts.len() - count);
        range.stop = Some(starts[count] - 1);
        starts.truncate(count);
    }

    starts
}

/// Move the area stop to the column with the lowest count, within the trailing window
/// `[good.start + typical_trail - 1, good.start + max_trail]` right of the last good peak
pub fn refine_stop(
    good: &Peak,
    typical_trail: i32,
    max_trail: i32,
    projection: &Projection,
    range: &mut KeyRange,
) {
    let x_min = good.start + typical_trail - 1;
    let x_max = projection.stop().min(good.start + max_trail);
    let mut min_count = u32::MAX;

    for x in x_min..=x_max {
        let count = projection.value(x);

        if count < min_count {
            range.stop = Some(x - 1);
            min_count = count;
        }
    }
}

/// One slice per start, each ending right before the next one, the last one at `area_stop`
pub fn allocate_slices(starts: &[i32], area_stop: i32, roi: &Roi) -> Vec<Slice> {
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let stop = starts.get(i + 1).map(|next| next - 1).unwrap_or(area_stop);
            Slice::new(roi.rect(start, stop))
        })
        .collect()
}
