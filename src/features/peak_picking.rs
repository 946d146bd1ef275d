//! Peak and space detection in a key signature projection
//!
//! Walks the projection left to right, emitting spaces (columns below a
//! low threshold) and peaks (columns above a high threshold). Peaks are candidate
//! alteration stems, spaces are candidate separators between header items.
//!
//! # Algorithm
//!
//! 1. Ignore leading columns until one drops below the peak threshold (the scan may
//!    start on the tail of the clef)
//! 2. The first space separates the clef from the next item; if it is too wide there is
//!    no key signature at all
//! 3. Each peak must be stem-like; non stem-like peaks are dropped silently
//! 4. A peak too high, too wide, too far from the previous one, or (for the first one)
//!    too far from browse start, is recorded as invalid and stops the scan
//! 5. An inner space too wide marks the end of the key signature area

use crate::config::KeyParameters;
use crate::features::projection::Projection;
use crate::sheet::staff::KeyRange;
use serde::{Deserialize, Serialize};

/// A column span of the projection above the peak threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peak {
    /// First abscissa
    pub start: i32,
    /// Last abscissa
    pub stop: i32,
    /// Maximum cumul value over the span
    pub height: i32,
    /// True if the peak disqualified the rest of the scan
    pub invalid: bool,
}

impl Peak {
    /// Create a valid peak
    pub fn new(start: i32, stop: i32, height: i32) -> Self {
        Self {
            start,
            stop,
            height,
            invalid: false,
        }
    }

    /// Width in columns
    pub fn width(&self) -> i32 {
        self.stop - self.start + 1
    }

    /// Center abscissa
    pub fn center(&self) -> f64 {
        (self.start + self.stop) as f64 / 2.0
    }
}

/// A column span of the projection below the space threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    /// First abscissa
    pub start: i32,
    /// Last abscissa
    pub stop: i32,
}

impl Space {
    /// Width in columns
    pub fn width(&self) -> i32 {
        self.stop - self.start + 1
    }
}

/// Event found while browsing the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEvent {
    /// Candidate stem
    Peak(Peak),
    /// Candidate separator
    Space(Space),
}

/// Result of a projection scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Accepted peaks, in abscissa order; only the last one may be invalid
    pub peaks: Vec<Peak>,
    /// Sequence of spaces and peaks, for diagnostics
    pub events: Vec<KeyEvent>,
    /// False if the first space was too wide: no key signature
    pub key_possible: bool,
}

/// Browse the projection over `[range.browse_start, range.browse_stop]`
///
/// Updates `range.start` and `range.stop` as the key area gets delimited.
///
/// # Arguments
///
/// * `projection` - Projection of the staff header region
/// * `range` - Key range, with browse bounds set and area bounds cleared
/// * `params` - Scale-dependent thresholds
/// * `is_stem_like` - Stem probe for a candidate peak
///
/// # Example
///
/// ```
/// use stave_keysig::config::{KeyConfig, KeyParameters};
/// use stave_keysig::features::peak_picking::browse_area;
/// use stave_keysig::features::projection::Projection;
/// use stave_keysig::sheet::{staff::KeyRange, Scale};
///
/// let params = KeyParameters::new(&KeyConfig::default(), &Scale::new(20, 2).unwrap());
/// let projection = Projection::from_values(0, vec![0; 100]);
/// let mut range = KeyRange::new(0, 99);
/// let outcome = browse_area(&projection, &mut range, &params, |_| true);
/// assert!(outcome.peaks.is_empty());
/// assert!(!outcome.key_possible);
/// ```
pub fn browse_area<F>(
    projection: &Projection,
    range: &mut KeyRange,
    params: &KeyParameters,
    is_stem_like: F,
) -> ScanOutcome
where
    F: FnMut(&Peak) -> bool,
{
    let mut scanner = EventScanner {
        range,
        params,
        is_stem_like,
        outcome: ScanOutcome {
            key_possible: true,
            ..ScanOutcome::default()
        },
    };
    scanner.browse(projection);

    log::debug!(
        "Browsed [{}..{}]: {} peaks, {} events, area {:?}..{:?}",
        scanner.range.browse_start,
        scanner.range.browse_stop,
        scanner.outcome.peaks.len(),
        scanner.outcome.events.len(),
        scanner.range.start,
        scanner.range.stop
    );

    scanner.outcome
}

struct EventScanner<'a, F> {
    range: &'a mut KeyRange,
    params: &'a KeyParameters,
    is_stem_like: F,
    outcome: ScanOutcome,
}

impl<'a, F> EventScanner<'a, F>
where
    F: FnMut(&Peak) -> bool,
{
    fn browse(&mut self, projection: &Projection) {
        let x_min = self.range.browse_start;
        let x_max = self.range.browse_stop;
        let min_peak_cumul = self.params.min_peak_cumul;
        let max_space_cumul = self.params.max_space_cumul;

        let mut space: Option<(i32, i32)> = None;
        let mut peak: Option<(i32, i32)> = None;
        let mut peak_height = 0;
        let mut valley_hit = false;

        for x in x_min..=x_max {
            let cumul = projection.value(x) as i32;

            if cumul >= min_peak_cumul {
                if !valley_hit {
                    continue;
                }

                if let Some((start, stop)) = space.take() {
                    if !self.create_space(start, stop) {
                        return;
                    }
                }

                peak = match peak {
                    Some((start, _)) => Some((start, x)),
                    None => Some((x, x)),
                };
                peak_height = peak_height.max(cumul);
            } else if !valley_hit {
                valley_hit = true;
            } else {
                if let Some((start, stop)) = peak.take() {
                    if !self.create_peak(start, stop, peak_height) {
                        return;
                    }

                    peak_height = 0;
                }

                if cumul <= max_space_cumul {
                    space = match space {
                        Some((start, _)) => Some((start, x)),
                        None => Some((x, x)),
                    };
                } else if let Some((start, stop)) = space.take() {
                    if !self.create_space(start, stop) {
                        return;
                    }
                }
            }
        }

        // Finish pending space or peak, if any
        if let Some((start, stop)) = space {
            self.create_space(start, stop);
        } else if let Some((start, stop)) = peak {
            self.create_peak(start, stop, peak_height);
        }
    }

    /// Returns whether browsing can keep on
    fn create_peak(&mut self, start: i32, stop: i32, height: i32) -> bool {
        let mut keep_on = true;
        let mut peak = Peak::new(start, stop, height);

        if height > self.params.max_peak_cumul || peak.width() > self.params.max_peak_width {
            log::debug!("Invalid height or width for {:?}", peak);
            peak.invalid = true;
            keep_on = false;
        } else {
            if !(self.is_stem_like)(&peak) {
                log::debug!("{:?} has no stem", peak);
                return true;
            }

            match self.outcome.peaks.last() {
                Some(prev) => {
                    let dx = peak.center() - prev.center();

                    if dx > self.params.max_peak_dx as f64 {
                        log::debug!("Too large delta {:.1} since previous peak", dx);
                        peak.invalid = true;
                        keep_on = false;
                    }
                }
                None => {
                    let offset = start - self.range.browse_start;

                    if offset > self.params.max_first_peak_offset {
                        log::debug!("First peak arrives too late, offset {}", offset);
                        peak.invalid = true;
                        keep_on = false;
                    } else if self.range.start.is_none() {
                        // No space was found before the peak, the key starts at browse start
                        self.range.start = Some(self.range.browse_start);
                    }
                }
            }
        }

        self.outcome.events.push(KeyEvent::Peak(peak));
        self.outcome.peaks.push(peak);

        keep_on
    }

    /// Returns whether browsing can keep on
    fn create_space(&mut self, start: i32, stop: i32) -> bool {
        let mut keep_on = true;
        let space = Space { start, stop };

        if self.range.start.is_none() {
            // Very first space found
            if space.width() > self.params.max_first_space_width {
                log::debug!("No key signature, first space {:?} too wide", space);
                self.outcome.key_possible = false;
                keep_on = false;
            } else {
                self.range.start = Some(space.stop + 1);
            }
        } else if self.outcome.peaks.is_empty() {
            // Item without peak, key area can only start after it
            self.range.start = Some(space.stop + 1);
        } else if space.width() > self.params.max_inner_space {
            self.range.stop = Some(space.start);
            keep_on = false;
        }

        self.outcome.events.push(KeyEvent::Space(space));

        keep_on
    }
}
