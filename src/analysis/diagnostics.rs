//! Per-staff diagnostics, for validation and tuning
//!
//! Everything needed to plot a staff header projection afterwards: the raw values, the
//! thresholds, the events found, the area and browse markers and the slices.

use super::result::Shape;
use crate::features::peak_picking::KeyEvent;
use crate::sheet::Rect;
use serde::{Deserialize, Serialize};

/// Noteworthy situation met while processing a staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyFlag {
    /// First space too wide: no key signature
    NoKeySignature,
    /// Staff processed again with a new browse start
    Reprocessed {
        /// New browse start
        browse_start: i32,
    },
    /// A leading slice was inserted during system alignment
    SliceInserted {
        /// Index of the inserted slice
        index: usize,
    },
    /// A trailing slice was appended during system alignment
    SliceAppended {
        /// Index of the appended slice
        index: usize,
    },
    /// Item pitch snapped to the clef pattern
    PitchAdjusted {
        /// Slice index
        index: usize,
        /// Measured pitch
        measured: f64,
        /// Canonical pitch
        pitch: i32,
    },
    /// Slice left without alteration after all repairs
    WeirdSlice {
        /// Slice index
        index: usize,
    },
}

/// Projection thresholds, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum cumul for a peak column
    pub min_peak_cumul: i32,
    /// Maximum cumul for a space column
    pub max_space_cumul: i32,
    /// Maximum cumul for an acceptable peak
    pub max_peak_cumul: i32,
}

/// Slice summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceDiagnostics {
    /// 1-based slice id
    pub id: usize,
    /// Slice rectangle
    pub rect: Rect,
    /// Best candidate shape and raw grade, if any candidate was evaluated
    pub candidate: Option<(Shape, f64)>,
    /// True if an alteration item was accepted
    pub accepted: bool,
}

/// Diagnostics of one staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDiagnostics {
    /// Crate version
    pub algorithm_version: String,
    /// Staff id
    pub staff_id: usize,
    /// Abscissa of the first projection value
    pub projection_start: i32,
    /// Projection values
    pub projection: Vec<u32>,
    /// Projection thresholds
    pub thresholds: Thresholds,
    /// Browse start abscissa
    pub browse_start: i32,
    /// Browse stop abscissa
    pub browse_stop: i32,
    /// Key area start, if any
    pub area_start: Option<i32>,
    /// Key area stop, if any
    pub area_stop: Option<i32>,
    /// Spaces and peaks, in abscissa order
    pub events: Vec<KeyEvent>,
    /// Slices, in abscissa order
    pub slices: Vec<SliceDiagnostics>,
    /// Flags raised while processing
    pub flags: Vec<KeyFlag>,
}

impl KeyDiagnostics {
    /// Empty diagnostics for a staff
    pub fn new(staff_id: usize) -> Self {
        Self {
            algorithm_version: env!("CARGO_PKG_VERSION").to_string(),
            staff_id,
            projection_start: 0,
            projection: vec![],
            thresholds: Thresholds::default(),
            browse_start: 0,
            browse_stop: 0,
            area_start: None,
            area_stop: None,
            events: vec![],
            slices: vec![],
            flags: vec![],
        }
    }

    /// Number of slices without accepted item
    pub fn weird_count(&self) -> usize {
        self.slices.iter().filter(|s| !s.accepted).count()
    }
}
