//! Staff geometry and staff header record

use super::Point;
use crate::analysis::result::KeyResult;
use serde::{Deserialize, Serialize};

/// A staff line, as a piecewise-linear function of abscissa
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffLine {
    /// Defining points, sorted by increasing abscissa
    points: Vec<(f64, f64)>,
}

impl StaffLine {
    /// Create a line from its defining points (sorted internally by abscissa)
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Self { points }
    }

    /// Horizontal line at ordinate `y`, spanning `[x_left, x_right]`
    pub fn horizontal(x_left: f64, x_right: f64, y: f64) -> Self {
        Self::new(vec![(x_left, y), (x_right, y)])
    }

    /// Ordinate (as precise value) at abscissa `x`, extrapolating beyond the ends
    pub fn y_at_f64(&self, x: f64) -> f64 {
        match self.points.len() {
            0 => 0.0,
            1 => self.points[0].1,
            n => {
                // Locate the segment to use, clamping to first/last segment
                let idx = self
                    .points
                    .windows(2)
                    .position(|w| x <= w[1].0)
                    .unwrap_or(n - 2);
                let (x0, y0) = self.points[idx];
                let (x1, y1) = self.points[idx + 1];

                if (x1 - x0).abs() < f64::EPSILON {
                    y0
                } else {
                    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
                }
            }
        }
    }

    /// Rounded ordinate at abscissa `x`
    pub fn y_at(&self, x: i32) -> i32 {
        self.y_at_f64(x as f64).round() as i32
    }
}

/// A bar line candidate, as provided by bar line detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Barline {
    /// Left abscissa of the bar line
    pub x: i32,
    /// Width of the bar line
    pub width: i32,
    /// True if the bar line is reliable enough to bound key browsing
    pub good: bool,
}

/// Immutable staff geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffGeometry {
    /// Staff id, unique within the sheet
    pub id: usize,
    /// First (top) staff line
    pub first_line: StaffLine,
    /// Last (bottom) staff line
    pub last_line: StaffLine,
    /// Bar lines of the staff, sorted by abscissa
    pub bars: Vec<Barline>,
}

impl StaffGeometry {
    /// Pitch position of a point: 0 on the middle line, -4 on the top line, +4 on the
    /// bottom line (positive downward, one unit per half interline).
    pub fn pitch_position_of(&self, x: f64, y: f64) -> f64 {
        let top = self.first_line.y_at_f64(x);
        let bottom = self.last_line.y_at_f64(x);

        if (bottom - top).abs() < f64::EPSILON {
            return 0.0;
        }

        4.0 * (2.0 * y - bottom - top) / (bottom - top)
    }

    /// Pitch position of an integer point
    pub fn pitch_of(&self, p: Point) -> f64 {
        self.pitch_position_of(p.x as f64, p.y as f64)
    }
}

/// Key signature abscissa range, persisted per staff
///
/// `browse_start` / `browse_stop` bound the projection scan; `start` / `stop` are the
/// inferred key area bounds, set while scanning and refined while slicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyRange {
    /// First abscissa to browse
    pub browse_start: i32,
    /// Last abscissa to browse
    pub browse_stop: i32,
    /// Inferred key area start, if any
    pub start: Option<i32>,
    /// Inferred key area stop, if any
    pub stop: Option<i32>,
}

impl KeyRange {
    /// Create a blank range over the provided browse bounds
    pub fn new(browse_start: i32, browse_stop: i32) -> Self {
        Self {
            browse_start,
            browse_stop,
            start: None,
            stop: None,
        }
    }

    /// Forget the inferred area bounds, keeping browse bounds
    pub fn clear_area(&mut self) {
        self.start = None;
        self.stop = None;
    }
}

/// Per-staff header record: inputs from clef detection and key outputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffHeader {
    /// Precise abscissa of measure start (generally right after the left bar line)
    pub start: i32,
    /// Abscissa of clef right end, if a clef was found
    pub clef_stop: Option<i32>,
    /// Current end of header (used as browse start when no clef is known)
    pub stop: i32,
    /// Key range, if key retrieval ran on this staff
    pub key_range: Option<KeyRange>,
    /// Resulting key signature, if any
    pub key: Option<KeyResult>,
    /// Left abscissa of each key slice
    pub alter_starts: Vec<i32>,
    /// Abscissa of the right end of the last accepted alteration
    pub key_stop: Option<i32>,
}

/// A staff: geometry plus header record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffInfo {
    /// Staff geometry
    pub geometry: StaffGeometry,
    /// Staff header record
    pub header: StaffHeader,
}

impl StaffInfo {
    /// Create a staff with a fresh header starting at `measure_start`
    pub fn new(geometry: StaffGeometry, measure_start: i32) -> Self {
        Self {
            geometry,
            header: StaffHeader {
                start: measure_start,
                stop: measure_start,
                ..StaffHeader::default()
            },
        }
    }

    /// Staff id
    pub fn id(&self) -> usize {
        self.geometry.id
    }

    /// Abscissa where key browsing should begin: right after the clef if any,
    /// otherwise at the current header end
    pub fn browse_start(&self) -> i32 {
        match self.header.clef_stop {
            Some(clef_stop) => clef_stop + 1,
            None => self.header.stop,
        }
    }
}

/// A system: a vertical group of staves processed together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// System id
    pub id: usize,
    /// Staves, top to bottom
    pub staves: Vec<StaffInfo>,
}
