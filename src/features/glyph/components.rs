//! Connected component building
//!
//! The default builder decomposes the buffer into vertical runs (one per contiguous
//! foreground span of a column), then links runs of adjacent columns that touch,
//! diagonals included.

use super::Glyph;
use crate::io::FOREGROUND;
use crate::sheet::Point;
use image::GrayImage;

/// Connected component capability
pub trait ComponentBuilder: Send + Sync {
    /// Build the connected components of `buffer`
    ///
    /// # Arguments
    ///
    /// * `buffer` - Binary buffer, foreground = 0
    /// * `origin` - Absolute location of the buffer top-left pixel
    ///
    /// # Returns
    ///
    /// Components in absolute coordinates, sorted by bounds left then top
    fn build_components(&self, buffer: &GrayImage, origin: Point) -> Vec<Glyph>;
}

/// Vertical run: column x, rows [y_start, y_stop]
#[derive(Debug, Clone, Copy)]
struct Run {
    x: u32,
    y_start: u32,
    y_stop: u32,
}

/// 8-connected components, built out of vertical runs
#[derive(Debug, Clone, Copy, Default)]
pub struct RunComponentBuilder;

impl RunComponentBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self
    }

    fn runs_of(buffer: &GrayImage) -> Vec<Vec<Run>> {
        let (width, height) = buffer.dimensions();
        let mut columns = Vec::with_capacity(width as usize);

        for x in 0..width {
            let mut runs = Vec::new();
            let mut start: Option<u32> = None;

            for y in 0..height {
                let fore = buffer.get_pixel(x, y).0[0] == FOREGROUND;

                match (fore, start) {
                    (true, None) => start = Some(y),
                    (false, Some(s)) => {
                        runs.push(Run {
                            x,
                            y_start: s,
                            y_stop: y - 1,
                        });
                        start = None;
                    }
                    _ => {}
                }
            }

            if let Some(s) = start {
                runs.push(Run {
                    x,
                    y_start: s,
                    y_stop: height - 1,
                });
            }

            columns.push(runs);
        }

        columns
    }
}

fn find(parents: &mut [usize], mut i: usize) -> usize {
    while parents[i] != i {
        parents[i] = parents[parents[i]];
        i = parents[i];
    }
    i
}

fn union(parents: &mut [usize], a: usize, b: usize) {
    let ra = find(parents, a);
    let rb = find(parents, b);

    if ra != rb {
        // Keep the smallest index as root, for deterministic output
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parents[hi] = lo;
    }
}

impl ComponentBuilder for RunComponentBuilder {
    fn build_components(&self, buffer: &GrayImage, origin: Point) -> Vec<Glyph> {
        let columns = Self::runs_of(buffer);

        // Flatten runs, remembering where each column begins
        let mut runs = Vec::new();
        let mut column_starts = Vec::with_capacity(columns.len() + 1);

        for column in &columns {
            column_starts.push(runs.len());
            runs.extend_from_slice(column);
        }
        column_starts.push(runs.len());

        let mut parents: Vec<usize> = (0..runs.len()).collect();

        for x in 1..columns.len() {
            let prev = column_starts[x - 1]..column_starts[x];
            let curr = column_starts[x]..column_starts[x + 1];

            for i in curr {
                for j in prev.clone() {
                    // Overlap, with one pixel tolerance for diagonal contact
                    let touching = runs[j].y_start <= runs[i].y_stop + 1
                        && runs[i].y_start <= runs[j].y_stop + 1;

                    if touching {
                        union(&mut parents, i, j);
                    }
                }
            }
        }

        let mut groups: std::collections::BTreeMap<usize, Vec<Point>> =
            std::collections::BTreeMap::new();

        for (i, run) in runs.iter().enumerate() {
            let root = find(&mut parents, i);
            let pixels = groups.entry(root).or_default();

            for y in run.y_start..=run.y_stop {
                pixels.push(Point::new(origin.x + run.x as i32, origin.y + y as i32));
            }
        }

        let mut glyphs: Vec<Glyph> = groups
            .into_values()
            .filter_map(Glyph::from_pixels)
            .collect();
        glyphs.sort_by_key(|g| (g.bounds().x, g.bounds().y));

        log::debug!(
            "Built {} components out of {} runs at ({}, {})",
            glyphs.len(),
            runs.len(),
            origin.x,
            origin.y
        );

        glyphs
    }
}
