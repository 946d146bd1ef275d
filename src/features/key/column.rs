//! System-level key alignment
//!
//! Key signatures of all staves in a system start at the same abscissa offset from
//! measure start and their items are vertically aligned. The column runs every staff
//! builder, then uses this alignment to repair individual staves:
//!
//! - a missing leading slice is inserted at its theoretical offset
//! - a staff whose slices match no theoretical offset is processed again from a browse
//!   start closer to the theoretical one, at most `max_retries` times
//! - missing trailing slices are scanned for at their theoretical offsets
//! - slices still lacking an item are reported

use super::builder::KeyBuilder;
use super::mixture::fit_means;
use super::KeyContext;
use crate::analysis::diagnostics::KeyDiagnostics;
use crate::analysis::graph::InterGraph;
use crate::sheet::SystemInfo;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Key summary of one staff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffReport {
    /// Staff id
    pub staff_id: usize,
    /// Signed alteration count (0 when no key)
    pub fifths: i32,
    /// Number of slices
    pub slice_count: usize,
    /// Slices without accepted item
    pub weird_slices: usize,
}

/// Outcome of key retrieval for a system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnReport {
    /// System id
    pub system_id: usize,
    /// Per-staff summaries, by staff id
    pub staves: Vec<StaffReport>,
    /// Largest key stop offset from measure start, over all staves (0 when no key)
    pub max_key_offset: i32,
    /// Theoretical slice offsets from measure start
    pub offsets: Vec<i32>,
    /// Mean slice width
    pub mean_slice_width: i32,
    /// Per-staff diagnostics, by staff id
    pub diagnostics: Vec<KeyDiagnostics>,
}

/// Column of key builders, one per staff of a system
pub struct KeyColumn<'a> {
    ctx: KeyContext<'a>,
    system_id: usize,
    /// Sorted by staff id
    builders: Vec<KeyBuilder<'a>>,
    offsets: Vec<i32>,
    mean_slice_width: i32,
}

impl<'a> KeyColumn<'a> {
    /// Create one builder per staff of `system`
    pub fn new(ctx: KeyContext<'a>, system: &SystemInfo, projection_width: i32) -> Self {
        let mut builders: Vec<KeyBuilder<'a>> = system
            .staves
            .iter()
            .map(|staff| KeyBuilder::new(ctx, staff, projection_width))
            .collect();
        builders.sort_by_key(|b| b.id());

        Self {
            ctx,
            system_id: system.id,
            builders,
            offsets: Vec::new(),
            mean_slice_width: 0,
        }
    }

    /// Staff builders, by staff id
    pub fn builders(&self) -> &[KeyBuilder<'a>] {
        &self.builders
    }

    /// Theoretical slice offsets, once aligned
    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    /// Mean slice width, once aligned
    pub fn mean_slice_width(&self) -> i32 {
        self.mean_slice_width
    }

    /// Retrieve the keys of all staves
    ///
    /// Processes each staff, checks alignment when the system has several staves,
    /// reconciles pitches and records the results in the staff headers of `system` and
    /// in `graph`.
    pub fn retrieve_keys(&mut self, system: &mut SystemInfo, graph: &mut InterGraph) -> ColumnReport {
        log::debug!(
            "Key retrieval for system#{} ({} staves)",
            self.system_id,
            self.builders.len()
        );

        if self.ctx.config.parallel {
            self.builders.par_iter_mut().for_each(|b| b.process());
        } else {
            self.builders.iter_mut().for_each(|b| b.process());
        }

        if self.builders.len() > 1 {
            self.check_keys_alignment(graph);
        }

        for builder in self.builders.iter_mut() {
            match system.staves.iter_mut().find(|s| s.id() == builder.id()) {
                Some(staff) => builder.adjust_pitches(graph, &mut staff.header),
                None => log::warn!("No staff#{} in system#{}", builder.id(), self.system_id),
            }
        }

        let max_key_offset = system
            .staves
            .iter()
            .filter_map(|s| s.header.key_stop.map(|stop| stop - s.header.start))
            .fold(0, i32::max);

        ColumnReport {
            system_id: self.system_id,
            staves: self
                .builders
                .iter()
                .map(|b| StaffReport {
                    staff_id: b.id(),
                    fifths: b.key().map(|k| k.fifths).unwrap_or(0),
                    slice_count: b.slices().len(),
                    weird_slices: b.slices().iter().filter(|s| !s.has_alter()).count(),
                })
                .collect(),
            max_key_offset,
            offsets: self.offsets.clone(),
            mean_slice_width: self.mean_slice_width,
            diagnostics: self.builders.iter().map(|b| b.diagnostics()).collect(),
        }
    }

    /// Verify vertical alignment of keys within the system, and repair staves
    fn check_keys_alignment(&mut self, graph: &mut InterGraph) {
        self.compute_offsets();

        if self.offsets.is_empty() {
            return;
        }

        let max_dist = self.ctx.params.max_slice_dist;
        let max_retries = self.ctx.config.max_retries;

        // Missing leading slices, or misaligned staff
        for builder in self.builders.iter_mut() {
            let mut retries = 0;
            let mut i = 0;

            while i < builder.slices().len() {
                let x = builder.slices()[i].rect.x;
                let offset = x - builder.measure_start();

                match best_slice_index(&self.offsets, offset, max_dist) {
                    Some(index) if index > i => {
                        log::debug!("Staff#{} slice inserted at index {}", builder.id(), i);
                        builder.insert_slice(i, self.offsets[i]);
                    }
                    Some(_) => {}
                    None => {
                        log::debug!("Staff#{} misaligned slice index {} x={}", builder.id(), i, x);

                        if retries >= max_retries {
                            break;
                        }

                        retries += 1;
                        let target = builder.measure_start() + self.offsets[0];
                        let start = ((builder.range().browse_start + target) / 2)
                            .max(builder.measure_start())
                            .min(builder.range().browse_stop);
                        builder.reprocess(start, graph);

                        // New slices are checked from the first one
                        i = 0;
                        continue;
                    }
                }

                i += 1;
            }
        }

        // Missing trailing slices
        for builder in self.builders.iter_mut() {
            for i in builder.slices().len()..self.offsets.len() {
                let x = builder.measure_start() + self.offsets[i] - 1;
                log::debug!("Staff#{} investigating slice index {} at x={}", builder.id(), i, x);

                if !builder.scan_slice(x, x + self.mean_slice_width - 1) {
                    break;
                }
            }
        }

        for builder in self.builders.iter_mut() {
            builder.report_weird_slices();
        }
    }

    /// Theoretical offset of every slice index, and mean slice width
    fn compute_offsets(&mut self) {
        let mut per_index: Vec<Vec<f64>> = Vec::new();
        let mut values = Vec::new();
        let mut width_sum = 0i64;

        for builder in &self.builders {
            for (i, slice) in builder.slices().iter().enumerate() {
                let offset = (slice.rect.x - builder.measure_start()) as f64;
                width_sum += slice.rect.width as i64;

                if i >= per_index.len() {
                    per_index.push(Vec::new());
                }

                per_index[i].push(offset);
                values.push(offset);
            }
        }

        let initial: Vec<f64> = per_index
            .iter()
            .map(|pop| pop.iter().sum::<f64>() / pop.len() as f64)
            .collect();
        let fit = fit_means(&values, &initial, self.ctx.config.em_max_iterations);

        self.offsets = fit.means.iter().map(|m| m.round() as i32).collect();
        self.mean_slice_width = if values.is_empty() {
            0
        } else {
            (width_sum as f64 / values.len() as f64).round() as i32
        };

        log::debug!(
            "System#{} offsets: {:?} mean slice width: {}",
            self.system_id,
            self.offsets,
            self.mean_slice_width
        );
    }
}

/// Index of the theoretical offset closest to `offset`, if within `max_dist`
fn best_slice_index(offsets: &[i32], offset: i32, max_dist: i32) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;

    for (i, &theoretical) in offsets.iter().enumerate() {
        let dist = (theoretical - offset).abs();

        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((i, dist));
        }
    }

    best.filter(|&(_, d)| d <= max_dist).map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_slice_index() {
        let offsets = [40, 61, 82];
        assert_eq!(best_slice_index(&offsets, 41, 10), Some(0));
        assert_eq!(best_slice_index(&offsets, 62, 10), Some(1));
        assert_eq!(best_slice_index(&offsets, 90, 10), Some(2));
        assert_eq!(best_slice_index(&offsets, 100, 10), None);
        assert_eq!(best_slice_index(&[], 40, 10), None);
    }

    #[test]
    fn test_best_slice_index_tie_keeps_first() {
        assert_eq!(best_slice_index(&[40, 60], 50, 10), Some(0));
    }
}
