//! Per-staff key signature builder
//!
//! A builder owns the key search state of one staff: projection, key range, peaks,
//! events and slices. The processing runs in two phases:
//!
//! 1. [`KeyBuilder::process`] scans the projection, infers the signature, cuts the key
//!    area into slices and extracts one alteration glyph per slice. This phase only
//!    reads shared data and can run for all staves of a system in parallel.
//! 2. [`KeyBuilder::adjust_pitches`] snaps item pitches to the best fitting clef layout,
//!    builds the key result, registers it into the result graph and records it in the
//!    staff header.
//!
//! In between, the system column may reprocess the staff, insert a missing leading
//! slice or append trailing slices.

use super::detector::guess_clef_kind;
use super::slices::{allocate_slices, compute_starts, Candidate, Roi, Slice};
use super::templates::ClefTemplates;
use super::KeyContext;
use crate::analysis::diagnostics::{KeyDiagnostics, KeyFlag, SliceDiagnostics, Thresholds};
use crate::analysis::graph::{ExclusionCause, InterGraph, InterKind, Relation};
use crate::analysis::result::{AlterItem, ClefKind, KeyResult, Shape};
use crate::config::KeyParameters;
use crate::features::glyph::classifier::evaluation_for;
use crate::features::glyph::{decompose, ClusterAdapter, Glyph};
use crate::features::peak_picking::{browse_area, KeyEvent, Peak};
use crate::features::projection::Projection;
use crate::features::signature::{check_signature, infer_signature};
use crate::features::stem::has_stem;
use crate::io::{copy_region, PixelSource, BACKGROUND};
use crate::sheet::staff::{KeyRange, StaffGeometry, StaffHeader, StaffInfo};
use crate::sheet::{Point, Rect};
use image::Luma;

/// Key signature builder for one staff
pub struct KeyBuilder<'a> {
    ctx: KeyContext<'a>,
    geometry: StaffGeometry,
    measure_start: i32,
    roi: Roi,
    projection: Projection,
    range: KeyRange,
    peaks: Vec<Peak>,
    events: Vec<KeyEvent>,
    slices: Vec<Slice>,
    shape: Option<Shape>,
    key: Option<KeyResult>,
    /// Graph inters registered by this builder
    registered: Vec<usize>,
    flags: Vec<KeyFlag>,
}

impl<'a> KeyBuilder<'a> {
    /// Create a builder for `staff`, and build its header projection
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared read-only context
    /// * `staff` - Staff geometry and header (measure start, clef stop)
    /// * `projection_width` - Maximum browsing width, counted from measure start
    pub fn new(ctx: KeyContext<'a>, staff: &StaffInfo, projection_width: i32) -> Self {
        let params = ctx.params;
        let geometry = staff.geometry.clone();
        let measure_start = staff.header.start;
        let browse_start = staff.browse_start();
        let browse_stop = browse_stop_of(&geometry, projection_width, measure_start, browse_start);

        // Room for any key, whatever the clef: 2 interlines above, 1 below
        let x_min = (measure_start - params.pre_staff_margin).max(0);
        let y_min = (geometry.first_line.y_at(x_min) - params.roi_margin_above).max(0);
        let y_max = (geometry.last_line.y_at(x_min) + params.roi_margin_below)
            .min(ctx.source.height() - 1);
        let roi = Roi::new(y_min, y_max);

        if roi.height == 0 || browse_stop < browse_start {
            log::warn!(
                "Staff#{} degenerate key area x=[{}..{}] y=[{}..{}]",
                geometry.id,
                browse_start,
                browse_stop,
                y_min,
                y_max
            );
        }

        let projection = Projection::build(
            ctx.source,
            &Rect::from_bounds(x_min, roi.y, browse_stop, roi.bottom()),
        );

        Self {
            ctx,
            geometry,
            measure_start,
            roi,
            projection,
            range: KeyRange::new(browse_start, browse_stop),
            peaks: Vec::new(),
            events: Vec::new(),
            slices: Vec::new(),
            shape: None,
            key: None,
            registered: Vec::new(),
            flags: Vec::new(),
        }
    }

    /// Staff id
    pub fn id(&self) -> usize {
        self.geometry.id
    }

    /// Measure start abscissa
    pub fn measure_start(&self) -> i32 {
        self.measure_start
    }

    /// Current key range
    pub fn range(&self) -> &KeyRange {
        &self.range
    }

    /// Header projection
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Vertical extent of the key area
    pub fn roi(&self) -> &Roi {
        &self.roi
    }

    /// Accepted peaks, only the last one may be invalid
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Spaces and peaks found
    pub fn events(&self) -> &[KeyEvent] {
        &self.events
    }

    /// Slices, in abscissa order
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// Key shape, once known
    pub fn shape(&self) -> Option<Shape> {
        self.shape
    }

    /// Key result, once reconciled
    pub fn key(&self) -> Option<&KeyResult> {
        self.key.as_ref()
    }

    /// Flags raised so far
    pub fn flags(&self) -> &[KeyFlag] {
        &self.flags
    }

    /// Signed count of accepted items: positive for sharps, negative for flats
    pub fn fifths(&self) -> i32 {
        let count = self.slices.iter().filter(|s| s.has_alter()).count() as i32;

        match self.shape {
            Some(Shape::Sharp) => count,
            Some(_) => -count,
            None => 0,
        }
    }

    /// Process the potential key signature of the staff
    pub fn process(&mut self) {
        let params = self.ctx.params;
        log::debug!("Key processing for staff#{}", self.id());

        self.browse();

        let area_start = self.range.start.unwrap_or(self.range.browse_start);
        let mut signature = infer_signature(&mut self.peaks, area_start, params);

        if signature.value != 0 {
            signature = check_signature(signature, &self.peaks, &mut self.range, params);
        }

        if signature.value == 0 {
            return;
        }

        let starts = compute_starts(signature, &self.peaks, &mut self.range, &self.projection, params);

        if starts.is_empty() {
            return;
        }

        self.shape = signature.shape;
        let area_stop = self.range.stop.unwrap_or(self.range.browse_stop);
        self.slices = allocate_slices(&starts, area_stop, &self.roi);

        // Connected components over the whole key area first
        self.retrieve_components();

        // Then hard extraction, slice by slice, for the empty ones
        let empty: Vec<usize> = (0..self.slices.len())
            .filter(|&i| !self.slices[i].has_alter())
            .collect();

        if !empty.is_empty() {
            log::debug!("Staff#{} empty key slices: {:?}", self.id(), empty);
            let shapes = self.target_shapes();

            for i in empty {
                self.extract_alter(i, &shapes, self.ctx.config.slice_alter_min_grade);
            }
        }
    }

    /// Forget everything found so far, including the inters registered in `graph`
    ///
    /// Only the re-run flags survive: the other flags describe slices that are gone.
    pub fn reset(&mut self, graph: &mut InterGraph) {
        for id in self.registered.drain(..) {
            graph.remove_inter(id);
        }

        self.flags
            .retain(|flag| matches!(flag, KeyFlag::Reprocessed { .. }));

        self.peaks.clear();
        self.events.clear();
        self.slices.clear();
        self.range.clear_area();
        self.shape = None;
        self.key = None;
    }

    /// Process again, from a new browse start
    pub fn reprocess(&mut self, browse_start: i32, graph: &mut InterGraph) {
        log::debug!("Staff#{} reprocessing from x={}", self.id(), browse_start);
        self.flags.push(KeyFlag::Reprocessed { browse_start });
        self.range.browse_start = browse_start;
        self.reset(graph);
        self.process();
    }

    /// Insert a slice at `index`, from `measure_start + offset` to the start of the slice
    /// currently at `index`, and try to extract an item there
    ///
    /// Returns false when there is no room for such a slice.
    pub fn insert_slice(&mut self, index: usize, offset: i32) -> bool {
        let next_x = match self.slices.get(index) {
            Some(next) => next.rect.x,
            None => return false,
        };
        let mut start = self.measure_start + offset;

        if index > 0 {
            start = start.max(self.slices[index - 1].rect.right() + 1);
        }

        if start > next_x - 1 {
            log::debug!("Staff#{} no room for a slice at index {}", self.id(), index);
            return false;
        }

        self.slices.insert(index, Slice::new(self.roi.rect(start, next_x - 1)));
        self.flags.push(KeyFlag::SliceInserted { index });
        log::debug!("Staff#{} trying to insert key slice#{} at x={}", self.id(), index + 1, start);

        let shapes = self.target_shapes();
        self.extract_alter(index, &shapes, self.ctx.config.slice_alter_min_grade);

        true
    }

    /// Append a slice over `[start, stop]` if the range is not void, and try to extract
    /// an item there
    ///
    /// Returns false when nothing significant lies in the range.
    pub fn scan_slice(&mut self, start: i32, stop: i32) -> bool {
        let start = match self.slices.last() {
            Some(last) => start.max(last.rect.right() + 1),
            None => start,
        };

        if start > stop
            || self
                .projection
                .is_range_void(start, stop, self.ctx.params.max_space_cumul / 2)
        {
            return false;
        }

        self.slices.push(Slice::new(self.roi.rect(start, stop)));
        let index = self.slices.len() - 1;
        self.flags.push(KeyFlag::SliceAppended { index });
        log::debug!("Staff#{} trying to append key slice#{} at x={}", self.id(), index + 1, start);

        let shapes = self.target_shapes();

        if self.extract_alter(index, &shapes, self.ctx.config.slice_alter_min_grade)
            && self.shape.is_none()
        {
            self.shape = self.slices[index].alter.as_ref().map(|a| a.shape);
        }

        true
    }

    /// Reconcile the items with the best fitting clef layout, and record the key
    ///
    /// Registers items and key into `graph`, links the key to the nearest preceding
    /// clef candidates, and writes key range, slice starts, key and key stop into
    /// `header`.
    pub fn adjust_pitches(&mut self, graph: &mut InterGraph, header: &mut StaffHeader) {
        header.key_range = Some(self.range);

        let shape = match self.shape {
            Some(shape) if !self.slices.is_empty() => shape,
            _ => return,
        };
        let staff_id = self.geometry.id;

        let measured: Vec<Option<f64>> = self
            .slices
            .iter()
            .map(|s| s.alter.as_ref().map(|a| a.measured_pitch))
            .collect();
        let templates = ClefTemplates::new();
        let guess = guess_clef_kind(shape, &measured, &templates);
        let canonical = templates.pitches(guess.clef, shape);

        for (i, slice) in self.slices.iter_mut().enumerate() {
            match slice.alter.as_mut() {
                Some(item) => {
                    if let Some(&pitch) = canonical.get(i) {
                        if item.pitch != pitch {
                            log::info!(
                                "Staff#{} slice#{} pitch adjusted from {:.1} to {}",
                                staff_id,
                                i + 1,
                                item.measured_pitch,
                                pitch
                            );
                            self.flags.push(KeyFlag::PitchAdjusted {
                                index: i,
                                measured: item.measured_pitch,
                                pitch,
                            });
                            item.pitch = pitch;
                        }
                    }
                }
                None => log::info!("Staff#{} no alter for slice#{}", staff_id, i + 1),
            }
        }

        header.alter_starts = self.slices.iter().map(|s| s.rect.x).collect();

        let mut key = match self.create_key(graph, guess.clef) {
            Some(key) => key,
            None => return,
        };

        self.check_with_clefs(graph, &key, guess.clef);

        // Items of a key support each other
        let bonus = self.ctx.config.key_alter_bonus;

        for item in self.slices.iter_mut().filter_map(|s| s.alter.as_mut()) {
            item.increase(bonus);

            if let Some(id) = item.id {
                graph.set_grade(id, item.grade);
            }
        }

        key.alters = self
            .slices
            .iter()
            .filter_map(|s| s.alter.clone())
            .collect();
        header.key_stop = key.stop();
        header.key = Some(key.clone());
        self.key = Some(key);
    }

    /// Flag the slices still lacking an item, and return their count
    pub fn report_weird_slices(&mut self) -> usize {
        let staff_id = self.geometry.id;
        let mut count = 0;

        for (index, slice) in self.slices.iter().enumerate() {
            if !slice.has_alter() {
                log::info!("Staff#{} weird key slice#{} at {:?}", staff_id, index + 1, slice.rect);
                self.flags.push(KeyFlag::WeirdSlice { index });
                count += 1;
            }
        }

        count
    }

    /// Snapshot of the builder state
    pub fn diagnostics(&self) -> KeyDiagnostics {
        let params = self.ctx.params;
        let mut diagnostics = KeyDiagnostics::new(self.id());
        diagnostics.projection_start = self.projection.start();
        diagnostics.projection = self.projection.values().to_vec();
        diagnostics.thresholds = Thresholds {
            min_peak_cumul: params.min_peak_cumul,
            max_space_cumul: params.max_space_cumul,
            max_peak_cumul: params.max_peak_cumul,
        };
        diagnostics.browse_start = self.range.browse_start;
        diagnostics.browse_stop = self.range.browse_stop;
        diagnostics.area_start = self.range.start;
        diagnostics.area_stop = self.range.stop;
        diagnostics.events = self.events.clone();
        diagnostics.slices = self
            .slices
            .iter()
            .enumerate()
            .map(|(i, s)| SliceDiagnostics {
                id: i + 1,
                rect: s.rect,
                candidate: s
                    .candidate
                    .as_ref()
                    .map(|c| (c.evaluation.shape, c.evaluation.grade)),
                accepted: s.has_alter(),
            })
            .collect();
        diagnostics.flags = self.flags.clone();
        diagnostics
    }

    fn target_shapes(&self) -> Vec<Shape> {
        match self.shape {
            Some(shape) => vec![shape],
            None => Shape::KEY_SHAPES.to_vec(),
        }
    }

    fn browse(&mut self) {
        let source = self.ctx.source;
        let params = self.ctx.params;
        let roi = self.roi;
        let staff_id = self.geometry.id;

        let outcome = browse_area(&self.projection, &mut self.range, params, |peak| {
            let stem = is_stem_like(peak, &roi, source, params);

            if !stem {
                log::debug!("Staff#{} {:?} no stem", staff_id, peak);
            }

            stem
        });

        if !outcome.key_possible {
            log::debug!("Staff#{} no key signature", staff_id);
            self.flags.push(KeyFlag::NoKeySignature);
        }

        self.peaks = outcome.peaks;
        self.events = outcome.events;
    }

    /// Whole-area extraction: each slice gets the best compound whose centroid it holds
    fn retrieve_components(&mut self) {
        let (start, stop) = match (self.slices.first(), self.slices.last()) {
            (Some(first), Some(last)) => (first.rect.x, last.rect.right()),
            _ => return,
        };

        if stop < start {
            return;
        }

        let ctx = self.ctx;
        let area = self.roi.rect(start, stop);
        let buffer = copy_region(ctx.source, &area);
        let mut parts = ctx
            .capabilities
            .components
            .build_components(&buffer, Point::new(area.x, area.y));
        purge_parts(&mut parts, stop, ctx.params);

        let shapes = self.target_shapes();
        let mut adapter = AreaAdapter {
            ctx,
            shapes: &shapes,
            slices: &mut self.slices,
        };
        decompose(&parts, &mut adapter);

        for i in 0..self.slices.len() {
            self.accept(i, ctx.config.alter_min_grade);
        }
    }

    /// Per-slice extraction, with accepted items of adjacent slices erased
    fn extract_alter(&mut self, index: usize, shapes: &[Shape], min_grade: f64) -> bool {
        let ctx = self.ctx;
        let rect = self.slices[index].rect;

        if rect.is_empty() {
            return false;
        }

        let mut buffer = copy_region(ctx.source, &rect);

        for j in [index.checked_sub(1), Some(index + 1)].into_iter().flatten() {
            let item = match self.slices.get(j).and_then(|s| s.alter.as_ref()) {
                Some(item) => item,
                None => continue,
            };

            if !item.glyph.bounds().intersects(&rect) {
                continue;
            }

            log::debug!("Erasing slice#{} item from slice#{}", j + 1, index + 1);

            for p in item.glyph.pixels().iter().filter(|p| rect.contains(**p)) {
                buffer.put_pixel(
                    (p.x - rect.x) as u32,
                    (p.y - rect.y) as u32,
                    Luma([BACKGROUND]),
                );
            }
        }

        let mut parts = ctx
            .capabilities
            .components
            .build_components(&buffer, Point::new(rect.x, rect.y));
        purge_parts(&mut parts, rect.right(), ctx.params);

        let mut adapter = SliceAdapter {
            ctx,
            shapes,
            slice: &mut self.slices[index],
        };
        decompose(&parts, &mut adapter);

        self.accept(index, min_grade)
    }

    /// Turn the slice candidate into an item if its grade is high enough
    fn accept(&mut self, index: usize, min_grade: f64) -> bool {
        let ctx = self.ctx;
        let geometry = &self.geometry;
        let slice = &mut self.slices[index];

        if slice.has_alter() {
            return true;
        }

        let candidate = match &slice.candidate {
            Some(candidate) => candidate,
            None => return false,
        };
        let grade = ctx.config.intrinsic_ratio * candidate.evaluation.grade;

        if grade < min_grade {
            log::debug!(
                "Slice#{} candidate {:?} too weak: {:.3}",
                index + 1,
                candidate.evaluation.shape,
                grade
            );
            return false;
        }

        slice.alter = Some(create_alter(candidate, grade, geometry, ctx.params));
        true
    }

    fn create_key(&mut self, graph: &mut InterGraph, clef: ClefKind) -> Option<KeyResult> {
        let shape = self.shape?;
        let staff_id = self.geometry.id;
        let mut ids = Vec::new();
        let mut bounds: Option<Rect> = None;

        for item in self.slices.iter_mut().filter_map(|s| s.alter.as_mut()) {
            let id = graph.add_inter(InterKind::KeyAlter(item.shape), staff_id, item.grade, item.bounds);
            item.id = Some(id);
            self.registered.push(id);
            ids.push(id);
            bounds = Some(match bounds {
                Some(b) => b.union(&item.bounds),
                None => item.bounds,
            });
        }

        let bounds = bounds?;

        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                graph.add_relation(a, b, Relation::KeyAlters);
            }
        }

        let support = self.ctx.config.alter_support_ratio;
        let grade = ids
            .iter()
            .map(|&id| graph.contextual_grade(id, support))
            .sum::<f64>()
            / ids.len() as f64;
        let fifths = match shape {
            Shape::Sharp => ids.len() as i32,
            _ => -(ids.len() as i32),
        };

        let key_id = graph.add_inter(InterKind::Key { fifths }, staff_id, grade, bounds);
        self.registered.push(key_id);

        log::debug!("Staff#{} key {} grade {:.3}", staff_id, fifths, grade);

        Some(KeyResult {
            id: Some(key_id),
            staff_id,
            shape,
            fifths,
            bounds,
            grade,
            guessed_clef: clef,
            alters: Vec::new(),
        })
    }

    /// Link the key to the nearest clef on its left and to the clefs competing with it
    fn check_with_clefs(&self, graph: &mut InterGraph, key: &KeyResult, guess: ClefKind) {
        let key_id = match key.id {
            Some(id) => id,
            None => return,
        };
        let last_clef = graph
            .staff_clefs(self.id())
            .iter()
            .rev()
            .find(|c| c.bounds.x < key.bounds.x)
            .map(|c| c.id);
        let last_clef = match last_clef {
            Some(id) => id,
            None => return,
        };

        let mut clefs: Vec<(usize, ClefKind)> = graph
            .exclusion_partners(last_clef)
            .into_iter()
            .chain(std::iter::once(last_clef))
            .filter_map(|id| match graph.inter(id).map(|i| i.kind) {
                Some(InterKind::Clef(kind)) => Some((id, kind)),
                _ => None,
            })
            .collect();
        clefs.dedup();

        for (id, kind) in clefs {
            if kind == guess {
                graph.add_relation(id, key_id, Relation::ClefKey);
            } else {
                log::debug!("Staff#{} clef {:?} incompatible with key", self.id(), kind);
                graph.insert_exclusion(id, key_id, ExclusionCause::Incompatible);
            }
        }
    }
}

/// Browsing stops right before the first good bar line after browse start, if any
fn browse_stop_of(geometry: &StaffGeometry, projection_width: i32, measure_start: i32, browse_start: i32) -> i32 {
    let end = measure_start + projection_width;

    geometry
        .bars
        .iter()
        .filter(|bar| bar.good && bar.x > browse_start && bar.x <= end)
        .map(|bar| bar.x - 1)
        .min()
        .unwrap_or(end)
}

fn is_stem_like(peak: &Peak, roi: &Roi, source: &dyn PixelSource, params: &KeyParameters) -> bool {
    let mut rect = roi.rect(peak.start, peak.stop);

    // Slight margin on both sides of thin peaks
    if peak.width() <= 2 {
        rect = rect.grow(1, 0);
    }

    has_stem(&rect, source, params.core_stem_length, params.min_black_ratio)
}

/// Drop tiny parts, and parts starting on the last column (next item stem)
fn purge_parts(parts: &mut Vec<Glyph>, x_max: i32, params: &KeyParameters) {
    parts.retain(|g| g.weight() >= params.min_part_weight && g.bounds().x != x_max);
}

fn create_alter(candidate: &Candidate, grade: f64, geometry: &StaffGeometry, params: &KeyParameters) -> AlterItem {
    let shape = candidate.evaluation.shape;
    let bounds = candidate.glyph.bounds();
    let x = (bounds.x + bounds.right()) as f64 / 2.0;

    // Flat pitch is given by its loop, at the bottom of the glyph
    let y = match shape {
        Shape::Flat => bounds.bottom() as f64 - params.flat_loop_height / 2.0,
        _ => (bounds.y + bounds.bottom()) as f64 / 2.0,
    };
    let measured_pitch = geometry.pitch_position_of(x, y);

    AlterItem {
        id: None,
        shape,
        grade,
        bounds,
        measured_pitch,
        pitch: measured_pitch.round() as i32,
        glyph: candidate.glyph.clone(),
    }
}

fn glyph_size_ok(params: &KeyParameters, bounds: &Rect) -> bool {
    bounds.height as f64 <= params.max_glyph_height && bounds.width as f64 <= params.max_glyph_width
}

fn offer_to(ctx: &KeyContext<'_>, shapes: &[Shape], slice: &mut Slice, glyph: &Glyph) {
    let evaluations = ctx
        .capabilities
        .classifier
        .evaluate(glyph, ctx.params.interline as f64);

    for &shape in shapes {
        if let Some(evaluation) = evaluation_for(&evaluations, shape) {
            slice.offer(glyph, evaluation);
        }
    }
}

/// Combination search over the whole key area
struct AreaAdapter<'s, 'a> {
    ctx: KeyContext<'a>,
    shapes: &'s [Shape],
    slices: &'s mut [Slice],
}

impl ClusterAdapter for AreaAdapter<'_, '_> {
    fn max_gap(&self) -> f64 {
        self.ctx.params.max_glyph_gap
    }

    fn is_size_acceptable(&self, bounds: &Rect) -> bool {
        glyph_size_ok(self.ctx.params, bounds)
    }

    fn is_weight_acceptable(&self, weight: usize) -> bool {
        weight as i64 >= self.ctx.params.min_glyph_weight as i64
    }

    fn evaluate_glyph(&mut self, glyph: &Glyph) {
        let centroid = glyph.centroid();

        if let Some(slice) = self.slices.iter_mut().find(|s| s.rect.x_embraces(centroid.x)) {
            offer_to(&self.ctx, self.shapes, slice, glyph);
        }
    }
}

/// Combination search within one slice
struct SliceAdapter<'s, 'a> {
    ctx: KeyContext<'a>,
    shapes: &'s [Shape],
    slice: &'s mut Slice,
}

impl ClusterAdapter for SliceAdapter<'_, '_> {
    fn max_gap(&self) -> f64 {
        self.ctx.params.max_glyph_gap
    }

    fn is_size_acceptable(&self, bounds: &Rect) -> bool {
        glyph_size_ok(self.ctx.params, bounds)
    }

    fn is_weight_acceptable(&self, weight: usize) -> bool {
        weight as i64 >= self.ctx.params.min_glyph_weight as i64
    }

    fn evaluate_glyph(&mut self, glyph: &Glyph) {
        offer_to(&self.ctx, self.shapes, self.slice, glyph);
    }
}
