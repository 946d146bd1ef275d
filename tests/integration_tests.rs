//! Integration tests for key signature retrieval
//!
//! Staves are drawn into a `GrayImage` with an interline of 20 pixels: each staff top
//! line lies at `top`, its bottom line at `top + 80`. Sharps are two 2-pixel stems
//! crossed by two bars, flats a stem with a loop at its bottom right. The test
//! classifier grades a glyph by its number of stem-like column runs.

use image::{GrayImage, Luma};
use stave_keysig::analysis::diagnostics::KeyFlag;
use stave_keysig::analysis::graph::{ExclusionCause, InterGraph, Relation};
use stave_keysig::features::glyph::{Evaluation, Glyph, RunComponentBuilder, ShapeClassifier};
use stave_keysig::sheet::{Rect, Scale, StaffGeometry, StaffInfo, StaffLine, SystemInfo};
use stave_keysig::{retrieve_keys, Capabilities, ClefKind, ColumnReport, KeyConfig, KeyError, Shape};

const WIDTH: u32 = 240;
const MEASURE_START: i32 = 10;

/// Grades glyphs by their count of stem-like column runs: 2 for a sharp, 1 for a flat
struct StemCounter;

impl ShapeClassifier for StemCounter {
    fn evaluate(&self, glyph: &Glyph, interline: f64) -> Vec<Evaluation> {
        let b = glyph.bounds();
        let min_count = interline.max(0.5 * b.height as f64);
        let mut runs = 0;
        let mut in_run = false;

        for x in b.x..=b.right() {
            let stem = glyph.column_count(x) as f64 >= min_count;
            if stem && !in_run {
                runs += 1;
            }
            in_run = stem;
        }

        let (sharp, flat) = match runs {
            2 => (0.9, 0.1),
            1 => (0.1, 0.9),
            _ => (0.05, 0.05),
        };
        vec![
            Evaluation::new(Shape::Sharp, sharp),
            Evaluation::new(Shape::Flat, flat),
        ]
    }
}

fn fill(img: &mut GrayImage, x0: i32, y0: i32, x1: i32, y1: i32) {
    for x in x0..=x1 {
        for y in y0..=y1 {
            img.put_pixel(x as u32, y as u32, Luma([0]));
        }
    }
}

/// Ordinate of a pitch position on a staff
fn pitch_y(top: i32, pitch: i32) -> i32 {
    top + 40 + 10 * pitch
}

/// Sharp with left edge `gx`, centered on `yc`
fn draw_sharp(img: &mut GrayImage, gx: i32, yc: i32) {
    fill(img, gx + 4, yc - 30, gx + 5, yc + 29);
    fill(img, gx + 12, yc - 30, gx + 13, yc + 29);
    fill(img, gx, yc - 10, gx + 17, yc - 7);
    fill(img, gx, yc + 6, gx + 17, yc + 9);
}

/// Flat with stem at `gx`, loop centered on `yc` (glyph bottom at `yc + 10`)
fn draw_flat(img: &mut GrayImage, gx: i32, yc: i32) {
    fill(img, gx, yc - 39, gx + 1, yc + 10);
    fill(img, gx + 2, yc - 5, gx + 11, yc - 4);
    fill(img, gx + 2, yc + 9, gx + 11, yc + 10);
    fill(img, gx + 10, yc - 3, gx + 11, yc + 8);
}

fn blank(staves: u32) -> GrayImage {
    GrayImage::from_pixel(WIDTH, 200 * staves, Luma([255]))
}

/// Top line ordinate of staff `index` (0-based)
fn staff_top(index: usize) -> i32 {
    60 + 200 * index as i32
}

fn staff(index: usize, clef_stop: i32) -> StaffInfo {
    let top = staff_top(index) as f64;
    let geometry = StaffGeometry {
        id: index + 1,
        first_line: StaffLine::horizontal(0.0, (WIDTH - 1) as f64, top),
        last_line: StaffLine::horizontal(0.0, (WIDTH - 1) as f64, top + 80.0),
        bars: vec![],
    };
    let mut staff = StaffInfo::new(geometry, MEASURE_START);
    staff.header.clef_stop = Some(clef_stop);
    staff
}

fn system(count: usize) -> SystemInfo {
    SystemInfo {
        id: 1,
        staves: (0..count).map(|i| staff(i, 41)).collect(),
    }
}

fn run(
    system: &mut SystemInfo,
    img: &GrayImage,
    graph: &mut InterGraph,
    config: &KeyConfig,
) -> Result<ColumnReport, KeyError> {
    let components = RunComponentBuilder::new();
    let capabilities = Capabilities {
        classifier: &StemCounter,
        components: &components,
    };
    retrieve_keys(
        system,
        img,
        capabilities,
        graph,
        &Scale::new(20, 2)?,
        config,
        150,
    )
}

/// Two treble sharps (F, C) at 50 and 72
fn draw_two_sharps(img: &mut GrayImage, top: i32) {
    draw_sharp(img, 50, pitch_y(top, -4));
    draw_sharp(img, 72, pitch_y(top, -1));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_staff_has_no_key() {
        let img = blank(1);
        let mut system = system(1);
        let mut graph = InterGraph::new();

        let report = run(&mut system, &img, &mut graph, &KeyConfig::default()).unwrap();

        assert_eq!(report.staves[0].fifths, 0);
        assert_eq!(report.staves[0].slice_count, 0);
        assert_eq!(report.max_key_offset, 0);
        assert!(system.staves[0].header.key.is_none());
        assert!(system.staves[0].header.key_range.is_some());
        assert!(report.diagnostics[0].flags.contains(&KeyFlag::NoKeySignature));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_one_sharp() {
        let mut img = blank(1);
        draw_sharp(&mut img, 50, pitch_y(staff_top(0), -4));
        let mut system = system(1);
        let mut graph = InterGraph::new();

        let report = run(&mut system, &img, &mut graph, &KeyConfig::default()).unwrap();

        assert_eq!(report.staves[0].fifths, 1);
        assert_eq!(report.staves[0].slice_count, 1);
        let header = &system.staves[0].header;
        let key = header.key.as_ref().unwrap();
        assert_eq!(key.shape, Shape::Sharp);
        assert_eq!(key.alters[0].pitch, -4);
        assert_eq!(header.alter_starts, vec![50]);
        assert_eq!(header.key_stop, Some(67));
        assert_eq!(report.max_key_offset, 67 - MEASURE_START);
    }

    #[test]
    fn test_three_flats() {
        let top = staff_top(0);
        let mut img = blank(1);
        draw_flat(&mut img, 50, pitch_y(top, 0));
        draw_flat(&mut img, 68, pitch_y(top, -3));
        draw_flat(&mut img, 86, pitch_y(top, 1));
        let mut system = system(1);
        let mut graph = InterGraph::new();
        let clef = graph.add_clef(1, ClefKind::Treble, 0.8, Rect::from_bounds(15, 20, 40, 160));

        let report = run(&mut system, &img, &mut graph, &KeyConfig::default()).unwrap();

        assert_eq!(report.staves[0].fifths, -3);
        let header = &system.staves[0].header;
        assert_eq!(header.alter_starts, vec![50, 68, 86]);
        assert_eq!(header.key_stop, Some(97));

        let key = header.key.as_ref().unwrap();
        assert_eq!(key.guessed_clef, ClefKind::Treble);
        let pitches: Vec<i32> = key.alters.iter().map(|a| a.pitch).collect();
        assert_eq!(pitches, vec![0, -3, 1]);
        assert!(key
            .alters
            .windows(2)
            .all(|w| w[0].bounds.right() < w[1].bounds.x));

        // Clef, 3 items, key
        assert_eq!(graph.len(), 5);
        assert!(graph.has_relation(clef, key.id.unwrap(), Relation::ClefKey));

        let diagnostics = &report.diagnostics[0];
        assert_eq!(diagnostics.slices.len(), 3);
        assert_eq!(diagnostics.weird_count(), 0);
        assert_eq!(diagnostics.area_start, Some(50));
    }

    #[test]
    fn test_bass_flats_exclude_treble_clef() {
        let top = staff_top(0);
        let mut img = blank(1);
        draw_flat(&mut img, 50, pitch_y(top, 2));
        draw_flat(&mut img, 68, pitch_y(top, -1));
        draw_flat(&mut img, 86, pitch_y(top, 3));
        let mut system = system(1);
        let mut graph = InterGraph::new();
        let clef = graph.add_clef(1, ClefKind::Treble, 0.8, Rect::from_bounds(15, 20, 40, 160));

        run(&mut system, &img, &mut graph, &KeyConfig::default()).unwrap();

        let key = system.staves[0].header.key.as_ref().unwrap();
        assert_eq!(key.fifths, -3);
        assert_eq!(key.guessed_clef, ClefKind::Bass);
        assert!(graph.has_relation(
            clef,
            key.id.unwrap(),
            Relation::Exclusion(ExclusionCause::Incompatible)
        ));
    }

    #[test]
    fn test_five_sharp_peaks_make_two_sharps() {
        let top = staff_top(0);
        let mut img = blank(1);
        draw_two_sharps(&mut img, top);
        // Lone stem after the second sharp
        fill(&mut img, 98, top + 10, 99, top + 69);
        let mut system = system(1);
        let mut graph = InterGraph::new();

        let report = run(&mut system, &img, &mut graph, &KeyConfig::default()).unwrap();

        assert_eq!(report.staves[0].fifths, 2);
        assert_eq!(report.staves[0].slice_count, 2);
        assert_eq!(system.staves[0].header.alter_starts, vec![50, 70]);
        assert_eq!(system.staves[0].header.key_stop, Some(89));
    }

    #[test]
    fn test_leading_slice_insertion() {
        let mut img = blank(3);
        for i in 0..3 {
            draw_two_sharps(&mut img, staff_top(i));
        }
        let mut system = system(3);
        // Clef stop wrongly found past the first sharp of the third staff
        system.staves[2].header.clef_stop = Some(67);
        let mut graph = InterGraph::new();

        let report = run(&mut system, &img, &mut graph, &KeyConfig::default()).unwrap();

        assert_eq!(report.offsets, vec![40, 61]);
        assert_eq!(report.mean_slice_width, 20);
        for staff in &report.staves {
            assert_eq!(staff.fifths, 2);
            assert_eq!(staff.weird_slices, 0);
        }
        assert_eq!(system.staves[2].header.alter_starts, vec![50, 72]);
        assert!(report.diagnostics[2]
            .flags
            .contains(&KeyFlag::SliceInserted { index: 0 }));
    }

    #[test]
    fn test_trailing_slice_scan() {
        let mut img = blank(3);
        for i in 0..3 {
            draw_two_sharps(&mut img, staff_top(i));
        }
        // Below the second sharp of the third staff, a segment makes its first stem
        // peak too high
        let top = staff_top(2);
        fill(&mut img, 76, top + 62, 77, top + 90);
        let mut system = system(3);
        let mut graph = InterGraph::new();

        let report = run(&mut system, &img, &mut graph, &KeyConfig::default()).unwrap();

        assert_eq!(report.offsets, vec![40, 60]);
        assert_eq!(report.staves[2].fifths, 2);
        assert_eq!(system.staves[2].header.alter_starts, vec![50, 69]);
        assert!(report.diagnostics[2]
            .flags
            .contains(&KeyFlag::SliceAppended { index: 1 }));
    }

    /// Three aligned staves, and a fourth one whose key lies 22 pixels to the right
    fn misaligned_image() -> GrayImage {
        let mut img = blank(4);
        for i in 0..3 {
            draw_two_sharps(&mut img, staff_top(i));
        }
        let top = staff_top(3);
        draw_sharp(&mut img, 72, pitch_y(top, -4));
        draw_sharp(&mut img, 94, pitch_y(top, -1));
        img
    }

    fn misaligned_system() -> SystemInfo {
        let mut system = system(4);
        system.staves[3].header.clef_stop = Some(62);
        system
    }

    fn reruns(flags: &[KeyFlag]) -> Vec<i32> {
        flags
            .iter()
            .filter_map(|f| match f {
                KeyFlag::Reprocessed { browse_start } => Some(*browse_start),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_misaligned_staff_is_reprocessed() {
        let img = misaligned_image();
        let mut system = misaligned_system();
        let mut graph = InterGraph::new();

        let report = run(&mut system, &img, &mut graph, &KeyConfig::default()).unwrap();

        // Offsets 62 and 82 of the fourth staff pull the second mean
        assert_eq!(report.offsets, vec![40, 65]);

        // (63 + 10 + 40) / 2
        let flags = &report.diagnostics[3].flags;
        assert_eq!(reruns(flags), vec![56]);
        assert_eq!(report.diagnostics[3].browse_start, 56);
        assert_eq!(
            flags
                .iter()
                .filter(|f| matches!(f, KeyFlag::SliceInserted { .. }))
                .count(),
            1
        );

        // Empty leading slice inserted again after the re-run, the two sharps kept
        assert_eq!(report.staves[3].fifths, 2);
        assert_eq!(report.staves[3].slice_count, 3);
        assert_eq!(report.staves[3].weird_slices, 1);
        assert_eq!(system.staves[3].header.alter_starts, vec![50, 72, 92]);

        for staff in &report.staves[..3] {
            assert_eq!(staff.fifths, 2);
            assert!(reruns(&report.diagnostics[staff.staff_id - 1].flags).is_empty());
        }
    }

    #[test]
    fn test_reprocess_count_is_capped() {
        let img = misaligned_image();
        let mut system = misaligned_system();

        let config = KeyConfig {
            max_retries: 3,
            ..KeyConfig::default()
        };
        let report = run(&mut system, &img, &mut InterGraph::new(), &config).unwrap();

        // Each re-run halves the distance to measure start + 40
        assert_eq!(reruns(&report.diagnostics[3].flags), vec![56, 53, 51]);
        assert_eq!(report.diagnostics[3].browse_start, 51);
        assert_eq!(report.staves[3].fifths, 2);

        let config = KeyConfig {
            max_retries: 0,
            ..KeyConfig::default()
        };
        let mut system = misaligned_system();
        let report = run(&mut system, &img, &mut InterGraph::new(), &config).unwrap();

        assert!(reruns(&report.diagnostics[3].flags).is_empty());
        assert_eq!(report.diagnostics[3].browse_start, 63);
        assert_eq!(report.staves[3].fifths, 2);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let mut img = blank(3);
        for i in 0..3 {
            draw_two_sharps(&mut img, staff_top(i));
        }

        let mut parallel_system = system(3);
        parallel_system.staves[2].header.clef_stop = Some(67);
        let mut sequential_system = parallel_system.clone();

        let parallel = run(
            &mut parallel_system,
            &img,
            &mut InterGraph::new(),
            &KeyConfig::default(),
        )
        .unwrap();
        let config = KeyConfig {
            parallel: false,
            ..KeyConfig::default()
        };
        let sequential = run(&mut sequential_system, &img, &mut InterGraph::new(), &config).unwrap();

        assert_eq!(parallel.staves, sequential.staves);
        assert_eq!(parallel.offsets, sequential.offsets);
        assert_eq!(parallel.max_key_offset, sequential.max_key_offset);
    }

    #[test]
    fn test_invalid_inputs() {
        let img = blank(1);
        let mut graph = InterGraph::new();

        let config = KeyConfig {
            alter_min_grade: 1.5,
            ..KeyConfig::default()
        };
        assert!(matches!(
            run(&mut system(1), &img, &mut graph, &config),
            Err(KeyError::InvalidConfig(_))
        ));

        let components = RunComponentBuilder::new();
        let capabilities = Capabilities {
            classifier: &StemCounter,
            components: &components,
        };
        let result = retrieve_keys(
            &mut system(1),
            &img,
            capabilities,
            &mut graph,
            &Scale::new(20, 2).unwrap(),
            &KeyConfig::default(),
            0,
        );
        assert!(matches!(result, Err(KeyError::InvalidInput(_))));

        assert!(Scale::new(0, 2).is_err());
    }
}
