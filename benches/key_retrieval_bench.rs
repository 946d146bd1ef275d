//! Performance benchmarks for key signature retrieval

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use stave_keysig::analysis::graph::InterGraph;
use stave_keysig::features::glyph::{Evaluation, Glyph, RunComponentBuilder, ShapeClassifier};
use stave_keysig::sheet::{Scale, StaffGeometry, StaffInfo, StaffLine, SystemInfo};
use stave_keysig::{retrieve_keys, Capabilities, KeyConfig, Shape};

/// Constant grades, every glyph looks like a sharp
struct AlwaysSharp;

impl ShapeClassifier for AlwaysSharp {
    fn evaluate(&self, _glyph: &Glyph, _interline: f64) -> Vec<Evaluation> {
        vec![
            Evaluation::new(Shape::Sharp, 0.8),
            Evaluation::new(Shape::Flat, 0.1),
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

/// System of `staves` staves, each holding 4 treble sharps
fn synthetic_system(staves: usize) -> (GrayImage, SystemInfo) {
    let mut img = GrayImage::from_pixel(400, 200 * staves as u32, Luma([255]));
    let mut infos = Vec::new();

    for i in 0..staves {
        let top = 60 + 200 * i as i32;

        for (k, pitch) in [-4, -1, -5, -2].iter().enumerate() {
            let gx = 50 + 22 * k as i32;
            let yc = top + 40 + 10 * pitch;
            fill(&mut img, gx + 4, yc - 30, gx + 5, yc + 29);
            fill(&mut img, gx + 12, yc - 30, gx + 13, yc + 29);
            fill(&mut img, gx, yc - 10, gx + 17, yc - 7);
            fill(&mut img, gx, yc + 6, gx + 17, yc + 9);
        }

        let geometry = StaffGeometry {
            id: i + 1,
            first_line: StaffLine::horizontal(0.0, 399.0, top as f64),
            last_line: StaffLine::horizontal(0.0, 399.0, (top + 80) as f64),
            bars: vec![],
        };
        let mut staff = StaffInfo::new(geometry, 10);
        staff.header.clef_stop = Some(41);
        infos.push(staff);
    }

    (img, SystemInfo { id: 1, staves: infos })
}

fn bench_retrieve_keys(c: &mut Criterion) {
    let (img, system) = synthetic_system(4);
    let scale = Scale::new(20, 2).unwrap();
    let components = RunComponentBuilder::new();
    let config = KeyConfig::default();

    c.bench_function("retrieve_keys_4_staves", |b| {
        b.iter(|| {
            let mut system = system.clone();
            let mut graph = InterGraph::new();
            let capabilities = Capabilities {
                classifier: &AlwaysSharp,
                components: &components,
            };
            let _ = retrieve_keys(
                black_box(&mut system),
                black_box(&img),
                capabilities,
                &mut graph,
                &scale,
                &config,
                black_box(250),
            );
        });
    });
}

criterion_group!(benches, bench_retrieve_keys);
criterion_main!(benches);
