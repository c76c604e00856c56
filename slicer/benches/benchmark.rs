use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use common::config::PrintConfig;
use slicer::{
    kernel::PlanarKernel,
    nesting::{InsetSettings, NestingEngine},
    Outline, Point,
};

/// A regular polygon approximating a circle, clockwise for holes.
fn circle(center: Point, radius: f64, sides: usize, hole: bool) -> Outline {
    let mut out = (0..sides)
        .map(|i| {
            let angle = i as f64 / sides as f64 * std::f64::consts::TAU;
            center + Point::new(angle.cos(), angle.sin()) * radius
        })
        .collect::<Vec<_>>();
    if hole {
        out.reverse();
    }
    out
}

/// A plate with a grid of round holes.
fn perforated_plate(holes: usize) -> Vec<Outline> {
    let size = holes as f64 * 10.0;
    let mut loops = vec![vec![
        Point::new(0.0, 0.0),
        Point::new(size, 0.0),
        Point::new(size, size),
        Point::new(0.0, size),
    ]];

    for x in 0..holes {
        for y in 0..holes {
            let center = Point::new(x as f64 * 10.0 + 5.0, y as f64 * 10.0 + 5.0);
            loops.push(circle(center, 3.0, 64, true));
        }
    }
    loops
}

pub fn bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("Nesting");

    let config = PrintConfig::default();
    let kernel = PlanarKernel::from_config(&config);
    let engine = NestingEngine::new(&kernel, InsetSettings::from_config(&config));

    for holes in [2, 4, 8] {
        let loops = perforated_plate(holes);
        group.bench_with_input(
            BenchmarkId::new("Perforated plate", holes * holes),
            &loops,
            |b, loops| b.iter(|| engine.nest(loops, false, "bench")),
        );
    }
}

criterion_group!(benches, bench);
criterion_main!(benches);
