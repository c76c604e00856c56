use common::config::PrintConfig;
use geo::MultiPolygon;

use crate::{
    kernel::polygon::{even_odd_region, offset_outline, offset_region, segment_inside},
    layer::{Layer, Winding},
    path::{Path, PathKind},
    strategy::FillStrategy,
    transform::{cos_degrees, sin_degrees},
    Point,
};

/// Shells inside every perimeter and straight infill lines, at 45 degrees
/// on even layers and 135 degrees on odd ones.
pub struct LineFill;

impl FillStrategy for LineFill {
    fn name(&self) -> &'static str {
        "lines"
    }

    fn fill(&self, layer: &mut Layer, config: &PrintConfig) {
        let width = config.carve.extrusion_width;
        let shells = config.fill.shells;
        let spacing = width / config.fill.density;
        let angle = if layer.index % 2 == 0 { 45.0 } else { 135.0 };

        layer.for_each_ring_mut(|ring| {
            // Shells sit one width apart, starting one width in from the
            // perimeter's center line.
            for shell in 1..=shells {
                let distance = (shell as f64 + 0.5) * width;
                for outline in offset_outline(ring.boundary(), distance) {
                    ring.loops.extend(Path::closed(PathKind::Loop, &outline));
                }
            }

            if ring.winding() != Winding::Outer {
                return;
            }

            let inset = (shells as f64 + 1.0) * width;
            let region = offset_region(&even_odd_region(&ring.region()), -inset);
            for [start, end] in scanline_fill(&region, spacing, angle) {
                ring.add_infill(vec![start, end]);
            }
        });
    }
}

/// Parallel lines `spacing` apart at `angle` degrees from the X axis,
/// clipped to the region. Every other line runs backwards so consecutive
/// lines start near where the last one ended.
pub fn scanline_fill(region: &MultiPolygon, spacing: f64, angle: f64) -> Vec<[Point; 2]> {
    let (sin, cos) = (sin_degrees(angle), cos_degrees(angle));
    let rotate = |p: &Point, sin: f64| Point::new(p.x * cos - p.y * sin, p.x * sin + p.y * cos);

    // Bounds of the region turned so the lines are horizontal.
    let Some((min, max)) = region
        .0
        .iter()
        .flat_map(|x| x.exterior().coords())
        .map(|c| rotate(&Point::new(c.x, c.y), -sin))
        .fold(None, |acc: Option<(Point, Point)>, p| match acc {
            Some((min, max)) => Some((min.inf(&p), max.sup(&p))),
            None => Some((p, p)),
        })
    else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for line in 0.. {
        let y = min.y + (line as f64 + 0.5) * spacing;
        if y >= max.y {
            break;
        }

        let (mut a, mut b) = (Point::new(min.x - 1.0, y), Point::new(max.x + 1.0, y));
        if line % 2 == 1 {
            std::mem::swap(&mut a, &mut b);
        }
        lines.extend(segment_inside(region, &rotate(&a, sin), &rotate(&b, sin)));
    }

    lines
}
