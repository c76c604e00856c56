//! Finding and cutting out the stretches of a perimeter that would print
//! over material that is already there.

use geo::MultiPolygon;

use crate::{
    kernel::polygon::{
        edges, from_ring, inside_parity, line_crosses_outlines, loop_band, polyline_length,
        region_contains, segment_outside, to_polygon,
    },
    Outline, Point,
};

/// A thin diamond or hexagon around a segment, stopping just short of both
/// ends so the outlines of neighbouring segments do not touch. Thick
/// outlines grow much faster from the ends.
pub fn segment_outline(begin: &Point, end: &Point, width: f64, thick: bool) -> Option<Outline> {
    let (exclusion, slope) = match thick {
        true => (0.8 * width.abs(), 3.0),
        false => (0.6 * width.abs(), 0.2),
    };

    let segment = end - begin;
    let length = segment.norm();
    if length == 0.0 {
        return None;
    }

    let direction = segment / length;
    let normal = Point::new(-direction.y, direction.x);
    let at = |along: f64, up: f64| begin + direction * (along * length) + normal * up;

    let mut along = 0.05;
    if along * length > 0.1 * exclusion {
        along *= 0.1 * exclusion / (along * length);
    }
    let along_end = 1.0 - along;
    let remaining_to_half = 0.5 - along;
    let along_to_width = exclusion / slope / length;

    let outline = if along_to_width > 0.9 * remaining_to_half {
        let up = slope * remaining_to_half * length;
        vec![at(along, 0.0), at(0.5, -up), at(along_end, 0.0), at(0.5, up)]
    } else {
        let outside_begin = along + along_to_width;
        let outside_end = along_end - along_to_width;
        vec![
            at(along, 0.0),
            at(outside_begin, -exclusion),
            at(outside_end, -exclusion),
            at(along_end, 0.0),
            at(outside_end, exclusion),
            at(outside_begin, exclusion),
        ]
    };

    Some(outline)
}

/// True if some edge of the loop crosses the thin outline of an earlier
/// edge.
pub fn intersects_itself(outline: &[Point], width: f64) -> bool {
    let mut outlines = Vec::new();
    for (begin, end) in edges(outline) {
        if line_crosses_outlines(&outlines, &begin, &end) {
            return true;
        }
        outlines.extend(segment_outline(&begin, &end, width, false));
    }
    false
}

/// The region within `radius` of a printed loop.
pub fn filled_band(center: &[Point], radius: f64) -> MultiPolygon {
    loop_band(center, radius)
}

/// True if the loop crosses any band or starts inside one.
pub fn intersects_bands(outline: &[Point], bands: &[MultiPolygon]) -> bool {
    let Some(start) = outline.first() else {
        return false;
    };

    bands.iter().any(|band| {
        region_contains(band, start)
            || band.0.iter().any(|polygon| {
                let rings = std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(from_ring)
                    .collect::<Vec<_>>();
                edges(outline).any(|(a, b)| line_crosses_outlines(&rings, &a, &b))
            })
    })
}

/// Chains segments into polylines, starting a new one whenever a segment
/// does not begin within `join` of where the last one ended. The last
/// polyline is folded into the first when it ends within `wrap` of the
/// first one's start.
pub fn chain_segments(segments: &[[Point; 2]], join: f64, wrap: f64) -> Vec<Vec<Point>> {
    let mut paths: Vec<Vec<Point>> = Vec::new();
    for [begin, end] in segments {
        match paths.last_mut() {
            Some(path) if path.last().is_some_and(|last| (last - begin).norm() < join) => {
                path.push(*end)
            }
            _ => paths.push(vec![*begin, *end]),
        }
    }

    if paths.len() > 1 {
        let first_start = paths[0][0];
        let last = &paths[paths.len() - 1];
        if last.last().is_some_and(|end| (end - first_start).norm() < wrap) {
            if let Some(mut joined) = paths.pop() {
                joined.pop();
                joined.append(&mut paths[0]);
                paths[0] = joined;
            }
        }
    }

    paths
}

/// Splits a perimeter loop around everything it overlaps: the bands of
/// loops accepted before it and, when it crosses itself, its own earlier
/// edges. Only pieces inside the layer's material are kept and pieces no
/// longer than `min_length` are dropped.
pub struct PerimeterSplit<'a> {
    pub bands: &'a [MultiPolygon],
    pub raw_loops: &'a [Outline],
    pub width: f64,
    pub half_width: f64,
}

impl PerimeterSplit<'_> {
    pub fn split(&self, center: &[Point], self_intersecting: bool) -> Vec<Vec<Point>> {
        let bands = self.bands.iter().collect::<Vec<_>>();
        let mut thin = Vec::new();
        let mut thick = Vec::new();

        let mut segments = Vec::new();
        for (begin, end) in edges(center) {
            if self_intersecting && line_crosses_outlines(&thin, &begin, &end) {
                let mut zones = bands.clone();
                zones.extend(thick.iter());
                segments.extend(segment_outside(&zones, &begin, &end));
            } else {
                segments.extend(segment_outside(&bands, &begin, &end));
            }

            if self_intersecting {
                thin.extend(segment_outline(&begin, &end, self.width, false));
                thick.extend(
                    segment_outline(&begin, &end, self.width, true)
                        .map(|x| MultiPolygon::new(vec![to_polygon(&x)])),
                );
            }
        }

        segments.retain(|[a, b]| inside_parity(self.raw_loops, &((a + b) / 2.0)));

        let join = 0.1 * self.half_width;
        let mut paths = chain_segments(&segments, join, 0.1 * join);
        paths.retain(|x| polyline_length(x) > 6.0 * self.half_width);
        paths
    }
}
