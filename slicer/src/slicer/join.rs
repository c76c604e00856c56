use ordered_float::OrderedFloat;
use tracing::warn;

use crate::{
    kernel::polygon::{contains_point, cross, signed_area, start_at_lower_left, POINT_EPSILON},
    Outline, Point,
};

/// End points closer than this are considered the same point.
const DISTANCE_CUTOFF: f64 = 1e-4;

// Quadratic in the number of segments. Fine for the segment counts a single
// layer produces.
/// Chains directed segments into closed loops by repeatedly following the
/// segment whose start is nearest to the current end.
pub fn join_segments(segments: &[[Point; 2]]) -> Vec<Outline> {
    let mut remaining = segments
        .iter()
        .filter(|[a, b]| (a - b).norm() > POINT_EPSILON)
        .copied()
        .collect::<Vec<_>>();

    let mut loops = Vec::new();
    while let Some([start, mut last]) = remaining.pop() {
        let mut outline = vec![start];

        loop {
            if (last - start).norm() < DISTANCE_CUTOFF {
                break;
            }

            let Some((idx, dist)) = remaining
                .iter()
                .enumerate()
                .map(|(idx, [a, _])| (idx, (a - last).norm()))
                .min_by_key(|(_, dist)| OrderedFloat(*dist))
            else {
                warn!("Open contour ending at ({:.3}, {:.3})", last.x, last.y);
                break;
            };

            if dist > DISTANCE_CUTOFF {
                warn!("Open contour ending at ({:.3}, {:.3})", last.x, last.y);
                break;
            }

            outline.push(last);
            last = remaining.swap_remove(idx)[1];
        }

        let outline = remove_collinear(outline);
        if outline.len() >= 3 {
            loops.push(outline);
        }
    }

    loops
}

/// Makes loops at an even containment depth counter clockwise and the rest
/// clockwise, so material is always on the left, then starts each loop at
/// its lower left point.
pub fn orient_loops(loops: &mut [Outline]) {
    let depths = (0..loops.len())
        .map(|i| {
            let point = loops[i][0];
            (0..loops.len())
                .filter(|&j| j != i && contains_point(&loops[j], &point))
                .count()
        })
        .collect::<Vec<_>>();

    for (outline, depth) in loops.iter_mut().zip(depths) {
        let widdershins = signed_area(outline) > 0.0;
        if widdershins != (depth % 2 == 0) {
            outline.reverse();
        }
        start_at_lower_left(outline);
    }
}

fn remove_collinear(outline: Outline) -> Outline {
    let n = outline.len();
    if n < 3 {
        return outline;
    }

    (0..n)
        .filter(|&i| {
            let prev = outline[(i + n - 1) % n];
            let next = outline[(i + 1) % n];
            let (a, b) = (outline[i] - prev, next - outline[i]);
            cross(&a, &b).abs() > POINT_EPSILON * (a.norm() + b.norm()) || a.dot(&b) < 0.0
        })
        .map(|i| outline[i])
        .collect()
}
