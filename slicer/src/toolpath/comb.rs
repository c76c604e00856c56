use ordered_float::OrderedFloat;
use tracing::debug;

use crate::{
    kernel::polygon::{dedup_outline, polyline_length, segment_intersection},
    Outline, Point,
};

/// Plans travel moves that stay clear of printed material.
pub trait CombRouter {
    /// Points to visit going from `from` to `to` at height `z`. The last
    /// point is always `to`.
    fn route_between(&self, z: f64, from: &Point, to: &Point) -> Vec<Point>;
}

/// Routes travels along the boundaries of one layer group instead of
/// cutting across them. Where the direct line enters and leaves a
/// boundary the route follows that boundary between the two crossings,
/// taking the shorter way round.
pub struct BoundaryComb {
    z: f64,
    boundaries: Vec<Outline>,
}

struct Crossing {
    /// Parameter along the travel.
    t: f64,
    edge: usize,
    point: Point,
}

impl BoundaryComb {
    pub fn new(z: f64, boundaries: Vec<Outline>) -> Self {
        let boundaries = boundaries
            .iter()
            .map(|x| dedup_outline(x))
            .filter(|x| x.len() >= 3)
            .collect();
        Self { z, boundaries }
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    fn crossings(boundary: &[Point], from: &Point, to: &Point) -> Vec<Crossing> {
        let n = boundary.len();
        let mut out = (0..n)
            .filter_map(|edge| {
                let (a, b) = (boundary[edge], boundary[(edge + 1) % n]);
                let (t, u) = segment_intersection(from, to, &a, &b)?;
                Some(Crossing {
                    t,
                    edge,
                    point: a + (b - a) * u,
                })
            })
            .collect::<Vec<_>>();
        out.sort_by_key(|x| OrderedFloat(x.t));
        out.dedup_by(|x, y| (x.point - y.point).norm() < 1e-9);
        out
    }

    /// The boundary vertices between two crossings, walking forwards or
    /// backwards, whichever is shorter.
    fn detour(boundary: &[Point], enter: &Crossing, exit: &Crossing) -> Vec<Point> {
        let n = boundary.len();
        let mut forward = vec![enter.point];
        let mut edge = enter.edge;
        while edge != exit.edge {
            edge = (edge + 1) % n;
            forward.push(boundary[edge]);
        }
        forward.push(exit.point);

        let mut backward = vec![enter.point];
        let mut edge = enter.edge;
        while edge != exit.edge {
            backward.push(boundary[edge]);
            edge = (edge + n - 1) % n;
        }
        backward.push(exit.point);

        match polyline_length(&forward) <= polyline_length(&backward) {
            true => forward,
            false => backward,
        }
    }
}

impl CombRouter for BoundaryComb {
    fn route_between(&self, z: f64, from: &Point, to: &Point) -> Vec<Point> {
        if (z - self.z).abs() > 1e-9 {
            debug!("No boundaries for a travel at z {z}, going straight");
            return vec![*to];
        }

        let mut detours = Vec::new();
        for boundary in &self.boundaries {
            let crossings = Self::crossings(boundary, from, to);
            for pair in crossings.chunks_exact(2) {
                if pair[0].edge != pair[1].edge {
                    detours.push((pair[0].t, Self::detour(boundary, &pair[0], &pair[1])));
                }
            }
        }
        detours.sort_by_key(|(t, _)| OrderedFloat(*t));

        let mut route = detours.into_iter().flat_map(|x| x.1).collect::<Vec<_>>();
        route.push(*to);
        route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::polygon::tests::square;

    #[test]
    fn straight_when_nothing_is_crossed() {
        let comb = BoundaryComb::new(0.2, vec![square(0.0, 10.0)]);
        let (from, to) = (Point::new(1.0, 1.0), Point::new(9.0, 9.0));
        assert_eq!(comb.route_between(0.2, &from, &to), vec![to]);

        // A single crossing has nothing to walk around.
        let outside = Point::new(20.0, 5.0);
        assert_eq!(comb.route_between(0.2, &from, &outside), vec![outside]);
    }

    #[test]
    fn walks_around_a_hole() {
        let mut hole = square(4.0, 6.0);
        hole.reverse();
        let comb = BoundaryComb::new(0.2, vec![square(0.0, 10.0), hole]);

        let (from, to) = (Point::new(2.0, 4.5), Point::new(8.0, 4.5));
        let route = comb.route_between(0.2, &from, &to);

        assert_eq!(route.last(), Some(&to));
        assert_eq!(route[0], Point::new(4.0, 4.5));
        // The short way round is along the bottom edge of the hole.
        assert!(route.contains(&Point::new(4.0, 4.0)));
        assert!(route.contains(&Point::new(6.0, 4.0)));
        assert!(!route.contains(&Point::new(4.0, 6.0)));
        assert_eq!(route[route.len() - 2], Point::new(6.0, 4.5));
    }

    #[test]
    fn other_heights_go_straight() {
        let comb = BoundaryComb::new(0.2, vec![square(4.0, 6.0)]);
        let (from, to) = (Point::new(0.0, 5.0), Point::new(10.0, 5.0));
        assert_eq!(comb.route_between(0.4, &from, &to), vec![to]);
        assert!(comb.route_between(0.2, &from, &to).len() > 1);
        assert!(BoundaryComb::new(0.2, vec![vec![Point::zeros()]]).is_empty());
    }
}
