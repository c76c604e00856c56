//! Planar polygon primitives shared by slicing, nesting, filling and
//! combing. Outlines are plain point lists, offsets and boolean operations
//! go through clipper on `geo` polygons.

use geo::{
    algorithm::line_intersection::{line_intersection, LineIntersection},
    Area, Contains, ConvexHull, Coord, Line, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Polygon,
};
use geo_clipper::{Clipper, ClipperOpen, EndType, JoinType};
use ordered_float::OrderedFloat;

use crate::{Outline, Point};

/// Points closer than this are merged.
pub const POINT_EPSILON: f64 = 1e-9;
const AREA_EPSILON: f64 = 1e-12;
/// Miters longer than this many offset distances are squared off.
const MITER_LIMIT: f64 = 2.0;
/// Clipper works on integers, this keeps a micron of resolution.
const CLIPPER_SCALE: f64 = 1e6;

pub fn cross(a: &Point, b: &Point) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Each edge of a closed outline, including the closing one.
pub fn edges(outline: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = outline.len();
    (0..n).map(move |i| (outline[i], outline[(i + 1) % n]))
}

fn coord(point: &Point) -> Coord {
    Coord {
        x: point.x,
        y: point.y,
    }
}

fn point(coord: &Coord) -> Point {
    Point::new(coord.x, coord.y)
}

/// The outline as a polygon without holes. The ring is closed by `geo`.
pub fn to_polygon(outline: &[Point]) -> Polygon {
    Polygon::new(LineString::new(outline.iter().map(coord).collect()), Vec::new())
}

/// A ring read back from `geo`, without its closing point.
pub fn from_ring(ring: &LineString) -> Outline {
    dedup_outline(&ring.coords().map(point).collect::<Vec<_>>())
}

/// Positive for counter clockwise outlines.
pub fn signed_area(outline: &[Point]) -> f64 {
    to_polygon(outline).signed_area()
}

pub fn is_widdershins(outline: &[Point]) -> bool {
    signed_area(outline) > 0.0
}

pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|x| (x[1] - x[0]).norm()).sum()
}

pub fn contains_point(outline: &[Point], point: &Point) -> bool {
    outline.len() >= 3 && to_polygon(outline).contains(&coord(point))
}

/// True when the point is inside an odd number of the outlines, which is
/// the filled region of a set of nested outlines.
pub fn inside_parity(outlines: &[Outline], point: &Point) -> bool {
    outlines
        .iter()
        .filter(|outline| contains_point(outline, point))
        .count()
        % 2
        == 1
}

pub fn region_contains(region: &MultiPolygon, point: &Point) -> bool {
    let coord = coord(point);
    region.0.iter().any(|polygon| polygon.contains(&coord))
}

/// Parameters `(t, u)` along `a1 → a2` and `b1 → b2` where the two segments
/// meet. Parallel and overlapping segments never do.
pub fn segment_intersection(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> Option<(f64, f64)> {
    let a = Line::new(coord(a1), coord(a2));
    let b = Line::new(coord(b1), coord(b2));
    match line_intersection(a, b)? {
        LineIntersection::SinglePoint { intersection, .. } => {
            let at = point(&intersection);
            Some((parameter(a1, a2, &at), parameter(b1, b2, &at)))
        }
        LineIntersection::Collinear { .. } => None,
    }
}

/// Where `point` projects onto the line through `a` and `b`, zero at `a`
/// and one at `b`.
fn parameter(a: &Point, b: &Point, point: &Point) -> f64 {
    let direction = b - a;
    let length = direction.norm_squared();
    if length == 0.0 {
        return 0.0;
    }
    (point - a).dot(&direction) / length
}

/// Strict crossing test. Segments that only touch at an end point do not
/// count.
pub fn segments_cross(a1: &Point, a2: &Point, b1: &Point, b2: &Point) -> bool {
    let a = Line::new(coord(a1), coord(a2));
    let b = Line::new(coord(b1), coord(b2));
    matches!(
        line_intersection(a, b),
        Some(LineIntersection::SinglePoint {
            is_proper: true,
            ..
        })
    )
}

pub fn line_crosses_outlines(outlines: &[Outline], a: &Point, b: &Point) -> bool {
    outlines
        .iter()
        .any(|outline| edges(outline).any(|(c, d)| segments_cross(a, b, &c, &d)))
}

/// Drops repeated points, including a closing point equal to the first.
pub fn dedup_outline(outline: &[Point]) -> Outline {
    let mut out: Outline = Vec::with_capacity(outline.len());
    for point in outline {
        if out.last().map_or(true, |last| (last - point).norm() > POINT_EPSILON) {
            out.push(*point);
        }
    }

    while out.len() > 1 && (out[0] - out[out.len() - 1]).norm() <= POINT_EPSILON {
        out.pop();
    }
    out
}

/// Offsets a closed outline by `distance` to the left of its direction of
/// travel, which is inwards for counter clockwise outlines. A region that
/// pinches off comes back as several outlines, one that collapses as none.
/// Every outline keeps the winding of the input and starts at its lower
/// left point.
pub fn offset_outline(outline: &[Point], distance: f64) -> Vec<Outline> {
    let mut points = dedup_outline(outline);
    if points.len() < 3 {
        return Vec::new();
    }

    let area = signed_area(&points);
    if area.abs() < AREA_EPSILON {
        return Vec::new();
    }

    // Clipper grows counter clockwise regions by positive deltas.
    let widdershins = area > 0.0;
    let delta = match widdershins {
        true => -distance,
        false => {
            points.reverse();
            distance
        }
    };

    to_polygon(&points)
        .offset(delta, JoinType::Miter(MITER_LIMIT), EndType::ClosedPolygon, CLIPPER_SCALE)
        .0
        .iter()
        .filter_map(|polygon| {
            let mut outline = from_ring(polygon.exterior());
            if outline.len() < 3 || signed_area(&outline).abs() < AREA_EPSILON {
                return None;
            }
            if is_widdershins(&outline) != widdershins {
                outline.reverse();
            }
            start_at_lower_left(&mut outline);
            Some(outline)
        })
        .collect()
}

/// The filled region of a set of nested outlines, read with the even-odd
/// rule.
pub fn even_odd_region(outlines: &[Outline]) -> MultiPolygon {
    outlines
        .iter()
        .filter(|x| x.len() >= 3)
        .fold(MultiPolygon::new(Vec::new()), |region, outline| {
            region.xor(&to_polygon(outline), CLIPPER_SCALE)
        })
}

/// Grows a region by `distance`, or shrinks it when negative.
pub fn offset_region(region: &MultiPolygon, distance: f64) -> MultiPolygon {
    region.offset(
        distance,
        JoinType::Miter(MITER_LIMIT),
        EndType::ClosedPolygon,
        CLIPPER_SCALE,
    )
}

pub fn union_regions(regions: impl IntoIterator<Item = MultiPolygon>) -> MultiPolygon {
    regions
        .into_iter()
        .fold(MultiPolygon::new(Vec::new()), |all, region| {
            all.union(&region, CLIPPER_SCALE)
        })
}

/// The counter clockwise outer outline of every polygon in a region.
pub fn outer_outlines(region: &MultiPolygon) -> Vec<Outline> {
    region
        .0
        .iter()
        .map(|polygon| {
            let mut outline = from_ring(polygon.exterior());
            if !is_widdershins(&outline) {
                outline.reverse();
            }
            start_at_lower_left(&mut outline);
            outline
        })
        .filter(|x| x.len() >= 3)
        .collect()
}

/// The region within `radius` of a closed loop.
pub fn loop_band(center: &[Point], radius: f64) -> MultiPolygon {
    MultiLineString::new(vec![LineString::new(center.iter().map(coord).collect())]).offset(
        radius,
        JoinType::Miter(MITER_LIMIT),
        EndType::ClosedLine,
        CLIPPER_SCALE,
    )
}

/// The pieces of `a → b` inside the region, in order along it.
pub fn segment_inside(region: &MultiPolygon, a: &Point, b: &Point) -> Vec<[Point; 2]> {
    let line = MultiLineString::new(vec![LineString::new(vec![coord(a), coord(b)])]);
    pieces_along(a, b, &line.intersection(region, CLIPPER_SCALE))
}

/// The pieces of `a → b` outside every region, in order along it.
pub fn segment_outside(regions: &[&MultiPolygon], a: &Point, b: &Point) -> Vec<[Point; 2]> {
    let mut pieces = MultiLineString::new(vec![LineString::new(vec![coord(a), coord(b)])]);
    for region in regions {
        if pieces.0.is_empty() {
            break;
        }
        pieces = pieces.difference(*region, CLIPPER_SCALE);
    }
    pieces_along(a, b, &pieces)
}

/// Clipped pieces of `a → b` sorted along it, each pointing the same way
/// as the segment. Pieces that touch are merged.
fn pieces_along(a: &Point, b: &Point, pieces: &MultiLineString) -> Vec<[Point; 2]> {
    let mut spans = pieces
        .0
        .iter()
        .filter_map(|line| {
            let (first, last) = (point(line.0.first()?), point(line.0.last()?));
            let (s, e) = (parameter(a, b, &first), parameter(a, b, &last));
            match s <= e {
                true => Some(((s, first), (e, last))),
                false => Some(((e, last), (s, first))),
            }
        })
        .filter(|(start, end)| (end.1 - start.1).norm() > POINT_EPSILON)
        .collect::<Vec<_>>();
    spans.sort_by_key(|(start, _)| OrderedFloat(start.0));

    let mut out: Vec<[Point; 2]> = Vec::with_capacity(spans.len());
    for ((_, start), (_, end)) in spans {
        match out.last_mut() {
            Some(last) if (last[1] - start).norm() <= POINT_EPSILON => last[1] = end,
            _ => out.push([start, end]),
        }
    }
    out
}

/// Index of the candidate with the smallest area that strictly encloses the
/// outline, tested with the outline's first point.
pub fn enclosing_index(candidates: &[Outline], outline: &[Point]) -> Option<usize> {
    let point = outline.first()?;
    let area = signed_area(outline).abs();

    candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.as_slice() != outline)
        .map(|(idx, candidate)| (idx, signed_area(candidate).abs()))
        .filter(|(idx, candidate_area)| {
            *candidate_area > area && contains_point(&candidates[*idx], point)
        })
        .min_by_key(|(_, candidate_area)| OrderedFloat(*candidate_area))
        .map(|(idx, _)| idx)
}

/// Rotates the outline to begin at its lower left point, the one with the
/// smallest `x + y`.
pub fn start_at_lower_left(outline: &mut Outline) {
    if let Some(idx) = outline
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| OrderedFloat(p.x + p.y))
        .map(|(idx, _)| idx)
    {
        outline.rotate_left(idx);
    }
}

/// Counter clockwise convex hull of a point set.
pub fn convex_hull(points: &[Point]) -> Outline {
    if points.len() < 3 {
        return dedup_outline(points);
    }

    let hull = MultiPoint::from(points.iter().map(coord).collect::<Vec<_>>()).convex_hull();
    let mut outline = from_ring(hull.exterior());
    if outline.len() >= 3 && !is_widdershins(&outline) {
        outline.reverse();
    }
    outline
}
