//! Turns the raw boundary loops of a layer into nested rings, each with a
//! perimeter half an extrusion width inside its boundary that never prints
//! over another perimeter.

use std::cmp::Reverse;

use common::config::PrintConfig;
use geo::MultiPolygon;
use ordered_float::OrderedFloat;
use tracing::{debug, warn};

use crate::{
    kernel::{
        polygon::{dedup_outline, signed_area},
        GeometryKernel,
    },
    layer::{BoundaryPerimeter, Layer, NestedRing},
    path::{Path, PathKind},
    slicer::SlicedLayer,
    Outline,
};

mod overlap;
pub use overlap::{
    chain_segments, filled_band, intersects_bands, intersects_itself, segment_outline,
    PerimeterSplit,
};

/// Scale from a bead's width to the width of the region it fills.
const BEAD_FILL_RATIO: f64 = 0.7853;

#[derive(Clone, Debug, PartialEq)]
pub struct InsetSettings {
    pub extrusion_width: f64,
    pub layer_height: f64,
    pub nozzle_diameter: f64,
    pub bridge_width_multiplier: f64,
    pub overlap_removal_scaler: f64,
    /// Handle small loops before large ones.
    pub ascending_area: bool,
}

impl InsetSettings {
    pub fn from_config(config: &PrintConfig) -> Self {
        Self {
            extrusion_width: config.carve.extrusion_width,
            layer_height: config.carve.layer_height,
            nozzle_diameter: config.inset.nozzle_diameter,
            bridge_width_multiplier: config.inset.bridge_width_multiplier,
            overlap_removal_scaler: config.inset.overlap_removal_scaler,
            ascending_area: config.inset.loop_order_ascending_area,
        }
    }

    /// How far perimeters sit inside their boundary.
    pub fn half_width(&self, bridge: bool) -> f64 {
        if bridge {
            self.bridge_width_multiplier * (2.0 * self.nozzle_diameter - self.layer_height) / 2.0
        } else {
            self.extrusion_width / 2.0
        }
    }

    /// Width kept clear around accepted perimeters, or `None` when overlap
    /// removal is turned off.
    pub fn overlap_removal_width(&self) -> Option<f64> {
        (self.overlap_removal_scaler >= 0.1)
            .then(|| self.extrusion_width * BEAD_FILL_RATIO * self.overlap_removal_scaler)
    }
}

struct Candidate {
    index: usize,
    outset: Outline,
    center: Outline,
}

pub struct NestingEngine<'a, K: GeometryKernel + ?Sized> {
    kernel: &'a K,
    settings: InsetSettings,
}

impl<'a, K: GeometryKernel + ?Sized> NestingEngine<'a, K> {
    pub fn new(kernel: &'a K, settings: InsetSettings) -> Self {
        Self { kernel, settings }
    }

    pub fn settings(&self) -> &InsetSettings {
        &self.settings
    }

    /// A layer holding the nested rings of a sliced layer. A layer without
    /// any ring is kept, it just prints no perimeters.
    pub fn build_layer(&self, sliced: &SlicedLayer, label: &str) -> Layer {
        let mut layer = Layer::new(sliced.z, sliced.index);
        layer.bridge_rotation = sliced.bridge_rotation;

        let label = format!("{label} layer {} (z {})", sliced.index, sliced.z);
        layer.nested_rings = self.nest(&sliced.loops, layer.is_bridge(), &label);
        if layer.nested_rings.is_empty() {
            warn!("No perimeters in {label}");
        }
        layer
    }

    pub fn nest(&self, loops: &[Outline], bridge: bool, label: &str) -> Vec<NestedRing> {
        let half_width = self.settings.half_width(bridge);
        let loops = loops.iter().map(|x| dedup_outline(x)).collect::<Vec<_>>();

        let mut candidates = Vec::with_capacity(loops.len());
        for (index, outline) in loops.iter().enumerate() {
            if outline.len() < 3 {
                warn!("Skipping loop {index} of {label} with {} point(s)", outline.len());
                continue;
            }

            let offsets = self.kernel.offset_loop(outline, half_width);
            match offsets.len() {
                0 => warn!("Loop {index} of {label} is too small for a perimeter"),
                1 => {}
                n => debug!("Loop {index} of {label} pinches off into {n} perimeters"),
            }
            candidates.extend(offsets.into_iter().map(|offset| Candidate {
                index,
                outset: offset.outset,
                center: offset.center,
            }));
        }

        let area = |x: &Candidate| OrderedFloat(signed_area(&x.center).abs());
        if self.settings.ascending_area {
            candidates.sort_by_key(area);
        } else {
            candidates.sort_by_key(|x| Reverse(area(x)));
        }

        let mut bands: Vec<MultiPolygon> = Vec::new();
        let mut rings = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let paths = match self.settings.overlap_removal_width() {
                None => Path::closed(PathKind::Perimeter, &candidate.center)
                    .into_iter()
                    .collect(),
                Some(width) => {
                    let paths = self.perimeter_paths(&candidate, &bands, &loops, width, half_width);
                    bands.push(filled_band(&candidate.center, width));
                    paths
                }
            };

            if paths.is_empty() {
                debug!("Loop {} of {label} overlaps completely", candidate.index);
            }
            rings.push((candidate.index, BoundaryPerimeter::new(candidate.outset, paths)));
        }

        self.assemble(rings, label)
    }

    fn perimeter_paths(
        &self,
        candidate: &Candidate,
        bands: &[MultiPolygon],
        raw_loops: &[Outline],
        width: f64,
        half_width: f64,
    ) -> Vec<Path> {
        let center = &candidate.center;
        let self_intersecting = intersects_itself(center, width);
        if !self_intersecting && !intersects_bands(center, bands) {
            return Path::closed(PathKind::Perimeter, center).into_iter().collect();
        }

        let split = PerimeterSplit {
            bands,
            raw_loops,
            width,
            half_width,
        };
        split
            .split(center, self_intersecting)
            .into_iter()
            .filter_map(|x| Path::new(PathKind::Perimeter, x))
            .collect()
    }

    /// Hangs every ring under the smallest ring around it.
    fn assemble(&self, rings: Vec<(usize, BoundaryPerimeter)>, label: &str) -> Vec<NestedRing> {
        let boundaries = rings
            .iter()
            .map(|(_, x)| x.boundary.clone())
            .collect::<Vec<_>>();

        let mut children = vec![Vec::new(); rings.len()];
        let mut roots = Vec::new();
        for (idx, (index, perimeter)) in rings.iter().enumerate() {
            match self.kernel.find_enclosing_loop(&boundaries, &perimeter.boundary) {
                Some(parent) => children[parent].push(idx),
                None => {
                    if !self.kernel.is_widdershins(&perimeter.boundary) {
                        warn!("Hole {index} of {label} is not inside any loop");
                    }
                    roots.push(idx);
                }
            }
        }

        let mut rings = rings
            .into_iter()
            .map(|(_, x)| Some(NestedRing::new(x)))
            .collect::<Vec<_>>();
        roots
            .into_iter()
            .filter_map(|x| take_ring(x, &mut rings, &children))
            .collect()
    }
}

fn take_ring(
    idx: usize,
    rings: &mut [Option<NestedRing>],
    children: &[Vec<usize>],
) -> Option<NestedRing> {
    let mut ring = rings[idx].take()?;
    for child in &children[idx] {
        ring.inner_rings.extend(take_ring(*child, rings, children));
    }
    Some(ring)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{
        kernel::{
            polygon::{
                polyline_length, region_contains, start_at_lower_left,
                tests::{dumbbell, rect, square},
            },
            OffsetLoop, PlanarKernel,
        },
        layer::Winding,
        mesh::Mesh,
        Point,
    };

    fn engine_settings() -> InsetSettings {
        InsetSettings::from_config(&PrintConfig::default())
    }

    fn hole(min: f64, max: f64) -> Outline {
        let mut outline = square(min, max);
        outline.reverse();
        start_at_lower_left(&mut outline);
        outline
    }

    #[test]
    fn single_square() {
        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let engine = NestingEngine::new(&kernel, engine_settings());
        let rings = engine.nest(&[square(0.0, 10.0)], false, "square");

        assert_eq!(rings.len(), 1);
        let ring = &rings[0];
        assert!(ring.inner_rings.is_empty());
        assert_eq!(ring.winding(), Winding::Outer);
        assert_eq!(ring.perimeter.paths.len(), 1);

        let path = &ring.perimeter.paths[0];
        assert_eq!(path.points.len(), 5);
        assert!((path.start() - Point::new(0.2, 0.2)).norm() < 1e-9);
        assert!((path.points[2] - Point::new(9.8, 9.8)).norm() < 1e-9);
        assert!((signed_area(ring.boundary()) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn square_with_hole() {
        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let engine = NestingEngine::new(&kernel, engine_settings());
        let loops = [square(0.0, 10.0), hole(4.0, 6.0), square(4.9, 5.1)];
        let rings = engine.nest(&loops, false, "holed");

        assert_eq!(rings.len(), 1);
        let outer = &rings[0];
        assert_eq!(outer.inner_rings.len(), 1);
        let inner = &outer.inner_rings[0];
        assert_eq!(inner.winding(), Winding::Inner);
        assert!((inner.perimeter.paths[0].start() - Point::new(3.8, 3.8)).norm() < 1e-9);

        // The island in the hole is smaller than twice the bead and vanishes.
        assert!(inner.inner_rings.is_empty());
        assert_eq!(outer.rings().len(), 2);
    }

    #[test]
    fn island_inside_hole() {
        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let engine = NestingEngine::new(&kernel, engine_settings());
        let loops = [square(2.0, 8.0), square(0.0, 20.0), hole(1.0, 9.0)];
        let rings = engine.nest(&loops, false, "island");

        assert_eq!(rings.len(), 1);
        let hole = &rings[0].inner_rings[0];
        assert_eq!(hole.winding(), Winding::Inner);
        assert_eq!(hole.inner_rings.len(), 1);
        assert_eq!(hole.inner_rings[0].winding(), Winding::Outer);
    }

    #[test]
    fn overlapping_loops_are_cut() {
        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let settings = engine_settings();
        let width = settings.overlap_removal_width().unwrap();
        let engine = NestingEngine::new(&kernel, settings);
        let nested = engine.nest(&[square(0.0, 12.0), square(11.0, 20.0)], false, "overlap");
        let rings = nested.iter().flat_map(|x| x.rings()).collect::<Vec<_>>();
        assert_eq!(rings.len(), 2);

        let first = rings[0];
        assert_eq!(first.perimeter.paths.len(), 1);
        let band = filled_band(&first.perimeter.paths[0].points[..4], width);

        let second = rings[1];
        assert!(!second.perimeter.paths.is_empty());
        for path in &second.perimeter.paths {
            for pair in path.points.windows(2) {
                let middle = (pair[0] + pair[1]) / 2.0;
                assert!(!region_contains(&band, &middle), "{middle:?} prints over the first loop");
            }
        }
    }

    #[test]
    fn pinched_loop_nests_as_separate_rings() {
        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let mut settings = engine_settings();
        settings.extrusion_width = 1.0;
        let engine = NestingEngine::new(&kernel, settings);

        let rings = engine.nest(&[dumbbell()], false, "dumbbell");
        assert_eq!(rings.len(), 2);
        for ring in &rings {
            assert_eq!(ring.winding(), Winding::Outer);
            assert!(ring.inner_rings.is_empty());
            assert!((signed_area(ring.boundary()) - 16.0).abs() < 1e-9);

            assert_eq!(ring.perimeter.paths.len(), 1);
            let path = &ring.perimeter.paths[0];
            assert_eq!(path.start(), path.end());
            assert!((polyline_length(&path.points) - 12.0).abs() < 1e-9);
        }
    }

    #[test]
    fn bands_cover_the_whole_center_of_split_loops() {
        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let mut settings = engine_settings();
        settings.extrusion_width = 1.0;
        let engine = NestingEngine::new(&kernel, settings);

        // The tall loop's band cuts a short piece out of the bottom edge of
        // the square, which is then dropped. The small loop sits on that
        // piece and nowhere near what the square keeps.
        let loops = [
            rect(4.5, -150.5, 9.0, 5.5),
            square(-0.5, 20.5),
            rect(6.0, -0.75, 7.5, 0.75),
        ];
        let nested = engine.nest(&loops, false, "split");
        let rings = nested.iter().flat_map(|x| x.rings()).collect::<Vec<_>>();
        assert_eq!(rings.len(), 3);

        let by_area = |area: f64| {
            rings
                .iter()
                .find(|x| (signed_area(x.boundary()) - area).abs() < 1e-6)
                .unwrap()
        };
        let tall = by_area(702.0);
        assert_eq!(tall.perimeter.paths.len(), 1);
        assert_eq!(tall.perimeter.paths[0].start(), tall.perimeter.paths[0].end());

        let cut = by_area(441.0);
        assert_eq!(cut.perimeter.paths.len(), 1);
        let kept = &cut.perimeter.paths[0];
        assert_ne!(kept.start(), kept.end());
        assert!(kept.points.iter().all(|p| p.y > 0.1 || p.x < 4.6 || p.x > 8.9));

        assert!(by_area(2.25).perimeter.paths.is_empty());
    }

    #[test]
    fn no_overlap_removal() {
        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let mut settings = engine_settings();
        settings.overlap_removal_scaler = 0.05;
        assert!(settings.overlap_removal_width().is_none());

        let engine = NestingEngine::new(&kernel, settings);
        let nested = engine.nest(&[square(0.0, 12.0), square(11.0, 20.0)], false, "overlap");
        let rings = nested.iter().flat_map(|x| x.rings()).collect::<Vec<_>>();
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|x| x.perimeter.paths.len() == 1));
    }

    #[test]
    fn bridge_width() {
        let mut settings = engine_settings();
        settings.bridge_width_multiplier = 2.0;
        assert!((settings.half_width(false) - 0.2).abs() < 1e-12);
        assert!((settings.half_width(true) - 0.6).abs() < 1e-12);

        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let engine = NestingEngine::new(&kernel, settings);
        let sliced = SlicedLayer {
            z: 0.4,
            index: 1,
            loops: vec![square(0.0, 10.0)],
            bridge_rotation: Some(Point::new(1.0, 0.0)),
        };
        let layer = engine.build_layer(&sliced, "bridge");
        assert!(layer.is_bridge());
        let start = layer.nested_rings[0].perimeter.paths[0].start();
        assert!((start - Point::new(0.6, 0.6)).norm() < 1e-9);
    }

    struct CountingKernel {
        inner: PlanarKernel,
        offsets: Cell<usize>,
    }

    impl GeometryKernel for CountingKernel {
        fn slice_loops_by_z(&self, mesh: &Mesh) -> Vec<SlicedLayer> {
            self.inner.slice_loops_by_z(mesh)
        }

        fn offset_loop(&self, outline: &[Point], distance: f64) -> Vec<OffsetLoop> {
            self.offsets.set(self.offsets.get() + 1);
            self.inner.offset_loop(outline, distance)
        }
    }

    #[test]
    fn degenerate_loops_are_skipped() {
        let kernel = CountingKernel {
            inner: PlanarKernel::from_config(&PrintConfig::default()),
            offsets: Cell::new(0),
        };
        let engine = NestingEngine::new(&kernel, engine_settings());
        let loops = vec![
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)],
            square(0.0, 0.3),
            square(0.0, 5.0),
        ];

        let rings = engine.nest(&loops, false, "degenerate");
        assert_eq!(kernel.offsets.get(), 2);
        assert_eq!(rings.len(), 1);

        let empty = engine.build_layer(
            &SlicedLayer {
                z: 0.2,
                index: 0,
                loops: vec![square(0.0, 0.1)],
                bridge_rotation: None,
            },
            "tiny",
        );
        assert!(empty.nested_rings.is_empty());
        let start = rings[0].start_point().unwrap();
        assert!((start - Point::new(0.2, 0.2)).norm() < 1e-9);
    }
}
