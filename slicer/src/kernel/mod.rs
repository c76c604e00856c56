//! The geometry collaborator used by the planner. Everything that turns a
//! mesh into loops or grows and shrinks loops goes through
//! [`GeometryKernel`] so it can be swapped or instrumented.

use common::config::PrintConfig;
use ordered_float::OrderedFloat;

use crate::{
    mesh::Mesh,
    slicer::{SlicedLayer, Slicer},
    Outline, Point,
};

pub mod polygon;

/// The result of offsetting a loop: `center` is the offset loop itself and
/// `outset` is that loop grown back by the same distance, the outline the
/// bead actually covers.
#[derive(Clone, Debug, PartialEq)]
pub struct OffsetLoop {
    pub outset: Outline,
    pub center: Outline,
}

pub trait GeometryKernel {
    /// Cuts a mesh into Z sorted layers of closed loops.
    fn slice_loops_by_z(&self, mesh: &Mesh) -> Vec<SlicedLayer>;

    /// Offsets a loop to the left of its direction by `distance`. A loop
    /// that pinches off gives one result per piece, one that collapses
    /// gives none.
    fn offset_loop(&self, outline: &[Point], distance: f64) -> Vec<OffsetLoop>;

    fn is_widdershins(&self, outline: &[Point]) -> bool {
        polygon::is_widdershins(outline)
    }

    fn loop_contains_point(&self, outline: &[Point], point: &Point) -> bool {
        polygon::contains_point(outline, point)
    }

    fn find_enclosing_loop(&self, candidates: &[Outline], outline: &[Point]) -> Option<usize> {
        polygon::enclosing_index(candidates, outline)
    }
}

/// The built in kernel: plane slicing plus clipper offsets.
pub struct PlanarKernel {
    slicer: Slicer,
}

impl PlanarKernel {
    pub fn new(slicer: Slicer) -> Self {
        Self { slicer }
    }

    pub fn from_config(config: &PrintConfig) -> Self {
        Self::new(Slicer::from_config(config))
    }
}

impl GeometryKernel for PlanarKernel {
    fn slice_loops_by_z(&self, mesh: &Mesh) -> Vec<SlicedLayer> {
        self.slicer.slice(mesh)
    }

    fn offset_loop(&self, outline: &[Point], distance: f64) -> Vec<OffsetLoop> {
        polygon::offset_outline(outline, distance)
            .into_iter()
            .map(|center| {
                let outset = polygon::offset_outline(&center, -distance)
                    .into_iter()
                    .max_by_key(|x| OrderedFloat(polygon::signed_area(x).abs()))
                    .unwrap_or_else(|| center.clone());
                OffsetLoop { outset, center }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        polygon::{
            signed_area,
            tests::{dumbbell, square},
        },
        *,
    };

    #[test]
    fn offset_keeps_outset_on_boundary() {
        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let offsets = kernel.offset_loop(&square(0.0, 10.0), 0.2);
        assert_eq!(offsets.len(), 1);

        let offset = &offsets[0];
        assert_eq!(offset.center.len(), 4);
        assert_eq!(offset.outset.len(), 4);
        for (a, b) in offset.outset.iter().zip(square(0.0, 10.0).iter()) {
            assert!((a - b).norm() < 1e-9);
        }
        assert!(kernel.offset_loop(&square(0.0, 0.3), 0.2).is_empty());
    }

    #[test]
    fn pinched_loop_gives_one_offset_per_piece() {
        let kernel = PlanarKernel::from_config(&PrintConfig::default());
        let offsets = kernel.offset_loop(&dumbbell(), 0.5);
        assert_eq!(offsets.len(), 2);

        for offset in &offsets {
            assert!((signed_area(&offset.center) - 9.0).abs() < 1e-9);
            assert!((signed_area(&offset.outset) - 16.0).abs() < 1e-9);
        }
    }
}
