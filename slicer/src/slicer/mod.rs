//! Cuts meshes into horizontal layers of closed boundary loops.

use std::time::Instant;

use common::{config::PrintConfig, misc::round_to};
use tracing::{debug, warn};

use crate::{mesh::Mesh, Outline, Point};

mod join;
pub use join::{join_segments, orient_loops};

/// Layer heights are kept to this many decimals so equal layers of
/// different objects compare equal.
pub const Z_DECIMAL_PLACES: u32 = 3;

/// The loops of one layer as produced by a geometry kernel.
#[derive(Clone, Debug, PartialEq)]
pub struct SlicedLayer {
    /// Height of the top of the layer.
    pub z: f64,
    /// Index of the layer counted from the bottom of the mesh.
    pub index: usize,
    pub loops: Vec<Outline>,
    /// Direction of bridging infill, for layers printed over air.
    pub bridge_rotation: Option<Point>,
}

#[derive(Clone, Debug)]
pub struct Slicer {
    layer_height: f64,
    print_from: usize,
    print_to: Option<usize>,
}

impl Slicer {
    pub fn new(layer_height: f64) -> Self {
        Self {
            layer_height,
            print_from: 0,
            print_to: None,
        }
    }

    pub fn from_config(config: &PrintConfig) -> Self {
        Self {
            layer_height: config.carve.layer_height,
            print_from: config.carve.layer_print_from,
            print_to: config.carve.layer_print_to,
        }
    }

    /// Only layers with an index in `from..to` are kept.
    pub fn with_print_window(mut self, from: usize, to: Option<usize>) -> Self {
        self.print_from = from;
        self.print_to = to;
        self
    }

    pub fn layer_height(&self) -> f64 {
        self.layer_height
    }

    /// Slices through the middle of every layer. Each layer's loops are
    /// oriented so solid material is on their left and start at their lower
    /// left point.
    pub fn slice(&self, mesh: &Mesh) -> Vec<SlicedLayer> {
        let start = Instant::now();
        if mesh.face_count() == 0 {
            warn!("Mesh has no faces, nothing to slice");
            return Vec::new();
        }

        let (min, max) = mesh.bounds();
        let h = self.layer_height;
        let first = (min.z / h).floor() as i64;

        let mut layers = Vec::new();
        let mut k = first;
        while (k as f64 + 0.5) * h < max.z {
            let index = (k - first) as usize;
            k += 1;

            if index < self.print_from || self.print_to.is_some_and(|to| index >= to) {
                continue;
            }

            let height = (index as f64 + first as f64 + 0.5) * h;
            let segments = mesh.intersect_plane(height);
            let mut loops = join_segments(&segments);
            if loops.is_empty() {
                warn!("No loops in layer {index} at z {height:.3}");
                continue;
            }

            orient_loops(&mut loops);
            layers.push(SlicedLayer {
                z: round_to((index as f64 + first as f64 + 1.0) * h, Z_DECIMAL_PLACES),
                index,
                loops,
                bridge_rotation: None,
            });
        }

        if layers.is_empty() {
            warn!("Mesh produced no slices");
        }

        debug!("Sliced {} layers in {:?}", layers.len(), start.elapsed());
        layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kernel::polygon::signed_area, mesh::tests::cuboid, Pos};

    #[test]
    fn cube_layers() {
        let mesh = cuboid(Pos::zeros(), Pos::new(10.0, 10.0, 1.0));
        let layers = Slicer::new(0.2).slice(&mesh);

        assert_eq!(layers.len(), 5);
        let heights = layers.iter().map(|x| x.z).collect::<Vec<_>>();
        assert_eq!(heights, vec![0.2, 0.4, 0.6, 0.8, 1.0]);

        for layer in &layers {
            assert_eq!(layer.loops.len(), 1);
            let outline = &layer.loops[0];
            assert_eq!(outline.len(), 4);
            assert!((signed_area(outline) - 100.0).abs() < 1e-9);
            assert!(outline[0].norm() < 1e-9);
        }
    }

    #[test]
    fn print_window() {
        let mesh = cuboid(Pos::zeros(), Pos::new(10.0, 10.0, 1.0));
        let layers = Slicer::new(0.2).with_print_window(1, Some(3)).slice(&mesh);
        let indices = layers.iter().map(|x| x.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(layers[0].z, 0.4);
    }

    #[test]
    fn raised_mesh_keeps_absolute_heights() {
        let mesh = cuboid(Pos::new(0.0, 0.0, 2.0), Pos::new(1.0, 1.0, 2.4));
        let layers = Slicer::new(0.2).slice(&mesh);
        let heights = layers.iter().map(|x| x.z).collect::<Vec<_>>();
        assert_eq!(heights, vec![2.2, 2.4]);
    }
}
