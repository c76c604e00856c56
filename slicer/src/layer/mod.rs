use common::{config::PrintOrder, gcode::Instruction, misc::round_to};
use tracing::error;

use crate::{
    path::{Path, Rates},
    slicer::Z_DECIMAL_PLACES,
    transform::Placement,
    Outline, Point,
};

mod nested_ring;
pub use nested_ring::{BoundaryPerimeter, NestedRing, Winding};

/// Everything printed at one height of one volume.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub z: f64,
    pub index: usize,
    /// Set for layers printed over air.
    pub bridge_rotation: Option<Point>,
    pub nested_rings: Vec<NestedRing>,
    pub support_paths: Vec<Path>,
    /// Instructions emitted before the first path of the layer group this
    /// layer starts.
    pub pre_commands: Vec<Instruction>,
    pub post_commands: Vec<Instruction>,
    /// Multipliers applied to the feed rate and flow rate of every path.
    pub feed_and_flow_multiplier: (f64, f64),
}

impl Layer {
    pub fn new(z: f64, index: usize) -> Self {
        Self {
            z,
            index,
            bridge_rotation: None,
            nested_rings: Vec::new(),
            support_paths: Vec::new(),
            pre_commands: Vec::new(),
            post_commands: Vec::new(),
            feed_and_flow_multiplier: (1.0, 1.0),
        }
    }

    pub fn is_bridge(&self) -> bool {
        self.bridge_rotation.is_some()
    }

    /// Every ring of the layer, depth first.
    pub fn rings(&self) -> Vec<&NestedRing> {
        self.nested_rings.iter().flat_map(|x| x.rings()).collect()
    }

    pub fn for_each_ring_mut(&mut self, mut f: impl FnMut(&mut NestedRing)) {
        for ring in &mut self.nested_rings {
            ring.for_each_ring_mut(&mut f);
        }
    }

    pub fn boundaries(&self) -> Vec<Outline> {
        self.rings().iter().map(|x| x.boundary().clone()).collect()
    }

    /// Support paths first, then the contribution of every ring for each
    /// entry of `order`.
    pub fn ordered_paths(&self, order: &[PrintOrder]) -> Vec<&Path> {
        let mut out = self.support_paths.iter().collect::<Vec<_>>();
        for kind in order {
            for ring in &self.nested_rings {
                match kind {
                    PrintOrder::Perimeter => ring.perimeter_paths(&mut out),
                    PrintOrder::Loops => ring.loop_paths(&mut out),
                    PrintOrder::Infill => ring.infill_paths(&mut out),
                }
            }
        }
        out
    }

    pub fn start_point(&self, order: &[PrintOrder]) -> Option<Point> {
        self.ordered_paths(order).first().map(|x| x.start())
    }

    pub fn distance_and_duration(&self, rates: &Rates) -> (f64, f64) {
        let bridge = self.is_bridge();
        let support = self
            .support_paths
            .iter()
            .map(|x| x.distance_and_duration(rates, bridge));
        let rings = self
            .nested_rings
            .iter()
            .map(|x| x.distance_and_duration(rates, bridge));

        let (distance, duration) = support
            .chain(rings)
            .fold((0.0, 0.0), |(d, t), (dx, tx)| (d + dx, t + tx));
        let (feed, _) = self.feed_and_flow_multiplier;
        (distance, duration / feed)
    }

    pub fn offset(&mut self, delta: &Point) {
        self.nested_rings.iter_mut().for_each(|x| x.offset(delta));
        self.support_paths.iter_mut().for_each(|x| x.offset(delta));
    }

    /// A copy of the layer moved by a planar placement, with its height
    /// shifted by the placement's Z displacement. Placements that tilt the
    /// layer are an error and give `None`.
    pub fn placed(&self, placement: &Placement) -> Option<Layer> {
        if !placement.is_planar() {
            error!(
                "Can not rotate layer {} at z {} out of the XY plane by {placement:?}",
                self.index, self.z
            );
            return None;
        }

        let planar = placement.flattened();
        let placed = self
            .nested_rings
            .iter()
            .map(|x| x.placed(&planar))
            .collect::<anyhow::Result<Vec<_>>>()
            .and_then(|rings| {
                let support = self
                    .support_paths
                    .iter()
                    .map(|x| x.placed(&planar))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok((rings, support))
            });

        let (nested_rings, support_paths) = match placed {
            Ok(x) => x,
            Err(err) => {
                error!("Failed to place layer {} at z {}: {err}", self.index, self.z);
                return None;
            }
        };

        let bridge_rotation = self
            .bridge_rotation
            .map(|x| planar.apply_rotation_only(&x.push(0.0)).xy());

        Some(Layer {
            z: round_to(self.z + placement.displacement().z, Z_DECIMAL_PLACES),
            index: self.index,
            bridge_rotation,
            nested_rings,
            support_paths,
            pre_commands: self.pre_commands.clone(),
            post_commands: self.post_commands.clone(),
            feed_and_flow_multiplier: self.feed_and_flow_multiplier,
        })
    }
}
