//! Turns scheduled layer groups into printer instructions.

use common::{
    config::PrintConfig,
    gcode::{Code, Instruction},
};
use tracing::{debug, warn};

use crate::{
    layer::Layer,
    path::{Path, Rates},
    scene::File,
    schedule::LayerGroup,
    toolpath::{BoundaryComb, CombRouter, ExtrusionContext, TravelPath},
    Point,
};

pub struct GcodeGenerator<'a> {
    config: &'a PrintConfig,
    rates: Rates,
}

/// `M82` or `M83` matching the configured extrusion mode, when extrusion
/// words are emitted at all.
pub fn extrusion_mode(config: &PrintConfig) -> Option<Instruction> {
    let code = match config.dimension.relative_extrusion {
        true => Code::RelativeExtrusion,
        false => Code::AbsoluteExtrusion,
    };
    config.dimension.active.then(|| Instruction::new(code))
}

impl<'a> GcodeGenerator<'a> {
    pub fn new(config: &'a PrintConfig) -> Self {
        Self {
            config,
            rates: Rates::from_config(config),
        }
    }

    pub fn rates(&self) -> &Rates {
        &self.rates
    }

    /// Start lines, the preface, every layer group in order and the end
    /// lines.
    pub fn generate(
        &self,
        file: &File,
        groups: &[LayerGroup],
        context: &mut ExtrusionContext,
    ) -> Vec<Instruction> {
        context.restart();
        let mut out = self.start_commands(context);
        for group in groups {
            out.extend(self.layer_group(file, group, context));
        }
        out.extend(self.end_commands());
        out
    }

    pub fn start_commands(&self, context: &mut ExtrusionContext) -> Vec<Instruction> {
        let preface = &self.config.preface;
        let mut out = preface
            .start_lines
            .iter()
            .map(Instruction::raw)
            .collect::<Vec<_>>();

        for (enabled, code) in [
            (preface.absolute_positioning, Code::AbsolutePositioning),
            (preface.units_millimeters, Code::UnitsMillimeters),
            (preface.start_at_home, Code::StartAtHome),
        ] {
            if enabled {
                out.push(Instruction::new(code));
            }
        }

        if preface.reset_extruder {
            out.push(context.extruder_mut().reset());
        }
        out
    }

    pub fn end_commands(&self) -> Vec<Instruction> {
        self.config
            .preface
            .end_lines
            .iter()
            .map(Instruction::raw)
            .collect()
    }

    /// Every path of every layer in the group, each preceded by a travel
    /// from where the last one ended. The commands around the group come
    /// from its first layer.
    pub fn layer_group(
        &self,
        file: &File,
        group: &LayerGroup,
        context: &mut ExtrusionContext,
    ) -> Vec<Instruction> {
        let layers = group.layers(file).collect::<Vec<_>>();
        let Some(first) = layers.first() else {
            warn!("Layer group at z {} has no layers", group.z);
            return Vec::new();
        };

        context.start_group();
        let mut out = first.pre_commands.clone();

        let comb = self.config.comb.active.then(|| {
            let boundaries = layers.iter().flat_map(|x| x.boundaries()).collect();
            BoundaryComb::new(group.z, boundaries)
        });
        let router = comb.as_ref().map(|x| x as &dyn CombRouter);

        let mut paths = 0;
        for layer in &layers {
            for path in layer.ordered_paths(&self.config.fill.print_order) {
                if path.length() <= 0.0 {
                    warn!(
                        "Skipping zero length {:?} path in layer {} at z {}",
                        path.kind, layer.index, layer.z
                    );
                    continue;
                }

                let travel = TravelPath::new(context.previous(), path.start().push(layer.z));
                self.travel(&travel, layer.feed_and_flow_multiplier.0, router, context, &mut out);
                self.extrude(path, layer, context, &mut out);
                paths += 1;
            }
        }

        debug!("Layer group at z {} has {paths} paths", group.z);
        out.extend(first.post_commands.iter().cloned());
        out
    }

    /// Retracts if the move takes any time, turns the extruder off, moves
    /// through the combed waypoints and undoes the retraction.
    pub fn travel(
        &self,
        travel: &TravelPath,
        feed_multiplier: f64,
        router: Option<&dyn CombRouter>,
        context: &mut ExtrusionContext,
        out: &mut Vec<Instruction>,
    ) {
        let idle = travel.transit_time(self.rates.extrusion_feed);
        let retract = self.config.dimension.active && idle > 0.0;

        if retract {
            let commands = context
                .extruder_mut()
                .retract(idle, self.rates.travel_feed);
            out.extend(commands);
        }
        out.push(Instruction::new(Code::ExtruderOff));

        let feed = self
            .rates
            .scaled_feed_rate(self.rates.travel_feed, feed_multiplier);
        for point in travel.waypoints(router) {
            let mut instruction = self.position(&point, travel.to.z);
            if self.config.speed.active {
                instruction = instruction.with('F', feed, self.config.general.decimal_places);
            }
            out.push(instruction);
        }
        context.move_to(travel.to);

        if retract {
            let commands = context
                .extruder_mut()
                .reverse_retract(self.rates.travel_feed);
            out.extend(commands);
        }
        out.push(Instruction::new(Code::ExtruderOn));
    }

    /// One move per point after the first, at the path's feed rate scaled
    /// for the layer and extruding in proportion to the distance covered.
    pub fn extrude(
        &self,
        path: &Path,
        layer: &Layer,
        context: &mut ExtrusionContext,
        out: &mut Vec<Instruction>,
    ) {
        let bridge = layer.is_bridge();
        let (feed_multiplier, flow_multiplier) = layer.feed_and_flow_multiplier;
        let feed = self
            .rates
            .scaled_feed_rate(self.rates.feed_rate_minute(path.kind, bridge), feed_multiplier);
        let flow = self.rates.flow_rate(path.kind, bridge) * flow_multiplier;

        let general = &self.config.general;
        let mut previous = path.start();
        for point in &path.points[1..] {
            let mut instruction = self.position(point, layer.z);
            if self.config.speed.active {
                instruction = instruction.with('F', feed, general.decimal_places);
            }
            if self.config.dimension.active {
                let extruder = context.extruder_mut();
                let distance = extruder.extrusion_distance((point - previous).norm(), flow, feed);
                instruction =
                    instruction.with(extruder.axis_code, distance, general.dimension_decimal_places);
            }

            previous = *point;
            out.push(instruction);
        }

        context.move_to(path.end().push(layer.z));
    }

    fn position(&self, point: &Point, z: f64) -> Instruction {
        let places = self.config.general.decimal_places;
        Instruction::linear_move()
            .with('X', point.x, places)
            .with('Y', point.y, places)
            .with('Z', z, places)
    }
}
