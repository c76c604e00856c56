//! Runs a print file through slicing, nesting, filling, scheduling and
//! instruction synthesis.

use std::{collections::BTreeSet, sync::Arc, time::Instant};

use anyhow::Result;
use common::{config::PrintConfig, gcode::Instruction};
use tracing::{info, warn};

use crate::{
    gcode::{extrusion_mode, GcodeGenerator},
    kernel::{GeometryKernel, PlanarKernel},
    nesting::{InsetSettings, NestingEngine},
    scene::{File, ObjectId},
    schedule::{layer_groups, LayerGroup},
    strategy::{FillStrategy, StrategyRegistry, SupportStrategy},
    toolpath::ExtrusionContext,
};

pub struct Pipeline {
    config: PrintConfig,
    kernel: Box<dyn GeometryKernel>,
    fill: Arc<dyn FillStrategy>,
    support: Arc<dyn SupportStrategy>,
}

pub struct PrintResult {
    pub instructions: Vec<Instruction>,
    pub layer_groups: Vec<LayerGroup>,
    /// Filament pushed through the nozzle in mm.
    pub filament_used: f64,
    /// Length of every extrusion in mm.
    pub distance: f64,
    /// Estimated time spent extruding in seconds.
    pub print_time: f64,
}

impl Pipeline {
    /// Checks the config and resolves the configured strategies, failing
    /// before anything is sliced.
    pub fn new(
        config: PrintConfig,
        kernel: Box<dyn GeometryKernel>,
        registry: &StrategyRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let fill = registry.fill(&config.fill.strategy)?;
        let support = registry.support(&config.support.strategy)?;

        Ok(Self {
            config,
            kernel,
            fill,
            support,
        })
    }

    /// A pipeline using the built in kernel and strategies.
    pub fn from_config(config: PrintConfig) -> Result<Self> {
        let kernel = Box::new(PlanarKernel::from_config(&config));
        Self::new(config, kernel, &StrategyRegistry::builtin())
    }

    pub fn config(&self) -> &PrintConfig {
        &self.config
    }

    pub fn run(&self, file: &mut File) -> Result<PrintResult> {
        let start = Instant::now();
        let carve = &self.config.carve;

        // Objects placed flat are sliced once and copied. Tilted ones wait
        // until the bed is finalized so copies that share slices are known.
        file.flatten_print_bed();
        let flat = file
            .print_bed()
            .instances
            .iter()
            .filter(|x| x.placement.is_planar())
            .map(|x| x.target)
            .collect::<BTreeSet<_>>();
        for id in &flat {
            self.prepare_object(file, *id)?;
        }
        info!("Prepared {} object(s) in {:?}", flat.len(), start.elapsed());

        let finalize = Instant::now();
        file.finalize_print_bed(carve.layer_height, carve.layer_height_tolerance);
        let placed = self.prepare_pending(file)?;
        info!(
            "Finalized the print bed with {placed} placed object(s) in {:?}",
            finalize.elapsed()
        );

        let bottom = &self.config.bottom;
        if bottom.active {
            let z = bottom.altitude + bottom.additional_height_ratio * carve.layer_height;
            let shift = file.align_bottom(z, carve.layer_height, carve.layer_height_tolerance);
            if shift != 0.0 {
                info!("Moved the print bed by {shift} mm to put its lowest layer at {z}");
                self.prepare_pending(file)?;
            }
        }

        let groups = layer_groups(file);
        if groups.is_empty() {
            warn!("Nothing on the print bed produced any layers");
        }
        self.support.support(file, &groups, &self.config);

        let speed = &self.config.speed;
        if let Some(first) = groups.first() {
            let multiplier = (
                speed.first_layer_feed_rate_ratio,
                speed.first_layer_flow_rate_ratio,
            );
            for member in &first.members {
                if let Some(layer) = member.get_mut(file) {
                    layer.feed_and_flow_multiplier = multiplier;
                }
            }
        }

        let generate = Instant::now();
        let generator = GcodeGenerator::new(&self.config);
        let mut context = ExtrusionContext::from_config(&self.config)?;
        let instructions = generator.generate(file, &groups, &mut context);
        info!(
            "Generated {} instructions for {} layer group(s) in {:?}",
            instructions.len(),
            groups.len(),
            generate.elapsed()
        );

        let (distance, print_time) = groups
            .iter()
            .flat_map(|x| x.layers(file))
            .map(|x| x.distance_and_duration(generator.rates()))
            .fold((0.0, 0.0), |(d, t), (dx, tx)| (d + dx, t + tx));

        info!("Planned the print in {:?}", start.elapsed());
        Ok(PrintResult {
            instructions,
            layer_groups: groups,
            filament_used: context.filament_extruded(),
            distance,
            print_time,
        })
    }

    /// Gives layers to every object on the bed still without them, copying
    /// them from a sliced source where possible. Returns how many objects
    /// were pending.
    fn prepare_pending(&self, file: &mut File) -> Result<usize> {
        let pending = file
            .bed_objects()
            .into_iter()
            .filter(|x| file.object(*x).is_some_and(|x| !x.is_sliced()))
            .collect::<BTreeSet<_>>();
        for id in &pending {
            if !file.place_layers_from_source(*id) {
                self.prepare_object(file, *id)?;
            }
        }
        Ok(pending.len())
    }

    /// Slices every volume of an object, nests the loops of each layer and
    /// applies the fill strategy.
    fn prepare_object(&self, file: &mut File, id: ObjectId) -> Result<()> {
        let Some(object) = file.object(id) else {
            warn!("Object {id} is not in the file");
            return Ok(());
        };
        if object.is_sliced() {
            return Ok(());
        }

        let label = object.label();
        let engine = NestingEngine::new(self.kernel.as_ref(), InsetSettings::from_config(&self.config));

        let mut volumes = Vec::with_capacity(object.volumes.len());
        for volume in 0..object.volumes.len() {
            let label = match object.volumes.len() {
                1 => label.clone(),
                _ => format!("{label} volume {volume}"),
            };

            let sliced = self.kernel.slice_loops_by_z(&object.volume_mesh(volume)?);
            let mut layers = sliced
                .iter()
                .map(|x| engine.build_layer(x, &label))
                .collect::<Vec<_>>();

            for (index, layer) in layers.iter_mut().enumerate() {
                layer.index = index;
                layer.pre_commands.extend(extrusion_mode(&self.config));
                self.fill.fill(layer, &self.config);
            }

            if layers.is_empty() {
                warn!("No layers in {label}");
            }
            volumes.push(layers);
        }

        if let Some(object) = file.object_mut(id) {
            object.set_layers(volumes);
        }
        Ok(())
    }
}
