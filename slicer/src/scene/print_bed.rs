use common::misc::round_to;
use tracing::{debug, warn};

use crate::{
    scene::{File, Instance, ObjectId},
    slicer::Z_DECIMAL_PLACES,
    transform::Placement,
    Pos,
};

impl File {
    /// Replaces the instances on the print bed with the object instances
    /// they lead to, composing placements through nested constellations.
    pub fn flatten_print_bed(&mut self) {
        let flat = self
            .print_bed
            .flatten_instances(self, true, &Placement::identity());
        self.print_bed.instances = flat;
    }

    /// The distinct objects on the print bed, in first seen order.
    pub fn bed_objects(&self) -> Vec<ObjectId> {
        self.print_bed.objects(self, true)
    }

    /// Turns every placed instance on the bed into an unplaced instance of
    /// an object that already sits where it should. Tilted instances reuse
    /// an earlier copy when the two differ by a flat placement shifting
    /// whole layers, so both share one slicing pass.
    pub fn finalize_print_bed(&mut self, layer_height: f64, tolerance: f64) {
        self.flatten_print_bed();

        let instances = std::mem::take(&mut self.print_bed.instances);
        let mut finalized = Vec::with_capacity(instances.len());

        for instance in instances {
            if instance.placement.is_identity() {
                finalized.push(instance);
                continue;
            }

            let target = if instance.placement.is_planar() {
                self.derived_object(instance.target, &instance.placement)
            } else {
                match self.shared_slices(&instance, layer_height, tolerance) {
                    Some((base, difference)) => {
                        debug!(
                            "Object {} at {:?} reuses the slices of object {base}",
                            instance.target, instance.placement
                        );
                        self.derived_object(base, &difference)
                    }
                    None => self.derived_object(instance.target, &instance.placement),
                }
            };

            match target {
                Some(id) => finalized.push(Instance::new(id, Placement::identity())),
                None => warn!(
                    "Dropping instance of unknown object {} from the print bed",
                    instance.target
                ),
            }
        }

        self.print_bed.instances = finalized;
    }

    /// Height of the lowest layer on the bed, `None` when nothing on it
    /// has layers.
    pub fn bottom_layer_z(&self) -> Option<f64> {
        self.print_bed
            .instances
            .iter()
            .filter_map(|instance| {
                let lowest = self
                    .object(instance.target)?
                    .layers()
                    .map(|x| x.z)
                    .min_by(f64::total_cmp)?;
                Some(lowest + instance.placement.displacement().z)
            })
            .min_by(f64::total_cmp)
    }

    /// Moves everything on the finalized bed up or down together so the
    /// lowest layer ends at `z`, then finalizes the bed again. Sliced
    /// objects carry their layers into the moved copies. Returns the
    /// distance moved.
    pub fn align_bottom(&mut self, z: f64, layer_height: f64, tolerance: f64) -> f64 {
        let Some(bottom) = self.bottom_layer_z() else {
            return 0.0;
        };

        let shift = round_to(z - bottom, Z_DECIMAL_PLACES);
        if shift == 0.0 {
            return 0.0;
        }

        debug!("Moving the print bed by {shift} so its lowest layer is at {z}");
        let shift = Pos::new(0.0, 0.0, shift);
        for instance in &mut self.print_bed.instances {
            instance.placement.translate(&shift);
        }
        self.finalize_print_bed(layer_height, tolerance);
        shift.z
    }

    /// An existing copy of the instance's object that differs from the
    /// wanted placement only by a flat move of whole layers, along with
    /// that move.
    fn shared_slices(
        &self,
        instance: &Instance,
        layer_height: f64,
        tolerance: f64,
    ) -> Option<(ObjectId, Placement)> {
        let source = self.object(instance.target)?;

        source.derived_objects().iter().find_map(|id| {
            let from = self.object(*id)?.derived_from.as_ref()?;
            let difference = &instance.placement / &from.placement;
            if !difference.is_planar() {
                return None;
            }

            let steps = difference.displacement().z / layer_height;
            ((steps - steps.round()).abs() * layer_height <= tolerance)
                .then_some((*id, difference))
        })
    }

    /// Copies layers onto a derived object from the object it was derived
    /// from, once that one is sliced. Returns whether the object has layers
    /// afterwards.
    pub fn place_layers_from_source(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.object(id) else {
            return false;
        };
        if object.is_sliced() {
            return true;
        }

        let Some(from) = object.derived_from.as_ref() else {
            return false;
        };
        if !from.placement.is_planar() {
            return false;
        }

        let layers = match self.object(from.target) {
            Some(source) if source.is_sliced() => source.placed_layers(&from.placement),
            _ => return false,
        };

        match (layers, self.object_mut(id)) {
            (Some(layers), Some(object)) => {
                object.set_layers(layers);
                true
            }
            _ => {
                warn!("Could not place layers onto object {id}");
                false
            }
        }
    }
}
